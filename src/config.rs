// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, str::FromStr, time::Duration};

use crate::{
    db::{HierarchyRepository, MessageRepository, NotificationRepository, ReportRepository, UserRepository},
    services::{
        auth::AuthService, export_service::ExportService, hierarchy_service::HierarchyService,
        messaging_service::MessagingService, notification_service::NotificationService,
        report_service::ReportService, user_service::UserService,
    },
};

/// Credenciais do admin inicial, se configuradas.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub jwt_ttl_days: i64,
    pub admin: Option<AdminBootstrap>,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} deve ser definida"))
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} inválida: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminBootstrap {
                name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_ttl_days: parsed_or("JWT_TTL_DAYS", 7)?,
            admin,
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub hierarchy_service: HierarchyService,
    pub report_service: ReportService,
    pub messaging_service: MessagingService,
    pub notification_service: NotificationService,
    pub export_service: ExportService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, config))
    }

    /// Monta o gráfico de dependências sobre um pool já criado.
    pub fn from_pool(db_pool: PgPool, config: &Config) -> Self {
        let user_repo = UserRepository::new(db_pool.clone());
        let hierarchy_repo = HierarchyRepository::new(db_pool.clone());
        let report_repo = ReportRepository::new(db_pool.clone());
        let message_repo = MessageRepository::new(db_pool.clone());
        let notification_repo = NotificationRepository::new(db_pool.clone());

        let notification_service = NotificationService::new(notification_repo, user_repo.clone());
        let user_service = UserService::new(db_pool.clone(), user_repo.clone(), hierarchy_repo.clone());
        let auth_service = AuthService::new(
            user_repo.clone(),
            user_service.clone(),
            config.jwt_secret.clone(),
            config.jwt_ttl_days,
        );
        let hierarchy_service = HierarchyService::new(hierarchy_repo.clone());
        let report_service = ReportService::new(report_repo, hierarchy_repo, notification_service.clone());
        let messaging_service = MessagingService::new(message_repo, user_repo, notification_service.clone());
        let export_service = ExportService::new(report_service.clone());

        Self {
            db_pool,
            auth_service,
            user_service,
            hierarchy_service,
            report_service,
            messaging_service,
            notification_service,
            export_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_values_fall_back_to_defaults() {
        let ttl: i64 = parsed_or("CLEARVIEW_TEST_UNSET_TTL", 7).unwrap();
        assert_eq!(ttl, 7);
    }

    #[test]
    fn missing_required_values_are_named_in_the_error() {
        let err = required("CLEARVIEW_TEST_UNSET_SECRET").unwrap_err();
        assert!(err.to_string().contains("CLEARVIEW_TEST_UNSET_SECRET"));
    }
}
