// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{
        AuthResponse, Claims, HierarchyRefs, LoginUserPayload, RegisterUserPayload, User, UserRole,
    },
    services::user_service::UserService,
};

/// bcrypt é caro: roda fora do runtime async.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    let valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(valid)
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    user_service: UserService,
    jwt_secret: String,
    token_ttl_days: i64,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        user_service: UserService,
        jwt_secret: String,
        token_ttl_days: i64,
    ) -> Self {
        Self {
            user_repo,
            user_service,
            jwt_secret,
            token_ttl_days,
        }
    }

    /// Auto-cadastro numa cadeira livre. Admins só são criados por outro admin.
    pub async fn register_user(&self, payload: RegisterUserPayload) -> Result<AuthResponse, AppError> {
        if payload.role == UserRole::Admin {
            return Err(AppError::forbidden("Admin accounts cannot be self-registered"));
        }

        let user = self.user_service.create_user(payload).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Novo usuário registrado");

        let token = self.create_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    pub async fn login_user(&self, payload: &LoginUserPayload) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(&payload.email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&payload.password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let token = self.create_token(&user)?;
        Ok(AuthResponse { token, user })
    }

    /// Decodifica o token e recarrega o usuário do banco, para que mudanças
    /// de papel ou cadeira valham já na próxima requisição.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    /// Cria o primeiro admin se nenhum existir.
    pub async fn bootstrap_admin(&self, name: &str, email: &str, password: &str) -> Result<bool, AppError> {
        if self.user_repo.has_admin().await? {
            return Ok(false);
        }

        let user = self
            .user_service
            .create_user(RegisterUserPayload {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                phone: None,
                role: UserRole::Admin,
                refs: HierarchyRefs::default(),
            })
            .await?;
        tracing::info!(user_id = %user.id, "Admin inicial criado");
        Ok(true)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(self.token_ttl_days);

        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
