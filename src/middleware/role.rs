// src/middleware/role.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::auth::{User, UserRole},
};

/// Papéis aceitos por uma rota.
pub trait RoleDef: Send + Sync + 'static {
    fn allowed() -> &'static [UserRole];

    fn describe() -> &'static str;
}

/// Guardião por papel. Entrega o usuário já conferido.
pub struct RequireRole<T>(pub User, PhantomData<T>);

impl<T> RequireRole<T> {
    pub fn user(&self) -> &User {
        &self.0
    }
}

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !T::allowed().contains(&user.role) {
            tracing::warn!(user_id = %user.id, role = %user.role, "Acesso negado por papel");
            return Err(AppError::forbidden(format!(
                "Only {} can perform this action",
                T::describe()
            )));
        }

        Ok(RequireRole(user, PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct Admin;
impl RoleDef for Admin {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::Admin]
    }

    fn describe() -> &'static str {
        "admins"
    }
}

pub struct CentreLeader;
impl RoleDef for CentreLeader {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::CithCentre]
    }

    fn describe() -> &'static str {
        "CITH centre users"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;
    use uuid::Uuid;

    fn parts_with(role: Option<UserRole>) -> Parts {
        let (mut parts, _) = Request::new(()).into_parts();
        if let Some(role) = role {
            let now = Utc::now();
            parts.extensions.insert(User {
                id: Uuid::new_v4(),
                name: "Tester".into(),
                email: "tester@church.org".into(),
                password_hash: String::new(),
                phone: None,
                role,
                district_id: None,
                zonal_supervisor_id: None,
                area_supervisor_id: None,
                cith_centre_id: None,
                created_at: now,
                updated_at: now,
            });
        }
        parts
    }

    #[tokio::test]
    async fn admin_passes_the_admin_guard() {
        let mut parts = parts_with(Some(UserRole::Admin));
        let guard = RequireRole::<Admin>::from_request_parts(&mut parts, &()).await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn other_roles_are_forbidden() {
        let mut parts = parts_with(Some(UserRole::DistrictPastor));
        let err = RequireRole::<Admin>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(err.to_string(), "Only admins can perform this action");
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        let mut parts = parts_with(None);
        let err = RequireRole::<CentreLeader>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
