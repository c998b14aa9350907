// src/handlers/auth.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::auth::{AuthResponse, AvailableSlot, LoginUserPayload, RegisterUserPayload, User, UserRole},
};

// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterUserPayload,
    responses(
        (status = 201, description = "Usuário criado e autenticado", body = AuthResponse),
        (status = 400, description = "Dados inválidos ou cadeira ocupada"),
        (status = 403, description = "Papel admin não pode se auto-cadastrar")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = app_state.auth_service.register_user(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Login realizado", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginUserPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let response = app_state.auth_service.login_user(&payload).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotQuery {
    /// Papel desejado no cadastro
    pub role: UserRole,
}

// GET /api/auth/available-slots?role=
#[utoipa::path(
    get,
    path = "/api/auth/available-slots",
    tag = "Auth",
    params(SlotQuery),
    responses(
        (status = 200, description = "Entidades com cadeira livre", body = Vec<AvailableSlot>)
    )
)]
pub async fn available_slots(
    State(app_state): State<AppState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<AvailableSlot>>, AppError> {
    let slots = app_state.user_service.available_slots(query.role).await?;
    Ok(Json(slots))
}

// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Usuário autenticado", body = User),
        (status = 401, description = "Token ausente ou inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}
