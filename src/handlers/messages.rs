// src/handlers/messages.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageParams},
    },
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::messaging::{Conversation, Message, Recipient, SendMessagePayload, UnreadCount},
};

// POST /api/messages/send
#[utoipa::path(
    post,
    path = "/api/messages/send",
    tag = "Messages",
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Mensagem enviada", body = Message),
        (status = 403, description = "Destinatário fora do alcance do remetente")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_message(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.messaging_service.send(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// GET /api/messages/conversations
#[utoipa::path(
    get,
    path = "/api/messages/conversations",
    tag = "Messages",
    responses((status = 200, description = "Conversas do usuário", body = Vec<Conversation>)),
    security(("api_jwt" = []))
)]
pub async fn list_conversations(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(app_state.messaging_service.conversations(&user).await?))
}

// GET /api/messages/conversations/{userId}
#[utoipa::path(
    get,
    path = "/api/messages/conversations/{user_id}",
    tag = "Messages",
    params(
        ("user_id" = Uuid, Path, description = "ID do interlocutor"),
        PageParams
    ),
    responses((status = 200, description = "Mensagens da conversa, mais recentes primeiro", body = Page<Message>)),
    security(("api_jwt" = []))
)]
pub async fn get_thread(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Message>>, AppError> {
    Ok(Json(app_state.messaging_service.thread(&user, user_id, page).await?))
}

// GET /api/messages/recipients
#[utoipa::path(
    get,
    path = "/api/messages/recipients",
    tag = "Messages",
    responses((status = 200, description = "Usuários que podem receber mensagens", body = Vec<Recipient>)),
    security(("api_jwt" = []))
)]
pub async fn list_recipients(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<Recipient>>, AppError> {
    Ok(Json(app_state.messaging_service.recipients(&user).await?))
}

// GET /api/messages/unread-count
#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    tag = "Messages",
    responses((status = 200, description = "Mensagens não lidas", body = UnreadCount)),
    security(("api_jwt" = []))
)]
pub async fn unread_messages(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCount>, AppError> {
    let unread = app_state.messaging_service.unread_count(&user).await?;
    Ok(Json(UnreadCount { unread }))
}
