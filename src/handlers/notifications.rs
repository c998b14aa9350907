// src/handlers/notifications.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
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
    models::{
        messaging::UnreadCount,
        notification::{MarkedRead, Notification},
    },
};

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    params(PageParams),
    responses((status = 200, description = "Notificações do usuário", body = Page<Notification>)),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Notification>>, AppError> {
    Ok(Json(app_state.notification_service.list(user.id, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "Notifications",
    responses((status = 200, description = "Notificações não lidas", body = UnreadCount)),
    security(("api_jwt" = []))
)]
pub async fn unread_notifications(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCount>, AppError> {
    let unread = app_state.notification_service.unread_count(user.id).await?;
    Ok(Json(UnreadCount { unread }))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "ID da notificação")),
    responses(
        (status = 200, description = "Notificação lida", body = Notification),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(app_state.notification_service.mark_read(user.id, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    responses((status = 200, description = "Todas marcadas como lidas", body = MarkedRead)),
    security(("api_jwt" = []))
)]
pub async fn mark_all_read(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<MarkedRead>, AppError> {
    let updated = app_state.notification_service.mark_all_read(user.id).await?;
    Ok(Json(MarkedRead { updated }))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "ID da notificação")),
    responses((status = 204, description = "Notificação removida")),
    security(("api_jwt" = []))
)]
pub async fn delete_notification(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.notification_service.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
