// src/handlers/reports.rs

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
    middleware::{
        auth::AuthenticatedUser,
        role::{Admin, CentreLeader, RequireRole},
    },
    models::report::{
        AdminEditPayload, ApproveReportPayload, RejectReportPayload, ReportDetail, ReportFilter, ReportSummary,
        SubmitReportPayload, UpdateReportPayload,
    },
};

// =============================================================================
//  1. ENVIO E LEITURA
// =============================================================================

// POST /api/reports
#[utoipa::path(
    post,
    path = "/api/reports",
    tag = "Reports",
    request_body = SubmitReportPayload,
    responses(
        (status = 201, description = "Relatório enviado (pending)", body = ReportDetail),
        (status = 400, description = "Dados inválidos ou relatório duplicado"),
        (status = 403, description = "Apenas usuários de centro")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_report(
    State(app_state): State<AppState>,
    leader: RequireRole<CentreLeader>,
    Json(payload): Json<SubmitReportPayload>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.submit(leader.user(), payload).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

// GET /api/reports
#[utoipa::path(
    get,
    path = "/api/reports",
    tag = "Reports",
    params(ReportFilter, PageParams),
    responses((status = 200, description = "Relatórios do escopo, semana mais recente primeiro", body = Page<ReportDetail>)),
    security(("api_jwt" = []))
)]
pub async fn list_reports(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<ReportFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ReportDetail>>, AppError> {
    Ok(Json(app_state.report_service.list(&user, &filter, page).await?))
}

// GET /api/reports/summary
#[utoipa::path(
    get,
    path = "/api/reports/summary",
    tag = "Reports",
    params(ReportFilter),
    responses((status = 200, description = "Totais do escopo", body = ReportSummary)),
    security(("api_jwt" = []))
)]
pub async fn report_summary(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<ReportSummary>, AppError> {
    Ok(Json(app_state.report_service.summary(&user, &filter).await?))
}

// GET /api/reports/pending
#[utoipa::path(
    get,
    path = "/api/reports/pending",
    tag = "Reports",
    responses((status = 200, description = "Relatórios aguardando o ator", body = Vec<ReportDetail>)),
    security(("api_jwt" = []))
)]
pub async fn pending_reports(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<ReportDetail>>, AppError> {
    Ok(Json(app_state.report_service.pending(&user).await?))
}

// GET /api/reports/{id}
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "ID do relatório")),
    responses(
        (status = 200, description = "Relatório", body = ReportDetail),
        (status = 404, description = "Não encontrado ou fora do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_report(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportDetail>, AppError> {
    Ok(Json(app_state.report_service.get(&user, id).await?))
}

// =============================================================================
//  2. EDIÇÃO PELO AUTOR
// =============================================================================

// PUT /api/reports/{id}
#[utoipa::path(
    put,
    path = "/api/reports/{id}",
    tag = "Reports",
    request_body = UpdateReportPayload,
    params(("id" = Uuid, Path, description = "ID do relatório")),
    responses(
        (status = 200, description = "Relatório atualizado; rejeitado volta a pending", body = ReportDetail),
        (status = 400, description = "Estado não permite edição")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_report(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportPayload>,
) -> Result<Json<ReportDetail>, AppError> {
    Ok(Json(app_state.report_service.update(&user, id, payload).await?))
}

// DELETE /api/reports/{id}
#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "ID do relatório")),
    responses(
        (status = 204, description = "Relatório removido"),
        (status = 400, description = "Estado não permite remoção")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_report(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.report_service.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  3. APROVAÇÃO
// =============================================================================

// PUT /api/reports/{id}/approve
#[utoipa::path(
    put,
    path = "/api/reports/{id}/approve",
    tag = "Reports",
    request_body(content = Option<ApproveReportPayload>, description = "Nível alvo (somente admin)"),
    params(("id" = Uuid, Path, description = "ID do relatório")),
    responses(
        (status = 200, description = "Relatório aprovado no próximo nível", body = ReportDetail),
        (status = 400, description = "Transição inválida"),
        (status = 403, description = "Ator não é o aprovador deste nível")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_report(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ApproveReportPayload>>,
) -> Result<Json<ReportDetail>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    Ok(Json(app_state.report_service.approve(&user, id, payload).await?))
}

// PUT /api/reports/{id}/reject
#[utoipa::path(
    put,
    path = "/api/reports/{id}/reject",
    tag = "Reports",
    request_body = RejectReportPayload,
    params(("id" = Uuid, Path, description = "ID do relatório")),
    responses(
        (status = 200, description = "Relatório rejeitado", body = ReportDetail),
        (status = 400, description = "Motivo ausente ou transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_report(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectReportPayload>,
) -> Result<Json<ReportDetail>, AppError> {
    Ok(Json(app_state.report_service.reject(&user, id, payload).await?))
}

// PUT /api/reports/{id}/admin-edit
#[utoipa::path(
    put,
    path = "/api/reports/{id}/admin-edit",
    tag = "Reports",
    request_body = AdminEditPayload,
    params(("id" = Uuid, Path, description = "ID do relatório")),
    responses(
        (status = 200, description = "Relatório sobrescrito", body = ReportDetail),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn admin_edit_report(
    State(app_state): State<AppState>,
    admin: RequireRole<Admin>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminEditPayload>,
) -> Result<Json<ReportDetail>, AppError> {
    Ok(Json(app_state.report_service.admin_edit(admin.user(), id, payload).await?))
}
