// src/handlers/export.rs

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::report::ReportFilter,
    services::export_service::export_filename,
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// GET /api/export/excel
#[utoipa::path(
    get,
    path = "/api/export/excel",
    tag = "Export",
    params(ReportFilter),
    responses(
        (status = 200, description = "Planilha .xlsx com os relatórios do escopo")
    ),
    security(("api_jwt" = []))
)]
pub async fn export_excel(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<ReportFilter>,
) -> Result<Response, AppError> {
    let bytes = app_state.export_service.export_reports(&user, &filter).await?;

    // O navegador baixa como anexo
    let headers = [
        (header::CONTENT_TYPE, XLSX_MIME.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export_filename(&filter)),
        ),
    ];

    Ok((headers, bytes).into_response())
}
