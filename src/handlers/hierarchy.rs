// src/handlers/hierarchy.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::hierarchy::{
        AreaSupervisor, AreaSupervisorPayload, CithCentre, CithCentrePayload, District, DistrictPayload,
        ZonalSupervisor, ZonalSupervisorPayload,
    },
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DistrictQuery {
    pub district_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AreaQuery {
    pub area_supervisor_id: Option<Uuid>,
}

// =============================================================================
//  1. DISTRICTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/districts",
    tag = "Hierarchy",
    responses((status = 200, description = "Distritos visíveis", body = Vec<District>)),
    security(("api_jwt" = []))
)]
pub async fn list_districts(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<District>>, AppError> {
    Ok(Json(app_state.hierarchy_service.list_districts(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/districts/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID do distrito")),
    responses(
        (status = 200, description = "Distrito", body = District),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_district(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<District>, AppError> {
    Ok(Json(app_state.hierarchy_service.get_district(&user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/districts",
    tag = "Hierarchy",
    request_body = DistrictPayload,
    responses(
        (status = 201, description = "Distrito criado", body = District),
        (status = 403, description = "Apenas admins")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_district(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<DistrictPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let district = app_state.hierarchy_service.create_district(&user, &payload).await?;
    Ok((StatusCode::CREATED, Json(district)))
}

#[utoipa::path(
    put,
    path = "/api/districts/{id}",
    tag = "Hierarchy",
    request_body = DistrictPayload,
    params(("id" = Uuid, Path, description = "ID do distrito")),
    responses((status = 200, description = "Distrito atualizado", body = District)),
    security(("api_jwt" = []))
)]
pub async fn update_district(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DistrictPayload>,
) -> Result<Json<District>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.hierarchy_service.update_district(&user, id, &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/districts/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID do distrito")),
    responses(
        (status = 204, description = "Distrito removido"),
        (status = 400, description = "Ainda possui áreas ou zonas")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_district(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.hierarchy_service.delete_district(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  2. AREA SUPERVISORS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/area-supervisors",
    tag = "Hierarchy",
    params(DistrictQuery),
    responses((status = 200, description = "Áreas visíveis", body = Vec<AreaSupervisor>)),
    security(("api_jwt" = []))
)]
pub async fn list_areas(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<DistrictQuery>,
) -> Result<Json<Vec<AreaSupervisor>>, AppError> {
    Ok(Json(app_state.hierarchy_service.list_areas(&user, query.district_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/area-supervisors/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID da área")),
    responses((status = 200, description = "Área", body = AreaSupervisor)),
    security(("api_jwt" = []))
)]
pub async fn get_area(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AreaSupervisor>, AppError> {
    Ok(Json(app_state.hierarchy_service.get_area(&user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/area-supervisors",
    tag = "Hierarchy",
    request_body = AreaSupervisorPayload,
    responses((status = 201, description = "Área criada", body = AreaSupervisor)),
    security(("api_jwt" = []))
)]
pub async fn create_area(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<AreaSupervisorPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let area = app_state.hierarchy_service.create_area(&user, &payload).await?;
    Ok((StatusCode::CREATED, Json(area)))
}

#[utoipa::path(
    put,
    path = "/api/area-supervisors/{id}",
    tag = "Hierarchy",
    request_body = AreaSupervisorPayload,
    params(("id" = Uuid, Path, description = "ID da área")),
    responses((status = 200, description = "Área atualizada", body = AreaSupervisor)),
    security(("api_jwt" = []))
)]
pub async fn update_area(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AreaSupervisorPayload>,
) -> Result<Json<AreaSupervisor>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.hierarchy_service.update_area(&user, id, &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/area-supervisors/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID da área")),
    responses((status = 204, description = "Área removida")),
    security(("api_jwt" = []))
)]
pub async fn delete_area(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.hierarchy_service.delete_area(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  3. ZONAL SUPERVISORS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/zonal-supervisors",
    tag = "Hierarchy",
    params(DistrictQuery),
    responses((status = 200, description = "Zonas visíveis", body = Vec<ZonalSupervisor>)),
    security(("api_jwt" = []))
)]
pub async fn list_zones(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<DistrictQuery>,
) -> Result<Json<Vec<ZonalSupervisor>>, AppError> {
    Ok(Json(app_state.hierarchy_service.list_zones(&user, query.district_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/zonal-supervisors/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID da zona")),
    responses((status = 200, description = "Zona", body = ZonalSupervisor)),
    security(("api_jwt" = []))
)]
pub async fn get_zone(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ZonalSupervisor>, AppError> {
    Ok(Json(app_state.hierarchy_service.get_zone(&user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/zonal-supervisors",
    tag = "Hierarchy",
    request_body = ZonalSupervisorPayload,
    responses(
        (status = 201, description = "Zona criada", body = ZonalSupervisor),
        (status = 400, description = "Áreas de outro distrito ou já zoneadas")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_zone(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ZonalSupervisorPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let zone = app_state.hierarchy_service.create_zone(&user, &payload).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

#[utoipa::path(
    put,
    path = "/api/zonal-supervisors/{id}",
    tag = "Hierarchy",
    request_body = ZonalSupervisorPayload,
    params(("id" = Uuid, Path, description = "ID da zona")),
    responses((status = 200, description = "Zona atualizada", body = ZonalSupervisor)),
    security(("api_jwt" = []))
)]
pub async fn update_zone(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ZonalSupervisorPayload>,
) -> Result<Json<ZonalSupervisor>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.hierarchy_service.update_zone(&user, id, &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/zonal-supervisors/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID da zona")),
    responses((status = 204, description = "Zona removida")),
    security(("api_jwt" = []))
)]
pub async fn delete_zone(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.hierarchy_service.delete_zone(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  4. CITH CENTRES
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/cith-centres",
    tag = "Hierarchy",
    params(AreaQuery),
    responses((status = 200, description = "Centros visíveis", body = Vec<CithCentre>)),
    security(("api_jwt" = []))
)]
pub async fn list_centres(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<AreaQuery>,
) -> Result<Json<Vec<CithCentre>>, AppError> {
    Ok(Json(app_state.hierarchy_service.list_centres(&user, query.area_supervisor_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/cith-centres/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID do centro")),
    responses((status = 200, description = "Centro", body = CithCentre)),
    security(("api_jwt" = []))
)]
pub async fn get_centre(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CithCentre>, AppError> {
    Ok(Json(app_state.hierarchy_service.get_centre(&user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/cith-centres",
    tag = "Hierarchy",
    request_body = CithCentrePayload,
    responses((status = 201, description = "Centro criado", body = CithCentre)),
    security(("api_jwt" = []))
)]
pub async fn create_centre(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CithCentrePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let centre = app_state.hierarchy_service.create_centre(&user, &payload).await?;
    Ok((StatusCode::CREATED, Json(centre)))
}

#[utoipa::path(
    put,
    path = "/api/cith-centres/{id}",
    tag = "Hierarchy",
    request_body = CithCentrePayload,
    params(("id" = Uuid, Path, description = "ID do centro")),
    responses((status = 200, description = "Centro atualizado", body = CithCentre)),
    security(("api_jwt" = []))
)]
pub async fn update_centre(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CithCentrePayload>,
) -> Result<Json<CithCentre>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.hierarchy_service.update_centre(&user, id, &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/cith-centres/{id}",
    tag = "Hierarchy",
    params(("id" = Uuid, Path, description = "ID do centro")),
    responses(
        (status = 204, description = "Centro removido"),
        (status = 400, description = "Ainda possui relatórios ou usuários")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_centre(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.hierarchy_service.delete_centre(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
