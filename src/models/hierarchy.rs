// src/models/hierarchy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. District (raiz da hierarquia)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct District {
    pub id: Uuid,
    #[schema(example = "Lagos Central")]
    pub name: String,
    #[schema(example = 4)]
    pub district_number: i32,
    #[schema(example = "Pastor John Okafor")]
    pub pastor_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 2. AreaSupervisor (primeiro nível de aprovação)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AreaSupervisor {
    pub id: Uuid,
    #[schema(example = "Area 3 - Yaba")]
    pub name: String,
    pub district_id: Uuid,
    pub supervisor_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 3. ZonalSupervisor (camada opcional entre áreas e distrito)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZonalSupervisor {
    pub id: Uuid,
    #[schema(example = "Mainland Zone")]
    pub name: String,
    pub district_id: Uuid,
    pub supervisor_name: Option<String>,
    // Preenchido a partir de zone_areas
    #[sqlx(default)]
    pub area_supervisor_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 4. CithCentre (folha, quem envia relatórios)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CithCentre {
    pub id: Uuid,
    #[schema(example = "Grace Cell")]
    pub name: String,
    pub location: Option<String>,
    pub area_supervisor_id: Uuid,
    pub leader_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Posição de um centro na hierarquia, resolvida por joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct CentreContext {
    pub centre_id: Uuid,
    pub area_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub district_id: Uuid,
}

impl CentreContext {
    pub fn is_zoned(&self) -> bool {
        self.zone_id.is_some()
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DistrictPayload {
    #[validate(length(min = 2, message = "Name must have at least 2 characters."))]
    pub name: String,
    #[validate(range(min = 1, message = "District number must be positive."))]
    pub district_number: i32,
    pub pastor_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AreaSupervisorPayload {
    #[validate(length(min = 2, message = "Name must have at least 2 characters."))]
    pub name: String,
    pub district_id: Uuid,
    pub supervisor_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZonalSupervisorPayload {
    #[validate(length(min = 2, message = "Name must have at least 2 characters."))]
    pub name: String,
    pub district_id: Uuid,
    pub supervisor_name: Option<String>,
    #[serde(default)]
    pub area_supervisor_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CithCentrePayload {
    #[validate(length(min = 2, message = "Name must have at least 2 characters."))]
    pub name: String,
    pub location: Option<String>,
    pub area_supervisor_id: Uuid,
    pub leader_name: Option<String>,
    #[validate(email(message = "The e-mail provided is invalid."))]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

/// Caminho resolvido de um usuário (view user_paths).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct UserPath {
    #[sqlx(rename = "path_district_id")]
    pub district_id: Option<Uuid>,
    #[sqlx(rename = "path_zone_id")]
    pub zone_id: Option<Uuid>,
    #[sqlx(rename = "path_area_id")]
    pub area_id: Option<Uuid>,
    #[sqlx(rename = "path_centre_id")]
    pub centre_id: Option<Uuid>,
}
