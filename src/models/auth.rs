// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

// Mapeia o CREATE TYPE user_role do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    DistrictPastor,
    ZonalSupervisor,
    AreaSupervisor,
    CithCentre,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::DistrictPastor => "district_pastor",
            UserRole::ZonalSupervisor => "zonal_supervisor",
            UserRole::AreaSupervisor => "area_supervisor",
            UserRole::CithCentre => "cith_centre",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "Grace Adeyemi")]
    pub name: String,
    #[schema(example = "grace@church.org")]
    pub email: String,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_hash: String,

    pub phone: Option<String>,
    pub role: UserRole,

    pub district_id: Option<Uuid>,
    pub zonal_supervisor_id: Option<Uuid>,
    pub area_supervisor_id: Option<Uuid>,
    pub cith_centre_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A cadeira que o usuário ocupa. Linhas inconsistentes com o papel não
    /// passam daqui.
    pub fn assignment(&self) -> Result<Assignment, AppError> {
        Assignment::from_parts(
            self.role,
            HierarchyRefs {
                district_id: self.district_id,
                zonal_supervisor_id: self.zonal_supervisor_id,
                area_supervisor_id: self.area_supervisor_id,
                cith_centre_id: self.cith_centre_id,
            },
        )
        .map_err(|_| AppError::forbidden("Your account is not attached to the hierarchy"))
    }
}

/// As quatro referências opcionais, como chegam do cliente ou do banco.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyRefs {
    pub district_id: Option<Uuid>,
    pub zonal_supervisor_id: Option<Uuid>,
    pub area_supervisor_id: Option<Uuid>,
    pub cith_centre_id: Option<Uuid>,
}

/// Papel + exatamente uma referência compatível.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Admin,
    DistrictPastor(Uuid),
    ZonalSupervisor(Uuid),
    AreaSupervisor(Uuid),
    CithCentre(Uuid),
}

impl Assignment {
    pub fn from_parts(role: UserRole, refs: HierarchyRefs) -> Result<Self, AppError> {
        let HierarchyRefs {
            district_id,
            zonal_supervisor_id,
            area_supervisor_id,
            cith_centre_id,
        } = refs;

        let provided = [district_id, zonal_supervisor_id, area_supervisor_id, cith_centre_id]
            .iter()
            .filter(|r| r.is_some())
            .count();

        let assignment = match role {
            UserRole::Admin => Some(Assignment::Admin),
            UserRole::DistrictPastor => district_id.map(Assignment::DistrictPastor),
            UserRole::ZonalSupervisor => zonal_supervisor_id.map(Assignment::ZonalSupervisor),
            UserRole::AreaSupervisor => area_supervisor_id.map(Assignment::AreaSupervisor),
            UserRole::CithCentre => cith_centre_id.map(Assignment::CithCentre),
        };

        let expected = if role == UserRole::Admin { 0 } else { 1 };

        match assignment {
            Some(a) if provided == expected => Ok(a),
            _ if role == UserRole::Admin => Err(AppError::bad_request(
                "Admin users cannot be attached to the hierarchy",
            )),
            _ => Err(AppError::bad_request(format!(
                "Role {role} requires exactly one matching hierarchy reference"
            ))),
        }
    }

    pub fn role(&self) -> UserRole {
        match self {
            Assignment::Admin => UserRole::Admin,
            Assignment::DistrictPastor(_) => UserRole::DistrictPastor,
            Assignment::ZonalSupervisor(_) => UserRole::ZonalSupervisor,
            Assignment::AreaSupervisor(_) => UserRole::AreaSupervisor,
            Assignment::CithCentre(_) => UserRole::CithCentre,
        }
    }

    pub fn refs(&self) -> HierarchyRefs {
        let mut refs = HierarchyRefs::default();
        match *self {
            Assignment::Admin => {}
            Assignment::DistrictPastor(id) => refs.district_id = Some(id),
            Assignment::ZonalSupervisor(id) => refs.zonal_supervisor_id = Some(id),
            Assignment::AreaSupervisor(id) => refs.area_supervisor_id = Some(id),
            Assignment::CithCentre(id) => refs.cith_centre_id = Some(id),
        }
        refs
    }
}

// Dados para registro de um novo usuário numa cadeira livre
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    #[validate(length(min = 2, message = "Name must have at least 2 characters."))]
    pub name: String,
    #[validate(email(message = "The e-mail provided is invalid."))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must have at least 6 characters."))]
    pub password: String,
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(flatten)]
    pub refs: HierarchyRefs,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 2, message = "Name must have at least 2 characters."))]
    pub name: Option<String>,
    #[validate(email(message = "The e-mail provided is invalid."))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must have at least 6 characters."))]
    pub password: Option<String>,
    pub phone: Option<String>,
    /// Quando presente, substitui papel e referência juntos
    pub role: Option<UserRole>,
    #[serde(flatten)]
    pub refs: HierarchyRefs,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(message = "The e-mail provided is invalid."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

/// Cadeira ainda não preenchida, oferecida no cadastro.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub id: Uuid,
    pub name: String,
    /// Quantos usuários ainda cabem
    pub open_seats: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(d: bool, z: bool, a: bool, c: bool) -> HierarchyRefs {
        HierarchyRefs {
            district_id: d.then(Uuid::new_v4),
            zonal_supervisor_id: z.then(Uuid::new_v4),
            area_supervisor_id: a.then(Uuid::new_v4),
            cith_centre_id: c.then(Uuid::new_v4),
        }
    }

    #[test]
    fn admin_takes_no_reference() {
        assert_eq!(
            Assignment::from_parts(UserRole::Admin, refs(false, false, false, false)).unwrap(),
            Assignment::Admin
        );
        assert!(Assignment::from_parts(UserRole::Admin, refs(true, false, false, false)).is_err());
    }

    #[test]
    fn role_needs_its_own_reference() {
        let r = refs(false, false, true, false);
        let a = Assignment::from_parts(UserRole::AreaSupervisor, r).unwrap();
        assert_eq!(a, Assignment::AreaSupervisor(r.area_supervisor_id.unwrap()));
        assert_eq!(a.refs(), r);

        // referência errada para o papel
        assert!(Assignment::from_parts(UserRole::DistrictPastor, r).is_err());
    }

    #[test]
    fn extra_references_are_rejected() {
        assert!(Assignment::from_parts(UserRole::CithCentre, refs(false, false, true, true)).is_err());
        assert!(Assignment::from_parts(UserRole::ZonalSupervisor, refs(true, true, false, false)).is_err());
    }

    #[test]
    fn role_round_trips_through_assignment() {
        let a = Assignment::from_parts(UserRole::CithCentre, refs(false, false, false, true)).unwrap();
        assert_eq!(a.role(), UserRole::CithCentre);
        assert_eq!(UserRole::ZonalSupervisor.to_string(), "zonal_supervisor");
    }
}
