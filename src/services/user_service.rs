// src/services/user_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageParams},
    },
    db::{HierarchyRepository, UserRepository},
    models::auth::{
        Assignment, AvailableSlot, HierarchyRefs, RegisterUserPayload, UpdateUserPayload, User, UserRole,
    },
    services::{
        auth::hash_password,
        scope::{resolve_visibility, Visibility},
    },
};

pub const CENTRE_SEATS: i64 = 2;

/// Quantos usuários cabem na cadeira (None = sem limite).
pub fn seat_capacity(role: UserRole) -> Option<i64> {
    match role {
        UserRole::Admin => None,
        UserRole::CithCentre => Some(CENTRE_SEATS),
        UserRole::DistrictPastor | UserRole::ZonalSupervisor | UserRole::AreaSupervisor => Some(1),
    }
}

fn seat_taken_error(assignment: Assignment) -> AppError {
    match assignment {
        Assignment::CithCentre(_) => {
            AppError::conflict(format!("This centre already has {CENTRE_SEATS} leaders"))
        }
        Assignment::DistrictPastor(_) => AppError::conflict("This district already has a supervisor assigned"),
        Assignment::ZonalSupervisor(_) => AppError::conflict("This zone already has a supervisor assigned"),
        _ => AppError::conflict("This area already has a supervisor assigned"),
    }
}

fn seat_entity(assignment: Assignment) -> &'static str {
    match assignment {
        Assignment::Admin => "User",
        Assignment::DistrictPastor(_) => "District",
        Assignment::ZonalSupervisor(_) => "Zonal supervisor",
        Assignment::AreaSupervisor(_) => "Area supervisor",
        Assignment::CithCentre(_) => "CITH centre",
    }
}

/// Um usuário está no escopo se a cadeira dele estiver.
pub fn user_in_scope(visibility: &Visibility, user: &User) -> bool {
    match user.role {
        UserRole::Admin => visibility.is_unrestricted(),
        UserRole::DistrictPastor => user.district_id.is_some_and(|id| visibility.can_see_district(id)),
        UserRole::ZonalSupervisor => user.zonal_supervisor_id.is_some_and(|id| visibility.can_see_zone(id)),
        UserRole::AreaSupervisor => user.area_supervisor_id.is_some_and(|id| visibility.can_see_area(id)),
        UserRole::CithCentre => user.cith_centre_id.is_some_and(|id| visibility.can_see_centre(id)),
    }
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    repo: UserRepository,
    hierarchy: HierarchyRepository,
}

impl UserService {
    pub fn new(pool: PgPool, repo: UserRepository, hierarchy: HierarchyRepository) -> Self {
        Self { pool, repo, hierarchy }
    }

    /// Cria o usuário na cadeira pedida. Trava a entidade dona da cadeira,
    /// confere a lotação e insere na mesma transação.
    pub async fn create_user(&self, payload: RegisterUserPayload) -> Result<User, AppError> {
        let assignment = Assignment::from_parts(payload.role, payload.refs)?;
        let password_hash = hash_password(&payload.password).await?;

        let mut tx = self.pool.begin().await?;
        self.claim_seat(&mut tx, assignment, None).await?;

        let user = self
            .repo
            .create_user(
                &mut *tx,
                &payload.name,
                &payload.email,
                &password_hash,
                payload.phone.as_deref(),
                assignment,
            )
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn claim_seat(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        assignment: Assignment,
        except: Option<Uuid>,
    ) -> Result<(), AppError> {
        if !self.repo.lock_seat(&mut **tx, assignment).await? {
            return Err(AppError::NotFound(seat_entity(assignment)));
        }

        if let Some(capacity) = seat_capacity(assignment.role()) {
            let taken = self.repo.count_seat_holders(&mut **tx, assignment, except).await?;
            if taken >= capacity {
                return Err(seat_taken_error(assignment));
            }
        }
        Ok(())
    }

    pub async fn update_user(&self, id: Uuid, payload: UpdateUserPayload) -> Result<User, AppError> {
        let current = self.repo.find_by_id(id).await?.ok_or(AppError::NotFound("User"))?;

        // Papel novo exige a referência nova; só referência nova mantém o papel
        let assignment = match payload.role {
            Some(role) => Some(Assignment::from_parts(role, payload.refs)?),
            None if payload.refs != HierarchyRefs::default() => Some(Assignment::from_parts(current.role, payload.refs)?),
            None => None,
        };

        let password_hash = match payload.password.as_deref() {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        if let Some(assignment) = assignment {
            if current.assignment().ok() != Some(assignment) {
                self.claim_seat(&mut tx, assignment, Some(id)).await?;
            }
        }

        let user = self
            .repo
            .update_user(
                &mut *tx,
                id,
                payload.name.as_deref(),
                payload.email.as_deref(),
                password_hash.as_deref(),
                payload.phone.as_deref(),
                assignment,
            )
            .await?
            .ok_or(AppError::NotFound("User"))?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        if actor.id == id {
            return Err(AppError::bad_request("You cannot delete your own account"));
        }
        if !self.repo.delete_user(id).await? {
            return Err(AppError::NotFound("User"));
        }
        Ok(())
    }

    pub async fn get_user(&self, actor: &User, id: Uuid) -> Result<User, AppError> {
        let visibility = resolve_visibility(&self.hierarchy, &actor.assignment()?).await?;
        let user = self.repo.find_by_id(id).await?.ok_or(AppError::NotFound("User"))?;
        if user.id != actor.id && !user_in_scope(&visibility, &user) {
            return Err(AppError::NotFound("User"));
        }
        Ok(user)
    }

    pub async fn list_users(
        &self,
        actor: &User,
        role: Option<UserRole>,
        page: PageParams,
    ) -> Result<Page<User>, AppError> {
        let visibility = resolve_visibility(&self.hierarchy, &actor.assignment()?).await?;
        let (users, total) = self.repo.list_scoped(&visibility, role, &page).await?;
        Ok(Page::new(users, &page, total))
    }

    pub async fn available_slots(&self, role: UserRole) -> Result<Vec<AvailableSlot>, AppError> {
        self.repo.available_slots(role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scope::ScopeSets;
    use chrono::Utc;

    use crate::db::fixtures;

    fn user(role: UserRole, area: Option<Uuid>, centre: Option<Uuid>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@church.org".into(),
            password_hash: String::new(),
            phone: None,
            role,
            district_id: None,
            zonal_supervisor_id: None,
            area_supervisor_id: area,
            cith_centre_id: centre,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn centres_hold_two_leaders_and_supervisors_one() {
        assert_eq!(seat_capacity(UserRole::CithCentre), Some(2));
        assert_eq!(seat_capacity(UserRole::AreaSupervisor), Some(1));
        assert_eq!(seat_capacity(UserRole::Admin), None);
    }

    #[test]
    fn seat_conflicts_use_the_expected_wording() {
        let err = seat_taken_error(Assignment::AreaSupervisor(Uuid::new_v4()));
        assert!(err.to_string().contains("already has a supervisor assigned"));

        let err = seat_taken_error(Assignment::CithCentre(Uuid::new_v4()));
        assert_eq!(err.to_string(), "This centre already has 2 leaders");
    }

    #[test]
    fn users_are_scoped_by_their_seat() {
        let area = Uuid::new_v4();
        let centre = Uuid::new_v4();
        let visibility = Visibility::Restricted(ScopeSets {
            areas: vec![area],
            centres: vec![centre],
            ..Default::default()
        });

        assert!(user_in_scope(&visibility, &user(UserRole::AreaSupervisor, Some(area), None)));
        assert!(user_in_scope(&visibility, &user(UserRole::CithCentre, None, Some(centre))));
        assert!(!user_in_scope(&visibility, &user(UserRole::CithCentre, None, Some(Uuid::new_v4()))));
        assert!(!user_in_scope(&visibility, &user(UserRole::Admin, None, None)));
        assert!(user_in_scope(&Visibility::Unrestricted, &user(UserRole::Admin, None, None)));
    }

    fn seat_payload(email: &str, role: UserRole, refs: HierarchyRefs) -> RegisterUserPayload {
        RegisterUserPayload {
            name: "Seat Holder".into(),
            email: email.into(),
            password: "secret123".into(),
            phone: None,
            role,
            refs,
        }
    }

    fn service(pool: &PgPool) -> UserService {
        UserService::new(
            pool.clone(),
            UserRepository::new(pool.clone()),
            HierarchyRepository::new(pool.clone()),
        )
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn an_area_takes_a_single_supervisor(pool: PgPool) {
        let service = service(&pool);
        let district = fixtures::district(&pool, 1).await;
        let area = fixtures::area(&pool, district).await;
        let refs = HierarchyRefs {
            area_supervisor_id: Some(area),
            ..Default::default()
        };

        let first = service
            .create_user(seat_payload("first@church.org", UserRole::AreaSupervisor, refs))
            .await
            .unwrap();
        assert_eq!(first.area_supervisor_id, Some(area));

        let err = service
            .create_user(seat_payload("second@church.org", UserRole::AreaSupervisor, refs))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
        assert_eq!(err.to_string(), "This area already has a supervisor assigned");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn a_centre_takes_two_leaders(pool: PgPool) {
        let service = service(&pool);
        let district = fixtures::district(&pool, 1).await;
        let area = fixtures::area(&pool, district).await;
        let centre = fixtures::centre(&pool, area).await;
        let refs = HierarchyRefs {
            cith_centre_id: Some(centre),
            ..Default::default()
        };

        for email in ["one@church.org", "two@church.org"] {
            service
                .create_user(seat_payload(email, UserRole::CithCentre, refs))
                .await
                .unwrap();
        }
        let err = service
            .create_user(seat_payload("three@church.org", UserRole::CithCentre, refs))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    }
}
