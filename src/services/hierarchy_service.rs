// src/services/hierarchy_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{hierarchy_repo::Dependents, HierarchyRepository},
    models::{
        auth::{Assignment, User},
        hierarchy::{
            AreaSupervisor, AreaSupervisorPayload, CithCentre, CithCentrePayload, District, DistrictPayload,
            ZonalSupervisor, ZonalSupervisorPayload,
        },
    },
    services::scope::resolve_visibility,
};

// --- Quem pode administrar o quê ---

/// Admin ou o pastor do próprio distrito.
pub fn manages_district(actor: &Assignment, district_id: Uuid) -> bool {
    match actor {
        Assignment::Admin => true,
        Assignment::DistrictPastor(id) => *id == district_id,
        _ => false,
    }
}

/// Centros: admin, pastor do distrito da área ou o supervisor da própria área.
pub fn manages_centres_of(actor: &Assignment, area: &AreaSupervisor) -> bool {
    match actor {
        Assignment::AreaSupervisor(id) => *id == area.id,
        other => manages_district(other, area.district_id),
    }
}

fn require(allowed: bool, what: &str) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("You are not allowed to manage this {what}")))
    }
}

fn refuse_if_children(count: i64, message: &str) -> Result<(), AppError> {
    if count > 0 {
        return Err(AppError::conflict(message));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HierarchyService {
    repo: HierarchyRepository,
}

impl HierarchyService {
    pub fn new(repo: HierarchyRepository) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &HierarchyRepository {
        &self.repo
    }

    async fn area_or_404(&self, id: Uuid) -> Result<AreaSupervisor, AppError> {
        self.repo.find_area(id).await?.ok_or(AppError::NotFound("Area supervisor"))
    }

    // =========================================================================
    //  DISTRICTS
    // =========================================================================

    pub async fn list_districts(&self, actor: &User) -> Result<Vec<District>, AppError> {
        // Todos enxergam o próprio distrito; admin enxerga todos
        let ids = match actor.assignment()? {
            Assignment::Admin => None,
            other => Some(self.district_ids_of(&other).await?),
        };
        self.repo.list_districts(ids).await
    }

    async fn district_ids_of(&self, assignment: &Assignment) -> Result<Vec<Uuid>, AppError> {
        let district = match *assignment {
            Assignment::ZonalSupervisor(id) => self.repo.find_zone(self.repo.pool(), id).await?.map(|z| z.district_id),
            Assignment::AreaSupervisor(id) => self.repo.find_area(id).await?.map(|a| a.district_id),
            Assignment::CithCentre(id) => self.repo.centre_context(id).await?.map(|c| c.district_id),
            Assignment::DistrictPastor(id) => Some(id),
            Assignment::Admin => None,
        };
        Ok(district.into_iter().collect())
    }

    pub async fn get_district(&self, actor: &User, id: Uuid) -> Result<District, AppError> {
        let assignment = actor.assignment()?;
        let visible = assignment == Assignment::Admin || self.district_ids_of(&assignment).await?.contains(&id);
        if !visible {
            return Err(AppError::NotFound("District"));
        }
        self.repo.find_district(id).await?.ok_or(AppError::NotFound("District"))
    }

    pub async fn create_district(&self, actor: &User, payload: &DistrictPayload) -> Result<District, AppError> {
        require(actor.assignment()? == Assignment::Admin, "district")?;
        let district = self.repo.create_district(payload).await?;
        tracing::info!(district_id = %district.id, "Distrito criado");
        Ok(district)
    }

    pub async fn update_district(&self, actor: &User, id: Uuid, payload: &DistrictPayload) -> Result<District, AppError> {
        require(actor.assignment()? == Assignment::Admin, "district")?;
        self.repo
            .update_district(id, payload)
            .await?
            .ok_or(AppError::NotFound("District"))
    }

    pub async fn delete_district(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        require(actor.assignment()? == Assignment::Admin, "district")?;
        refuse_if_children(
            self.repo.count_dependents(Dependents::DistrictChildren, id).await?,
            "Cannot delete a district that still has areas or zones",
        )?;
        if !self.repo.delete_district(id).await? {
            return Err(AppError::NotFound("District"));
        }
        Ok(())
    }

    // =========================================================================
    //  AREAS
    // =========================================================================

    pub async fn list_areas(&self, actor: &User, district_id: Option<Uuid>) -> Result<Vec<AreaSupervisor>, AppError> {
        let visibility = resolve_visibility(&self.repo, &actor.assignment()?).await?;
        self.repo.list_areas(visibility.area_filter(), district_id).await
    }

    pub async fn get_area(&self, actor: &User, id: Uuid) -> Result<AreaSupervisor, AppError> {
        let visibility = resolve_visibility(&self.repo, &actor.assignment()?).await?;
        if !visibility.can_see_area(id) {
            return Err(AppError::NotFound("Area supervisor"));
        }
        self.area_or_404(id).await
    }

    pub async fn create_area(&self, actor: &User, payload: &AreaSupervisorPayload) -> Result<AreaSupervisor, AppError> {
        require(manages_district(&actor.assignment()?, payload.district_id), "area")?;
        self.repo
            .find_district(payload.district_id)
            .await?
            .ok_or(AppError::NotFound("District"))?;
        self.repo.create_area(payload).await
    }

    pub async fn update_area(
        &self,
        actor: &User,
        id: Uuid,
        payload: &AreaSupervisorPayload,
    ) -> Result<AreaSupervisor, AppError> {
        let assignment = actor.assignment()?;
        let current = self.area_or_404(id).await?;
        require(manages_district(&assignment, current.district_id), "area")?;
        require(manages_district(&assignment, payload.district_id), "area")?;

        // Mudar de distrito quebraria a zona a que a área pertence
        if payload.district_id != current.district_id && self.repo.zone_of_area(id).await?.is_some() {
            return Err(AppError::conflict(
                "Remove the area from its zone before moving it to another district",
            ));
        }

        self.repo
            .update_area(id, payload)
            .await?
            .ok_or(AppError::NotFound("Area supervisor"))
    }

    pub async fn delete_area(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        let current = self.area_or_404(id).await?;
        require(manages_district(&actor.assignment()?, current.district_id), "area")?;
        refuse_if_children(
            self.repo.count_dependents(Dependents::AreaChildren, id).await?,
            "Cannot delete an area that still has centres or belongs to a zone",
        )?;
        if !self.repo.delete_area(id).await? {
            return Err(AppError::NotFound("Area supervisor"));
        }
        Ok(())
    }

    // =========================================================================
    //  ZONES
    // =========================================================================

    pub async fn list_zones(&self, actor: &User, district_id: Option<Uuid>) -> Result<Vec<ZonalSupervisor>, AppError> {
        let visibility = resolve_visibility(&self.repo, &actor.assignment()?).await?;
        self.repo.list_zones(visibility.zone_filter(), district_id).await
    }

    pub async fn get_zone(&self, actor: &User, id: Uuid) -> Result<ZonalSupervisor, AppError> {
        let visibility = resolve_visibility(&self.repo, &actor.assignment()?).await?;
        if !visibility.can_see_zone(id) {
            return Err(AppError::NotFound("Zonal supervisor"));
        }
        self.repo
            .find_zone(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Zonal supervisor"))
    }

    pub async fn create_zone(&self, actor: &User, payload: &ZonalSupervisorPayload) -> Result<ZonalSupervisor, AppError> {
        require(manages_district(&actor.assignment()?, payload.district_id), "zone")?;
        self.repo
            .find_district(payload.district_id)
            .await?
            .ok_or(AppError::NotFound("District"))?;

        let mut tx = self.repo.pool().begin().await?;
        let area_ids = self.check_zone_areas(&mut tx, payload).await?;
        let id = self.repo.insert_zone(&mut *tx, payload).await?;
        self.repo.add_zone_areas(&mut *tx, id, &area_ids).await?;
        let zone = self
            .repo
            .find_zone(&mut *tx, id)
            .await?
            .ok_or(AppError::NotFound("Zonal supervisor"))?;
        tx.commit().await?;

        tracing::info!(zone_id = %zone.id, areas = area_ids.len(), "Zona criada");
        Ok(zone)
    }

    pub async fn update_zone(
        &self,
        actor: &User,
        id: Uuid,
        payload: &ZonalSupervisorPayload,
    ) -> Result<ZonalSupervisor, AppError> {
        let assignment = actor.assignment()?;
        let current = self
            .repo
            .find_zone(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Zonal supervisor"))?;
        require(manages_district(&assignment, current.district_id), "zone")?;
        require(manages_district(&assignment, payload.district_id), "zone")?;

        let mut tx = self.repo.pool().begin().await?;
        let area_ids = self.check_zone_areas(&mut tx, payload).await?;
        self.repo.update_zone_row(&mut *tx, id, payload).await?;
        self.repo.clear_zone_areas(&mut *tx, id).await?;
        self.repo.add_zone_areas(&mut *tx, id, &area_ids).await?;
        let zone = self
            .repo
            .find_zone(&mut *tx, id)
            .await?
            .ok_or(AppError::NotFound("Zonal supervisor"))?;
        tx.commit().await?;
        Ok(zone)
    }

    // Toda área da zona precisa ser do mesmo distrito
    async fn check_zone_areas(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payload: &ZonalSupervisorPayload,
    ) -> Result<Vec<Uuid>, AppError> {
        let mut area_ids = payload.area_supervisor_ids.clone();
        area_ids.sort();
        area_ids.dedup();

        let matching = self
            .repo
            .count_areas_in_district(&mut **tx, payload.district_id, &area_ids)
            .await?;
        if matching != area_ids.len() as i64 {
            return Err(AppError::bad_request(
                "Every area in a zone must exist and belong to the zone's district",
            ));
        }
        Ok(area_ids)
    }

    pub async fn delete_zone(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        let current = self
            .repo
            .find_zone(self.repo.pool(), id)
            .await?
            .ok_or(AppError::NotFound("Zonal supervisor"))?;
        require(manages_district(&actor.assignment()?, current.district_id), "zone")?;
        refuse_if_children(
            self.repo.count_dependents(Dependents::ZoneMembers, id).await?,
            "Cannot delete a zone that still has areas",
        )?;
        if !self.repo.delete_zone(id).await? {
            return Err(AppError::NotFound("Zonal supervisor"));
        }
        Ok(())
    }

    // =========================================================================
    //  CENTRES
    // =========================================================================

    pub async fn list_centres(&self, actor: &User, area_id: Option<Uuid>) -> Result<Vec<CithCentre>, AppError> {
        let visibility = resolve_visibility(&self.repo, &actor.assignment()?).await?;
        self.repo.list_centres(visibility.centre_filter(), area_id).await
    }

    pub async fn get_centre(&self, actor: &User, id: Uuid) -> Result<CithCentre, AppError> {
        let visibility = resolve_visibility(&self.repo, &actor.assignment()?).await?;
        if !visibility.can_see_centre(id) {
            return Err(AppError::NotFound("CITH centre"));
        }
        self.repo.find_centre(id).await?.ok_or(AppError::NotFound("CITH centre"))
    }

    pub async fn create_centre(&self, actor: &User, payload: &CithCentrePayload) -> Result<CithCentre, AppError> {
        let area = self.area_or_404(payload.area_supervisor_id).await?;
        require(manages_centres_of(&actor.assignment()?, &area), "centre")?;
        let centre = self.repo.create_centre(payload).await?;
        tracing::info!(centre_id = %centre.id, area_id = %area.id, "Centro criado");
        Ok(centre)
    }

    pub async fn update_centre(&self, actor: &User, id: Uuid, payload: &CithCentrePayload) -> Result<CithCentre, AppError> {
        let assignment = actor.assignment()?;
        let current = self.repo.find_centre(id).await?.ok_or(AppError::NotFound("CITH centre"))?;
        let current_area = self.area_or_404(current.area_supervisor_id).await?;
        require(manages_centres_of(&assignment, &current_area), "centre")?;

        if payload.area_supervisor_id != current.area_supervisor_id {
            let target_area = self.area_or_404(payload.area_supervisor_id).await?;
            require(manages_centres_of(&assignment, &target_area), "centre")?;
        }

        self.repo
            .update_centre(id, payload)
            .await?
            .ok_or(AppError::NotFound("CITH centre"))
    }

    pub async fn delete_centre(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        let current = self.repo.find_centre(id).await?.ok_or(AppError::NotFound("CITH centre"))?;
        let area = self.area_or_404(current.area_supervisor_id).await?;
        require(manages_centres_of(&actor.assignment()?, &area), "centre")?;
        refuse_if_children(
            self.repo.count_dependents(Dependents::CentreChildren, id).await?,
            "Cannot delete a centre that still has reports or users",
        )?;
        if !self.repo.delete_centre(id).await? {
            return Err(AppError::NotFound("CITH centre"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::PgPool;

    use crate::db::fixtures;

    fn area(district_id: Uuid) -> AreaSupervisor {
        let now = Utc::now();
        AreaSupervisor {
            id: Uuid::new_v4(),
            name: "Area 1".into(),
            district_id,
            supervisor_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pastors_manage_only_their_district() {
        let district = Uuid::new_v4();
        assert!(manages_district(&Assignment::Admin, district));
        assert!(manages_district(&Assignment::DistrictPastor(district), district));
        assert!(!manages_district(&Assignment::DistrictPastor(Uuid::new_v4()), district));
        assert!(!manages_district(&Assignment::AreaSupervisor(Uuid::new_v4()), district));
    }

    #[test]
    fn area_supervisors_manage_centres_of_their_area() {
        let district = Uuid::new_v4();
        let a = area(district);
        assert!(manages_centres_of(&Assignment::AreaSupervisor(a.id), &a));
        assert!(!manages_centres_of(&Assignment::AreaSupervisor(Uuid::new_v4()), &a));
        assert!(manages_centres_of(&Assignment::DistrictPastor(district), &a));
        assert!(!manages_centres_of(&Assignment::CithCentre(Uuid::new_v4()), &a));
        assert!(!manages_centres_of(&Assignment::ZonalSupervisor(Uuid::new_v4()), &a));
    }

    #[test]
    fn childless_entities_can_be_deleted() {
        assert!(refuse_if_children(0, "x").is_ok());
        assert!(matches!(refuse_if_children(1, "x"), Err(AppError::Conflict(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn districts_are_deleted_only_once_empty(pool: PgPool) {
        let service = HierarchyService::new(HierarchyRepository::new(pool.clone()));
        let admin = fixtures::user(&pool, Assignment::Admin).await;
        let busy = fixtures::district(&pool, 1).await;
        fixtures::area(&pool, busy).await;
        let empty = fixtures::district(&pool, 2).await;

        let err = service.delete_district(&admin, busy).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
        assert_eq!(err.to_string(), "Cannot delete a district that still has areas or zones");
        assert!(service.get_district(&admin, busy).await.is_ok());

        service.delete_district(&admin, empty).await.unwrap();
        assert!(matches!(
            service.get_district(&admin, empty).await,
            Err(AppError::NotFound("District"))
        ));
    }
}
