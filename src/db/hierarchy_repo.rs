use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Executor};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::hierarchy::{
        AreaSupervisor, AreaSupervisorPayload, CentreContext, CithCentre, CithCentrePayload, District,
        DistrictPayload, ZonalSupervisor, ZonalSupervisorPayload,
    },
    services::scope::HierarchyLookup,
};

const ZONE_SELECT: &str = r#"
    SELECT z.*,
           COALESCE(
               ARRAY_AGG(za.area_supervisor_id ORDER BY za.area_supervisor_id)
                   FILTER (WHERE za.area_supervisor_id IS NOT NULL),
               '{}'
           ) AS area_supervisor_ids
    FROM zonal_supervisors z
    LEFT JOIN zone_areas za ON za.zonal_supervisor_id = z.id
"#;

fn map_unique(e: sqlx::Error, message: &str) -> AppError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => AppError::conflict(message),
        Some(db_err) if db_err.is_foreign_key_violation() => AppError::NotFound("Parent entity"),
        _ => AppError::DatabaseError(e),
    }
}

/// Dependentes que impedem a exclusão de uma entidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependents {
    DistrictChildren,
    AreaChildren,
    ZoneMembers,
    CentreChildren,
}

#[derive(Clone)]
pub struct HierarchyRepository {
    pool: PgPool,
}

impl HierarchyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---
    // Districts
    // ---

    pub async fn list_districts(&self, ids: Option<Vec<Uuid>>) -> Result<Vec<District>, AppError> {
        let districts = sqlx::query_as::<_, District>(
            "SELECT * FROM districts WHERE $1::uuid[] IS NULL OR id = ANY($1) ORDER BY district_number",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(districts)
    }

    pub async fn find_district(&self, id: Uuid) -> Result<Option<District>, AppError> {
        let district = sqlx::query_as::<_, District>("SELECT * FROM districts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(district)
    }

    pub async fn create_district(&self, payload: &DistrictPayload) -> Result<District, AppError> {
        sqlx::query_as::<_, District>(
            r#"
            INSERT INTO districts (name, district_number, pastor_name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&payload.name)
        .bind(payload.district_number)
        .bind(&payload.pastor_name)
        .bind(&payload.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "A district with this number already exists"))
    }

    pub async fn update_district(&self, id: Uuid, payload: &DistrictPayload) -> Result<Option<District>, AppError> {
        sqlx::query_as::<_, District>(
            r#"
            UPDATE districts
            SET name = $2, district_number = $3, pastor_name = $4, description = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&payload.name)
        .bind(payload.district_number)
        .bind(&payload.pastor_name)
        .bind(&payload.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "A district with this number already exists"))
    }

    pub async fn delete_district(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM districts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_delete(e, "a district"))?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Areas
    // ---

    pub async fn list_areas(
        &self,
        ids: Option<Vec<Uuid>>,
        district_id: Option<Uuid>,
    ) -> Result<Vec<AreaSupervisor>, AppError> {
        let areas = sqlx::query_as::<_, AreaSupervisor>(
            r#"
            SELECT * FROM area_supervisors
            WHERE ($1::uuid[] IS NULL OR id = ANY($1))
              AND ($2::uuid IS NULL OR district_id = $2)
            ORDER BY name
            "#,
        )
        .bind(ids)
        .bind(district_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(areas)
    }

    pub async fn find_area(&self, id: Uuid) -> Result<Option<AreaSupervisor>, AppError> {
        let area = sqlx::query_as::<_, AreaSupervisor>("SELECT * FROM area_supervisors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(area)
    }

    pub async fn create_area(&self, payload: &AreaSupervisorPayload) -> Result<AreaSupervisor, AppError> {
        sqlx::query_as::<_, AreaSupervisor>(
            r#"
            INSERT INTO area_supervisors (name, district_id, supervisor_name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&payload.name)
        .bind(payload.district_id)
        .bind(&payload.supervisor_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "Area already exists"))
    }

    pub async fn update_area(&self, id: Uuid, payload: &AreaSupervisorPayload) -> Result<Option<AreaSupervisor>, AppError> {
        sqlx::query_as::<_, AreaSupervisor>(
            r#"
            UPDATE area_supervisors
            SET name = $2, district_id = $3, supervisor_name = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&payload.name)
        .bind(payload.district_id)
        .bind(&payload.supervisor_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "Area already exists"))
    }

    pub async fn delete_area(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM area_supervisors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_delete(e, "an area"))?;
        Ok(result.rows_affected() > 0)
    }

    /// A zona a que a área pertence, se alguma.
    pub async fn zone_of_area(&self, area_id: Uuid) -> Result<Option<Uuid>, AppError> {
        let zone = sqlx::query_scalar::<_, Uuid>(
            "SELECT zonal_supervisor_id FROM zone_areas WHERE area_supervisor_id = $1",
        )
        .bind(area_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(zone)
    }

    // ---
    // Zones
    // ---

    pub async fn list_zones(
        &self,
        ids: Option<Vec<Uuid>>,
        district_id: Option<Uuid>,
    ) -> Result<Vec<ZonalSupervisor>, AppError> {
        let zones = sqlx::query_as::<_, ZonalSupervisor>(&format!(
            r#"
            {ZONE_SELECT}
            WHERE ($1::uuid[] IS NULL OR z.id = ANY($1))
              AND ($2::uuid IS NULL OR z.district_id = $2)
            GROUP BY z.id
            ORDER BY z.name
            "#
        ))
        .bind(ids)
        .bind(district_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(zones)
    }

    pub async fn find_zone<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<ZonalSupervisor>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let zone = sqlx::query_as::<_, ZonalSupervisor>(&format!("{ZONE_SELECT} WHERE z.id = $1 GROUP BY z.id"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(zone)
    }

    pub async fn insert_zone<'e, E>(&self, executor: E, payload: &ZonalSupervisorPayload) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO zonal_supervisors (name, district_id, supervisor_name)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&payload.name)
        .bind(payload.district_id)
        .bind(&payload.supervisor_name)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique(e, "Zone already exists"))
    }

    pub async fn update_zone_row<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &ZonalSupervisorPayload,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE zonal_supervisors
            SET name = $2, district_id = $3, supervisor_name = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&payload.name)
        .bind(payload.district_id)
        .bind(&payload.supervisor_name)
        .execute(executor)
        .await
        .map_err(|e| map_unique(e, "Zone already exists"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_zone_areas<'e, E>(&self, executor: E, zone_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM zone_areas WHERE zonal_supervisor_id = $1")
            .bind(zone_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn add_zone_areas<'e, E>(&self, executor: E, zone_id: Uuid, area_ids: &[Uuid]) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if area_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO zone_areas (zonal_supervisor_id, area_supervisor_id)
            SELECT $1, area_id FROM UNNEST($2::uuid[]) AS area_id
            "#,
        )
        .bind(zone_id)
        .bind(area_ids)
        .execute(executor)
        .await
        .map_err(|e| map_unique(e, "An area can belong to only one zone"))?;
        Ok(())
    }

    /// Quantas das áreas pertencem ao distrito (para validar a composição da zona).
    pub async fn count_areas_in_district<'e, E>(
        &self,
        executor: E,
        district_id: Uuid,
        area_ids: &[Uuid],
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM area_supervisors WHERE district_id = $1 AND id = ANY($2)",
        )
        .bind(district_id)
        .bind(area_ids)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn delete_zone(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM zonal_supervisors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_delete(e, "a zone"))?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Centres
    // ---

    pub async fn list_centres(
        &self,
        ids: Option<Vec<Uuid>>,
        area_id: Option<Uuid>,
    ) -> Result<Vec<CithCentre>, AppError> {
        let centres = sqlx::query_as::<_, CithCentre>(
            r#"
            SELECT * FROM cith_centres
            WHERE ($1::uuid[] IS NULL OR id = ANY($1))
              AND ($2::uuid IS NULL OR area_supervisor_id = $2)
            ORDER BY name
            "#,
        )
        .bind(ids)
        .bind(area_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(centres)
    }

    pub async fn find_centre(&self, id: Uuid) -> Result<Option<CithCentre>, AppError> {
        let centre = sqlx::query_as::<_, CithCentre>("SELECT * FROM cith_centres WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(centre)
    }

    pub async fn create_centre(&self, payload: &CithCentrePayload) -> Result<CithCentre, AppError> {
        sqlx::query_as::<_, CithCentre>(
            r#"
            INSERT INTO cith_centres (name, location, area_supervisor_id, leader_name, contact_email, contact_phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&payload.name)
        .bind(&payload.location)
        .bind(payload.area_supervisor_id)
        .bind(&payload.leader_name)
        .bind(&payload.contact_email)
        .bind(&payload.contact_phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "Centre already exists"))
    }

    pub async fn update_centre(&self, id: Uuid, payload: &CithCentrePayload) -> Result<Option<CithCentre>, AppError> {
        sqlx::query_as::<_, CithCentre>(
            r#"
            UPDATE cith_centres
            SET name = $2, location = $3, area_supervisor_id = $4, leader_name = $5,
                contact_email = $6, contact_phone = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.location)
        .bind(payload.area_supervisor_id)
        .bind(&payload.leader_name)
        .bind(&payload.contact_email)
        .bind(&payload.contact_phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "Centre already exists"))
    }

    pub async fn delete_centre(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cith_centres WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_delete(e, "a centre"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Centro -> área -> (zona) -> distrito, num só SELECT.
    pub async fn centre_context(&self, centre_id: Uuid) -> Result<Option<CentreContext>, AppError> {
        let ctx = sqlx::query_as::<_, CentreContext>(
            r#"
            SELECT c.id AS centre_id,
                   a.id AS area_id,
                   za.zonal_supervisor_id AS zone_id,
                   a.district_id AS district_id
            FROM cith_centres c
            JOIN area_supervisors a ON a.id = c.area_supervisor_id
            LEFT JOIN zone_areas za ON za.area_supervisor_id = a.id
            WHERE c.id = $1
            "#,
        )
        .bind(centre_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ctx)
    }

    /// Quantos filhos ainda apontam para a entidade.
    pub async fn count_dependents(&self, kind: Dependents, id: Uuid) -> Result<i64, AppError> {
        let sql = match kind {
            Dependents::DistrictChildren => {
                r#"SELECT (SELECT COUNT(*) FROM area_supervisors WHERE district_id = $1)
                        + (SELECT COUNT(*) FROM zonal_supervisors WHERE district_id = $1)"#
            }
            Dependents::AreaChildren => {
                r#"SELECT (SELECT COUNT(*) FROM cith_centres WHERE area_supervisor_id = $1)
                        + (SELECT COUNT(*) FROM zone_areas WHERE area_supervisor_id = $1)"#
            }
            Dependents::ZoneMembers => "SELECT COUNT(*) FROM zone_areas WHERE zonal_supervisor_id = $1",
            Dependents::CentreChildren => {
                r#"SELECT (SELECT COUNT(*) FROM weekly_reports WHERE cith_centre_id = $1)
                        + (SELECT COUNT(*) FROM users WHERE cith_centre_id = $1)"#
            }
        };

        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl HierarchyLookup for HierarchyRepository {
    async fn areas_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM area_supervisors WHERE district_id = $1 ORDER BY id")
            .bind(district_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn zones_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM zonal_supervisors WHERE district_id = $1 ORDER BY id")
            .bind(district_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn areas_in_zone(&self, zone_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT area_supervisor_id FROM zone_areas WHERE zonal_supervisor_id = $1 ORDER BY area_supervisor_id",
        )
        .bind(zone_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn centres_in_areas(&self, area_ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        if area_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM cith_centres WHERE area_supervisor_id = ANY($1) ORDER BY id",
        )
        .bind(area_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
