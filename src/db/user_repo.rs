use sqlx::{PgPool, Postgres, Executor};
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::PageParams},
    models::{
        auth::{Assignment, AvailableSlot, HierarchyRefs, User, UserRole},
        hierarchy::UserPath,
    },
    services::scope::{Member, Visibility},
};

const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

// Usuário + caminho resolvido, vindo da view user_paths
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    #[sqlx(flatten)]
    pub user: User,
    #[sqlx(flatten)]
    pub path: UserPath,
}

impl MemberRow {
    pub fn member(&self) -> Member {
        Member {
            id: self.user.id,
            role: self.user.role,
            path: self.path,
        }
    }
}

const MEMBER_SELECT: &str = r#"
    SELECT u.*, up.path_district_id, up.path_zone_id, up.path_area_id, up.path_centre_id
    FROM users u
    JOIN user_paths up ON up.user_id = u.id
"#;

// Filtro de escopo aplicado a usuários: qualquer referência dentro dos conjuntos
const USER_SCOPE_FILTER: &str = r#"
    ($1::uuid[] IS NULL
        OR u.district_id = ANY($1)
        OR u.zonal_supervisor_id = ANY($2)
        OR u.area_supervisor_id = ANY($3)
        OR u.cith_centre_id = ANY($4))
"#;

fn map_user_write_error(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            if db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) {
                return AppError::EmailAlreadyExists;
            }
            return AppError::conflict("This position already has a supervisor assigned");
        }
        if db_err.is_foreign_key_violation() {
            return AppError::NotFound("Hierarchy entity");
        }
    }
    AppError::DatabaseError(e)
}

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_member(&self, id: Uuid) -> Result<Option<MemberRow>, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!("{MEMBER_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Candidatos a destinatário: o próprio distrito e os admins (ou todos, se None).
    pub async fn list_members_near(&self, district_id: Option<Uuid>) -> Result<Vec<MemberRow>, AppError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "{MEMBER_SELECT} WHERE $1::uuid IS NULL OR up.path_district_id = $1 OR u.role = 'admin' ORDER BY u.name"
        ))
        .bind(district_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_user<'e, E>(
        &self,
        executor: E,
        name: &str,
        email: &str,
        password_hash: &str,
        phone: Option<&str>,
        assignment: Assignment,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let refs = assignment.refs();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                name, email, password_hash, phone, role,
                district_id, zonal_supervisor_id, area_supervisor_id, cith_centre_id
            )
            VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(phone)
        .bind(assignment.role())
        .bind(refs.district_id)
        .bind(refs.zonal_supervisor_id)
        .bind(refs.area_supervisor_id)
        .bind(refs.cith_centre_id)
        .fetch_one(executor)
        .await
        .map_err(map_user_write_error)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_user<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
        phone: Option<&str>,
        assignment: Option<Assignment>,
    ) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Papel e referências mudam juntos, ou não mudam
        let refs = assignment.map(|a| a.refs()).unwrap_or_default();
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE(LOWER($3), email),
                password_hash = COALESCE($4, password_hash),
                phone = COALESCE($5, phone),
                role = COALESCE($6, role),
                district_id = CASE WHEN $6 IS NULL THEN district_id ELSE $7 END,
                zonal_supervisor_id = CASE WHEN $6 IS NULL THEN zonal_supervisor_id ELSE $8 END,
                area_supervisor_id = CASE WHEN $6 IS NULL THEN area_supervisor_id ELSE $9 END,
                cith_centre_id = CASE WHEN $6 IS NULL THEN cith_centre_id ELSE $10 END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(phone)
        .bind(assignment.map(|a| a.role()))
        .bind(refs.district_id)
        .bind(refs.zonal_supervisor_id)
        .bind(refs.area_supervisor_id)
        .bind(refs.cith_centre_id)
        .fetch_optional(executor)
        .await
        .map_err(map_user_write_error)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_delete(e, "a user"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Trava a linha da entidade dona da cadeira até o fim da transação.
    /// Retorna false se a entidade não existe.
    pub async fn lock_seat<'e, E>(&self, executor: E, assignment: Assignment) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (table, id) = match assignment {
            Assignment::Admin => return Ok(true),
            Assignment::DistrictPastor(id) => ("districts", id),
            Assignment::ZonalSupervisor(id) => ("zonal_supervisors", id),
            Assignment::AreaSupervisor(id) => ("area_supervisors", id),
            Assignment::CithCentre(id) => ("cith_centres", id),
        };

        let found = sqlx::query_scalar::<_, Uuid>(&format!("SELECT id FROM {table} WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(found.is_some())
    }

    /// Quantos usuários (exceto `except`) já ocupam a cadeira.
    pub async fn count_seat_holders<'e, E>(
        &self,
        executor: E,
        assignment: Assignment,
        except: Option<Uuid>,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let refs = assignment.refs();
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE role = $1
              AND ($2::uuid IS NULL OR id <> $2)
              AND district_id IS NOT DISTINCT FROM $3
              AND zonal_supervisor_id IS NOT DISTINCT FROM $4
              AND area_supervisor_id IS NOT DISTINCT FROM $5
              AND cith_centre_id IS NOT DISTINCT FROM $6
            "#,
        )
        .bind(assignment.role())
        .bind(except)
        .bind(refs.district_id)
        .bind(refs.zonal_supervisor_id)
        .bind(refs.area_supervisor_id)
        .bind(refs.cith_centre_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn list_scoped(
        &self,
        visibility: &Visibility,
        role: Option<UserRole>,
        page: &PageParams,
    ) -> Result<(Vec<User>, i64), AppError> {
        let where_clause = format!("WHERE {USER_SCOPE_FILTER} AND ($5::user_role IS NULL OR u.role = $5)");

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT u.* FROM users u {where_clause} ORDER BY u.role, u.name LIMIT $6 OFFSET $7"
        ))
        .bind(visibility.district_filter())
        .bind(visibility.zone_filter())
        .bind(visibility.area_filter())
        .bind(visibility.centre_filter())
        .bind(role)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users u {where_clause}"))
            .bind(visibility.district_filter())
            .bind(visibility.zone_filter())
            .bind(visibility.area_filter())
            .bind(visibility.centre_filter())
            .bind(role)
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }

    pub async fn admin_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE role = 'admin'")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    pub async fn has_admin(&self) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Quem ocupa a cadeira (para notificações).
    pub async fn seat_holder_ids(&self, assignment: Assignment) -> Result<Vec<Uuid>, AppError> {
        let refs: HierarchyRefs = assignment.refs();
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users
            WHERE role = $1
              AND ($2::uuid IS NULL OR district_id = $2)
              AND ($3::uuid IS NULL OR zonal_supervisor_id = $3)
              AND ($4::uuid IS NULL OR area_supervisor_id = $4)
              AND ($5::uuid IS NULL OR cith_centre_id = $5)
            "#,
        )
        .bind(assignment.role())
        .bind(refs.district_id)
        .bind(refs.zonal_supervisor_id)
        .bind(refs.area_supervisor_id)
        .bind(refs.cith_centre_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Entidades com cadeira livre para o papel pedido.
    pub async fn available_slots(&self, role: UserRole) -> Result<Vec<AvailableSlot>, AppError> {
        let (table, column, capacity) = match role {
            UserRole::Admin => return Ok(Vec::new()),
            UserRole::DistrictPastor => ("districts", "district_id", 1),
            UserRole::ZonalSupervisor => ("zonal_supervisors", "zonal_supervisor_id", 1),
            UserRole::AreaSupervisor => ("area_supervisors", "area_supervisor_id", 1),
            UserRole::CithCentre => ("cith_centres", "cith_centre_id", 2),
        };

        let slots = sqlx::query_as::<_, AvailableSlot>(&format!(
            r#"
            SELECT e.id, e.name, ($2 - COUNT(u.id))::bigint AS open_seats
            FROM {table} e
            LEFT JOIN users u ON u.{column} = e.id AND u.role = $1
            GROUP BY e.id, e.name
            HAVING COUNT(u.id) < $2
            ORDER BY e.name
            "#
        ))
        .bind(role)
        .bind(capacity as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(slots)
    }
}
