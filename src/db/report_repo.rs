use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{error::AppError, pagination::PageParams},
    models::report::{
        EventType, ReportData, ReportDetail, ReportFilter, ReportStatus, ReportSummary, WeeklyReport,
    },
    services::{
        approval::{AdminEditPlan, RejectionChange, Transition, ALL_LEVELS},
        scope::Visibility,
    },
};

const REPORT_UNIQUE_CONSTRAINT: &str = "uq_weekly_reports_centre_week_event";

const DETAIL_SELECT: &str = r#"
    SELECT r.*,
           c.name AS cith_centre_name,
           a.id AS area_supervisor_id,
           a.name AS area_supervisor_name,
           za.zonal_supervisor_id AS zonal_supervisor_id,
           d.id AS district_id,
           d.name AS district_name,
           u.name AS submitted_by_name
    FROM weekly_reports r
    JOIN cith_centres c ON c.id = r.cith_centre_id
    JOIN area_supervisors a ON a.id = c.area_supervisor_id
    JOIN districts d ON d.id = a.district_id
    JOIN users u ON u.id = r.submitted_by
    LEFT JOIN zone_areas za ON za.area_supervisor_id = a.id
"#;

const SUMMARY_SELECT: &str = r#"
    SELECT COUNT(*) AS total_reports,
           COUNT(*) FILTER (WHERE r.status = 'pending') AS pending,
           COUNT(*) FILTER (WHERE r.status = 'area_approved') AS area_approved,
           COUNT(*) FILTER (WHERE r.status = 'zonal_approved') AS zonal_approved,
           COUNT(*) FILTER (WHERE r.status = 'district_approved') AS district_approved,
           COUNT(*) FILTER (WHERE r.status = 'rejected') AS rejected,
           COALESCE(SUM(r.male), 0)::bigint AS total_male,
           COALESCE(SUM(r.female), 0)::bigint AS total_female,
           COALESCE(SUM(r.children), 0)::bigint AS total_children,
           COALESCE(SUM(r.total_attendance), 0)::bigint AS total_attendance,
           COALESCE(SUM(r.offerings), 0) AS total_offerings,
           COALESCE(SUM(r.number_of_first_timers), 0)::bigint AS total_first_timers,
           COALESCE(SUM(r.first_timers_followed_up), 0)::bigint AS total_followed_up,
           COALESCE(SUM(r.first_timers_converted_to_cith), 0)::bigint AS total_converted
    FROM weekly_reports r
"#;

/// Colunas (quem, quando) de cada nível de aprovação.
fn stamp_columns(level: ReportStatus) -> Option<(&'static str, &'static str)> {
    match level {
        ReportStatus::AreaApproved => Some(("area_approved_by", "area_approved_at")),
        ReportStatus::ZonalApproved => Some(("zonal_approved_by", "zonal_approved_at")),
        ReportStatus::DistrictApproved => Some(("district_approved_by", "district_approved_at")),
        ReportStatus::Pending | ReportStatus::Rejected => None,
    }
}

fn push_data(qb: &mut QueryBuilder<'_, Postgres>, data: &ReportData) {
    qb.push(", male = ").push_bind(data.male);
    qb.push(", female = ").push_bind(data.female);
    qb.push(", children = ").push_bind(data.children);
    qb.push(", offerings = ").push_bind(data.offerings);
    qb.push(", testimonies = ").push_bind(data.testimonies.clone());
    qb.push(", number_of_first_timers = ").push_bind(data.number_of_first_timers);
    qb.push(", first_timers_followed_up = ").push_bind(data.first_timers_followed_up);
    qb.push(", first_timers_converted_to_cith = ").push_bind(data.first_timers_converted_to_cith);
    qb.push(", meeting_mode = ").push_bind(data.meeting_mode);
    qb.push(", remarks = ").push_bind(data.remarks.clone());
}

const CLEAR_REJECTION: &str = ", rejected_by = NULL, rejected_at = NULL, rejection_reason = NULL";

// Reenvio volta a `pending`: nenhum carimbo de aprovação ou rejeição sobrevive
fn resubmission_query<'a>(
    id: Uuid,
    submitter_id: Uuid,
    expected: ReportStatus,
    data: &ReportData,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new("UPDATE weekly_reports SET status = ");
    qb.push_bind(ReportStatus::Pending);
    qb.push(", updated_at = NOW()");
    push_data(&mut qb, data);
    for (by, at) in ALL_LEVELS.iter().filter_map(|l| stamp_columns(*l)) {
        qb.push(format!(", {by} = NULL, {at} = NULL"));
    }
    qb.push(CLEAR_REJECTION);
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" AND submitted_by = ").push_bind(submitter_id);
    qb.push(" AND status = ").push_bind(expected);
    qb.push(" RETURNING *");
    qb
}

// Filtros comuns a listagem, resumo e exportação
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReportFilter, visibility: &Visibility) {
    qb.push(" WHERE TRUE");
    if let Some(centres) = visibility.centre_filter() {
        qb.push(" AND r.cith_centre_id = ANY(").push_bind(centres).push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND r.status = ").push_bind(status);
    }
    if let Some(event_type) = filter.event_type {
        qb.push(" AND r.event_type = ").push_bind(event_type);
    }
    if let Some(centre_id) = filter.cith_centre_id {
        qb.push(" AND r.cith_centre_id = ").push_bind(centre_id);
    }
    if let Some(from) = filter.from {
        qb.push(" AND r.week >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND r.week <= ").push_bind(to);
    }
}

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists_for(&self, centre_id: Uuid, week: NaiveDate, event_type: EventType) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM weekly_reports
                WHERE cith_centre_id = $1 AND week = $2 AND event_type = $3
            )
            "#,
        )
        .bind(centre_id)
        .bind(week)
        .bind(event_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn insert(
        &self,
        centre_id: Uuid,
        week: NaiveDate,
        event_type: EventType,
        data: &ReportData,
        submitted_by: Uuid,
    ) -> Result<Uuid, AppError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO weekly_reports (
                cith_centre_id, week, event_type,
                male, female, children, offerings, testimonies,
                number_of_first_timers, first_timers_followed_up, first_timers_converted_to_cith,
                meeting_mode, remarks, submitted_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(centre_id)
        .bind(week)
        .bind(event_type)
        .bind(data.male)
        .bind(data.female)
        .bind(data.children)
        .bind(data.offerings)
        .bind(&data.testimonies)
        .bind(data.number_of_first_timers)
        .bind(data.first_timers_followed_up)
        .bind(data.first_timers_converted_to_cith)
        .bind(data.meeting_mode)
        .bind(&data.remarks)
        .bind(submitted_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.constraint() == Some(REPORT_UNIQUE_CONSTRAINT) => {
                AppError::conflict("A report already exists for this centre, week and event type")
            }
            _ => AppError::DatabaseError(e),
        })
    }

    pub async fn find_detail(&self, id: Uuid) -> Result<Option<ReportDetail>, AppError> {
        let detail = sqlx::query_as::<_, ReportDetail>(&format!("{DETAIL_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(detail)
    }

    /// Listagem com escopo. Sem `page`, devolve tudo (exportação).
    pub async fn list(
        &self,
        filter: &ReportFilter,
        visibility: &Visibility,
        page: Option<&PageParams>,
    ) -> Result<Vec<ReportDetail>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(DETAIL_SELECT);
        push_filters(&mut qb, filter, visibility);
        qb.push(" ORDER BY r.week DESC, c.name, r.event_type");
        if let Some(page) = page {
            qb.push(" LIMIT ").push_bind(page.limit());
            qb.push(" OFFSET ").push_bind(page.offset());
        }

        let reports = qb.build_query_as::<ReportDetail>().fetch_all(&self.pool).await?;
        Ok(reports)
    }

    pub async fn count(&self, filter: &ReportFilter, visibility: &Visibility) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM weekly_reports r");
        push_filters(&mut qb, filter, visibility);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    pub async fn summary(&self, filter: &ReportFilter, visibility: &Visibility) -> Result<ReportSummary, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        push_filters(&mut qb, filter, visibility);
        let summary = qb.build_query_as::<ReportSummary>().fetch_one(&self.pool).await?;
        Ok(summary)
    }

    /// Relatórios nos estados dados, dentro do escopo.
    pub async fn list_in_statuses(
        &self,
        statuses: &[ReportStatus],
        visibility: &Visibility,
    ) -> Result<Vec<ReportDetail>, AppError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new(DETAIL_SELECT);
        push_filters(&mut qb, &ReportFilter::default(), visibility);
        qb.push(" AND r.status = ANY(").push_bind(statuses.to_vec()).push(")");
        qb.push(" ORDER BY r.week ASC, r.created_at ASC");

        let reports = qb.build_query_as::<ReportDetail>().fetch_all(&self.pool).await?;
        Ok(reports)
    }

    /// Grava a transição só se o estado ainda for `transition.from`.
    /// `None` quando outra requisição mudou o relatório antes.
    pub async fn apply_transition(
        &self,
        id: Uuid,
        transition: &Transition,
        actor_id: Uuid,
        rejection_reason: Option<&str>,
    ) -> Result<Option<WeeklyReport>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE weekly_reports SET status = ");
        qb.push_bind(transition.to);
        qb.push(", updated_at = NOW()");

        for (by, at) in transition.stamps.iter().filter_map(|l| stamp_columns(*l)) {
            qb.push(format!(", {by} = ")).push_bind(actor_id);
            qb.push(format!(", {at} = NOW()"));
        }

        if transition.to == ReportStatus::Rejected {
            qb.push(", rejected_by = ").push_bind(actor_id);
            qb.push(", rejected_at = NOW()");
            qb.push(", rejection_reason = ").push_bind(rejection_reason.map(str::to_string));
        } else {
            qb.push(CLEAR_REJECTION);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status = ").push_bind(transition.from);
        qb.push(" RETURNING *");

        let report = qb.build_query_as::<WeeklyReport>().fetch_optional(&self.pool).await?;
        Ok(report)
    }

    /// Edição do autor: troca os dados e reenvia (volta a `pending`).
    pub async fn update_by_submitter(
        &self,
        id: Uuid,
        submitter_id: Uuid,
        expected: ReportStatus,
        data: &ReportData,
    ) -> Result<Option<WeeklyReport>, AppError> {
        let mut qb = resubmission_query(id, submitter_id, expected, data);
        let report = qb.build_query_as::<WeeklyReport>().fetch_optional(&self.pool).await?;
        Ok(report)
    }

    pub async fn apply_admin_edit(
        &self,
        id: Uuid,
        expected: ReportStatus,
        plan: &AdminEditPlan,
        data: Option<&ReportData>,
        admin_id: Uuid,
    ) -> Result<Option<WeeklyReport>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE weekly_reports SET status = ");
        qb.push_bind(plan.status);
        qb.push(", updated_at = NOW()");

        if let Some(data) = data {
            push_data(&mut qb, data);
        }

        for (by, at) in plan.clear.iter().filter_map(|l| stamp_columns(*l)) {
            qb.push(format!(", {by} = NULL, {at} = NULL"));
        }
        for (by, at) in plan.stamp.iter().filter_map(|l| stamp_columns(*l)) {
            qb.push(format!(", {by} = ")).push_bind(admin_id);
            qb.push(format!(", {at} = NOW()"));
        }

        match &plan.rejection {
            RejectionChange::Keep => {}
            RejectionChange::Clear => {
                qb.push(CLEAR_REJECTION);
            }
            RejectionChange::Set(reason) => {
                qb.push(", rejected_by = ").push_bind(admin_id);
                qb.push(", rejected_at = NOW()");
                qb.push(", rejection_reason = ").push_bind(reason.clone());
            }
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND status = ").push_bind(expected);
        qb.push(" RETURNING *");

        let report = qb.build_query_as::<WeeklyReport>().fetch_optional(&self.pool).await?;
        Ok(report)
    }

    /// Apaga se ainda estiver no estado lido antes.
    pub async fn delete(&self, id: Uuid, expected: ReportStatus) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM weekly_reports WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::report::MeetingMode, services::scope::ScopeSets};

    #[test]
    fn only_approval_levels_have_stamp_columns() {
        assert_eq!(
            stamp_columns(ReportStatus::ZonalApproved),
            Some(("zonal_approved_by", "zonal_approved_at"))
        );
        assert_eq!(stamp_columns(ReportStatus::Pending), None);
        assert_eq!(stamp_columns(ReportStatus::Rejected), None);
    }

    #[test]
    fn filters_bind_the_scope_and_every_given_field() {
        let centre = Uuid::new_v4();
        let visibility = Visibility::Restricted(ScopeSets {
            centres: vec![centre],
            ..Default::default()
        });
        let filter = ReportFilter {
            status: Some(ReportStatus::Pending),
            from: NaiveDate::from_ymd_opt(2025, 1, 5),
            ..Default::default()
        };

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM weekly_reports r");
        push_filters(&mut qb, &filter, &visibility);
        let sql = qb.sql();

        assert!(sql.contains("r.cith_centre_id = ANY($1)"));
        assert!(sql.contains("r.status = $2"));
        assert!(sql.contains("r.week >= $3"));
        assert!(!sql.contains("r.week <="));
    }

    #[test]
    fn unrestricted_scope_adds_no_centre_filter() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM weekly_reports r");
        push_filters(&mut qb, &ReportFilter::default(), &Visibility::Unrestricted);
        assert_eq!(qb.sql(), "SELECT 1 FROM weekly_reports r WHERE TRUE");
    }

    #[test]
    fn resubmission_wipes_every_approval_and_rejection_stamp() {
        let data = ReportData {
            male: 3,
            female: 4,
            children: 1,
            offerings: Default::default(),
            testimonies: None,
            number_of_first_timers: 0,
            first_timers_followed_up: 0,
            first_timers_converted_to_cith: 0,
            meeting_mode: MeetingMode::default(),
            remarks: None,
        };
        let qb = resubmission_query(Uuid::new_v4(), Uuid::new_v4(), ReportStatus::Rejected, &data);
        let sql = qb.sql();

        for (by, at) in ALL_LEVELS.iter().filter_map(|l| stamp_columns(*l)) {
            assert!(sql.contains(&format!("{by} = NULL")), "{by} survives: {sql}");
            assert!(sql.contains(&format!("{at} = NULL")), "{at} survives: {sql}");
        }
        assert!(sql.contains("rejection_reason = NULL"));
        assert!(sql.ends_with("AND status = $14 RETURNING *"), "{sql}");
    }
}
