// src/models/report.rs

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::hierarchy::CentreContext;

// --- ENUMS ---

// Mapeia o CREATE TYPE report_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    AreaApproved,
    ZonalApproved,
    DistrictApproved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::AreaApproved => "area_approved",
            ReportStatus::ZonalApproved => "zonal_approved",
            ReportStatus::DistrictApproved => "district_approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    /// Posição na cadeia de aprovação. Rejeitado volta ao início.
    pub fn rank(&self) -> u8 {
        match self {
            ReportStatus::Pending | ReportStatus::Rejected => 0,
            ReportStatus::AreaApproved => 1,
            ReportStatus::ZonalApproved => 2,
            ReportStatus::DistrictApproved => 3,
        }
    }

    pub fn is_approval_level(&self) -> bool {
        self.rank() > 0
    }

    /// Estados em que o autor ainda pode editar ou apagar.
    pub fn is_editable(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::Rejected)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RegularService,
    SpecialProgram,
    Outreach,
    PrayerMeeting,
}

impl EventType {
    pub fn label(&self) -> &'static str {
        match self {
            EventType::RegularService => "Regular service",
            EventType::SpecialProgram => "Special program",
            EventType::Outreach => "Outreach",
            EventType::PrayerMeeting => "Prayer meeting",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "meeting_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingMode {
    #[default]
    InPerson,
    Online,
    Hybrid,
}

impl MeetingMode {
    pub fn label(&self) -> &'static str {
        match self {
            MeetingMode::InPerson => "In person",
            MeetingMode::Online => "Online",
            MeetingMode::Hybrid => "Hybrid",
        }
    }
}

/// Semanas começam no domingo.
pub fn normalize_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

// --- DADOS DO RELATÓRIO ---

// Teto por contagem: a soma das três cabe no total_attendance INTEGER
pub const MAX_COUNT: i32 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_report_data"))]
pub struct ReportData {
    #[validate(range(min = 0, max = MAX_COUNT, message = "must be between 0 and 100000"))]
    #[schema(example = 10)]
    pub male: i32,
    #[validate(range(min = 0, max = MAX_COUNT, message = "must be between 0 and 100000"))]
    #[schema(example = 12)]
    pub female: i32,
    #[validate(range(min = 0, max = MAX_COUNT, message = "must be between 0 and 100000"))]
    #[schema(example = 3)]
    pub children: i32,
    #[validate(custom(function = "validate_not_negative"))]
    #[schema(value_type = f64, example = 15000.50)]
    pub offerings: Decimal,
    pub testimonies: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_COUNT, message = "must be between 0 and 100000"))]
    pub number_of_first_timers: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_COUNT, message = "must be between 0 and 100000"))]
    pub first_timers_followed_up: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_COUNT, message = "must be between 0 and 100000"))]
    pub first_timers_converted_to_cith: i32,
    #[serde(default)]
    pub meeting_mode: MeetingMode,
    pub remarks: Option<String>,
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

fn validate_not_blank(val: &str) -> Result<(), ValidationError> {
    if val.trim().is_empty() {
        return Err(validation_error("required", "A rejection reason is required"));
    }
    Ok(())
}

// Funil de primeiras visitas: nunca cresce de uma etapa para a próxima
fn validate_report_data(data: &ReportData) -> Result<(), ValidationError> {
    if data.first_timers_followed_up > data.number_of_first_timers {
        return Err(validation_error(
            "funnel",
            "First timers followed up cannot exceed the number of first timers",
        ));
    }
    if data.first_timers_converted_to_cith > data.first_timers_followed_up {
        return Err(validation_error(
            "funnel",
            "First timers converted to CITH cannot exceed those followed up",
        ));
    }
    Ok(())
}

// --- RELATÓRIO (o registro) ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub id: Uuid,
    pub cith_centre_id: Uuid,
    #[schema(value_type = String, format = Date, example = "2025-03-02")]
    pub week: NaiveDate,
    pub event_type: EventType,

    #[sqlx(flatten)]
    pub data: ReportData,
    pub total_attendance: i32,

    pub status: ReportStatus,
    pub submitted_by: Uuid,

    pub area_approved_by: Option<Uuid>,
    pub area_approved_at: Option<DateTime<Utc>>,
    pub zonal_approved_by: Option<Uuid>,
    pub zonal_approved_at: Option<DateTime<Utc>>,
    pub district_approved_by: Option<Uuid>,
    pub district_approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklyReport {
    /// Quem carimbou cada nível de aprovação, na ordem da cadeia.
    pub fn approval_stamps(&self) -> [(ReportStatus, Option<Uuid>); 3] {
        [
            (ReportStatus::AreaApproved, self.area_approved_by),
            (ReportStatus::ZonalApproved, self.zonal_approved_by),
            (ReportStatus::DistrictApproved, self.district_approved_by),
        ]
    }
}

/// Relatório com os nomes da hierarquia ("populate").
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub report: WeeklyReport,
    pub cith_centre_name: String,
    pub area_supervisor_id: Uuid,
    pub area_supervisor_name: String,
    pub zonal_supervisor_id: Option<Uuid>,
    pub district_id: Uuid,
    pub district_name: String,
    pub submitted_by_name: String,
}

impl ReportDetail {
    pub fn context(&self) -> CentreContext {
        CentreContext {
            centre_id: self.report.cith_centre_id,
            area_id: self.area_supervisor_id,
            zone_id: self.zonal_supervisor_id,
            district_id: self.district_id,
        }
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportPayload {
    #[schema(value_type = String, format = Date, example = "2025-03-04")]
    pub week: NaiveDate,
    pub event_type: EventType,
    #[validate(nested)]
    pub data: ReportData,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportPayload {
    #[validate(nested)]
    pub data: ReportData,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveReportPayload {
    /// Só para admin: nível alvo (por padrão, o próximo)
    pub target_status: Option<ReportStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectReportPayload {
    #[validate(custom(function = "validate_not_blank"))]
    #[schema(example = "Offering total does not match the receipts")]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminEditPayload {
    #[validate(nested)]
    pub data: Option<ReportData>,
    pub target_status: Option<ReportStatus>,
    #[serde(default)]
    pub reset_approvals: bool,
    pub rejection_reason: Option<String>,
}

// --- Filtros e agregados ---

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub event_type: Option<EventType>,
    pub cith_centre_id: Option<Uuid>,
    /// Semana inicial (inclusive)
    pub from: Option<NaiveDate>,
    /// Semana final (inclusive)
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_reports: i64,
    pub pending: i64,
    pub area_approved: i64,
    pub zonal_approved: i64,
    pub district_approved: i64,
    pub rejected: i64,
    pub total_male: i64,
    pub total_female: i64,
    pub total_children: i64,
    pub total_attendance: i64,
    #[schema(value_type = f64)]
    pub total_offerings: Decimal,
    pub total_first_timers: i64,
    pub total_followed_up: i64,
    pub total_converted: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn data() -> ReportData {
        ReportData {
            male: 10,
            female: 12,
            children: 3,
            offerings: Decimal::new(1500050, 2),
            testimonies: None,
            number_of_first_timers: 4,
            first_timers_followed_up: 3,
            first_timers_converted_to_cith: 1,
            meeting_mode: MeetingMode::InPerson,
            remarks: None,
        }
    }

    #[test]
    fn valid_data_passes() {
        assert!(data().validate().is_ok());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let mut d = data();
        d.children = -1;
        let errors = d.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("children"));
    }

    #[test]
    fn counts_above_the_ceiling_are_rejected() {
        let mut d = data();
        d.male = MAX_COUNT;
        d.female = MAX_COUNT;
        d.children = MAX_COUNT;
        assert!(d.validate().is_ok());

        d.male = i32::MAX;
        d.number_of_first_timers = MAX_COUNT + 1;
        let errors = d.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("male"));
        assert!(fields.contains_key("number_of_first_timers"));
        assert!(!fields.contains_key("female"));
    }

    #[test]
    fn negative_offerings_are_rejected() {
        let mut d = data();
        d.offerings = Decimal::new(-1, 0);
        let errors = d.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("offerings"));
    }

    #[test]
    fn followed_up_cannot_exceed_first_timers() {
        let mut d = data();
        d.first_timers_followed_up = 5;
        d.first_timers_converted_to_cith = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn converted_cannot_exceed_followed_up() {
        let mut d = data();
        d.first_timers_converted_to_cith = 4;
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejection_reason_cannot_be_blank() {
        let payload = RejectReportPayload { reason: "   ".into() };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("reason"));
        assert!(RejectReportPayload { reason: "Totals do not add up".into() }.validate().is_ok());
    }

    #[test]
    fn weeks_normalize_to_sunday() {
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let wednesday = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        assert_eq!(normalize_week(sunday), sunday);
        assert_eq!(normalize_week(wednesday), sunday);
        assert_eq!(normalize_week(saturday), sunday);
    }

    #[test]
    fn rejected_ranks_with_pending() {
        assert_eq!(ReportStatus::Rejected.rank(), ReportStatus::Pending.rank());
        assert!(ReportStatus::ZonalApproved.rank() < ReportStatus::DistrictApproved.rank());
        assert!(ReportStatus::Rejected.is_editable());
        assert!(!ReportStatus::AreaApproved.is_editable());
    }
}
