// src/services/export_service.rs

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};

use crate::{
    common::error::AppError,
    models::{
        auth::User,
        report::{ReportDetail, ReportFilter},
    },
    services::report_service::ReportService,
};

const HEADERS: [(&str, f64); 19] = [
    ("Week", 12.0),
    ("CITH Centre", 24.0),
    ("Area", 20.0),
    ("District", 20.0),
    ("Event type", 16.0),
    ("Meeting mode", 14.0),
    ("Male", 8.0),
    ("Female", 8.0),
    ("Children", 9.0),
    ("Total attendance", 10.0),
    ("Offerings", 12.0),
    ("First timers", 10.0),
    ("Followed up", 10.0),
    ("Converted", 10.0),
    ("Status", 16.0),
    ("Submitted by", 20.0),
    ("Testimonies", 30.0),
    ("Remarks", 30.0),
    ("Rejection reason", 30.0),
];

// Colunas numéricas somadas na linha de totais
const SUMMED_COLUMNS: std::ops::RangeInclusive<u16> = 6..=13;

fn numeric_cells(r: &ReportDetail) -> [f64; 8] {
    let d = &r.report.data;
    [
        f64::from(d.male),
        f64::from(d.female),
        f64::from(d.children),
        f64::from(r.report.total_attendance),
        d.offerings.to_f64().unwrap_or_default(),
        f64::from(d.number_of_first_timers),
        f64::from(d.first_timers_followed_up),
        f64::from(d.first_timers_converted_to_cith),
    ]
}

/// Uma linha por relatório, cabeçalho congelado e linha de totais no fim.
pub fn build_workbook(reports: &[ReportDetail]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    let money = Format::new().set_num_format("#,##0.00");
    let bold = Format::new().set_bold();
    let bold_money = Format::new().set_bold().set_num_format("#,##0.00");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Weekly reports")?;

    for (col, (title, width)) in HEADERS.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header)?;
        worksheet.set_column_width(col, *width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    let mut totals = [0f64; 8];

    for (i, r) in reports.iter().enumerate() {
        let row = (i + 1) as u32;
        let report = &r.report;

        worksheet.write_string(row, 0, report.week.format("%Y-%m-%d").to_string())?;
        worksheet.write_string(row, 1, &r.cith_centre_name)?;
        worksheet.write_string(row, 2, &r.area_supervisor_name)?;
        worksheet.write_string(row, 3, &r.district_name)?;
        worksheet.write_string(row, 4, report.event_type.label())?;
        worksheet.write_string(row, 5, report.data.meeting_mode.label())?;

        for (offset, value) in numeric_cells(r).into_iter().enumerate() {
            let col = *SUMMED_COLUMNS.start() + offset as u16;
            if col == 10 {
                worksheet.write_number_with_format(row, col, value, &money)?;
            } else {
                worksheet.write_number(row, col, value)?;
            }
            totals[offset] += value;
        }

        worksheet.write_string(row, 14, report.status.as_str())?;
        worksheet.write_string(row, 15, &r.submitted_by_name)?;
        worksheet.write_string(row, 16, report.data.testimonies.as_deref().unwrap_or(""))?;
        worksheet.write_string(row, 17, report.data.remarks.as_deref().unwrap_or(""))?;
        worksheet.write_string(row, 18, report.rejection_reason.as_deref().unwrap_or(""))?;
    }

    let totals_row = (reports.len() + 1) as u32;
    worksheet.write_string_with_format(totals_row, 0, "Total", &bold)?;
    for (offset, value) in totals.into_iter().enumerate() {
        let col = *SUMMED_COLUMNS.start() + offset as u16;
        let format = if col == 10 { &bold_money } else { &bold };
        worksheet.write_number_with_format(totals_row, col, value, format)?;
    }

    workbook.save_to_buffer()
}

pub fn export_filename(filter: &ReportFilter) -> String {
    match (filter.from, filter.to) {
        (Some(from), Some(to)) => format!("weekly-reports_{from}_{to}.xlsx"),
        (Some(from), None) => format!("weekly-reports_from_{from}.xlsx"),
        (None, Some(to)) => format!("weekly-reports_until_{to}.xlsx"),
        (None, None) => "weekly-reports.xlsx".to_string(),
    }
}

#[derive(Clone)]
pub struct ExportService {
    reports: ReportService,
}

impl ExportService {
    pub fn new(reports: ReportService) -> Self {
        Self { reports }
    }

    /// Planilha com os relatórios que o ator enxerga, com os mesmos filtros da listagem.
    pub async fn export_reports(&self, actor: &User, filter: &ReportFilter) -> Result<Vec<u8>, AppError> {
        let reports = self.reports.list_all(actor, filter).await?;
        tracing::info!(user_id = %actor.id, rows = reports.len(), "Exportando relatórios");

        // Montar o xlsx é CPU puro
        let bytes = tokio::task::spawn_blocking(move || build_workbook(&reports))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de exportação: {}", e))??;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::report::{EventType, MeetingMode, ReportData, ReportStatus, WeeklyReport};

    fn detail() -> ReportDetail {
        let now = Utc::now();
        ReportDetail {
            report: WeeklyReport {
                id: Uuid::new_v4(),
                cith_centre_id: Uuid::new_v4(),
                week: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
                event_type: EventType::RegularService,
                data: ReportData {
                    male: 10,
                    female: 12,
                    children: 3,
                    offerings: Decimal::new(1500050, 2),
                    testimonies: Some("Healing testimony".into()),
                    number_of_first_timers: 2,
                    first_timers_followed_up: 1,
                    first_timers_converted_to_cith: 0,
                    meeting_mode: MeetingMode::Hybrid,
                    remarks: None,
                },
                total_attendance: 25,
                status: ReportStatus::Pending,
                submitted_by: Uuid::new_v4(),
                area_approved_by: None,
                area_approved_at: None,
                zonal_approved_by: None,
                zonal_approved_at: None,
                district_approved_by: None,
                district_approved_at: None,
                rejected_by: None,
                rejected_at: None,
                rejection_reason: None,
                created_at: now,
                updated_at: now,
            },
            cith_centre_name: "Grace Cell".into(),
            area_supervisor_id: Uuid::new_v4(),
            area_supervisor_name: "Area 3".into(),
            zonal_supervisor_id: None,
            district_id: Uuid::new_v4(),
            district_name: "Lagos Central".into(),
            submitted_by_name: "Grace Adeyemi".into(),
        }
    }

    #[test]
    fn workbook_is_a_zip_archive() {
        let bytes = build_workbook(&[detail(), detail()]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_export_still_has_headers_and_totals() {
        assert!(build_workbook(&[]).is_ok());
    }

    #[test]
    fn numeric_cells_follow_the_header_order() {
        let cells = numeric_cells(&detail());
        assert_eq!(cells[3], 25.0);
        assert_eq!(cells[4], 15000.5);
        assert_eq!(HEADERS[*SUMMED_COLUMNS.start() as usize + 4].0, "Offerings");
        assert_eq!(HEADERS[*SUMMED_COLUMNS.end() as usize].0, "Converted");
    }

    #[test]
    fn filename_reflects_the_date_range() {
        let filter = ReportFilter {
            from: NaiveDate::from_ymd_opt(2025, 1, 5),
            to: NaiveDate::from_ymd_opt(2025, 3, 30),
            ..Default::default()
        };
        assert_eq!(export_filename(&filter), "weekly-reports_2025-01-05_2025-03-30.xlsx");
        assert_eq!(export_filename(&ReportFilter::default()), "weekly-reports.xlsx");
    }
}
