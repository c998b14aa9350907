// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::available_slots,

        // --- Users ---
        handlers::auth::get_me,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::delete_user,

        // --- Hierarchy ---
        handlers::hierarchy::list_districts,
        handlers::hierarchy::get_district,
        handlers::hierarchy::create_district,
        handlers::hierarchy::update_district,
        handlers::hierarchy::delete_district,
        handlers::hierarchy::list_areas,
        handlers::hierarchy::get_area,
        handlers::hierarchy::create_area,
        handlers::hierarchy::update_area,
        handlers::hierarchy::delete_area,
        handlers::hierarchy::list_zones,
        handlers::hierarchy::get_zone,
        handlers::hierarchy::create_zone,
        handlers::hierarchy::update_zone,
        handlers::hierarchy::delete_zone,
        handlers::hierarchy::list_centres,
        handlers::hierarchy::get_centre,
        handlers::hierarchy::create_centre,
        handlers::hierarchy::update_centre,
        handlers::hierarchy::delete_centre,

        // --- Reports ---
        handlers::reports::submit_report,
        handlers::reports::list_reports,
        handlers::reports::report_summary,
        handlers::reports::pending_reports,
        handlers::reports::get_report,
        handlers::reports::update_report,
        handlers::reports::delete_report,
        handlers::reports::approve_report,
        handlers::reports::reject_report,
        handlers::reports::admin_edit_report,

        // --- Export ---
        handlers::export::export_excel,

        // --- Messages ---
        handlers::messages::send_message,
        handlers::messages::list_conversations,
        handlers::messages::get_thread,
        handlers::messages::list_recipients,
        handlers::messages::unread_messages,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::unread_notifications,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::delete_notification,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::HierarchyRefs,
            models::auth::RegisterUserPayload,
            models::auth::UpdateUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,
            models::auth::AvailableSlot,

            // --- Hierarchy ---
            models::hierarchy::District,
            models::hierarchy::AreaSupervisor,
            models::hierarchy::ZonalSupervisor,
            models::hierarchy::CithCentre,
            models::hierarchy::DistrictPayload,
            models::hierarchy::AreaSupervisorPayload,
            models::hierarchy::ZonalSupervisorPayload,
            models::hierarchy::CithCentrePayload,

            // --- Reports ---
            models::report::ReportStatus,
            models::report::EventType,
            models::report::MeetingMode,
            models::report::ReportData,
            models::report::WeeklyReport,
            models::report::ReportDetail,
            models::report::ReportSummary,
            models::report::SubmitReportPayload,
            models::report::UpdateReportPayload,
            models::report::ApproveReportPayload,
            models::report::RejectReportPayload,
            models::report::AdminEditPayload,

            // --- Messages ---
            models::messaging::Message,
            models::messaging::Conversation,
            models::messaging::Recipient,
            models::messaging::SendMessagePayload,
            models::messaging::UnreadCount,

            // --- Notifications ---
            models::notification::NotificationKind,
            models::notification::Notification,
            models::notification::MarkedRead,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação, registro e cadeiras livres"),
        (name = "Users", description = "Usuários e perfil"),
        (name = "Hierarchy", description = "Distritos, zonas, áreas e centros CITH"),
        (name = "Reports", description = "Relatórios semanais e fluxo de aprovação"),
        (name = "Export", description = "Exportação em planilha"),
        (name = "Messages", description = "Mensagens diretas"),
        (name = "Notifications", description = "Notificações do usuário")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_report_workflow() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/reports",
            "/api/reports/{id}/approve",
            "/api/reports/{id}/reject",
            "/api/reports/{id}/admin-edit",
            "/api/export/excel",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
