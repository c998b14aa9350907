// src/services/report_service.rs
//
// Orquestra o ciclo de vida dos relatórios: lê o estado, planeja com
// `approval`, grava com UPDATE condicional e dispara as notificações.

use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageParams},
    },
    db::{HierarchyRepository, ReportRepository},
    models::{
        auth::{Assignment, User},
        report::{
            normalize_week, AdminEditPayload, ApproveReportPayload, RejectReportPayload, ReportDetail,
            ReportFilter, ReportStatus, ReportSummary, SubmitReportPayload, UpdateReportPayload,
        },
    },
    services::{
        approval::{actionable_statuses, can_act, plan_admin_edit, plan_approval, plan_rejection},
        notification_service::{NotificationService, ReportEvent},
        scope::{resolve_visibility, Visibility},
    },
};

#[derive(Clone)]
pub struct ReportService {
    repo: ReportRepository,
    hierarchy: HierarchyRepository,
    notifications: NotificationService,
}

impl ReportService {
    pub fn new(repo: ReportRepository, hierarchy: HierarchyRepository, notifications: NotificationService) -> Self {
        Self {
            repo,
            hierarchy,
            notifications,
        }
    }

    pub async fn visibility(&self, actor: &User) -> Result<Visibility, AppError> {
        resolve_visibility(&self.hierarchy, &actor.assignment()?).await
    }

    // Fora do escopo é 404, para não revelar que o relatório existe
    async fn visible_detail(&self, actor: &User, id: Uuid) -> Result<(Assignment, ReportDetail), AppError> {
        let assignment = actor.assignment()?;
        let visibility = resolve_visibility(&self.hierarchy, &assignment).await?;
        let detail = self
            .repo
            .find_detail(id)
            .await?
            .filter(|d| visibility.can_see_centre(d.report.cith_centre_id))
            .ok_or(AppError::NotFound("Report"))?;
        Ok((assignment, detail))
    }

    async fn reload(&self, id: Uuid) -> Result<ReportDetail, AppError> {
        self.repo.find_detail(id).await?.ok_or(AppError::NotFound("Report"))
    }

    pub async fn submit(&self, actor: &User, payload: SubmitReportPayload) -> Result<ReportDetail, AppError> {
        let centre_id = match actor.assignment()? {
            Assignment::CithCentre(id) => id,
            _ => return Err(AppError::forbidden("Only CITH centre users can submit reports")),
        };
        payload.validate()?;

        let week = normalize_week(payload.week);
        if self.repo.exists_for(centre_id, week, payload.event_type).await? {
            return Err(AppError::conflict(
                "A report already exists for this centre, week and event type",
            ));
        }

        let id = self
            .repo
            .insert(centre_id, week, payload.event_type, &payload.data, actor.id)
            .await?;
        let detail = self.reload(id).await?;

        tracing::info!(report_id = %id, centre_id = %centre_id, %week, "Relatório enviado");
        self.notifications
            .notify_report(ReportEvent::Submitted, detail.clone(), actor.id);
        Ok(detail)
    }

    pub async fn get(&self, actor: &User, id: Uuid) -> Result<ReportDetail, AppError> {
        let (_, detail) = self.visible_detail(actor, id).await?;
        Ok(detail)
    }

    pub async fn list(&self, actor: &User, filter: &ReportFilter, page: PageParams) -> Result<Page<ReportDetail>, AppError> {
        let visibility = self.visibility(actor).await?;
        let items = self.repo.list(filter, &visibility, Some(&page)).await?;
        let total = self.repo.count(filter, &visibility).await?;
        Ok(Page::new(items, &page, total))
    }

    /// Todos os relatórios do escopo, sem paginação (exportação).
    pub async fn list_all(&self, actor: &User, filter: &ReportFilter) -> Result<Vec<ReportDetail>, AppError> {
        let visibility = self.visibility(actor).await?;
        self.repo.list(filter, &visibility, None).await
    }

    pub async fn summary(&self, actor: &User, filter: &ReportFilter) -> Result<ReportSummary, AppError> {
        let visibility = self.visibility(actor).await?;
        self.repo.summary(filter, &visibility).await
    }

    /// A fila do ator: relatórios em que ele é o próximo a agir.
    pub async fn pending(&self, actor: &User) -> Result<Vec<ReportDetail>, AppError> {
        let assignment = actor.assignment()?;
        let visibility = resolve_visibility(&self.hierarchy, &assignment).await?;
        let candidates = self
            .repo
            .list_in_statuses(&actionable_statuses(assignment.role()), &visibility)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|d| can_act(d.report.status, &assignment, &d.context()))
            .collect())
    }

    pub async fn approve(&self, actor: &User, id: Uuid, payload: ApproveReportPayload) -> Result<ReportDetail, AppError> {
        let (assignment, detail) = self.visible_detail(actor, id).await?;
        let from = detail.report.status;
        let transition = plan_approval(from, &assignment, &detail.context(), payload.target_status)?;

        self.repo
            .apply_transition(id, &transition, actor.id, None)
            .await?
            .ok_or(AppError::InvalidTransition { from, action: "approve" })?;

        let detail = self.reload(id).await?;
        tracing::info!(report_id = %id, %from, to = %transition.to, actor = %actor.id, "Relatório aprovado");
        self.notifications
            .notify_report(ReportEvent::Approved(transition.to), detail.clone(), actor.id);
        Ok(detail)
    }

    pub async fn reject(&self, actor: &User, id: Uuid, payload: RejectReportPayload) -> Result<ReportDetail, AppError> {
        payload.validate()?;
        let (assignment, detail) = self.visible_detail(actor, id).await?;
        let from = detail.report.status;
        let transition = plan_rejection(from, &assignment, &detail.context())?;

        self.repo
            .apply_transition(id, &transition, actor.id, Some(payload.reason.trim()))
            .await?
            .ok_or(AppError::InvalidTransition { from, action: "reject" })?;

        let detail = self.reload(id).await?;
        tracing::info!(report_id = %id, %from, actor = %actor.id, "Relatório rejeitado");
        self.notifications
            .notify_report(ReportEvent::Rejected, detail.clone(), actor.id);
        Ok(detail)
    }

    /// Edição pelo autor enquanto pendente ou rejeitado; rejeitado volta a pendente.
    pub async fn update(&self, actor: &User, id: Uuid, payload: UpdateReportPayload) -> Result<ReportDetail, AppError> {
        payload.validate()?;
        let (_, detail) = self.visible_detail(actor, id).await?;
        if detail.report.submitted_by != actor.id {
            return Err(AppError::forbidden("Only the submitter can edit this report"));
        }

        let from = detail.report.status;
        if !from.is_editable() {
            return Err(AppError::InvalidTransition { from, action: "edit" });
        }

        self.repo
            .update_by_submitter(id, actor.id, from, &payload.data)
            .await?
            .ok_or(AppError::InvalidTransition { from, action: "edit" })?;

        let detail = self.reload(id).await?;
        if from == ReportStatus::Rejected {
            tracing::info!(report_id = %id, "Relatório reenviado após rejeição");
            self.notifications
                .notify_report(ReportEvent::Submitted, detail.clone(), actor.id);
        }
        Ok(detail)
    }

    pub async fn delete(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        let (assignment, detail) = self.visible_detail(actor, id).await?;
        let from = detail.report.status;

        if assignment != Assignment::Admin {
            if detail.report.submitted_by != actor.id {
                return Err(AppError::forbidden("Only the submitter can delete this report"));
            }
            if !from.is_editable() {
                return Err(AppError::InvalidTransition { from, action: "delete" });
            }
        }

        if !self.repo.delete(id, from).await? {
            return Err(AppError::InvalidTransition { from, action: "delete" });
        }
        tracing::info!(report_id = %id, actor = %actor.id, "Relatório apagado");
        Ok(())
    }

    /// Sobrescrita do admin: dados, estado e carimbos de uma vez.
    pub async fn admin_edit(&self, actor: &User, id: Uuid, payload: AdminEditPayload) -> Result<ReportDetail, AppError> {
        if actor.assignment()? != Assignment::Admin {
            return Err(AppError::forbidden("Only admins can override reports"));
        }
        payload.validate()?;

        let detail = self.reload(id).await?;
        let from = detail.report.status;
        let plan = plan_admin_edit(
            &detail.report,
            &detail.context(),
            payload.target_status,
            payload.reset_approvals,
            payload.rejection_reason.as_deref(),
        )?;

        self.repo
            .apply_admin_edit(id, from, &plan, payload.data.as_ref(), actor.id)
            .await?
            .ok_or(AppError::InvalidTransition { from, action: "edit" })?;

        let updated = self.reload(id).await?;
        tracing::warn!(report_id = %id, admin = %actor.id, %from, to = %plan.status, "Relatório sobrescrito pelo admin");

        if plan.status != from {
            let event = match plan.status {
                ReportStatus::Rejected => Some(ReportEvent::Rejected),
                s if s.is_approval_level() => Some(ReportEvent::Approved(s)),
                _ => None,
            };
            if let Some(event) = event {
                self.notifications.notify_report(event, updated.clone(), actor.id);
            }
        }
        Ok(updated)
    }
}
