// src/services/notification_service.rs
//
// Fan-out de notificações. O público de cada evento é uma função pura do
// evento e do contexto do centro; a gravação roda numa task destacada e
// nunca devolve erro para quem disparou.

use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageParams},
    },
    db::{NotificationRepository, UserRepository},
    models::{
        auth::Assignment,
        hierarchy::CentreContext,
        notification::{NewNotification, Notification, NotificationKind},
        report::{ReportDetail, ReportStatus},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEvent {
    Submitted,
    Approved(ReportStatus),
    Rejected,
}

/// Quem recebe, antes de virar lista de ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Submitter,
    AreaSupervisor(Uuid),
    ZonalSupervisor(Uuid),
    DistrictPastor(Uuid),
    Admins,
}

pub fn audiences(event: ReportEvent, ctx: &CentreContext) -> Vec<Audience> {
    let mut out = Vec::new();
    match event {
        ReportEvent::Submitted => {
            out.push(Audience::AreaSupervisor(ctx.area_id));
            if let Some(zone) = ctx.zone_id {
                out.push(Audience::ZonalSupervisor(zone));
            }
            out.push(Audience::DistrictPastor(ctx.district_id));
        }
        ReportEvent::Approved(ReportStatus::AreaApproved) => {
            out.push(Audience::Submitter);
            // Quem aprova a seguir
            match ctx.zone_id {
                Some(zone) => out.push(Audience::ZonalSupervisor(zone)),
                None => out.push(Audience::DistrictPastor(ctx.district_id)),
            }
        }
        ReportEvent::Approved(ReportStatus::ZonalApproved) => {
            out.push(Audience::Submitter);
            out.push(Audience::DistrictPastor(ctx.district_id));
        }
        ReportEvent::Approved(_) => out.push(Audience::Submitter),
        ReportEvent::Rejected => {
            out.push(Audience::Submitter);
            out.push(Audience::AreaSupervisor(ctx.area_id));
        }
    }
    out.push(Audience::Admins);
    out
}

/// Título e corpo da notificação de um evento de relatório.
pub fn report_notification(event: ReportEvent, report: &ReportDetail) -> NewNotification {
    let what = format!(
        "{} report for {} (week of {})",
        report.report.event_type.label(),
        report.cith_centre_name,
        report.report.week
    );

    let (kind, title, body) = match event {
        ReportEvent::Submitted => (
            NotificationKind::ReportSubmitted,
            "New report submitted".to_string(),
            format!("{what} was submitted by {}.", report.submitted_by_name),
        ),
        ReportEvent::Approved(level) => (
            NotificationKind::ReportApproved,
            "Report approved".to_string(),
            format!("{what} is now {level}."),
        ),
        ReportEvent::Rejected => (
            NotificationKind::ReportRejected,
            "Report rejected".to_string(),
            format!(
                "{what} was rejected: {}",
                report.report.rejection_reason.as_deref().unwrap_or("no reason given")
            ),
        ),
    };

    NewNotification {
        kind,
        title,
        body,
        report_id: Some(report.report.id),
    }
}

// Sem duplicatas e nunca o próprio ator
fn finalize_recipients(mut ids: Vec<Uuid>, actor_id: Uuid) -> Vec<Uuid> {
    ids.retain(|id| *id != actor_id);
    ids.sort();
    ids.dedup();
    ids
}

/// Junta o que cada público resolveu; públicos que falharam voltam à parte.
fn gather_recipients(
    resolved: Vec<(Audience, Result<Vec<Uuid>, AppError>)>,
    actor_id: Uuid,
) -> (Vec<Uuid>, Vec<(Audience, AppError)>) {
    let mut ids = Vec::new();
    let mut failed = Vec::new();
    for (audience, result) in resolved {
        match result {
            Ok(found) => ids.extend(found),
            Err(e) => failed.push((audience, e)),
        }
    }
    (finalize_recipients(ids, actor_id), failed)
}

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    user_repo: UserRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, user_repo: UserRepository) -> Self {
        Self { repo, user_repo }
    }

    /// Dispara e esquece: roda depois que a mudança de estado já foi gravada.
    pub fn notify_report(&self, event: ReportEvent, report: ReportDetail, actor_id: Uuid) {
        let service = self.clone();
        tokio::spawn(async move {
            service.deliver_report(event, &report, actor_id).await;
        });
    }

    pub fn notify_message(&self, recipient_id: Uuid, sender_name: String, preview: String) {
        let service = self.clone();
        tokio::spawn(async move {
            let notification = NewNotification {
                kind: NotificationKind::NewMessage,
                title: format!("New message from {sender_name}"),
                body: preview,
                report_id: None,
            };
            if let Err(e) = service.repo.insert_many(&[recipient_id], &notification).await {
                tracing::warn!(%recipient_id, "Falha ao notificar mensagem: {}", e);
            }
        });
    }

    async fn resolve(&self, audience: Audience, report: &ReportDetail) -> Result<Vec<Uuid>, AppError> {
        match audience {
            Audience::Submitter => Ok(vec![report.report.submitted_by]),
            Audience::AreaSupervisor(id) => self.user_repo.seat_holder_ids(Assignment::AreaSupervisor(id)).await,
            Audience::ZonalSupervisor(id) => self.user_repo.seat_holder_ids(Assignment::ZonalSupervisor(id)).await,
            Audience::DistrictPastor(id) => self.user_repo.seat_holder_ids(Assignment::DistrictPastor(id)).await,
            Audience::Admins => self.user_repo.admin_ids().await,
        }
    }

    // Cada público e cada linha falham sozinhos
    async fn deliver_report(&self, event: ReportEvent, report: &ReportDetail, actor_id: Uuid) {
        let report_id = report.report.id;

        let mut resolved = Vec::new();
        for audience in audiences(event, &report.context()) {
            resolved.push((audience, self.resolve(audience, report).await));
        }
        let (recipients, failed) = gather_recipients(resolved, actor_id);
        for (audience, e) in failed {
            tracing::warn!(%report_id, ?event, ?audience, "Falha ao resolver destinatários: {}", e);
        }

        let notification = report_notification(event, report);
        match self.repo.insert_many(&recipients, &notification).await {
            Ok(sent) => {
                tracing::debug!(%report_id, sent, "Notificações de relatório enviadas");
            }
            Err(e) => {
                tracing::warn!(%report_id, ?event, "Inserção em lote falhou, tentando uma a uma: {}", e);
                for recipient_id in recipients {
                    if let Err(e) = self.repo.insert_many(&[recipient_id], &notification).await {
                        tracing::warn!(%report_id, %recipient_id, "Falha ao notificar: {}", e);
                    }
                }
            }
        }
    }

    pub async fn list(&self, user_id: Uuid, page: PageParams) -> Result<Page<Notification>, AppError> {
        let (items, total) = self.repo.list(user_id, &page).await?;
        Ok(Page::new(items, &page, total))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError> {
        self.repo.unread_count(user_id).await
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification, AppError> {
        self.repo
            .mark_read(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Notification"))
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.repo.mark_all_read(user_id).await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete(user_id, id).await? {
            return Err(AppError::NotFound("Notification"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(zoned: bool) -> CentreContext {
        CentreContext {
            centre_id: Uuid::new_v4(),
            area_id: Uuid::new_v4(),
            zone_id: zoned.then(Uuid::new_v4),
            district_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn submission_reaches_the_whole_chain() {
        let c = ctx(true);
        assert_eq!(
            audiences(ReportEvent::Submitted, &c),
            vec![
                Audience::AreaSupervisor(c.area_id),
                Audience::ZonalSupervisor(c.zone_id.unwrap()),
                Audience::DistrictPastor(c.district_id),
                Audience::Admins,
            ]
        );

        let c = ctx(false);
        assert_eq!(
            audiences(ReportEvent::Submitted, &c),
            vec![
                Audience::AreaSupervisor(c.area_id),
                Audience::DistrictPastor(c.district_id),
                Audience::Admins,
            ]
        );
    }

    #[test]
    fn area_approval_alerts_the_next_approver() {
        let zoned = ctx(true);
        let out = audiences(ReportEvent::Approved(ReportStatus::AreaApproved), &zoned);
        assert!(out.contains(&Audience::ZonalSupervisor(zoned.zone_id.unwrap())));
        assert!(!out.contains(&Audience::DistrictPastor(zoned.district_id)));

        let unzoned = ctx(false);
        let out = audiences(ReportEvent::Approved(ReportStatus::AreaApproved), &unzoned);
        assert_eq!(
            out,
            vec![
                Audience::Submitter,
                Audience::DistrictPastor(unzoned.district_id),
                Audience::Admins,
            ]
        );
    }

    #[test]
    fn final_approval_goes_to_submitter_and_admins() {
        let c = ctx(true);
        assert_eq!(
            audiences(ReportEvent::Approved(ReportStatus::DistrictApproved), &c),
            vec![Audience::Submitter, Audience::Admins]
        );
        assert_eq!(
            audiences(ReportEvent::Approved(ReportStatus::ZonalApproved), &c),
            vec![Audience::Submitter, Audience::DistrictPastor(c.district_id), Audience::Admins]
        );
    }

    #[test]
    fn rejection_reaches_submitter_and_area() {
        let c = ctx(false);
        assert_eq!(
            audiences(ReportEvent::Rejected, &c),
            vec![Audience::Submitter, Audience::AreaSupervisor(c.area_id), Audience::Admins]
        );
    }

    #[test]
    fn actor_never_notifies_themselves() {
        let actor = Uuid::new_v4();
        let other = Uuid::new_v4();
        let ids = finalize_recipients(vec![actor, other, other, actor], actor);
        assert_eq!(ids, vec![other]);
    }

    #[test]
    fn a_failed_audience_does_not_drop_the_others() {
        let actor = Uuid::new_v4();
        let submitter = Uuid::new_v4();
        let pastor = Uuid::new_v4();
        let district = Uuid::new_v4();

        let (ids, failed) = gather_recipients(
            vec![
                (Audience::Submitter, Ok(vec![submitter])),
                (Audience::Admins, Err(AppError::Conflict("pool closed".into()))),
                (Audience::DistrictPastor(district), Ok(vec![pastor, actor])),
            ],
            actor,
        );

        let mut expected = vec![submitter, pastor];
        expected.sort();
        assert_eq!(ids, expected);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, Audience::Admins);
    }
}
