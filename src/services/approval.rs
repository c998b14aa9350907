// src/services/approval.rs
//
// Máquina de estados da aprovação dos relatórios semanais.
// Tudo aqui é puro: o ReportService lê o estado, planeja a transição com
// estas funções e grava com um UPDATE condicional.

use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Assignment, UserRole},
        hierarchy::CentreContext,
        report::{ReportStatus, WeeklyReport},
    },
};

/// Se a regra vale para centros cuja área está numa zona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zoning {
    Any,
    Zoned,
    Unzoned,
}

impl Zoning {
    fn matches(&self, ctx: &CentreContext) -> bool {
        match self {
            Zoning::Any => true,
            Zoning::Zoned => ctx.is_zoned(),
            Zoning::Unzoned => !ctx.is_zoned(),
        }
    }
}

/// Qual parte da hierarquia do ator precisa cobrir o centro do relatório.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Area,
    Zone,
    District,
}

impl Ownership {
    pub fn covers(&self, actor: &Assignment, ctx: &CentreContext) -> bool {
        match (self, actor) {
            (Ownership::Area, Assignment::AreaSupervisor(id)) => ctx.area_id == *id,
            (Ownership::Zone, Assignment::ZonalSupervisor(id)) => ctx.zone_id == Some(*id),
            (Ownership::District, Assignment::DistrictPastor(id)) => ctx.district_id == *id,
            _ => false,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Ownership::Area => "area",
            Ownership::Zone => "zone",
            Ownership::District => "district",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: ReportStatus,
    pub actor: UserRole,
    pub zoning: Zoning,
    pub to: ReportStatus,
    pub guard: Ownership,
}

/// (estado atual, papel, zoneamento) -> (próximo estado, guarda).
/// Rejeitar é permitido exatamente onde aprovar seria.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: ReportStatus::Pending,
        actor: UserRole::AreaSupervisor,
        zoning: Zoning::Any,
        to: ReportStatus::AreaApproved,
        guard: Ownership::Area,
    },
    TransitionRule {
        from: ReportStatus::AreaApproved,
        actor: UserRole::ZonalSupervisor,
        zoning: Zoning::Zoned,
        to: ReportStatus::ZonalApproved,
        guard: Ownership::Zone,
    },
    TransitionRule {
        from: ReportStatus::AreaApproved,
        actor: UserRole::DistrictPastor,
        zoning: Zoning::Unzoned,
        to: ReportStatus::DistrictApproved,
        guard: Ownership::District,
    },
    TransitionRule {
        from: ReportStatus::ZonalApproved,
        actor: UserRole::DistrictPastor,
        zoning: Zoning::Zoned,
        to: ReportStatus::DistrictApproved,
        guard: Ownership::District,
    },
];

/// A guarda de hierarquia de cada papel aprovador.
pub fn role_guard(role: UserRole) -> Option<Ownership> {
    TRANSITIONS.iter().find(|r| r.actor == role).map(|r| r.guard)
}

pub fn find_rule(
    status: ReportStatus,
    role: UserRole,
    ctx: &CentreContext,
) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|r| r.from == status && r.actor == role && r.zoning.matches(ctx))
}

/// Os níveis que este relatório precisa atravessar, em ordem.
pub fn required_levels(ctx: &CentreContext) -> Vec<ReportStatus> {
    let mut levels = vec![ReportStatus::AreaApproved];
    if ctx.is_zoned() {
        levels.push(ReportStatus::ZonalApproved);
    }
    levels.push(ReportStatus::DistrictApproved);
    levels
}

/// Uma mudança de estado já validada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ReportStatus,
    pub to: ReportStatus,
    /// Níveis a carimbar com o ator (vazio numa rejeição)
    pub stamps: Vec<ReportStatus>,
}

fn check_guard(actor: &Assignment, ctx: &CentreContext) -> Result<(), AppError> {
    let guard = role_guard(actor.role()).ok_or_else(|| {
        AppError::forbidden(format!("Role {} cannot act on report approvals", actor.role()))
    })?;
    if !guard.covers(actor, ctx) {
        return Err(AppError::forbidden(format!(
            "This report belongs to a centre outside your {}",
            guard.label()
        )));
    }
    Ok(())
}

pub fn plan_approval(
    status: ReportStatus,
    actor: &Assignment,
    ctx: &CentreContext,
    target: Option<ReportStatus>,
) -> Result<Transition, AppError> {
    if *actor == Assignment::Admin {
        return plan_admin_approval(status, ctx, target);
    }

    check_guard(actor, ctx)?;

    let rule = find_rule(status, actor.role(), ctx).ok_or(AppError::InvalidTransition {
        from: status,
        action: "approve",
    })?;

    if target.is_some_and(|t| t != rule.to) {
        return Err(AppError::forbidden("Only admins can choose the approval level"));
    }

    Ok(Transition {
        from: status,
        to: rule.to,
        stamps: vec![rule.to],
    })
}

// Admin força qualquer avanço; os níveis pulados ficam carimbados com ele
fn plan_admin_approval(
    status: ReportStatus,
    ctx: &CentreContext,
    target: Option<ReportStatus>,
) -> Result<Transition, AppError> {
    let levels = required_levels(ctx);
    let invalid = AppError::InvalidTransition {
        from: status,
        action: "approve",
    };

    let target = match target {
        Some(t) => t,
        None => match levels.iter().find(|l| l.rank() > status.rank()) {
            Some(next) => *next,
            None => return Err(invalid),
        },
    };

    if !levels.contains(&target) || target.rank() <= status.rank() {
        return Err(invalid);
    }

    let stamps = levels
        .into_iter()
        .filter(|l| l.rank() > status.rank() && l.rank() <= target.rank())
        .collect();

    Ok(Transition {
        from: status,
        to: target,
        stamps,
    })
}

pub fn plan_rejection(
    status: ReportStatus,
    actor: &Assignment,
    ctx: &CentreContext,
) -> Result<Transition, AppError> {
    let invalid = AppError::InvalidTransition {
        from: status,
        action: "reject",
    };

    if *actor == Assignment::Admin {
        if status == ReportStatus::Rejected {
            return Err(invalid);
        }
    } else {
        check_guard(actor, ctx)?;
        find_rule(status, actor.role(), ctx).ok_or(invalid)?;
    }

    Ok(Transition {
        from: status,
        to: ReportStatus::Rejected,
        stamps: Vec::new(),
    })
}

/// Se o ator é quem deve agir agora (fila de pendências).
pub fn can_act(status: ReportStatus, actor: &Assignment, ctx: &CentreContext) -> bool {
    match actor {
        Assignment::Admin => status != ReportStatus::DistrictApproved && status != ReportStatus::Rejected,
        _ => find_rule(status, actor.role(), ctx).is_some_and(|r| r.guard.covers(actor, ctx)),
    }
}

/// Estados a partir dos quais um papel pode aprovar (para filtrar no banco).
pub fn actionable_statuses(role: UserRole) -> Vec<ReportStatus> {
    if role == UserRole::Admin {
        return vec![
            ReportStatus::Pending,
            ReportStatus::AreaApproved,
            ReportStatus::ZonalApproved,
        ];
    }
    let mut statuses: Vec<ReportStatus> = TRANSITIONS
        .iter()
        .filter(|r| r.actor == role)
        .map(|r| r.from)
        .collect();
    statuses.dedup();
    statuses
}

// =============================================================================
//  EDIÇÃO ABRANGENTE DO ADMIN (fora da tabela de transições)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionChange {
    Keep,
    Clear,
    Set(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminEditPlan {
    pub status: ReportStatus,
    /// Níveis carimbados com o admin agora
    pub stamp: Vec<ReportStatus>,
    /// Níveis cujos carimbos são apagados
    pub clear: Vec<ReportStatus>,
    pub rejection: RejectionChange,
}

pub const ALL_LEVELS: [ReportStatus; 3] = [
    ReportStatus::AreaApproved,
    ReportStatus::ZonalApproved,
    ReportStatus::DistrictApproved,
];

pub fn plan_admin_edit(
    report: &WeeklyReport,
    ctx: &CentreContext,
    target: Option<ReportStatus>,
    reset_approvals: bool,
    rejection_reason: Option<&str>,
) -> Result<AdminEditPlan, AppError> {
    let target = target.unwrap_or(report.status);
    let levels = required_levels(ctx);

    // Sem zona o nível zonal não existe no fluxo
    if target == ReportStatus::ZonalApproved && !ctx.is_zoned() {
        return Err(AppError::InvalidTransition {
            from: report.status,
            action: "zonally approve",
        });
    }

    let stamped = |level: ReportStatus| -> Option<Uuid> {
        if reset_approvals {
            return None;
        }
        report
            .approval_stamps()
            .into_iter()
            .find(|(l, _)| *l == level)
            .and_then(|(_, by)| by)
    };

    let mut stamp = Vec::new();
    let mut clear = Vec::new();

    let rejection = match target {
        ReportStatus::Pending => {
            clear.extend(ALL_LEVELS);
            RejectionChange::Clear
        }
        ReportStatus::Rejected => {
            if reset_approvals {
                clear.extend(ALL_LEVELS);
            }
            match rejection_reason.map(str::trim).filter(|r| !r.is_empty()) {
                Some(reason) => RejectionChange::Set(reason.to_string()),
                None if report.status == ReportStatus::Rejected => RejectionChange::Keep,
                None => {
                    return Err(AppError::bad_request("A rejection reason is required"));
                }
            }
        }
        approved => {
            for level in ALL_LEVELS {
                let needed = levels.contains(&level) && level.rank() <= approved.rank();
                if !needed {
                    clear.push(level);
                } else if stamped(level).is_none() {
                    stamp.push(level);
                }
            }
            RejectionChange::Clear
        }
    };

    Ok(AdminEditPlan {
        status: target,
        stamp,
        clear,
        rejection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::models::report::{EventType, MeetingMode, ReportData};

    struct Tree {
        district: Uuid,
        zone: Uuid,
        area: Uuid,
        other_area: Uuid,
        centre: Uuid,
    }

    impl Tree {
        fn new() -> Self {
            Self {
                district: Uuid::new_v4(),
                zone: Uuid::new_v4(),
                area: Uuid::new_v4(),
                other_area: Uuid::new_v4(),
                centre: Uuid::new_v4(),
            }
        }

        fn unzoned(&self) -> CentreContext {
            CentreContext {
                centre_id: self.centre,
                area_id: self.area,
                zone_id: None,
                district_id: self.district,
            }
        }

        fn zoned(&self) -> CentreContext {
            CentreContext {
                zone_id: Some(self.zone),
                ..self.unzoned()
            }
        }
    }

    fn report(status: ReportStatus) -> WeeklyReport {
        let now = Utc::now();
        WeeklyReport {
            id: Uuid::new_v4(),
            cith_centre_id: Uuid::new_v4(),
            week: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            event_type: EventType::RegularService,
            data: ReportData {
                male: 10,
                female: 12,
                children: 3,
                offerings: Decimal::new(5000, 0),
                testimonies: None,
                number_of_first_timers: 0,
                first_timers_followed_up: 0,
                first_timers_converted_to_cith: 0,
                meeting_mode: MeetingMode::InPerson,
                remarks: None,
            },
            total_attendance: 25,
            status,
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
        }
    }

    fn is_invalid_transition(err: &AppError) -> bool {
        matches!(err, AppError::InvalidTransition { .. })
    }

    #[test]
    fn area_supervisor_approves_pending_in_own_area() {
        let t = Tree::new();
        let plan = plan_approval(
            ReportStatus::Pending,
            &Assignment::AreaSupervisor(t.area),
            &t.unzoned(),
            None,
        )
        .unwrap();
        assert_eq!(plan.to, ReportStatus::AreaApproved);
        assert_eq!(plan.stamps, vec![ReportStatus::AreaApproved]);
    }

    #[test]
    fn approving_twice_at_same_level_is_invalid() {
        let t = Tree::new();
        let err = plan_approval(
            ReportStatus::AreaApproved,
            &Assignment::AreaSupervisor(t.area),
            &t.unzoned(),
            None,
        )
        .unwrap_err();
        assert!(is_invalid_transition(&err));
    }

    #[test]
    fn area_supervisor_of_another_area_is_forbidden() {
        let t = Tree::new();
        let err = plan_approval(
            ReportStatus::Pending,
            &Assignment::AreaSupervisor(t.other_area),
            &t.unzoned(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn centre_users_cannot_approve() {
        let t = Tree::new();
        let err = plan_approval(
            ReportStatus::Pending,
            &Assignment::CithCentre(t.centre),
            &t.unzoned(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn unzoned_reports_go_straight_to_the_district() {
        let t = Tree::new();
        let pastor = Assignment::DistrictPastor(t.district);
        let plan = plan_approval(ReportStatus::AreaApproved, &pastor, &t.unzoned(), None).unwrap();
        assert_eq!(plan.to, ReportStatus::DistrictApproved);

        // zonal não existe para centros fora de zona
        let err = plan_approval(
            ReportStatus::AreaApproved,
            &Assignment::ZonalSupervisor(t.zone),
            &t.unzoned(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn zoned_reports_cannot_skip_the_zonal_step() {
        let t = Tree::new();
        let pastor = Assignment::DistrictPastor(t.district);
        let err = plan_approval(ReportStatus::AreaApproved, &pastor, &t.zoned(), None).unwrap_err();
        assert!(is_invalid_transition(&err));

        let zonal = Assignment::ZonalSupervisor(t.zone);
        let plan = plan_approval(ReportStatus::AreaApproved, &zonal, &t.zoned(), None).unwrap();
        assert_eq!(plan.to, ReportStatus::ZonalApproved);

        let plan = plan_approval(ReportStatus::ZonalApproved, &pastor, &t.zoned(), None).unwrap();
        assert_eq!(plan.to, ReportStatus::DistrictApproved);
    }

    #[test]
    fn pastor_of_another_district_is_forbidden() {
        let t = Tree::new();
        let err = plan_approval(
            ReportStatus::AreaApproved,
            &Assignment::DistrictPastor(Uuid::new_v4()),
            &t.unzoned(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn district_approved_is_terminal_for_everyone_but_admin_reject() {
        let t = Tree::new();
        for actor in [
            Assignment::AreaSupervisor(t.area),
            Assignment::ZonalSupervisor(t.zone),
            Assignment::DistrictPastor(t.district),
            Assignment::Admin,
        ] {
            assert!(plan_approval(ReportStatus::DistrictApproved, &actor, &t.zoned(), None).is_err());
        }
        assert!(plan_rejection(ReportStatus::DistrictApproved, &Assignment::Admin, &t.zoned()).is_ok());
    }

    #[test]
    fn non_admins_cannot_pick_a_target() {
        let t = Tree::new();
        let err = plan_approval(
            ReportStatus::Pending,
            &Assignment::AreaSupervisor(t.area),
            &t.unzoned(),
            Some(ReportStatus::DistrictApproved),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn admin_defaults_to_the_next_level() {
        let t = Tree::new();
        let plan = plan_approval(ReportStatus::AreaApproved, &Assignment::Admin, &t.zoned(), None).unwrap();
        assert_eq!(plan.to, ReportStatus::ZonalApproved);

        let plan = plan_approval(ReportStatus::AreaApproved, &Assignment::Admin, &t.unzoned(), None).unwrap();
        assert_eq!(plan.to, ReportStatus::DistrictApproved);
    }

    #[test]
    fn admin_jump_stamps_every_skipped_level() {
        let t = Tree::new();
        let plan = plan_approval(
            ReportStatus::Pending,
            &Assignment::Admin,
            &t.zoned(),
            Some(ReportStatus::DistrictApproved),
        )
        .unwrap();
        assert_eq!(
            plan.stamps,
            vec![
                ReportStatus::AreaApproved,
                ReportStatus::ZonalApproved,
                ReportStatus::DistrictApproved
            ]
        );

        let plan = plan_approval(
            ReportStatus::Rejected,
            &Assignment::Admin,
            &t.unzoned(),
            Some(ReportStatus::DistrictApproved),
        )
        .unwrap();
        assert_eq!(
            plan.stamps,
            vec![ReportStatus::AreaApproved, ReportStatus::DistrictApproved]
        );
    }

    #[test]
    fn admin_cannot_move_backwards_or_into_a_missing_zone() {
        let t = Tree::new();
        let err = plan_approval(
            ReportStatus::ZonalApproved,
            &Assignment::Admin,
            &t.zoned(),
            Some(ReportStatus::AreaApproved),
        )
        .unwrap_err();
        assert!(is_invalid_transition(&err));

        let err = plan_approval(
            ReportStatus::Pending,
            &Assignment::Admin,
            &t.unzoned(),
            Some(ReportStatus::ZonalApproved),
        )
        .unwrap_err();
        assert!(is_invalid_transition(&err));

        let err = plan_approval(
            ReportStatus::Pending,
            &Assignment::Admin,
            &t.unzoned(),
            Some(ReportStatus::Rejected),
        )
        .unwrap_err();
        assert!(is_invalid_transition(&err));
    }

    #[test]
    fn whoever_can_approve_can_reject() {
        let t = Tree::new();
        let ctx = t.zoned();
        for rule in TRANSITIONS.iter().filter(|r| r.zoning != Zoning::Unzoned) {
            let actor = match rule.actor {
                UserRole::AreaSupervisor => Assignment::AreaSupervisor(t.area),
                UserRole::ZonalSupervisor => Assignment::ZonalSupervisor(t.zone),
                UserRole::DistrictPastor => Assignment::DistrictPastor(t.district),
                _ => unreachable!(),
            };
            let plan = plan_rejection(rule.from, &actor, &ctx).unwrap();
            assert_eq!(plan.to, ReportStatus::Rejected);
            assert!(plan.stamps.is_empty());
        }
    }

    #[test]
    fn rejection_outside_the_actors_step_is_invalid() {
        let t = Tree::new();
        let err = plan_rejection(
            ReportStatus::AreaApproved,
            &Assignment::AreaSupervisor(t.area),
            &t.unzoned(),
        )
        .unwrap_err();
        assert!(is_invalid_transition(&err));

        let err = plan_rejection(ReportStatus::Rejected, &Assignment::Admin, &t.unzoned()).unwrap_err();
        assert!(is_invalid_transition(&err));
    }

    #[test]
    fn pending_queue_matches_the_table() {
        let t = Tree::new();
        assert!(can_act(ReportStatus::Pending, &Assignment::AreaSupervisor(t.area), &t.zoned()));
        assert!(!can_act(ReportStatus::Pending, &Assignment::AreaSupervisor(t.other_area), &t.zoned()));
        assert!(can_act(ReportStatus::AreaApproved, &Assignment::ZonalSupervisor(t.zone), &t.zoned()));
        assert!(!can_act(ReportStatus::AreaApproved, &Assignment::DistrictPastor(t.district), &t.zoned()));
        assert!(can_act(ReportStatus::AreaApproved, &Assignment::DistrictPastor(t.district), &t.unzoned()));

        assert_eq!(
            actionable_statuses(UserRole::DistrictPastor),
            vec![ReportStatus::AreaApproved, ReportStatus::ZonalApproved]
        );
        assert!(actionable_statuses(UserRole::CithCentre).is_empty());
    }

    #[test]
    fn admin_edit_to_pending_clears_everything() {
        let t = Tree::new();
        let mut r = report(ReportStatus::DistrictApproved);
        r.area_approved_by = Some(Uuid::new_v4());
        r.district_approved_by = Some(Uuid::new_v4());

        let plan = plan_admin_edit(&r, &t.unzoned(), Some(ReportStatus::Pending), false, None).unwrap();
        assert_eq!(plan.status, ReportStatus::Pending);
        assert!(plan.stamp.is_empty());
        assert_eq!(plan.clear, ALL_LEVELS.to_vec());
        assert_eq!(plan.rejection, RejectionChange::Clear);
    }

    #[test]
    fn admin_edit_keeps_existing_stamps_unless_reset() {
        let t = Tree::new();
        let mut r = report(ReportStatus::AreaApproved);
        r.area_approved_by = Some(Uuid::new_v4());

        let plan = plan_admin_edit(&r, &t.zoned(), Some(ReportStatus::DistrictApproved), false, None).unwrap();
        assert_eq!(
            plan.stamp,
            vec![ReportStatus::ZonalApproved, ReportStatus::DistrictApproved]
        );
        assert!(plan.clear.is_empty());

        let plan = plan_admin_edit(&r, &t.zoned(), Some(ReportStatus::DistrictApproved), true, None).unwrap();
        assert_eq!(plan.stamp, ALL_LEVELS.to_vec());
    }

    #[test]
    fn admin_edit_down_to_area_level_clears_higher_stamps() {
        let t = Tree::new();
        let mut r = report(ReportStatus::DistrictApproved);
        r.area_approved_by = Some(Uuid::new_v4());
        r.district_approved_by = Some(Uuid::new_v4());

        let plan = plan_admin_edit(&r, &t.unzoned(), Some(ReportStatus::AreaApproved), false, None).unwrap();
        assert!(plan.stamp.is_empty());
        assert_eq!(
            plan.clear,
            vec![ReportStatus::ZonalApproved, ReportStatus::DistrictApproved]
        );
    }

    #[test]
    fn admin_edit_rejection_needs_a_reason() {
        let t = Tree::new();
        let r = report(ReportStatus::Pending);
        assert!(plan_admin_edit(&r, &t.unzoned(), Some(ReportStatus::Rejected), false, Some("  ")).is_err());

        let plan = plan_admin_edit(&r, &t.unzoned(), Some(ReportStatus::Rejected), false, Some(" wrong totals ")).unwrap();
        assert_eq!(plan.rejection, RejectionChange::Set("wrong totals".into()));

        // já rejeitado: mantém o motivo anterior
        let r = report(ReportStatus::Rejected);
        let plan = plan_admin_edit(&r, &t.unzoned(), None, false, None).unwrap();
        assert_eq!(plan.rejection, RejectionChange::Keep);
    }

    #[test]
    fn admin_edit_to_zonal_level_without_zone_is_an_invalid_transition() {
        let t = Tree::new();
        let r = report(ReportStatus::Pending);
        for status in [ReportStatus::Pending, ReportStatus::AreaApproved] {
            let r = report(status);
            let err = plan_admin_edit(&r, &t.unzoned(), Some(ReportStatus::ZonalApproved), false, None)
                .unwrap_err();
            assert!(is_invalid_transition(&err), "{err:?}");
        }
        assert!(plan_admin_edit(&r, &t.zoned(), Some(ReportStatus::ZonalApproved), false, None).is_ok());
    }
}
