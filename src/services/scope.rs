// src/services/scope.rs
//
// Filtro de visibilidade: uma tabela papel -> regra de escopo, resolvida a
// cada requisição em conjuntos de ids. Listagens, resumo, exportação,
// destinatários de mensagem e usuários usam o mesmo resultado.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Assignment, UserRole},
        hierarchy::UserPath,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    Unrestricted,
    District,
    Zone,
    Area,
    Centre,
}

const SCOPE_RULES: [(UserRole, ScopeRule); 5] = [
    (UserRole::Admin, ScopeRule::Unrestricted),
    (UserRole::DistrictPastor, ScopeRule::District),
    (UserRole::ZonalSupervisor, ScopeRule::Zone),
    (UserRole::AreaSupervisor, ScopeRule::Area),
    (UserRole::CithCentre, ScopeRule::Centre),
];

pub fn scope_rule(role: UserRole) -> ScopeRule {
    SCOPE_RULES
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, rule)| *rule)
        .unwrap_or(ScopeRule::Centre)
}

/// O que o filtro precisa saber da hierarquia. Implementado pelo
/// HierarchyRepository; os testes usam uma versão em memória.
#[async_trait]
pub trait HierarchyLookup: Send + Sync {
    async fn areas_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, AppError>;
    async fn zones_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, AppError>;
    async fn areas_in_zone(&self, zone_id: Uuid) -> Result<Vec<Uuid>, AppError>;
    async fn centres_in_areas(&self, area_ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSets {
    pub districts: Vec<Uuid>,
    pub zones: Vec<Uuid>,
    pub areas: Vec<Uuid>,
    pub centres: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Unrestricted,
    Restricted(ScopeSets),
}

impl Visibility {
    pub fn sets(&self) -> Option<&ScopeSets> {
        match self {
            Visibility::Unrestricted => None,
            Visibility::Restricted(sets) => Some(sets),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Visibility::Unrestricted)
    }

    // Option<Vec<_>> vira NULL no bind, e NULL desliga o filtro no SQL
    pub fn district_filter(&self) -> Option<Vec<Uuid>> {
        self.sets().map(|s| s.districts.clone())
    }

    pub fn zone_filter(&self) -> Option<Vec<Uuid>> {
        self.sets().map(|s| s.zones.clone())
    }

    pub fn area_filter(&self) -> Option<Vec<Uuid>> {
        self.sets().map(|s| s.areas.clone())
    }

    pub fn centre_filter(&self) -> Option<Vec<Uuid>> {
        self.sets().map(|s| s.centres.clone())
    }

    pub fn can_see_district(&self, id: Uuid) -> bool {
        self.sets().is_none_or(|s| s.districts.contains(&id))
    }

    pub fn can_see_zone(&self, id: Uuid) -> bool {
        self.sets().is_none_or(|s| s.zones.contains(&id))
    }

    pub fn can_see_area(&self, id: Uuid) -> bool {
        self.sets().is_none_or(|s| s.areas.contains(&id))
    }

    pub fn can_see_centre(&self, id: Uuid) -> bool {
        self.sets().is_none_or(|s| s.centres.contains(&id))
    }
}

/// Calculado de novo a cada requisição; a hierarquia pode mudar entre duas.
pub async fn resolve_visibility<L>(lookup: &L, assignment: &Assignment) -> Result<Visibility, AppError>
where
    L: HierarchyLookup + ?Sized,
{
    let mut sets = ScopeSets::default();

    match (scope_rule(assignment.role()), *assignment) {
        (ScopeRule::Unrestricted, _) => return Ok(Visibility::Unrestricted),
        (ScopeRule::District, Assignment::DistrictPastor(district_id)) => {
            sets.districts = vec![district_id];
            sets.zones = lookup.zones_in_district(district_id).await?;
            sets.areas = lookup.areas_in_district(district_id).await?;
            sets.centres = lookup.centres_in_areas(&sets.areas).await?;
        }
        (ScopeRule::Zone, Assignment::ZonalSupervisor(zone_id)) => {
            sets.zones = vec![zone_id];
            sets.areas = lookup.areas_in_zone(zone_id).await?;
            sets.centres = lookup.centres_in_areas(&sets.areas).await?;
        }
        (ScopeRule::Area, Assignment::AreaSupervisor(area_id)) => {
            sets.areas = vec![area_id];
            sets.centres = lookup.centres_in_areas(&sets.areas).await?;
        }
        (ScopeRule::Centre, Assignment::CithCentre(centre_id)) => {
            sets.centres = vec![centre_id];
        }
        // Regra e cadeira divergentes: não vê nada
        _ => {}
    }

    Ok(Visibility::Restricted(sets))
}

// =============================================================================
//  PERMISSÃO DE MENSAGENS
// =============================================================================

/// Um usuário com papel e caminho resolvido na hierarquia.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub id: Uuid,
    pub role: UserRole,
    pub path: UserPath,
}

fn same(a: Option<Uuid>, b: Option<Uuid>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

// Elo direto supervisor -> subordinado
fn supervises(sup: &Member, sub: &Member) -> bool {
    match (sup.role, sub.role) {
        (
            UserRole::DistrictPastor,
            UserRole::ZonalSupervisor | UserRole::AreaSupervisor | UserRole::CithCentre,
        ) => same(sup.path.district_id, sub.path.district_id),
        (UserRole::ZonalSupervisor, UserRole::AreaSupervisor) => same(sup.path.zone_id, sub.path.zone_id),
        (UserRole::AreaSupervisor, UserRole::CithCentre) => same(sup.path.area_id, sub.path.area_id),
        _ => false,
    }
}

/// Admin fala com todos; os demais só com o elo adjacente. Simétrico.
pub fn can_message(sender: &Member, recipient: &Member) -> bool {
    if sender.id == recipient.id {
        return false;
    }
    if sender.role == UserRole::Admin || recipient.role == UserRole::Admin {
        return true;
    }
    supervises(sender, recipient) || supervises(recipient, sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Hierarquia em memória:
    /// D1 -> Z1 -> {A1, A2}, D1 -> A3 (sem zona), D2 -> A4
    /// A1 -> {C1, C2}, A2 -> C3, A3 -> C4, A4 -> C5
    struct MemoryHierarchy {
        d1: Uuid,
        d2: Uuid,
        z1: Uuid,
        a1: Uuid,
        a2: Uuid,
        a3: Uuid,
        a4: Uuid,
        c1: Uuid,
        c2: Uuid,
        c3: Uuid,
        c4: Uuid,
        c5: Uuid,
        area_district: HashMap<Uuid, Uuid>,
        zone_district: HashMap<Uuid, Uuid>,
        area_zone: HashMap<Uuid, Uuid>,
        centre_area: HashMap<Uuid, Uuid>,
    }

    impl MemoryHierarchy {
        fn new() -> Self {
            let id = Uuid::new_v4;
            let (d1, d2, z1) = (id(), id(), id());
            let (a1, a2, a3, a4) = (id(), id(), id(), id());
            let (c1, c2, c3, c4, c5) = (id(), id(), id(), id(), id());
            Self {
                d1,
                d2,
                z1,
                a1,
                a2,
                a3,
                a4,
                c1,
                c2,
                c3,
                c4,
                c5,
                area_district: HashMap::from([(a1, d1), (a2, d1), (a3, d1), (a4, d2)]),
                zone_district: HashMap::from([(z1, d1)]),
                area_zone: HashMap::from([(a1, z1), (a2, z1)]),
                centre_area: HashMap::from([(c1, a1), (c2, a1), (c3, a2), (c4, a3), (c5, a4)]),
            }
        }

        fn keys_for(map: &HashMap<Uuid, Uuid>, value: Uuid) -> Vec<Uuid> {
            let mut keys: Vec<Uuid> = map.iter().filter(|(_, v)| **v == value).map(|(k, _)| *k).collect();
            keys.sort();
            keys
        }
    }

    #[async_trait]
    impl HierarchyLookup for MemoryHierarchy {
        async fn areas_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, AppError> {
            Ok(Self::keys_for(&self.area_district, district_id))
        }

        async fn zones_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, AppError> {
            Ok(Self::keys_for(&self.zone_district, district_id))
        }

        async fn areas_in_zone(&self, zone_id: Uuid) -> Result<Vec<Uuid>, AppError> {
            Ok(Self::keys_for(&self.area_zone, zone_id))
        }

        async fn centres_in_areas(&self, area_ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
            let mut centres: Vec<Uuid> = self
                .centre_area
                .iter()
                .filter(|(_, a)| area_ids.contains(a))
                .map(|(c, _)| *c)
                .collect();
            centres.sort();
            Ok(centres)
        }
    }

    fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn admin_sees_everything() {
        let h = MemoryHierarchy::new();
        let v = resolve_visibility(&h, &Assignment::Admin).await.unwrap();
        assert!(v.is_unrestricted());
        assert!(v.can_see_centre(h.c5));
        assert_eq!(v.centre_filter(), None);
    }

    #[tokio::test]
    async fn area_supervisor_never_sees_other_areas() {
        let h = MemoryHierarchy::new();
        let v = resolve_visibility(&h, &Assignment::AreaSupervisor(h.a1)).await.unwrap();
        let centres = v.centre_filter().unwrap();
        assert_eq!(sorted(centres), sorted(vec![h.c1, h.c2]));
        for other in [h.c3, h.c4, h.c5] {
            assert!(!v.can_see_centre(other));
        }
    }

    #[tokio::test]
    async fn district_pastor_sees_only_own_district() {
        let h = MemoryHierarchy::new();
        let v = resolve_visibility(&h, &Assignment::DistrictPastor(h.d1)).await.unwrap();
        let sets = v.sets().unwrap();
        assert_eq!(sets.centres, sorted(vec![h.c1, h.c2, h.c3, h.c4]));
        assert_eq!(sets.areas, sorted(vec![h.a1, h.a2, h.a3]));
        assert_eq!(sets.zones, vec![h.z1]);
        assert!(!v.can_see_centre(h.c5));
        assert!(!v.can_see_district(h.d2));
    }

    #[tokio::test]
    async fn zonal_supervisor_sees_the_zone_areas() {
        let h = MemoryHierarchy::new();
        let v = resolve_visibility(&h, &Assignment::ZonalSupervisor(h.z1)).await.unwrap();
        let sets = v.sets().unwrap();
        assert_eq!(sets.areas, sorted(vec![h.a1, h.a2]));
        assert_eq!(sets.centres, sorted(vec![h.c1, h.c2, h.c3]));
        assert!(!v.can_see_area(h.a3));
        assert!(sets.districts.is_empty());
    }

    #[tokio::test]
    async fn centre_user_sees_only_own_centre() {
        let h = MemoryHierarchy::new();
        let v = resolve_visibility(&h, &Assignment::CithCentre(h.c3)).await.unwrap();
        assert_eq!(v.centre_filter(), Some(vec![h.c3]));
        assert_eq!(v.area_filter(), Some(vec![]));
    }

    #[test]
    fn every_role_has_a_rule() {
        assert_eq!(scope_rule(UserRole::Admin), ScopeRule::Unrestricted);
        assert_eq!(scope_rule(UserRole::DistrictPastor), ScopeRule::District);
        assert_eq!(scope_rule(UserRole::ZonalSupervisor), ScopeRule::Zone);
        assert_eq!(scope_rule(UserRole::AreaSupervisor), ScopeRule::Area);
        assert_eq!(scope_rule(UserRole::CithCentre), ScopeRule::Centre);
    }

    fn member(role: UserRole, district: Option<Uuid>, zone: Option<Uuid>, area: Option<Uuid>, centre: Option<Uuid>) -> Member {
        Member {
            id: Uuid::new_v4(),
            role,
            path: UserPath {
                district_id: district,
                zone_id: zone,
                area_id: area,
                centre_id: centre,
            },
        }
    }

    #[test]
    fn messaging_follows_adjacent_links() {
        let h = MemoryHierarchy::new();
        let admin = member(UserRole::Admin, None, None, None, None);
        let pastor = member(UserRole::DistrictPastor, Some(h.d1), None, None, None);
        let other_pastor = member(UserRole::DistrictPastor, Some(h.d2), None, None, None);
        let zonal = member(UserRole::ZonalSupervisor, Some(h.d1), Some(h.z1), None, None);
        let area = member(UserRole::AreaSupervisor, Some(h.d1), Some(h.z1), Some(h.a1), None);
        let other_area = member(UserRole::AreaSupervisor, Some(h.d1), None, Some(h.a3), None);
        let leader = member(UserRole::CithCentre, Some(h.d1), Some(h.z1), Some(h.a1), Some(h.c1));
        let far_leader = member(UserRole::CithCentre, Some(h.d2), None, Some(h.a4), Some(h.c5));

        // admin <-> qualquer um
        assert!(can_message(&admin, &far_leader));
        assert!(can_message(&leader, &admin));

        // centro <-> própria área, nos dois sentidos
        assert!(can_message(&leader, &area));
        assert!(can_message(&area, &leader));
        assert!(!can_message(&leader, &other_area));

        // área <-> pastor do próprio distrito
        assert!(can_message(&area, &pastor));
        assert!(can_message(&other_area, &pastor));
        assert!(!can_message(&area, &other_pastor));

        // pastor <-> centros do distrito
        assert!(can_message(&pastor, &leader));
        assert!(!can_message(&pastor, &far_leader));

        // zona <-> áreas da zona
        assert!(can_message(&zonal, &area));
        assert!(!can_message(&zonal, &other_area));
        assert!(!can_message(&zonal, &leader));

        // mesmo papel não conversa direto
        assert!(!can_message(&area, &other_area));
        assert!(!can_message(&pastor, &other_pastor));
    }

    #[test]
    fn nobody_messages_themselves() {
        let admin = member(UserRole::Admin, None, None, None, None);
        assert!(!can_message(&admin, &admin));
    }
}
