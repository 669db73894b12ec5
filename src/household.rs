//! Household composition and the C3 coverage-level resolver.

use std::collections::HashMap;

use crate::config::marker::PreparedConfig;
use crate::error::CallError;
use crate::ids::{CoverageLevelId, ServiceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRole {
    Primary,
    Spouse,
    Child,
}

/// A household member plus the service utilization hypothesized for them:
/// service-id → count for the year being estimated. Absent entries are
/// zero, matching the external MPCE call's shape.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: String,
    pub role: MemberRole,
    pub services: HashMap<ServiceId, u32>,
}

impl Member {
    pub fn primary(id: impl Into<String>) -> Self {
        Member { id: id.into(), role: MemberRole::Primary, services: HashMap::new() }
    }

    pub fn spouse(id: impl Into<String>) -> Self {
        Member { id: id.into(), role: MemberRole::Spouse, services: HashMap::new() }
    }

    pub fn child(id: impl Into<String>) -> Self {
        Member { id: id.into(), role: MemberRole::Child, services: HashMap::new() }
    }

    pub fn with_services(mut self, services: HashMap<ServiceId, u32>) -> Self {
        self.services = services;
        self
    }
}

/// A household as described to the cost engine: a required primary member
/// plus an optional spouse and any number of children.
#[derive(Debug, Clone)]
pub struct Household {
    pub members: Vec<Member>,
}

impl Household {
    pub fn new(members: Vec<Member>) -> Result<Household, CallError> {
        if !members.iter().any(|m| m.role == MemberRole::Primary) {
            return Err(CallError::MissingPrimary);
        }
        Ok(Household { members })
    }

    pub fn has_spouse(&self) -> bool {
        self.members.iter().any(|m| m.role == MemberRole::Spouse)
    }

    pub fn num_children(&self) -> usize {
        self.members.iter().filter(|m| m.role == MemberRole::Child).count()
    }

    /// Household members in the canonical evaluation order: primary,
    /// then spouse (if present), then children in the order they were
    /// given.
    pub fn ordered_members(&self) -> Vec<&Member> {
        let primary = self.members.iter().find(|m| m.role == MemberRole::Primary);
        let spouse = self.members.iter().find(|m| m.role == MemberRole::Spouse);
        let children = self.members.iter().filter(|m| m.role == MemberRole::Child);
        primary.into_iter().chain(spouse).chain(children).collect()
    }
}

/// C3 — resolves a household's composition to the coverage level it falls
/// under. Levels are tried in the configuration's own order, so a config
/// that lists more specific levels before broader ones gets the specific
/// match; the first level that accommodates the household's spouse status
/// and whose `maxNumChildren` covers the child count wins.
pub fn resolve_coverage_level(cfg: &PreparedConfig, household: &Household) -> Result<CoverageLevelId, CallError> {
    let spouse = household.has_spouse();
    let children = household.num_children();
    for level_id in &cfg.coverage_level_order {
        let level = &cfg.coverage_levels[level_id];
        // A level "accommodates" a spouse if the household has none (any
        // tier, spousal or not, covers that) or the tier itself offers
        // spousal coverage. Combined with the configured levels' non-decreasing
        // ordering, a spouseless household still lands on the narrowest
        // (spouse=false) tier first whenever one exists.
        let spouse_accommodated = !spouse || level.spouse;
        if spouse_accommodated && level.max_children.covers(children) {
            return Ok(level_id.clone());
        }
    }
    Err(CallError::NoCoverageLevelForHousehold { spouse, children })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_str, prepare};

    fn prepared() -> PreparedConfig {
        let raw = load_config_str(include_str!("../tests/fixtures/minimal_config.json")).unwrap();
        prepare(raw).unwrap()
    }

    #[test]
    fn household_without_primary_is_rejected() {
        let err = Household::new(vec![Member::spouse("s1")]).unwrap_err();
        assert_eq!(err, CallError::MissingPrimary);
    }

    #[test]
    fn resolves_employee_only_for_solo_primary() {
        let cfg = prepared();
        let household = Household::new(vec![Member::primary("p1")]).unwrap();
        let level = resolve_coverage_level(&cfg, &household).unwrap();
        assert_eq!(level.as_str(), "employeeOnly");
    }

    #[test]
    fn resolves_family_for_spouse_and_children() {
        let cfg = prepared();
        let household = Household::new(vec![Member::primary("p1"), Member::spouse("s1"), Member::child("c1")]).unwrap();
        let level = resolve_coverage_level(&cfg, &household).unwrap();
        assert_eq!(level.as_str(), "family");
    }

    #[test]
    fn spouse_only_household_is_accommodated_by_family_level() {
        let cfg = prepared();
        // The fixture's spouse-bearing level ("family") has maxNumChildren
        // unlimited, so a spouse with no children resolves to it even though
        // "employeeOnly" (spouse: false) doesn't accommodate the spouse.
        let household = Household::new(vec![Member::primary("p1"), Member::spouse("s1")]).unwrap();
        let level = resolve_coverage_level(&cfg, &household).unwrap();
        assert_eq!(level.as_str(), "family");
    }

    #[test]
    fn no_match_is_reported_when_no_level_covers_the_child_count() {
        let mut cfg = prepared();
        // Cap "family"'s child allowance so a 3-child household has no level
        // left to fall into: "employeeOnly" only covers spouseless/childless
        // households, and this narrowed "family" tops out at one child.
        cfg.coverage_levels.get_mut(&CoverageLevelId::from("family")).unwrap().max_children =
            crate::config::types::MaxChildren::Finite(1);
        let household = Household::new(vec![
            Member::primary("p1"),
            Member::spouse("s1"),
            Member::child("c1"),
            Member::child("c2"),
            Member::child("c3"),
        ])
        .unwrap();
        let err = resolve_coverage_level(&cfg, &household).unwrap_err();
        assert_eq!(err, CallError::NoCoverageLevelForHousehold { spouse: true, children: 3 });
    }
}
