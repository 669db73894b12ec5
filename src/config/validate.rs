//! C1 — the configuration validator.
//!
//! Every check below runs independently and appends to a shared issue list
//! rather than returning on the first failure, building up a result across
//! a sequence of passes rather than short-circuiting. The caller gets the
//! whole story in one `ConfigError`, sorted and de-duplicated.

use std::collections::HashSet;

use crate::config::polymap::{has_entry_for_coverage_level, has_premium_entry};
use crate::config::types::{RawConfig, RawCoverageEntry};
use crate::error::ConfigError;
use crate::ids::{CategoryId, CombinedLimitId, CoverageLevelId, PlanId, RegionId, ServiceId, StatusId};

#[derive(Default)]
struct Issues(Vec<String>);

impl Issues {
    fn push(&mut self, msg: impl Into<String>) {
        self.0.push(msg.into());
    }
}

pub fn validate_config(cfg: &RawConfig) -> Result<(), ConfigError> {
    let mut issues = Issues::default();

    check_order_matches_keys(&mut issues, "regions", &cfg.regions_order, cfg.regions.keys());
    check_order_matches_keys(&mut issues, "plans", &cfg.plans_order, cfg.plans.keys());
    check_order_matches_keys(&mut issues, "statuses", &cfg.statuses_order, cfg.statuses.keys());
    check_order_matches_keys(&mut issues, "coverageLevels", &cfg.coverage_levels_order, cfg.coverage_levels.keys());
    check_order_matches_keys(&mut issues, "categories", &cfg.categories_order, cfg.categories.keys());
    check_order_matches_keys(&mut issues, "services", &cfg.services_order, cfg.services.keys());
    check_order_matches_keys(&mut issues, "combinedLimits", &cfg.combined_limits_order, cfg.combined_limits.keys());

    check_regions_reference_known_plans(&mut issues, cfg);
    check_categories_reference_known_services(&mut issues, cfg);
    check_services_cover_every_plan(&mut issues, cfg);
    check_coverage_sequences(&mut issues, cfg);
    check_combined_limit_references(&mut issues, cfg);
    check_limit_group_families(&mut issues, cfg);
    check_fund_configuration(&mut issues, cfg);
    check_coverage_level_costs(&mut issues, cfg);
    check_non_negative_amounts(&mut issues, cfg);
    check_coverage_rule_shapes(&mut issues, cfg);
    check_coverage_level_ordering(&mut issues, cfg);
    check_costs_object_ids(&mut issues, cfg);

    if issues.0.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::from_issues(issues.0))
    }
}

fn check_order_matches_keys<'a, K>(
    issues: &mut Issues,
    label: &str,
    order: &[K],
    keys: impl Iterator<Item = &'a K>,
) where
    K: std::hash::Hash + Eq + std::fmt::Display + Clone + 'a,
{
    let key_set: HashSet<&K> = keys.collect();
    let order_set: HashSet<&K> = order.iter().collect();

    if order.len() != order_set.len() {
        issues.push(format!("{label}Order contains duplicate entries"));
    }
    for missing in key_set.difference(&order_set) {
        issues.push(format!("{label}Order is missing {missing}"));
    }
    for extra in order_set.difference(&key_set) {
        issues.push(format!("{label}Order references unknown {label} {extra}"));
    }
}

fn check_regions_reference_known_plans(issues: &mut Issues, cfg: &RawConfig) {
    for (region_id, region) in &cfg.regions {
        for plan_id in &region.plans {
            if !cfg.plans.contains_key(plan_id) {
                issues.push(format!("region {region_id} references unknown plan {plan_id}"));
            }
        }
    }
}

fn check_categories_reference_known_services(issues: &mut Issues, cfg: &RawConfig) {
    let mut seen: std::collections::HashMap<&ServiceId, &CategoryId> = std::collections::HashMap::new();
    for (category_id, category) in &cfg.categories {
        for service_id in &category.ordered_contents {
            if !cfg.services.contains_key(service_id) {
                issues.push(format!("category {category_id} references unknown service {service_id}"));
                continue;
            }
            if let Some(other) = seen.insert(service_id, category_id) {
                if other != category_id {
                    issues.push(format!("service {service_id} appears in both category {other} and {category_id}"));
                }
            }
        }
    }
    for service_id in cfg.services.keys() {
        if !seen.contains_key(service_id) {
            issues.push(format!("service {service_id} is not assigned to any category"));
        }
    }
}

fn check_services_cover_every_plan(issues: &mut Issues, cfg: &RawConfig) {
    for (service_id, service) in &cfg.services {
        for plan_id in cfg.plans.keys() {
            if !service.coverage.contains_key(plan_id) {
                issues.push(format!("service {service_id} has no coverage entry for plan {plan_id}"));
            }
        }
        for plan_id in service.coverage.keys() {
            if !cfg.plans.contains_key(plan_id) {
                issues.push(format!("service {service_id} has a coverage entry for unknown plan {plan_id}"));
            }
        }
    }
}

fn check_coverage_sequences(issues: &mut Issues, cfg: &RawConfig) {
    for (service_id, service) in &cfg.services {
        for (plan_id, entry) in &service.coverage {
            let rules = entry.as_slice();
            if rules.is_empty() {
                issues.push(format!("service {service_id} plan {plan_id} has an empty coverage sequence"));
                continue;
            }
            if matches!(entry, RawCoverageEntry::Sequence(_)) && rules.len() > 1 {
                for rule in rules {
                    if rule.combined_limit_id.is_some() {
                        issues.push(format!(
                            "service {service_id} plan {plan_id}: combinedLimitId is not allowed on a rule inside a multi-rule coverage sequence"
                        ));
                    }
                }
                for rule in &rules[..rules.len() - 1] {
                    if rule.covered_count.is_none() && rule.dollar_limit.is_none() {
                        issues.push(format!(
                            "service {service_id} plan {plan_id}: a non-terminal rule in a coverage sequence must cap itself with coveredCount or dollarLimit"
                        ));
                    }
                }
            }
            for rule in rules {
                if let (Some(min), Some(max)) = (rule.coinsurance_min_dollar, rule.coinsurance_max_dollar) {
                    if min > max {
                        issues.push(format!(
                            "service {service_id} plan {plan_id}: coinsuranceMinDollar ({min}) exceeds coinsuranceMaxDollar ({max})"
                        ));
                    }
                }
                if let Some(rate) = rule.coinsurance {
                    if !(0.0..=1.0).contains(&rate) {
                        issues.push(format!("service {service_id} plan {plan_id}: coinsurance {rate} is outside [0, 1]"));
                    }
                }
            }
        }
    }
}

fn check_combined_limit_references(issues: &mut Issues, cfg: &RawConfig) {
    let mut referenced: HashSet<&CombinedLimitId> = HashSet::new();
    for (service_id, service) in &cfg.services {
        for (plan_id, entry) in &service.coverage {
            for rule in entry.as_slice() {
                if let Some(id) = &rule.combined_limit_id {
                    referenced.insert(id);
                    if !cfg.combined_limits.contains_key(id) {
                        issues.push(format!("service {service_id} plan {plan_id} references unknown combinedLimitId {id}"));
                    }
                }
            }
        }
    }
    for id in cfg.combined_limits.keys() {
        if !referenced.contains(id) {
            issues.push(format!("combinedLimit {id} is never referenced by any coverage rule"));
        }
    }
}

fn check_limit_group_families(issues: &mut Issues, cfg: &RawConfig) {
    let category_ids: HashSet<&CategoryId> = cfg.categories.keys().collect();

    for (plan_id, plan) in &cfg.plans {
        for (family_label, family) in [
            ("personDeductibles", &plan.person_deductibles),
            ("familyDeductibles", &plan.family_deductibles),
            ("personOutOfPocketMaximums", &plan.person_out_of_pocket_maximums),
            ("familyOutOfPocketMaximums", &plan.family_out_of_pocket_maximums),
        ] {
            let Some(groups) = family else { continue };

            let mut assigned: HashSet<&CategoryId> = HashSet::new();
            let mut has_general = false;
            for (group_id, group) in groups {
                if group_id.is_general() {
                    has_general = true;
                    if group.categories.is_some() {
                        issues.push(format!(
                            "plan {plan_id} {family_label}.{group_id}: the \"general\" group must not declare categories"
                        ));
                    }
                } else if group.categories.as_ref().map_or(true, |c| c.is_empty()) {
                    issues.push(format!(
                        "plan {plan_id} {family_label}.{group_id}: a non-general group must declare a non-empty categories subset"
                    ));
                }
                if group.amount.is_none() && group.amount_map.is_none() {
                    issues.push(format!("plan {plan_id} {family_label}.{group_id}: must set either amount or amountMap"));
                }
                if group.amount.is_some() && group.amount_map.is_some() {
                    issues.push(format!("plan {plan_id} {family_label}.{group_id}: amount and amountMap are mutually exclusive"));
                }
                if let Some(categories) = &group.categories {
                    for cat in categories {
                        if !category_ids.contains(cat) {
                            issues.push(format!("plan {plan_id} {family_label}.{group_id} references unknown category {cat}"));
                        }
                        if !assigned.insert(cat) {
                            issues.push(format!("plan {plan_id} {family_label}: category {cat} is assigned to more than one group"));
                        }
                    }
                }
            }
            if !has_general {
                issues.push(format!("plan {plan_id} {family_label}: missing required \"general\" group"));
            }
        }
    }
}

fn check_fund_configuration(issues: &mut Issues, cfg: &RawConfig) {
    let regions: HashSet<RegionId> = cfg.regions.keys().cloned().collect();
    let statuses: HashSet<StatusId> = cfg.statuses.keys().cloned().collect();
    let levels: HashSet<CoverageLevelId> = cfg.coverage_levels.keys().cloned().collect();

    for (plan_id, plan) in &cfg.plans {
        if let Some(applies_to) = &plan.categories_fund_applies_to {
            for cat in applies_to.keys() {
                if !cfg.categories.contains_key(cat) {
                    issues.push(format!("plan {plan_id} categoriesFundAppliesTo references unknown category {cat}"));
                }
            }
        }
        if plan.fund_amount_map.is_some() && plan.categories_fund_applies_to.is_none() {
            issues.push(format!("plan {plan_id} sets fundAmountMap but no categoriesFundAppliesTo"));
        }
        // A fund that pays for some category must resolve to a value for
        // every coverage level the plan can be offered at; a coverage level
        // the map never mentions is a configuration gap, not an implicit
        // zero.
        if let Some(map) = &plan.fund_amount_map {
            for level in &levels {
                if !has_entry_for_coverage_level(map, &regions, &statuses, &levels, level) {
                    issues.push(format!("plan {plan_id} fundAmountMap has no entry for coverage level {level}"));
                }
            }
        }
    }
}

/// Unlike `fundAmountMap`/deductible `amountMap`s (coverage level at the
/// leaf, checked with [`has_entry_for_coverage_level`]), a premium table
/// puts status at the leaf, so every (coverage level, status) pair needs an
/// entry, not just every coverage level.
fn check_coverage_level_costs(issues: &mut Issues, cfg: &RawConfig) {
    let regions: HashSet<RegionId> = cfg.regions.keys().cloned().collect();
    let statuses: HashSet<StatusId> = cfg.statuses.keys().cloned().collect();
    let levels: HashSet<CoverageLevelId> = cfg.coverage_levels.keys().cloned().collect();

    for plan_id in cfg.plans.keys() {
        let Some(map) = cfg.coverage_level_costs_per_plan.get(plan_id) else {
            issues.push(format!("plan {plan_id} has no entry in coverageLevelCostsPerPlan"));
            continue;
        };
        for level in &levels {
            for status in &statuses {
                if !has_premium_entry(map, &regions, level, status) {
                    issues.push(format!(
                        "plan {plan_id} coverageLevelCostsPerPlan has no premium entry for coverage level {level} status {status}"
                    ));
                }
            }
        }
    }
}

fn check_non_negative_amounts(issues: &mut Issues, cfg: &RawConfig) {
    for (service_id, service) in &cfg.services {
        for (region_id, cost) in &service.costs {
            if *cost < 0.0 {
                issues.push(format!("service {service_id} cost for region {region_id} is negative"));
            }
        }
    }
    for (plan_id, plan) in &cfg.plans {
        for family in [
            &plan.person_deductibles,
            &plan.family_deductibles,
            &plan.person_out_of_pocket_maximums,
            &plan.family_out_of_pocket_maximums,
        ] {
            let Some(groups) = family else { continue };
            for (group_id, group) in groups {
                if let Some(amount) = group.amount {
                    if amount < 0.0 {
                        issues.push(format!("plan {plan_id} group {group_id}: negative amount"));
                    }
                }
            }
        }
    }
}

/// `notCovered`/`coveredCount`+`dollarLimit`/`copay`+`dollarLimit` shape
/// constraints, checked per-rule across every service's coverage sequence
/// for every plan.
fn check_coverage_rule_shapes(issues: &mut Issues, cfg: &RawConfig) {
    for (service_id, service) in &cfg.services {
        for (plan_id, entry) in &service.coverage {
            for rule in entry.as_slice() {
                if rule.not_covered == Some(false) {
                    issues.push(format!(
                        "service {service_id} plan {plan_id}: notCovered, if present, must be true"
                    ));
                }
                if rule.covered_count.is_some() && rule.dollar_limit.is_some() {
                    issues.push(format!(
                        "service {service_id} plan {plan_id}: coveredCount and dollarLimit are mutually exclusive"
                    ));
                }
                if rule.copay.is_some() && rule.dollar_limit.is_some() {
                    issues.push(format!(
                        "service {service_id} plan {plan_id}: copay and dollarLimit are mutually exclusive"
                    ));
                }
            }
        }
    }
}

/// Ordering invariant: `coverageLevelsOrder` must be non-decreasing in
/// `(spouse, maxNumChildren)` so C3's forward scan always finds the
/// narrowest covering tier.
fn check_coverage_level_ordering(issues: &mut Issues, cfg: &RawConfig) {
    let mut prev: Option<(bool, crate::config::types::MaxChildren)> = None;
    for level_id in &cfg.coverage_levels_order {
        let Some(level) = cfg.coverage_levels.get(level_id) else { continue };
        let key = (level.spouse, level.max_num_children);
        if let Some(p) = prev {
            if key < p {
                issues.push(format!(
                    "coverageLevelsOrder is not non-decreasing in (spouse, maxNumChildren) at {level_id}"
                ));
            }
        }
        prev = Some(key);
    }
}

/// Every plan's `costsObjectId` must be `"costs"` or begin with `"costs_"`,
/// and every service must carry a cost object for every `costsObjectId`
/// any plan requires.
fn check_costs_object_ids(issues: &mut Issues, cfg: &RawConfig) {
    let mut required_ids: HashSet<&str> = HashSet::new();
    required_ids.insert("costs");

    for (plan_id, plan) in &cfg.plans {
        let id = plan.costs_object_id();
        if id != "costs" && !id.starts_with("costs_") {
            issues.push(format!(
                "plan {plan_id} costsObjectId {id:?} must be \"costs\" or begin with \"costs_\""
            ));
        }
        required_ids.insert(id);
    }

    for (service_id, service) in &cfg.services {
        for id in &required_ids {
            if service.cost_object(id).is_none() {
                issues.push(format!("service {service_id} has no cost object for costsObjectId {id:?}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_config_str;
    use crate::config::types::RawLimitGroup;
    use crate::ids::GroupId;
    use std::collections::HashMap;

    fn minimal_valid_json() -> &'static str {
        include_str!("../../tests/fixtures/minimal_config.json")
    }

    #[test]
    fn minimal_config_passes_validation() {
        let cfg = load_config_str(minimal_valid_json()).expect("parses");
        validate_config(&cfg).expect("validates");
    }

    #[test]
    fn general_group_with_categories_is_rejected() {
        let mut cfg = load_config_str(minimal_valid_json()).expect("parses");
        let plan = cfg.plans.get_mut(&PlanId::from("PPO")).unwrap();
        let groups = plan.person_deductibles.as_mut().unwrap();
        groups.get_mut(&GroupId::general()).unwrap().categories = Some(vec![CategoryId::from("outpatient")]);
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("must not declare categories")));
    }

    #[test]
    fn non_general_group_without_categories_is_rejected() {
        let mut cfg = load_config_str(minimal_valid_json()).expect("parses");
        let plan = cfg.plans.get_mut(&PlanId::from("PPO")).unwrap();
        let groups = plan.person_deductibles.as_mut().unwrap();
        groups.insert(GroupId::from("rx"), RawLimitGroup { amount: Some(50.0), amount_map: None, categories: None });
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("non-empty categories subset")));
    }

    #[test]
    fn family_missing_general_group_is_rejected_even_when_every_category_is_assigned() {
        let mut cfg = load_config_str(minimal_valid_json()).expect("parses");
        let plan = cfg.plans.get_mut(&PlanId::from("PPO")).unwrap();
        let mut groups: HashMap<GroupId, RawLimitGroup> = HashMap::new();
        groups.insert(
            GroupId::from("named"),
            RawLimitGroup { amount: Some(500.0), amount_map: None, categories: Some(vec![CategoryId::from("outpatient")]) },
        );
        plan.person_deductibles = Some(groups);
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("missing required \"general\" group")));
    }

    #[test]
    fn dangling_region_plan_reference_is_reported() {
        let mut cfg = load_config_str(minimal_valid_json()).expect("parses");
        cfg.regions
            .get_mut(&RegionId::from("CA"))
            .unwrap()
            .plans
            .push(PlanId::from("does_not_exist"));
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.issues.iter().any(|i| i.contains("does_not_exist")));
    }
}
