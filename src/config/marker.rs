//! C2 — the one-shot config marker.
//!
//! `prepare()` validates a `RawConfig` and then derives a `PreparedConfig`:
//! an immutable value with the category→group assignments resolved, costs
//! converted to whole cents, and coverage sequences normalized to `Vec`s.
//! This is the only type the resolver, plan evaluator, and FSAE estimator
//! ever see — there is no process-wide cache behind it, `prepare` is an
//! ordinary constructor that callers run once and then share via `Arc`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::config::polymap::resolve_amount;
use crate::config::types::{
    Description, RawAccountType, RawConfig, RawCoverageRule, RawDeductibleTiming, RawFicaConfig, RawFilingStatus, RawPlan,
};
use crate::config::validate::validate_config;
use crate::error::ConfigError;
use crate::ids::{AccountTypeId, CategoryId, CombinedLimitId, CoverageLevelId, GroupId, PlanId, RegionId, ServiceId, StatusId};
use crate::money::Cents;

/// `"afterCopay"` and `"beforeCoinsurance"` are synonyms in the source
/// format — both land on [`DeductibleTiming::AfterCopay`] here, so the rest
/// of the engine only ever has to match three cases, not four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductibleTiming {
    NoDeductible,
    BeforeCopay,
    AfterCopay,
}

impl From<RawDeductibleTiming> for DeductibleTiming {
    fn from(raw: RawDeductibleTiming) -> Self {
        match raw {
            RawDeductibleTiming::NoDeductible => DeductibleTiming::NoDeductible,
            RawDeductibleTiming::BeforeCopay => DeductibleTiming::BeforeCopay,
            RawDeductibleTiming::AfterCopay | RawDeductibleTiming::BeforeCoinsurance => DeductibleTiming::AfterCopay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedCoverageRule {
    pub not_covered: bool,
    pub copay: Option<Cents>,
    pub coinsurance: Option<f64>,
    pub coinsurance_min_dollar: Option<Cents>,
    pub coinsurance_max_dollar: Option<Cents>,
    pub coinsurance_towards_oop_max: bool,
    pub copay_towards_oop_max: bool,
    pub deductible: DeductibleTiming,
    pub covered_count: Option<u32>,
    pub dollar_limit: Option<Cents>,
    pub single_use_cost_max: Option<Cents>,
    pub combined_limit_id: Option<CombinedLimitId>,
    /// Resolved from the rule's own explicit `eligibleForFund` if set,
    /// else `plan.categoriesFundAppliesTo[service.categoryId]`. Resolution
    /// needs both the plan and the service's category, so it happens in
    /// [`prepare`] rather than in this `From` impl.
    pub eligible_for_fund: bool,
}

impl PreparedCoverageRule {
    fn from_raw(raw: &RawCoverageRule, category_default: bool) -> Self {
        PreparedCoverageRule {
            not_covered: raw.not_covered.unwrap_or(false),
            copay: raw.copay.map(Cents::from_dollars),
            coinsurance: raw.coinsurance,
            coinsurance_min_dollar: raw.coinsurance_min_dollar.map(Cents::from_dollars),
            coinsurance_max_dollar: raw.coinsurance_max_dollar.map(Cents::from_dollars),
            coinsurance_towards_oop_max: !raw.coinsurance_not_towards_oop_max.unwrap_or(false),
            copay_towards_oop_max: !raw.copay_not_towards_oop_max.unwrap_or(false),
            // Unspecified `deductible` defaults to `"afterCopay"` per the
            // configuration format, not to no deductible at all.
            deductible: raw.deductible.map(DeductibleTiming::from).unwrap_or(DeductibleTiming::AfterCopay),
            covered_count: raw.covered_count,
            dollar_limit: raw.dollar_limit.map(|d| Cents::from_dollars(d as f64)),
            single_use_cost_max: raw.single_use_cost_max.map(Cents::from_dollars),
            combined_limit_id: raw.combined_limit_id.clone(),
            eligible_for_fund: raw.eligible_for_fund.unwrap_or(category_default),
        }
    }
}

#[cfg(test)]
impl From<&RawCoverageRule> for PreparedCoverageRule {
    /// Test-only convenience: builds a rule with no plan/category context,
    /// so `eligibleForFund` falls back to `false` unless set explicitly.
    fn from(raw: &RawCoverageRule) -> Self {
        PreparedCoverageRule::from_raw(raw, false)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedService {
    pub description: String,
    /// costsObjectId ("costs" or a "costs_*" variant) → region → price.
    pub costs: HashMap<String, HashMap<RegionId, Cents>>,
    /// Normalized coverage: always a non-empty sequence, even for services
    /// whose raw entry was a single rule.
    pub coverage: HashMap<PlanId, Vec<PreparedCoverageRule>>,
}

impl PreparedService {
    pub fn cost(&self, costs_object_id: &str, region: &RegionId) -> Option<Cents> {
        self.costs.get(costs_object_id).and_then(|m| m.get(region)).copied()
    }
}

#[derive(Debug, Clone)]
pub struct PreparedLimitGroup {
    pub amount: Option<Cents>,
    pub amount_map: Option<Value>,
}

impl PreparedLimitGroup {
    /// Resolves this group's limit for a household's region/status/coverage
    /// level. A group with neither `amount` nor a matching `amountMap` entry
    /// resolves to zero, which in practice only happens for a misconfigured
    /// plan the validator should already have flagged.
    pub fn amount_for(
        &self,
        regions: &HashSet<RegionId>,
        statuses: &HashSet<StatusId>,
        levels: &HashSet<CoverageLevelId>,
        region: &RegionId,
        status: &StatusId,
        level: &CoverageLevelId,
    ) -> Cents {
        if let Some(amount) = self.amount {
            return amount;
        }
        if let Some(map) = &self.amount_map {
            if let Some(dollars) = resolve_amount(map, regions, statuses, levels, region, status, level) {
                return Cents::from_dollars(dollars);
            }
        }
        Cents::ZERO
    }
}

#[derive(Debug, Clone)]
pub struct PreparedCombinedLimit {
    pub description: String,
    pub person_reimburse_limit: Option<Cents>,
    pub family_reimburse_limit: Option<Cents>,
}

/// One of the plan's four limit-group families: a `general` catch-all plus
/// any explicitly carved-out groups, and the category→group assignment
/// derived from each group's `categories` list.
#[derive(Debug, Clone)]
pub struct LimitGroupFamily {
    pub groups: HashMap<GroupId, PreparedLimitGroup>,
    pub category_group: HashMap<CategoryId, GroupId>,
}

impl LimitGroupFamily {
    fn build(raw: &HashMap<GroupId, crate::config::types::RawLimitGroup>, all_categories: &[CategoryId]) -> Self {
        let mut groups = HashMap::new();
        let mut category_group = HashMap::new();

        for (group_id, raw_group) in raw {
            groups.insert(
                group_id.clone(),
                PreparedLimitGroup {
                    amount: raw_group.amount.map(Cents::from_dollars),
                    amount_map: raw_group.amount_map.clone(),
                },
            );
            if let Some(categories) = &raw_group.categories {
                for cat in categories {
                    category_group.insert(cat.clone(), group_id.clone());
                }
            }
        }

        for cat in all_categories {
            category_group.entry(cat.clone()).or_insert_with(GroupId::general);
        }

        LimitGroupFamily { groups, category_group }
    }

    /// The group a category falls into, or `None` if this family was never
    /// configured on the plan at all (the category contributes nothing to
    /// it — e.g. a plan with no `familyOutOfPocketMaximums` simply has no
    /// family-level OOP tracking).
    pub fn group_for(&self, category: &CategoryId) -> Option<&PreparedLimitGroup> {
        let group_id = self.category_group.get(category)?;
        self.groups.get(group_id)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedPlan {
    pub description: String,
    pub person_deductibles: LimitGroupFamily,
    pub family_deductibles: LimitGroupFamily,
    pub person_oop: LimitGroupFamily,
    pub family_oop: LimitGroupFamily,
    pub fund_amount_map: Option<Value>,
    pub categories_fund_applies_to: HashSet<CategoryId>,
    pub fund_allows_contributions: bool,
    pub coverage_level_costs: Value,
    pub costs_object_id: String,
    /// Service ids (plan-filtered, preserving the configuration's overall
    /// service order) whose coverage sequence under this plan has a
    /// deductible somewhere in it.
    pub with_deductible_services: Vec<ServiceId>,
    /// The complement of `with_deductible_services`. Evaluated after it —
    /// see the plan evaluator's two-pass ordering.
    pub no_deductible_services: Vec<ServiceId>,
}

#[derive(Debug, Clone)]
pub struct PreparedCoverageLevel {
    pub description: String,
    pub spouse: bool,
    pub max_children: crate::config::types::MaxChildren,
}

/// The validated, normalized configuration. Cheap to clone (wrap in `Arc`
/// for fan-out across worker threads) and safe to share across calls — all
/// the work that must happen exactly once already has, in `prepare()`.
#[derive(Debug, Clone)]
pub struct PreparedConfig {
    pub regions: HashMap<RegionId, HashSet<PlanId>>,
    pub statuses: HashSet<StatusId>,
    pub coverage_levels: HashMap<CoverageLevelId, PreparedCoverageLevel>,
    pub coverage_level_order: Vec<CoverageLevelId>,
    pub category_services: HashMap<CategoryId, Vec<ServiceId>>,
    pub service_category: HashMap<ServiceId, CategoryId>,
    pub services_order: Vec<ServiceId>,
    pub services: HashMap<ServiceId, PreparedService>,
    pub combined_limits: HashMap<CombinedLimitId, PreparedCombinedLimit>,
    pub plans_order: Vec<PlanId>,
    pub plans: HashMap<PlanId, PreparedPlan>,
    pub account_types: HashMap<AccountTypeId, RawAccountType>,
    pub account_types_order: Vec<AccountTypeId>,
    pub filing_statuses: HashMap<String, RawFilingStatus>,
    pub fica: RawFicaConfig,
}

impl PreparedConfig {
    pub fn region_set(&self) -> HashSet<RegionId> {
        self.regions.keys().cloned().collect()
    }

    pub fn coverage_level_set(&self) -> HashSet<CoverageLevelId> {
        self.coverage_levels.keys().cloned().collect()
    }
}

pub fn prepare(cfg: RawConfig) -> Result<PreparedConfig, ConfigError> {
    validate_config(&cfg)?;

    let mut service_category = HashMap::new();
    let mut category_services = HashMap::new();
    for category_id in &cfg.categories_order {
        let category = &cfg.categories[category_id];
        category_services.insert(category_id.clone(), category.ordered_contents.clone());
        for service_id in &category.ordered_contents {
            service_category.insert(service_id.clone(), category_id.clone());
        }
    }

    let combined_limits = cfg
        .combined_limits
        .iter()
        .map(|(id, raw)| {
            (
                id.clone(),
                PreparedCombinedLimit {
                    description: raw.description.clone(),
                    person_reimburse_limit: raw.person_reimburse_limit.map(Cents::from_dollars),
                    family_reimburse_limit: raw.family_reimburse_limit.map(Cents::from_dollars),
                },
            )
        })
        .collect();

    let all_categories: Vec<CategoryId> = cfg.categories_order.clone();

    // Plans must be prepared before services: a rule's `eligibleForFund`
    // default comes from its plan's `categoriesFundAppliesTo`, so each
    // service's per-plan coverage needs the plan already resolved.
    let mut plans = HashMap::new();
    for (plan_id, raw_plan) in &cfg.plans {
        plans.insert(plan_id.clone(), prepare_plan(plan_id, raw_plan, &all_categories, &cfg));
    }

    let mut services = HashMap::new();
    for (service_id, raw_service) in &cfg.services {
        let mut costs: HashMap<String, HashMap<RegionId, Cents>> = HashMap::new();
        costs.insert(
            "costs".to_string(),
            raw_service.costs.iter().map(|(r, c)| (r.clone(), Cents::from_dollars(*c))).collect(),
        );
        for (object_id, by_region) in &raw_service.custom_costs {
            costs.insert(object_id.clone(), by_region.iter().map(|(r, c)| (r.clone(), Cents::from_dollars(*c))).collect());
        }
        let category = service_category.get(service_id);
        let coverage = raw_service
            .coverage
            .iter()
            .map(|(plan_id, entry)| {
                let category_default = category
                    .map(|cat| plans.get(plan_id).is_some_and(|p| p.categories_fund_applies_to.contains(cat)))
                    .unwrap_or(false);
                let rules = entry.as_slice().iter().map(|r| PreparedCoverageRule::from_raw(r, category_default)).collect();
                (plan_id.clone(), rules)
            })
            .collect();
        services.insert(
            service_id.clone(),
            PreparedService { description: raw_service.description.clone(), costs, coverage },
        );
    }

    let coverage_levels = cfg
        .coverage_levels
        .iter()
        .map(|(id, raw)| {
            (
                id.clone(),
                PreparedCoverageLevel {
                    description: raw.description.clone(),
                    spouse: raw.spouse,
                    max_children: raw.max_num_children,
                },
            )
        })
        .collect();

    let regions = cfg
        .regions
        .iter()
        .map(|(id, region)| (id.clone(), region.plans.iter().cloned().collect()))
        .collect();

    Ok(PreparedConfig {
        regions,
        statuses: cfg.statuses.keys().cloned().collect(),
        coverage_levels,
        coverage_level_order: cfg.coverage_levels_order.clone(),
        category_services,
        service_category,
        services_order: cfg.services_order.clone(),
        services,
        combined_limits,
        plans_order: cfg.plans_order.clone(),
        plans,
        account_types: cfg.account_types.clone(),
        account_types_order: cfg.account_types_order.clone(),
        filing_statuses: cfg.filing_statuses.clone(),
        fica: cfg.fica,
    })
}

fn prepare_plan(plan_id: &PlanId, raw: &RawPlan, all_categories: &[CategoryId], cfg: &RawConfig) -> PreparedPlan {
    let empty = HashMap::new();
    let person_deductibles = LimitGroupFamily::build(raw.person_deductibles.as_ref().unwrap_or(&empty), all_categories);
    let family_deductibles = LimitGroupFamily::build(raw.family_deductibles.as_ref().unwrap_or(&empty), all_categories);
    let person_oop = LimitGroupFamily::build(raw.person_out_of_pocket_maximums.as_ref().unwrap_or(&empty), all_categories);
    let family_oop = LimitGroupFamily::build(raw.family_out_of_pocket_maximums.as_ref().unwrap_or(&empty), all_categories);

    let coverage_level_costs = cfg.coverage_level_costs_per_plan.get(plan_id).cloned().unwrap_or(Value::Null);

    let mut with_deductible_services = Vec::new();
    let mut no_deductible_services = Vec::new();
    for service_id in &cfg.services_order {
        let Some(service) = cfg.services.get(service_id) else { continue };
        let Some(entry) = service.coverage.get(plan_id) else { continue };
        let has_deductible = entry
            .as_slice()
            .iter()
            .any(|rule| !matches!(rule.deductible, Some(RawDeductibleTiming::NoDeductible)));
        if has_deductible {
            with_deductible_services.push(service_id.clone());
        } else {
            no_deductible_services.push(service_id.clone());
        }
    }

    PreparedPlan {
        description: description_text(&raw.description),
        person_deductibles,
        family_deductibles,
        person_oop,
        family_oop,
        fund_amount_map: raw.fund_amount_map.clone(),
        categories_fund_applies_to: raw
            .categories_fund_applies_to
            .as_ref()
            .map(|m| m.iter().filter(|(_, v)| **v).map(|(k, _)| k.clone()).collect())
            .unwrap_or_default(),
        fund_allows_contributions: raw.fund_allows_contributions.unwrap_or(true),
        coverage_level_costs,
        costs_object_id: raw.costs_object_id().to_string(),
        with_deductible_services,
        no_deductible_services,
    }
}

fn description_text(desc: &Description) -> String {
    match desc {
        Description::Single(s) => s.clone(),
        Description::Localized(map) => map.get("en").or_else(|| map.values().next()).cloned().unwrap_or_default(),
    }
}
