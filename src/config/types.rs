//! Raw, deserialized configuration shape — the direct JSON image of the
//! on-disk plan configuration.
//!
//! Nothing here has been validated or cross-referenced yet; that is the
//! validator's (C1) job. Nothing here has been normalized either (e.g. a
//! service's `coverage` entry may still be a single rule rather than a
//! one-element sequence); that is the marker's (C2) job. `RawConfig` is
//! deliberately "dumb data" so the two passes that follow have a single,
//! simple input shape to reason about.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CategoryId, CombinedLimitId, CoverageLevelId, GroupId, PlanId, RegionId, ServiceId, StatusId};

/// Top-level configuration value: every named-entity map paired with its
/// explicit order sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    pub regions: HashMap<RegionId, RawRegion>,
    pub regions_order: Vec<RegionId>,

    pub plans: HashMap<PlanId, RawPlan>,
    pub plans_order: Vec<PlanId>,

    pub statuses: HashMap<StatusId, RawStatus>,
    pub statuses_order: Vec<StatusId>,

    pub coverage_levels: HashMap<CoverageLevelId, RawCoverageLevel>,
    pub coverage_levels_order: Vec<CoverageLevelId>,

    /// plan-id -> (region-id? ->) coverage-level-id -> status-id -> premium|null
    #[serde(default)]
    pub coverage_level_costs_per_plan: HashMap<PlanId, Value>,

    pub categories: HashMap<CategoryId, RawCategory>,
    pub categories_order: Vec<CategoryId>,

    pub services: HashMap<ServiceId, RawService>,
    pub services_order: Vec<ServiceId>,

    #[serde(default)]
    pub combined_limits: HashMap<CombinedLimitId, RawCombinedLimit>,
    #[serde(default)]
    pub combined_limits_order: Vec<CombinedLimitId>,

    /// Presentational: service-id -> non-negative count, keyed by an
    /// arbitrary health-status label. Not consumed by the engines.
    #[serde(default)]
    pub health_statuses: HashMap<String, RawHealthStatus>,
    #[serde(default)]
    pub health_statuses_order: Vec<String>,

    #[serde(default)]
    pub account_types: HashMap<crate::ids::AccountTypeId, RawAccountType>,
    #[serde(default)]
    pub account_types_order: Vec<crate::ids::AccountTypeId>,

    #[serde(default)]
    pub filing_statuses: HashMap<String, RawFilingStatus>,

    #[serde(default)]
    pub fica: RawFicaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRegion {
    pub description: String,
    pub plans: Vec<PlanId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStatus {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoverageLevel {
    pub description: String,
    pub spouse: bool,
    pub max_num_children: MaxChildren,
}

/// Either a finite child count or the literal `"unlimited"`, standing in
/// for an unbounded child allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MaxChildren {
    Finite(u32),
    Unlimited,
}

impl<'de> Deserialize<'de> for MaxChildren {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u32),
            Str(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(MaxChildren::Finite(n)),
            Raw::Str(s) if s.eq_ignore_ascii_case("unlimited") => Ok(MaxChildren::Unlimited),
            Raw::Str(other) => Err(serde::de::Error::custom(format!(
                "maxNumChildren string must be \"unlimited\", got {other:?}"
            ))),
        }
    }
}

impl MaxChildren {
    pub fn covers(&self, children: usize) -> bool {
        match self {
            MaxChildren::Unlimited => true,
            MaxChildren::Finite(n) => children as u32 <= *n,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Single(String),
    Localized(HashMap<String, String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlan {
    pub description: Description,

    #[serde(default)]
    pub person_deductibles: Option<HashMap<GroupId, RawLimitGroup>>,
    #[serde(default)]
    pub family_deductibles: Option<HashMap<GroupId, RawLimitGroup>>,
    #[serde(default)]
    pub person_out_of_pocket_maximums: Option<HashMap<GroupId, RawLimitGroup>>,
    #[serde(default)]
    pub family_out_of_pocket_maximums: Option<HashMap<GroupId, RawLimitGroup>>,

    #[serde(default)]
    pub fund_amount_map: Option<Value>,
    #[serde(default)]
    pub categories_fund_applies_to: Option<HashMap<CategoryId, bool>>,
    #[serde(default)]
    pub fund_allows_contributions: Option<bool>,

    #[serde(default)]
    pub costs_object_id: Option<String>,
}

impl RawPlan {
    pub fn costs_object_id(&self) -> &str {
        self.costs_object_id.as_deref().unwrap_or("costs")
    }
}

/// A single named group (e.g. `"general"` or `"oopmax_rx"`) within one of a
/// plan's four limit-group families.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLimitGroup {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub amount_map: Option<Value>,
    #[serde(default)]
    pub categories: Option<Vec<CategoryId>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategory {
    pub description: String,
    pub ordered_contents: Vec<ServiceId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCombinedLimit {
    pub description: String,
    #[serde(default)]
    pub person_reimburse_limit: Option<f64>,
    #[serde(default)]
    pub family_reimburse_limit: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHealthStatus {
    pub description: String,
    #[serde(default)]
    pub contents: HashMap<ServiceId, u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawService {
    pub description: String,
    #[serde(default)]
    pub costs: HashMap<RegionId, f64>,
    #[serde(default)]
    pub costs_for_display: HashMap<RegionId, f64>,
    pub coverage: HashMap<PlanId, RawCoverageEntry>,
    #[serde(flatten)]
    pub custom_costs: HashMap<String, HashMap<RegionId, f64>>,
}

impl RawService {
    /// Returns the per-region cost map for the given `costsObjectId`
    /// (`"costs"` or a plan-specific `"costs_*"` object).
    pub fn cost_object(&self, id: &str) -> Option<&HashMap<RegionId, f64>> {
        if id == "costs" {
            Some(&self.costs)
        } else {
            self.custom_costs.get(id)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCoverageEntry {
    Single(RawCoverageRule),
    Sequence(Vec<RawCoverageRule>),
}

impl RawCoverageEntry {
    pub fn as_slice(&self) -> &[RawCoverageRule] {
        match self {
            RawCoverageEntry::Single(r) => std::slice::from_ref(r),
            RawCoverageEntry::Sequence(rs) => rs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawDeductibleTiming {
    #[serde(rename = "none")]
    NoDeductible,
    BeforeCopay,
    AfterCopay,
    BeforeCoinsurance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoverageRule {
    #[serde(default)]
    pub not_covered: Option<bool>,
    #[serde(default)]
    pub copay: Option<f64>,
    #[serde(default)]
    pub coinsurance: Option<f64>,
    #[serde(default)]
    pub coinsurance_min_dollar: Option<f64>,
    #[serde(default)]
    pub coinsurance_max_dollar: Option<f64>,
    #[serde(default)]
    pub coinsurance_not_towards_oop_max: Option<bool>,
    #[serde(default)]
    pub copay_not_towards_oop_max: Option<bool>,
    #[serde(default)]
    pub deductible: Option<RawDeductibleTiming>,
    #[serde(default)]
    pub covered_count: Option<u32>,
    #[serde(default)]
    pub dollar_limit: Option<u32>,
    #[serde(default)]
    pub single_use_cost_max: Option<f64>,
    #[serde(default)]
    pub combined_limit_id: Option<CombinedLimitId>,
    #[serde(default)]
    pub eligible_for_fund: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccountType {
    pub description: String,
    pub contribution_minimum: f64,
    pub contribution_maximum: f64,
    #[serde(default)]
    pub employer_match_rate: f64,
    #[serde(default)]
    pub employer_max_match_amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFilingStatus {
    pub description: String,
    pub personal_exemption: f64,
    pub dependent_exemption: f64,
    pub standard_deduction: f64,
    /// `(bracket upper bound, marginal rate)`, ascending, last entry's
    /// upper bound is the overflow bracket and is ignored.
    pub brackets: Vec<(f64, f64)>,
}

/// FICA payroll-tax constants consulted by [`crate::fsae::calculate_fica_payroll_taxes`].
/// Independent of filing status — FICA is withheld per-wage-earner on
/// income alone. Defaults to the 2017 rates (6.2% OASDI up to the
/// wage base, 1.45% Medicare uncapped) when a configuration omits the block
/// entirely, so existing MPCE-only configurations need not carry one.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFicaConfig {
    #[serde(default = "default_ss_limit")]
    pub social_security_limit: f64,
    #[serde(default = "default_ss_rate")]
    pub social_security_rate: f64,
    #[serde(default = "default_medicare_rate")]
    pub medicare_rate: f64,
}

fn default_ss_limit() -> f64 {
    127_200.0
}
fn default_ss_rate() -> f64 {
    0.062
}
fn default_medicare_rate() -> f64 {
    0.0145
}

impl Default for RawFicaConfig {
    fn default() -> Self {
        RawFicaConfig {
            social_security_limit: default_ss_limit(),
            social_security_rate: default_ss_rate(),
            medicare_rate: default_medicare_rate(),
        }
    }
}
