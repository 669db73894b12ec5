//! C6 — the public medical plan cost estimate entry point.
//!
//! `calculate` is the single pure, synchronous call the CLI and the Lambda
//! handler both sit on top of: given a prepared configuration, a household,
//! and per-plan caller overrides, it resolves the coverage level once (C3)
//! and evaluates every plan offered in the requested region (C5) in
//! `plans_order`.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::marker::PreparedConfig;
use crate::engine::plan_eval::{evaluate_plan, PlanCallParams, PlanResult};
use crate::error::CallError;
use crate::household::{resolve_coverage_level, Household};
use crate::ids::{PlanId, RegionId, StatusId};

/// One plan's caller-supplied overrides, keyed by plan id. A plan with no
/// entry gets the all-zero default — no rollover, no voluntary
/// contribution, no premium adjustment.
pub type PlanRequest = HashMap<PlanId, PlanCallParams>;

#[derive(Debug, Clone)]
pub struct MpceResponse {
    pub coverage_level: crate::ids::CoverageLevelId,
    pub plans: HashMap<PlanId, PlanResult>,
    pub elapsed_msec: u128,
}

pub fn calculate(
    cfg: &PreparedConfig,
    region: &RegionId,
    status: &StatusId,
    household: &Household,
    plan_params: &PlanRequest,
) -> Result<MpceResponse, CallError> {
    let start = Instant::now();

    let plans_in_region = cfg.regions.get(region).ok_or_else(|| CallError::UnknownRegion(region.clone()))?;
    if !cfg.statuses.contains(status) {
        return Err(CallError::UnknownStatus(status.clone()));
    }

    let level = resolve_coverage_level(cfg, household)?;

    let mut plans = HashMap::new();
    for plan_id in &cfg.plans_order {
        if !plans_in_region.contains(plan_id) {
            continue;
        }
        let params = plan_params.get(plan_id).copied().unwrap_or_default();
        let result = evaluate_plan(cfg, plan_id, region, status, &level, household, &params);
        plans.insert(plan_id.clone(), result);
    }

    Ok(MpceResponse { coverage_level: level, plans, elapsed_msec: start.elapsed().as_millis() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_str, prepare};
    use crate::household::Member;

    fn prepared() -> PreparedConfig {
        let raw = load_config_str(include_str!("../../tests/fixtures/minimal_config.json")).unwrap();
        prepare(raw).unwrap()
    }

    #[test]
    fn calculates_every_plan_offered_in_the_region() {
        let cfg = prepared();
        let household = Household::new(vec![Member::primary("p1")]).unwrap();
        let response = calculate(&cfg, &RegionId::from("CA"), &StatusId::from("fullTime"), &household, &PlanRequest::new()).unwrap();
        assert_eq!(response.coverage_level.as_str(), "employeeOnly");
        assert!(response.plans.contains_key(&PlanId::from("PPO")));
    }

    #[test]
    fn unknown_region_is_reported() {
        let cfg = prepared();
        let household = Household::new(vec![Member::primary("p1")]).unwrap();
        let err = calculate(&cfg, &RegionId::from("TX"), &StatusId::from("fullTime"), &household, &PlanRequest::new()).unwrap_err();
        assert_eq!(err, CallError::UnknownRegion(RegionId::from("TX")));
    }
}
