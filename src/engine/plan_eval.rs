//! C5 — the Plan Evaluator.
//!
//! Drives C4 over every household member and every service under a single
//! plan, in the marker-produced with-deductible-then-no-deductible order,
//! then applies the plan fund offset and premium lookup to produce one
//! [`PlanResult`].

use std::collections::HashSet;

use crate::config::marker::PreparedConfig;
use crate::config::polymap::{resolve_amount, resolve_premium};
use crate::engine::budgets::{GroupBudget, LookupContext, PlanBudgets};
use crate::engine::service_eval::evaluate_service_event;
use crate::household::Household;
use crate::ids::{CoverageLevelId, PlanId, RegionId, StatusId};
use crate::money::Cents;

/// Per-plan caller overrides: current-year voluntary contribution, prior
/// rollover, an employer match beyond the plan's own seeded fund, and a
/// flat adjustment (positive or negative) to the looked-up premium.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanCallParams {
    pub rollover: Cents,
    pub voluntary_contribution: Cents,
    pub premium_adjustment: Cents,
    pub additional_match: Cents,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanResult {
    pub total_deductibles: Cents,
    pub total_copays: Cents,
    pub total_coinsurance: Cents,
    pub total_expenses_not_covered: Cents,
    pub total_raw_expenses: Cents,
    pub total_fund_eligible_costs: Cents,
    pub total_fund_amount_offset: Cents,
    pub plan_fund_paid: Cents,
    pub plan_fund_additional_match_paid: Cents,
    pub rollover_fund_paid: Cents,
    pub voluntary_fund_paid: Cents,
    pub fund_carryover_balance: Cents,
    pub medical_and_drug_costs_excluding_deductibles: Cents,
    pub medical_and_drug_costs_including_deductibles: Cents,
    pub medical_and_drug_costs_including_deductibles_less_fund_offset: Cents,
    pub employer_or_plan_paid_excluding_fund: Cents,
    pub annual_premium: Cents,
    pub annual_premium_after_adjustment: Cents,
    pub care_plus_premium: Cents,
    pub current_year_fund_contributions: Cents,
    pub annual_total: Cents,
}

pub fn evaluate_plan(
    cfg: &PreparedConfig,
    plan_id: &PlanId,
    region: &RegionId,
    status: &StatusId,
    level: &CoverageLevelId,
    household: &Household,
    params: &PlanCallParams,
) -> PlanResult {
    let plan = &cfg.plans[plan_id];
    let members = household.ordered_members();

    let regions = cfg.region_set();
    let statuses = cfg.statuses.clone();
    let levels = cfg.coverage_level_set();
    let ctx = LookupContext { regions: &regions, statuses: &statuses, levels: &levels, region, status, level };

    let mut budgets = PlanBudgets::new(plan, &cfg.combined_limits, members.len(), &ctx);

    let mut result = PlanResult::default();

    for (member_idx, member) in members.iter().enumerate() {
        for service_id in plan.with_deductible_services.iter().chain(plan.no_deductible_services.iter()) {
            let raw_count = member.services.get(service_id).copied().unwrap_or(0);
            if raw_count == 0 {
                continue;
            }
            let service = &cfg.services[service_id];
            let Some(raw_cost) = service.cost(&plan.costs_object_id, region) else { continue };
            let category = &cfg.service_category[service_id];
            let Some(rules) = service.coverage.get(plan_id) else { continue };

            // "additionalServices*" events encode raw dollars of additional
            // medical spend as (count=dollars, cost=$1); canonicalize the
            // pair locally so the rest of the evaluation only ever sees an
            // ordinary (count, cost). The caller's household map is never
            // mutated — only these locals swap.
            let (count, cost) = canonicalize_additional_services(service_id.as_str(), raw_count, raw_cost);

            result.total_raw_expenses += cost * count;

            let combined_limit_id = rules.iter().find_map(|r| r.combined_limit_id.clone());

            let person_ded_budget = budgets.person_deductible[member_idx].budget_for(&plan.person_deductibles, category);
            let family_ded_budget = budgets.family_deductible.budget_for(&plan.family_deductibles, category);
            let person_oop_budget = budgets.person_oop[member_idx].budget_for(&plan.person_oop, category);
            let family_oop_budget = budgets.family_oop.budget_for(&plan.family_oop, category);

            let mut fallback = GroupBudget::unlimited();
            let person_ded = person_ded_budget.unwrap_or(&mut fallback);
            let mut fallback2 = GroupBudget::unlimited();
            let family_ded = family_ded_budget.unwrap_or(&mut fallback2);
            let mut fallback3 = GroupBudget::unlimited();
            let person_oop = person_oop_budget.unwrap_or(&mut fallback3);
            let mut fallback4 = GroupBudget::unlimited();
            let family_oop = family_oop_budget.unwrap_or(&mut fallback4);

            let person_combined = combined_limit_id.as_ref().and_then(|id| budgets.person_combined[member_idx].get_mut(id));
            let family_combined = combined_limit_id.as_ref().and_then(|id| budgets.family_combined.get_mut(id));

            let outcome = evaluate_service_event(rules, cost, count, person_ded, family_ded, person_oop, family_oop, person_combined, family_combined);

            result.total_deductibles += outcome.deductible;
            result.total_copays += outcome.copay;
            result.total_coinsurance += outcome.coinsurance;
            result.total_expenses_not_covered += outcome.expenses_not_covered;

            // Each rule in the sequence already carries its resolved
            // eligibleForFund (explicit override, or the plan's
            // categoriesFundAppliesTo default) from the marker; a multi-rule
            // sequence is fund-eligible if any rule in it is, since C4
            // doesn't track which rule produced which dollar.
            let eligible = rules.iter().any(|r| r.eligible_for_fund);
            if eligible {
                result.total_fund_eligible_costs += outcome.deductible + outcome.copay + outcome.coinsurance + outcome.expenses_not_covered;
            }
        }
    }

    apply_fund_offset(plan, &regions, &statuses, &levels, region, status, level, params, &mut result);
    apply_premium(plan, &regions, region, status, level, params, &mut result);

    result.medical_and_drug_costs_excluding_deductibles = result.total_copays + result.total_coinsurance + result.total_expenses_not_covered;
    result.medical_and_drug_costs_including_deductibles = result.medical_and_drug_costs_excluding_deductibles + result.total_deductibles;
    result.medical_and_drug_costs_including_deductibles_less_fund_offset =
        result.medical_and_drug_costs_including_deductibles.saturating_sub(result.total_fund_amount_offset);
    result.employer_or_plan_paid_excluding_fund = result.total_raw_expenses.saturating_sub(result.medical_and_drug_costs_including_deductibles);
    result.care_plus_premium = result.medical_and_drug_costs_including_deductibles_less_fund_offset + result.annual_premium_after_adjustment;
    result.current_year_fund_contributions = params.voluntary_contribution;
    result.annual_total = result.care_plus_premium + result.current_year_fund_contributions;

    result
}

/// Implements the `additionalServices*`/`cost==1` canonicalization:
/// when a service id carries that prefix and its per-instance cost is
/// exactly one dollar, `count` actually holds raw dollars of spend and
/// `cost` is the nominal $1 stand-in. Swap them so the rest of the engine
/// sees an ordinary (one event, that many dollars) shape.
fn canonicalize_additional_services(service_id: &str, count: u32, cost: Cents) -> (u32, Cents) {
    if service_id.starts_with("additionalServices") && cost == Cents::from_dollars(1.0) {
        (1, Cents(count as i64 * 100))
    } else {
        (count, cost)
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_fund_offset(
    plan: &crate::config::marker::PreparedPlan,
    regions: &HashSet<RegionId>,
    statuses: &HashSet<StatusId>,
    levels: &HashSet<CoverageLevelId>,
    region: &RegionId,
    status: &StatusId,
    level: &CoverageLevelId,
    params: &PlanCallParams,
    result: &mut PlanResult,
) {
    let plan_fund = plan
        .fund_amount_map
        .as_ref()
        .and_then(|map| resolve_amount(map, regions, statuses, levels, region, status, level))
        .map(Cents::from_dollars)
        .unwrap_or(Cents::ZERO);

    let total_available = plan_fund + params.additional_match + params.rollover + params.voluntary_contribution;
    let offset = result.total_fund_eligible_costs.min(total_available);

    let mut remaining = offset;
    result.plan_fund_paid = plan_fund.min(remaining);
    remaining = remaining.saturating_sub(result.plan_fund_paid);
    result.plan_fund_additional_match_paid = params.additional_match.min(remaining);
    remaining = remaining.saturating_sub(result.plan_fund_additional_match_paid);
    result.rollover_fund_paid = params.rollover.min(remaining);
    remaining = remaining.saturating_sub(result.rollover_fund_paid);
    result.voluntary_fund_paid = params.voluntary_contribution.min(remaining);

    result.total_fund_amount_offset = offset;
    result.fund_carryover_balance = total_available.saturating_sub(offset);
}

fn apply_premium(
    plan: &crate::config::marker::PreparedPlan,
    regions: &HashSet<RegionId>,
    region: &RegionId,
    status: &StatusId,
    level: &CoverageLevelId,
    params: &PlanCallParams,
    result: &mut PlanResult,
) {
    // Premium tables put status at the leaf (coverageLevel -> status ->
    // premium), unlike an amountMap's coverage-level-at-the-leaf shapes, so
    // this resolves differently from `apply_fund_offset`'s fundAmountMap
    // lookup above.
    let raw_premium = resolve_premium(&plan.coverage_level_costs, regions, region, level, status)
        .map(Cents::from_dollars)
        .unwrap_or(Cents::ZERO);
    result.annual_premium = raw_premium;
    result.annual_premium_after_adjustment = Cents((raw_premium.0 + params.premium_adjustment.0).max(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_str, prepare};
    use crate::household::Member;
    use crate::ids::ServiceId;
    use std::collections::HashMap;

    fn cdhp_config() -> PreparedConfig {
        let raw = load_config_str(include_str!("../../tests/fixtures/cdhp_fund_config.json")).unwrap();
        prepare(raw).unwrap()
    }

    fn services(pairs: &[(&str, u32)]) -> HashMap<ServiceId, u32> {
        pairs.iter().map(|(id, count)| (ServiceId::from(*id), *count)).collect()
    }

    /// S5: employeeOnly, single outpatient visit under the family deductible
    /// (no family on the household, but the plan only declares a family
    /// deductible group here) — fund-eligible cost equals the deductible
    /// paid, and the plan fund offsets it dollar for dollar since it covers
    /// the whole amount.
    #[test]
    fn fund_offsets_outpatient_deductible_and_leaves_a_carryover() {
        let cfg = cdhp_config();
        let household = Household::new(vec![Member::primary("p1").with_services(services(&[("primaryCarePhysician", 1)]))]).unwrap();
        let level = CoverageLevelId::from("employeeOnly");
        let result = evaluate_plan(&cfg, &PlanId::from("CDHP"), &RegionId::from("CA"), &StatusId::from("fullTime"), &level, &household, &PlanCallParams::default());

        assert_eq!(result.total_deductibles, Cents::from_dollars(135.78));
        assert_eq!(result.total_fund_eligible_costs, Cents::from_dollars(135.78));
        assert_eq!(result.plan_fund_paid, Cents::from_dollars(135.78));
        assert_eq!(result.total_fund_amount_offset, Cents::from_dollars(135.78));
        assert_eq!(result.fund_carryover_balance, Cents::from_dollars(450.0 - 135.78));
    }

    /// Fund offset priority: plan fund, then additional match, then
    /// rollover, then voluntary — each source only draws once the one
    /// before it is fully exhausted.
    #[test]
    fn fund_offset_draws_sources_in_priority_order() {
        let cfg = cdhp_config();
        // Two visits ($271.56) exceeds the plan's $450 fund alone only if
        // we also draw on the extra sources; push a bigger bill instead so
        // plan fund ($450) drains first, then match, then rollover.
        let household = Household::new(vec![Member::primary("p1").with_services(services(&[("primaryCarePhysician", 10)]))]).unwrap();
        let level = CoverageLevelId::from("employeeOnly");
        let params = PlanCallParams {
            rollover: Cents::from_dollars(100.0),
            voluntary_contribution: Cents::from_dollars(50.0),
            additional_match: Cents::from_dollars(200.0),
            premium_adjustment: Cents::ZERO,
        };
        let result = evaluate_plan(&cfg, &PlanId::from("CDHP"), &RegionId::from("CA"), &StatusId::from("fullTime"), &level, &household, &params);

        // 10 * 135.78 = 1357.80, all deductible (family deductible caps at
        // 3000 so none of it is trimmed), all fund-eligible (outpatient).
        assert_eq!(result.total_fund_eligible_costs, Cents::from_dollars(1357.80));
        assert_eq!(result.plan_fund_paid, Cents::from_dollars(450.0));
        assert_eq!(result.plan_fund_additional_match_paid, Cents::from_dollars(200.0));
        assert_eq!(result.rollover_fund_paid, Cents::from_dollars(100.0));
        assert_eq!(result.voluntary_fund_paid, Cents::from_dollars(50.0));
        let total_available = Cents::from_dollars(450.0 + 200.0 + 100.0 + 50.0);
        assert_eq!(
            result.plan_fund_paid + result.plan_fund_additional_match_paid + result.rollover_fund_paid + result.voluntary_fund_paid,
            result.total_fund_amount_offset
        );
        assert_eq!(result.total_fund_amount_offset, total_available.min(result.total_fund_eligible_costs));
        assert_eq!(result.fund_carryover_balance, total_available.saturating_sub(result.total_fund_amount_offset));
    }

    /// Split OOP group (S6): pharmacy copays draw against the plan's
    /// narrower `oopmax_rx` group, not the `general` group, and no copay
    /// ever drives that group's `available` negative even once exhausted.
    #[test]
    fn split_oop_group_clamps_pharmacy_copays_independently() {
        let cfg = cdhp_config();
        let household = Household::new(vec![Member::primary("p1").with_services(services(&[("drugGeneric", 5)]))]).unwrap();
        let level = CoverageLevelId::from("employeeOnly");
        let result = evaluate_plan(&cfg, &PlanId::from("CDHP"), &RegionId::from("CA"), &StatusId::from("fullTime"), &level, &household, &PlanCallParams::default());

        // 5 * $15 copay = $75 nominal, but the oopmax_rx person cap is $40:
        // $15 + $15 + $10 (clamped) + $0 + $0.
        assert_eq!(result.total_copays, Cents::from_dollars(40.0));
        assert_eq!(result.total_raw_expenses, Cents::from_dollars(75.0));
        // Pharmacy isn't fund-eligible on this plan.
        assert_eq!(result.total_fund_eligible_costs, Cents::ZERO);
    }

    /// Combined limit exhaustion inside a full plan evaluation: the
    /// accounting identity (raw = reimbursed + deductible + copay +
    /// coinsurance + notCovered + employerOrPlanPaid) must still hold once
    /// the combined limit caps total reimbursement mid-service.
    #[test]
    fn combined_limit_caps_reimbursement_and_the_rest_is_not_covered() {
        let cfg = cdhp_config();
        let household = Household::new(vec![Member::primary("p1").with_services(services(&[("acupuncture", 4)]))]).unwrap();
        let level = CoverageLevelId::from("employeeOnly");
        let result = evaluate_plan(&cfg, &PlanId::from("CDHP"), &RegionId::from("CA"), &StatusId::from("fullTime"), &level, &household, &PlanCallParams::default());

        assert_eq!(result.total_raw_expenses, Cents::from_dollars(800.0));
        // $500 combined limit reimbursed, $300 left uncovered; the combined
        // limit's reimbursement never shows up as a deductible/copay/
        // coinsurance, only as employerOrPlanPaidExcludingFund.
        assert_eq!(result.total_expenses_not_covered, Cents::from_dollars(300.0));
        assert_eq!(result.employer_or_plan_paid_excluding_fund, Cents::from_dollars(500.0));
        assert_eq!(
            result.total_deductibles + result.total_copays + result.total_coinsurance + result.total_expenses_not_covered + result.employer_or_plan_paid_excluding_fund,
            result.total_raw_expenses
        );
        // altcare is fund-eligible on this plan, so the uncovered remainder
        // (the combined limit's reimbursement isn't, but the shortfall is
        // still a member-paid, fund-eligible dollar) counts toward it.
        assert_eq!(result.total_fund_eligible_costs, Cents::from_dollars(300.0));
    }

    /// Premium lookup descends `(region? ->) coverageLevel -> status`:
    /// status sits at the leaf, not coverage level, so two employment
    /// statuses at the same coverage level must resolve to different
    /// premiums rather than both collapsing to the same (or a missing)
    /// amount.
    #[test]
    fn premium_resolves_by_status_not_just_coverage_level() {
        let cfg = cdhp_config();
        let household = Household::new(vec![Member::primary("p1")]).unwrap();
        let level = CoverageLevelId::from("employeeOnly");

        let full_time = evaluate_plan(&cfg, &PlanId::from("CDHP"), &RegionId::from("CA"), &StatusId::from("fullTime"), &level, &household, &PlanCallParams::default());
        let part_time = evaluate_plan(&cfg, &PlanId::from("CDHP"), &RegionId::from("CA"), &StatusId::from("partTime"), &level, &household, &PlanCallParams::default());

        assert_eq!(full_time.annual_premium, Cents::from_dollars(50.0));
        assert_eq!(part_time.annual_premium, Cents::from_dollars(65.0));
    }
}
