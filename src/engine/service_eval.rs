//! C4 — the Service Evaluator.
//!
//! Applies one service's coverage sequence, for one event count, to a
//! single household member's and the family's running budgets. Total over
//! validated input: every clamp here is the thing that keeps the
//! `used + available = cap` invariant (both non-negative) true, so this
//! module never errors — a negative intermediate would mean the validator
//! let something through it shouldn't have.

use crate::config::marker::{DeductibleTiming, PreparedCoverageRule};
use crate::engine::budgets::GroupBudget;
use crate::money::Cents;

/// Per-service-event totals produced by one call to [`evaluate_service_event`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleOutcome {
    pub deductible: Cents,
    pub copay: Cents,
    pub coinsurance: Cents,
    pub expenses_not_covered: Cents,
}

impl RuleOutcome {
    fn add(&mut self, other: RuleOutcome) {
        self.deductible += other.deductible;
        self.copay += other.copay;
        self.coinsurance += other.coinsurance;
        self.expenses_not_covered += other.expenses_not_covered;
    }
}

/// The mutable budget references one unit of coverage needs. Deductible and
/// OOP budgets are always present (every plan has at least the `"general"`
/// catch-all group); combined-limit budgets are only `Some` when the rule
/// in question carries a `combinedLimitId`.
pub struct UnitBudgets<'a> {
    pub person_deductible: &'a mut GroupBudget,
    pub family_deductible: &'a mut GroupBudget,
    pub person_oop: &'a mut GroupBudget,
    pub family_oop: &'a mut GroupBudget,
    pub person_combined: Option<&'a mut GroupBudget>,
    pub family_combined: Option<&'a mut GroupBudget>,
}

fn deductible_pass(cost_left: &mut Cents, single_use_left: &mut Cents, budgets: &mut UnitBudgets) -> Cents {
    let paid = (*cost_left)
        .min(*single_use_left)
        .min(budgets.person_deductible.available)
        .min(budgets.family_deductible.available);
    budgets.person_deductible.consume(paid);
    budgets.family_deductible.consume(paid);
    // The deductible counts toward both the deductible group and the OOP
    // group, for both person and family.
    budgets.person_oop.consume(paid);
    budgets.family_oop.consume(paid);
    *cost_left = cost_left.saturating_sub(paid);
    *single_use_left = single_use_left.saturating_sub(paid);
    paid
}

fn copay_pass(cost_left: &mut Cents, single_use_left: &mut Cents, rule: &PreparedCoverageRule, budgets: &mut UnitBudgets) -> Cents {
    let nominal = rule.copay.unwrap_or(Cents::ZERO);
    let potential = (*cost_left).min(*single_use_left).min(nominal);
    let actual = if rule.copay_towards_oop_max {
        let clamped = potential.min(budgets.person_oop.available).min(budgets.family_oop.available);
        budgets.person_oop.consume(clamped);
        budgets.family_oop.consume(clamped);
        clamped
    } else {
        potential
    };
    *cost_left = cost_left.saturating_sub(actual);
    *single_use_left = single_use_left.saturating_sub(actual);
    actual
}

fn coinsurance_pass(cost_left: &mut Cents, single_use_left: &mut Cents, rule: &PreparedCoverageRule, budgets: &mut UnitBudgets) -> Cents {
    let rate = rule.coinsurance.unwrap_or(0.0);
    let mut amount = cost_left.scale(rate);
    if let Some(min) = rule.coinsurance_min_dollar {
        amount = amount.max(min);
    }
    if let Some(max) = rule.coinsurance_max_dollar {
        amount = amount.min(max);
    }
    amount = amount.min(*cost_left).min(*single_use_left);

    let actual = if rule.coinsurance_towards_oop_max {
        let clamped = amount.min(budgets.person_oop.available).min(budgets.family_oop.available);
        budgets.person_oop.consume(clamped);
        budgets.family_oop.consume(clamped);
        clamped
    } else {
        amount
    };
    *cost_left = cost_left.saturating_sub(actual);
    *single_use_left = single_use_left.saturating_sub(actual);
    actual
}

/// Processes a single covered unit of a single rule. Returns the outcome
/// plus whether the rule's combined limit (if any) was just exhausted.
fn process_unit(rule: &PreparedCoverageRule, cost: Cents, budgets: &mut UnitBudgets) -> (RuleOutcome, bool) {
    let mut outcome = RuleOutcome::default();
    let mut cost_left = cost;
    let mut single_use_left = rule.single_use_cost_max.unwrap_or(Cents::MAX);

    if rule.deductible == DeductibleTiming::BeforeCopay {
        outcome.deductible += deductible_pass(&mut cost_left, &mut single_use_left, budgets);
    }
    if rule.copay.is_some() {
        outcome.copay += copay_pass(&mut cost_left, &mut single_use_left, rule, budgets);
    }
    if rule.deductible == DeductibleTiming::AfterCopay {
        outcome.deductible += deductible_pass(&mut cost_left, &mut single_use_left, budgets);
    }
    if rule.coinsurance.is_some() {
        outcome.coinsurance += coinsurance_pass(&mut cost_left, &mut single_use_left, rule, budgets);
    }

    let mut exhausted = false;
    if rule.combined_limit_id.is_some() {
        if let (Some(person_combined), Some(family_combined)) = (budgets.person_combined.as_deref_mut(), budgets.family_combined.as_deref_mut()) {
            let reimbursed = cost_left.min(person_combined.available).min(family_combined.available);
            person_combined.consume(reimbursed);
            family_combined.consume(reimbursed);
            cost_left = cost_left.saturating_sub(reimbursed);
            outcome.expenses_not_covered += cost_left;
            exhausted = person_combined.available.is_zero() || family_combined.available.is_zero();
        }
    }

    (outcome, exhausted)
}

/// Number of units of `count` that a single rule covers, given the
/// remaining (not yet covered-or-rejected) count and per-unit `cost`.
fn covered_units(rule: &PreparedCoverageRule, remaining: u32, cost: Cents) -> u32 {
    if rule.not_covered {
        return 0;
    }
    if let Some(covered_count) = rule.covered_count {
        return remaining.min(covered_count);
    }
    if let Some(dollar_limit) = rule.dollar_limit {
        if cost.is_zero() {
            return remaining;
        }
        let affordable = (dollar_limit.0 / cost.0).max(0) as u32;
        return remaining.min(affordable);
    }
    remaining
}

/// Evaluates an entire service event — a service's (possibly multi-rule)
/// coverage sequence applied `count` times at `cost` each — against one
/// member's and the family's budgets.
///
/// `person_combined`/`family_combined` back whichever combined limit the
/// rule in effect declares, if any; the validator guarantees at most one
/// rule in the sequence ever declares one (multi-rule sequences may not).
#[allow(clippy::too_many_arguments)]
pub fn evaluate_service_event(
    rules: &[PreparedCoverageRule],
    cost: Cents,
    count: u32,
    person_deductible: &mut GroupBudget,
    family_deductible: &mut GroupBudget,
    person_oop: &mut GroupBudget,
    family_oop: &mut GroupBudget,
    mut person_combined: Option<&mut GroupBudget>,
    mut family_combined: Option<&mut GroupBudget>,
) -> RuleOutcome {
    let mut total = RuleOutcome::default();
    let mut remaining = count;

    for (i, rule) in rules.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        let is_last = i == rules.len() - 1;
        let covered = covered_units(rule, remaining, cost);

        let mut stop_event = false;
        let mut processed = 0u32;
        for _ in 0..covered {
            let mut unit_budgets = UnitBudgets {
                person_deductible,
                family_deductible,
                person_oop,
                family_oop,
                person_combined: person_combined.as_deref_mut(),
                family_combined: family_combined.as_deref_mut(),
            };
            let (outcome, exhausted) = process_unit(rule, cost, &mut unit_budgets);
            total.add(outcome);
            processed += 1;
            if exhausted {
                stop_event = true;
                break;
            }
        }

        // Units this rule was entitled to cover but never actually ran
        // through `process_unit` because the combined limit exhausted
        // mid-loop — without this they'd vanish from the accounting
        // identity instead of landing in expenses-not-covered.
        let unprocessed_in_rule = covered - processed;
        remaining -= covered;
        if stop_event {
            total.expenses_not_covered += Cents(cost.0 * (unprocessed_in_rule as i64 + remaining as i64));
            remaining = 0;
            break;
        }
        if is_last {
            total.expenses_not_covered += Cents(cost.0 * remaining as i64);
            remaining = 0;
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::RawCoverageRule;

    fn rule(copay: Option<f64>, coinsurance: Option<f64>, deductible: DeductibleTiming) -> PreparedCoverageRule {
        let raw = RawCoverageRule {
            not_covered: None,
            copay,
            coinsurance,
            coinsurance_min_dollar: None,
            coinsurance_max_dollar: None,
            coinsurance_not_towards_oop_max: None,
            copay_not_towards_oop_max: None,
            deductible: None,
            covered_count: None,
            dollar_limit: None,
            single_use_cost_max: None,
            combined_limit_id: None,
            eligible_for_fund: None,
        };
        let mut prepared = PreparedCoverageRule::from(&raw);
        prepared.deductible = deductible;
        prepared
    }

    #[test]
    fn er_visit_scenario_matches_spec_s4() {
        // S4: copay 100, then deductible (family=900 remaining), then 10% coinsurance.
        let mut r = rule(Some(100.0), Some(0.10), DeductibleTiming::AfterCopay);
        r.deductible = DeductibleTiming::AfterCopay;
        let rules = vec![r];

        let mut person_ded = GroupBudget::new(Cents::from_dollars(900.0));
        let mut family_ded = GroupBudget::new(Cents::from_dollars(900.0));
        let mut person_oop = GroupBudget::new(Cents::from_dollars(4900.0));
        let mut family_oop = GroupBudget::new(Cents::from_dollars(4900.0));

        let outcome = evaluate_service_event(
            &rules,
            Cents::from_dollars(1640.96),
            1,
            &mut person_ded,
            &mut family_ded,
            &mut person_oop,
            &mut family_oop,
            None,
            None,
        );

        assert_eq!(outcome.copay, Cents::from_dollars(100.0));
        assert_eq!(outcome.deductible, Cents::from_dollars(900.0));
        assert_eq!(outcome.coinsurance, Cents::from_dollars(64.10));
        assert_eq!(outcome.expenses_not_covered, Cents::ZERO);
    }

    #[test]
    fn combined_limit_exhaustion_mid_event_accounts_for_every_unprocessed_unit() {
        // 4 units at $200 each ($800 raw) against a $500 combined limit:
        // the limit exhausts partway through the 3rd unit, and the whole
        // event (including the 4th unit it never even started processing)
        // must land somewhere — reimbursed or uncovered — not vanish.
        let mut r = rule(None, None, DeductibleTiming::NoDeductible);
        r.combined_limit_id = Some(crate::ids::CombinedLimitId::from("altcare"));
        let rules = vec![r];

        let mut person_ded = GroupBudget::unlimited();
        let mut family_ded = GroupBudget::unlimited();
        let mut person_oop = GroupBudget::unlimited();
        let mut family_oop = GroupBudget::unlimited();
        let mut person_combined = GroupBudget::new(Cents::from_dollars(500.0));
        let mut family_combined = GroupBudget::new(Cents::from_dollars(1000.0));

        let outcome = evaluate_service_event(
            &rules,
            Cents::from_dollars(200.0),
            4,
            &mut person_ded,
            &mut family_ded,
            &mut person_oop,
            &mut family_oop,
            Some(&mut person_combined),
            Some(&mut family_combined),
        );

        let raw = Cents::from_dollars(200.0) * 4;
        let reimbursed = person_combined.used();
        assert_eq!(reimbursed, Cents::from_dollars(500.0));
        assert_eq!(outcome.expenses_not_covered, raw - reimbursed);
        assert_eq!(
            outcome.deductible + outcome.copay + outcome.coinsurance + outcome.expenses_not_covered + reimbursed,
            raw
        );
    }
}
