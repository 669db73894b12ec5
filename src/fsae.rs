//! C7 — the Flexible Spending / HSA Estimator.
//!
//! Sizes a pre-tax account contribution for a target cost and computes the
//! federal-bracket income-tax and FICA savings it buys. Independent of the
//! medical plan cost engine — it shares only the validator/marker's
//! aggregated-configuration-value style, via [`PreparedConfig`].

use std::time::Instant;

use crate::config::marker::PreparedConfig;
use crate::config::types::{RawAccountType, RawFilingStatus};
use crate::error::CallError;
use crate::ids::AccountTypeId;
use crate::money::Cents;

/// `calculateContributions`'s two outputs: the suggested employee
/// contribution and the employer match it would draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContributionSuggestion {
    pub suggested_contribution: Cents,
    pub employer_matching_contribution: Cents,
}

/// Sizes a contribution to `account` given a `totalCost` to cover and a
/// `rollover` already on hand.
///
/// The two candidates inside the outer `max` exist for different reasons:
/// `limited / (1 + employerMatchRate)` keeps the employee contribution plus
/// its proportional match from overshooting the combined cap; `limited -
/// employerMaxMatchAmount` keeps it from overshooting once the match itself
/// is capped in dollars rather than by rate.
pub fn calculate_contributions(account: &RawAccountType, total_cost: Cents, rollover: Cents) -> ContributionSuggestion {
    if total_cost.is_zero() {
        return ContributionSuggestion::default();
    }

    let remaining = total_cost.saturating_sub(rollover);
    let limited = remaining.min(Cents::from_dollars(account.contribution_maximum));
    let limited_dollars = limited.to_dollars();

    let combined_cap_candidate = limited_dollars / (1.0 + account.employer_match_rate);
    let match_cap_candidate = limited_dollars - account.employer_max_match_amount;
    let suggested_dollars = account.contribution_minimum.max(combined_cap_candidate.max(match_cap_candidate)).max(0.0);
    let suggested_contribution = Cents::from_dollars(suggested_dollars);

    let employer_matching_contribution =
        Cents::from_dollars((suggested_contribution.to_dollars() * account.employer_match_rate).min(account.employer_max_match_amount).max(0.0));

    ContributionSuggestion { suggested_contribution, employer_matching_contribution }
}

/// Walks `filing`'s ascending `(bracketUpper, rate)` brackets against
/// taxable income, the last bracket's upper bound standing in for "and
/// everything above it at this rate." Negative taxable income (more
/// exemptions and deductions than income) produces a proportionally
/// negative tax — a refund credit — rather than being clamped to zero;
/// clamping is left to the caller if it wants one.
pub fn calculate_federal_income_tax(income: Cents, filing: &RawFilingStatus, dependents: u32) -> Cents {
    let exemptions = filing.personal_exemption + filing.dependent_exemption * dependents as f64;
    let taxable = income.to_dollars() - exemptions - filing.standard_deduction;

    let mut tax = 0.0;
    let mut taxed_so_far = 0.0;
    let last = filing.brackets.len().saturating_sub(1);
    for (i, (upper, rate)) in filing.brackets.iter().enumerate() {
        if i == last {
            tax += (taxable - taxed_so_far) * rate;
        } else {
            let bounded = upper.min(taxable);
            tax += (bounded - taxed_so_far) * rate;
            taxed_so_far = bounded;
        }
    }
    Cents::from_dollars(tax)
}

/// `min(income, ssLimit) * ssRate + income * medicareRate`: OASDI is capped
/// at the wage base, Medicare is not.
pub fn calculate_fica_payroll_taxes(income: Cents, ss_limit: Cents, ss_rate: f64, medicare_rate: f64) -> Cents {
    let social_security = income.min(ss_limit).to_dollars() * ss_rate;
    let medicare = income.to_dollars() * medicare_rate;
    Cents::from_dollars(social_security + medicare)
}

/// The external-facing FSAE call inputs: an account type and filing
/// status that may be the empty string to mean "use the default",
/// dependent count, the two incomes, prior rollover, and the cost(s) to
/// size a contribution against.
#[derive(Debug, Clone)]
pub struct FsaeRequest {
    pub account_type_id: String,
    pub filing_status_id: String,
    pub number_of_dependents: u32,
    pub primary_annual_income: Cents,
    pub spouse_annual_income: Cents,
    pub rollover_amount: Cents,
    pub costs: Vec<Cents>,
}

impl FsaeRequest {
    pub fn single_cost(account_type_id: impl Into<String>, primary_income: Cents, cost: Cents) -> Self {
        FsaeRequest {
            account_type_id: account_type_id.into(),
            filing_status_id: "single".to_string(),
            number_of_dependents: 0,
            primary_annual_income: primary_income,
            spouse_annual_income: Cents::ZERO,
            rollover_amount: Cents::ZERO,
            costs: vec![cost],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsaeResult {
    pub account_type_id: AccountTypeId,
    pub account_type_description: String,
    pub total_costs: Cents,
    pub suggested_contribution: Cents,
    pub employer_matching_contribution: Cents,
    pub federal_income_tax_savings: Cents,
    pub fica_tax_savings: Cents,
    pub total_tax_savings: Cents,
    pub total_match_and_tax_savings: Cents,
    pub elapsed_msec: u128,
}

/// "marriedFilingJoint" is the one filing status whose federal-tax
/// calculation considers the spouse's income at all; FICA
/// savings are always computed on `primaryAnnualIncome` alone regardless of
/// filing status, since FICA is withheld per-wage-earner, not per-household.
const MARRIED_FILING_JOINT: &str = "marriedFilingJoint";

pub fn calculate(cfg: &PreparedConfig, request: &FsaeRequest) -> Result<FsaeResult, CallError> {
    let start = Instant::now();

    let account_type_id = if request.account_type_id.is_empty() {
        cfg.account_types_order
            .first()
            .cloned()
            .ok_or_else(|| CallError::UnknownAccountType(AccountTypeId::from("")))?
    } else {
        AccountTypeId::from(request.account_type_id.as_str())
    };
    let account = cfg
        .account_types
        .get(&account_type_id)
        .ok_or_else(|| CallError::UnknownAccountType(account_type_id.clone()))?;

    let filing_status_id = if request.filing_status_id.is_empty() { "single" } else { request.filing_status_id.as_str() };
    let filing = cfg
        .filing_statuses
        .get(filing_status_id)
        .ok_or_else(|| CallError::UnknownFilingStatus(filing_status_id.to_string()))?;

    let total_costs: Cents = request.costs.iter().copied().sum();
    let contributions = calculate_contributions(account, total_costs, request.rollover_amount);

    let household_income_before = if filing_status_id == MARRIED_FILING_JOINT {
        request.primary_annual_income + request.spouse_annual_income
    } else {
        request.primary_annual_income
    };
    let household_income_after = Cents(household_income_before.0 - contributions.suggested_contribution.0);

    let fed_before = calculate_federal_income_tax(household_income_before, filing, request.number_of_dependents);
    let fed_after = calculate_federal_income_tax(household_income_after, filing, request.number_of_dependents);
    let federal_income_tax_savings = Cents(fed_before.0 - fed_after.0);

    let ss_limit = Cents::from_dollars(cfg.fica.social_security_limit);
    let primary_income_after = Cents(request.primary_annual_income.0 - contributions.suggested_contribution.0);
    let fica_before = calculate_fica_payroll_taxes(request.primary_annual_income, ss_limit, cfg.fica.social_security_rate, cfg.fica.medicare_rate);
    let fica_after = calculate_fica_payroll_taxes(primary_income_after, ss_limit, cfg.fica.social_security_rate, cfg.fica.medicare_rate);
    let fica_tax_savings = Cents(fica_before.0 - fica_after.0);

    let total_tax_savings = federal_income_tax_savings + fica_tax_savings;
    let total_match_and_tax_savings = total_tax_savings + contributions.employer_matching_contribution;

    Ok(FsaeResult {
        account_type_id,
        account_type_description: account.description.clone(),
        total_costs,
        suggested_contribution: contributions.suggested_contribution,
        employer_matching_contribution: contributions.employer_matching_contribution,
        federal_income_tax_savings,
        fica_tax_savings,
        total_tax_savings,
        total_match_and_tax_savings,
        elapsed_msec: start.elapsed().as_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_str, prepare};

    fn prepared() -> PreparedConfig {
        let raw = load_config_str(include_str!("../tests/fixtures/minimal_config.json")).unwrap();
        prepare(raw).unwrap()
    }

    /// Single filer, low usage.
    #[test]
    fn s1_single_filer_low_usage() {
        let cfg = prepared();
        let request = FsaeRequest::single_cost("FSA", Cents::from_dollars(60_000.0), Cents::from_dollars(1000.0));
        let result = calculate(&cfg, &request).unwrap();

        assert_eq!(result.suggested_contribution, Cents::from_dollars(1000.0));
        assert_eq!(result.employer_matching_contribution, Cents::ZERO);
        assert_eq!(result.federal_income_tax_savings, Cents::from_dollars(250.0));
        assert_eq!(result.fica_tax_savings, Cents::from_dollars(76.50));
        assert_eq!(result.total_tax_savings, Cents::from_dollars(326.50));
        assert_eq!(result.total_match_and_tax_savings, Cents::from_dollars(326.50));
    }

    /// Married filing joint, high income.
    #[test]
    fn s2_married_joint_high_income() {
        let cfg = prepared();
        let request = FsaeRequest {
            account_type_id: "FSA".to_string(),
            filing_status_id: MARRIED_FILING_JOINT.to_string(),
            number_of_dependents: 0,
            primary_annual_income: Cents::from_dollars(200_000.0),
            spouse_annual_income: Cents::ZERO,
            rollover_amount: Cents::ZERO,
            costs: vec![Cents::from_dollars(2600.0)],
        };
        let result = calculate(&cfg, &request).unwrap();

        assert_eq!(result.suggested_contribution, Cents::from_dollars(2600.0));
        assert_eq!(result.federal_income_tax_savings, Cents::from_dollars(728.0));
        assert_eq!(result.fica_tax_savings, Cents::from_dollars(198.90));
    }

    #[test]
    fn zero_cost_suggests_zero_contribution() {
        let cfg = prepared();
        let request = FsaeRequest::single_cost("FSA", Cents::from_dollars(60_000.0), Cents::ZERO);
        let result = calculate(&cfg, &request).unwrap();
        assert_eq!(result.suggested_contribution, Cents::ZERO);
        assert_eq!(result.employer_matching_contribution, Cents::ZERO);
    }

    #[test]
    fn empty_account_and_filing_status_default() {
        let cfg = prepared();
        let request = FsaeRequest {
            account_type_id: String::new(),
            filing_status_id: String::new(),
            number_of_dependents: 0,
            primary_annual_income: Cents::from_dollars(60_000.0),
            spouse_annual_income: Cents::ZERO,
            rollover_amount: Cents::ZERO,
            costs: vec![Cents::from_dollars(1000.0)],
        };
        let result = calculate(&cfg, &request).unwrap();
        assert_eq!(result.account_type_id, AccountTypeId::from("FSA"));
    }

    #[test]
    fn unknown_account_type_is_reported() {
        let cfg = prepared();
        let request = FsaeRequest::single_cost("does_not_exist", Cents::from_dollars(60_000.0), Cents::from_dollars(100.0));
        let err = calculate(&cfg, &request).unwrap_err();
        assert_eq!(err, CallError::UnknownAccountType(AccountTypeId::from("does_not_exist")));
    }

    #[test]
    fn fica_is_piecewise_linear_with_a_slope_change_at_the_ss_limit() {
        // FICA is non-decreasing and piecewise-linear, with a slope change
        // once income crosses the social security limit.
        let limit = Cents::from_dollars(300_000.0);
        let below = calculate_fica_payroll_taxes(Cents::from_dollars(100_000.0), limit, 0.062, 0.0145);
        let at = calculate_fica_payroll_taxes(limit, limit, 0.062, 0.0145);
        let above = calculate_fica_payroll_taxes(Cents::from_dollars(400_000.0), limit, 0.062, 0.0145);
        assert!(below < at);
        assert!(at < above);
        // Above the limit, an extra dollar of income only adds the Medicare
        // share — not the combined rate below the limit.
        let one_more_above = calculate_fica_payroll_taxes(Cents::from_dollars(400_001.0), limit, 0.062, 0.0145);
        assert_eq!(one_more_above.0 - above.0, 1); // 1 cent ~= $0.01 * medicareRate*100 rounded
    }
}
