//! AWS Lambda handler for the Medical Plan Cost Engine and FSA/HSA estimator.
//!
//! This Lambda function accepts a plan configuration plus one household
//! scenario and returns either the MPCE per-plan cost breakdown or an FSAE
//! contribution/savings estimate, selected by the request's `mode` field.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use medplan_cost_engine::config::{prepare, RawConfig};
use medplan_cost_engine::fsae::{self, FsaeRequest};
use medplan_cost_engine::household::{Household, Member};
use medplan_cost_engine::ids::{PlanId, RegionId, ServiceId, StatusId};
use medplan_cost_engine::money::Cents;
use medplan_cost_engine::{calculate, PlanCallParams, PlanRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_mode() -> String {
    "price".to_string()
}

/// Input for a single invocation. `config` is the whole plan configuration
/// JSON document, embedded inline rather than loaded from a file path — the
/// function has no filesystem to read a config from, so the caller ships it
/// with every request, same as the projection engine's `inforce_csv` field.
#[derive(Debug, Deserialize)]
pub struct MedplanRequest {
    /// `"price"` runs the cost engine, `"fsae"` runs the account estimator.
    #[serde(default = "default_mode")]
    pub mode: String,

    pub config: RawConfig,

    #[serde(default)]
    pub region_id: String,
    #[serde(default)]
    pub status_id: String,
    #[serde(default)]
    pub primary_services: HashMap<String, u32>,
    #[serde(default)]
    pub spouse_services: Option<HashMap<String, u32>>,
    #[serde(default)]
    pub children_services: Vec<HashMap<String, u32>>,
    #[serde(default)]
    pub plan_params: HashMap<String, PlanParamsInput>,

    #[serde(default)]
    pub account_type_id: String,
    #[serde(default)]
    pub filing_status_id: String,
    #[serde(default)]
    pub number_of_dependents: u32,
    #[serde(default)]
    pub primary_annual_income: f64,
    #[serde(default)]
    pub spouse_annual_income: f64,
    #[serde(default)]
    pub rollover_amount: f64,
    #[serde(default)]
    pub costs: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanParamsInput {
    #[serde(default)]
    pub rollover: f64,
    #[serde(default)]
    pub voluntary_contribution: f64,
    #[serde(default)]
    pub premium_adjustment: f64,
    #[serde(default)]
    pub additional_match: f64,
}

impl From<&PlanParamsInput> for PlanCallParams {
    fn from(p: &PlanParamsInput) -> Self {
        PlanCallParams {
            rollover: Cents::from_dollars(p.rollover),
            voluntary_contribution: Cents::from_dollars(p.voluntary_contribution),
            premium_adjustment: Cents::from_dollars(p.premium_adjustment),
            additional_match: Cents::from_dollars(p.additional_match),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanResultOutput {
    pub plan_id: String,
    pub total_deductibles: f64,
    pub total_copays: f64,
    pub total_coinsurance: f64,
    pub total_expenses_not_covered: f64,
    pub total_fund_amount_offset: f64,
    pub annual_premium_after_adjustment: f64,
    pub annual_total: f64,
}

#[derive(Debug, Serialize)]
pub struct FsaeResultOutput {
    pub account_type_id: String,
    pub suggested_contribution: f64,
    pub employer_matching_contribution: f64,
    pub federal_income_tax_savings: f64,
    pub fica_tax_savings: f64,
    pub total_tax_savings: f64,
    pub total_match_and_tax_savings: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct MedplanResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plans: Option<Vec<PlanResultOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsae: Option<FsaeResultOutput>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn services_map(raw: &HashMap<String, u32>) -> HashMap<ServiceId, u32> {
    raw.iter().map(|(k, v)| (ServiceId::from(k.as_str()), *v)).collect()
}

fn error_response(start: std::time::Instant, message: String) -> MedplanResponse {
    MedplanResponse { execution_time_ms: start.elapsed().as_millis() as u64, error: Some(message), ..Default::default() }
}

async fn handler(event: LambdaEvent<MedplanRequest>) -> Result<MedplanResponse, Error> {
    let start = std::time::Instant::now();
    let request = event.payload;

    let cfg = match prepare(request.config.clone()) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(error_response(start, format!("invalid configuration: {e}"))),
    };

    if request.mode == "fsae" {
        let fsae_request = FsaeRequest {
            account_type_id: request.account_type_id.clone(),
            filing_status_id: request.filing_status_id.clone(),
            number_of_dependents: request.number_of_dependents,
            primary_annual_income: Cents::from_dollars(request.primary_annual_income),
            spouse_annual_income: Cents::from_dollars(request.spouse_annual_income),
            rollover_amount: Cents::from_dollars(request.rollover_amount),
            costs: request.costs.iter().map(|c| Cents::from_dollars(*c)).collect(),
        };
        return Ok(match fsae::calculate(&cfg, &fsae_request) {
            Ok(result) => MedplanResponse {
                fsae: Some(FsaeResultOutput {
                    account_type_id: result.account_type_id.to_string(),
                    suggested_contribution: result.suggested_contribution.to_dollars(),
                    employer_matching_contribution: result.employer_matching_contribution.to_dollars(),
                    federal_income_tax_savings: result.federal_income_tax_savings.to_dollars(),
                    fica_tax_savings: result.fica_tax_savings.to_dollars(),
                    total_tax_savings: result.total_tax_savings.to_dollars(),
                    total_match_and_tax_savings: result.total_match_and_tax_savings.to_dollars(),
                }),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            },
            Err(e) => error_response(start, e.to_string()),
        });
    }

    let mut members = vec![Member::primary("primary").with_services(services_map(&request.primary_services))];
    if let Some(spouse) = &request.spouse_services {
        members.push(Member::spouse("spouse").with_services(services_map(spouse)));
    }
    for (i, child) in request.children_services.iter().enumerate() {
        members.push(Member::child(format!("child{i}")).with_services(services_map(child)));
    }
    let household = match Household::new(members) {
        Ok(h) => h,
        Err(e) => return Ok(error_response(start, e.to_string())),
    };

    let plan_params: PlanRequest =
        request.plan_params.iter().map(|(plan_id, p)| (PlanId::from(plan_id.as_str()), PlanCallParams::from(p))).collect();

    let response = calculate(
        &cfg,
        &RegionId::from(request.region_id.as_str()),
        &StatusId::from(request.status_id.as_str()),
        &household,
        &plan_params,
    );

    Ok(match response {
        Ok(response) => {
            let plans = cfg
                .plans_order
                .iter()
                .filter_map(|plan_id| {
                    response.plans.get(plan_id).map(|r| PlanResultOutput {
                        plan_id: plan_id.to_string(),
                        total_deductibles: r.total_deductibles.to_dollars(),
                        total_copays: r.total_copays.to_dollars(),
                        total_coinsurance: r.total_coinsurance.to_dollars(),
                        total_expenses_not_covered: r.total_expenses_not_covered.to_dollars(),
                        total_fund_amount_offset: r.total_fund_amount_offset.to_dollars(),
                        annual_premium_after_adjustment: r.annual_premium_after_adjustment.to_dollars(),
                        annual_total: r.annual_total.to_dollars(),
                    })
                })
                .collect();
            MedplanResponse {
                coverage_level: Some(response.coverage_level.to_string()),
                plans: Some(plans),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            }
        }
        Err(e) => error_response(start, e.to_string()),
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    lambda_runtime::run(service_fn(handler)).await
}
