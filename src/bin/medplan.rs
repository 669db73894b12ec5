//! Medical Plan Cost Engine CLI.
//!
//! Three subcommands sit directly on top of the library's two pure
//! entrypoints: `price` and `batch` call [`medplan_cost_engine::calculate`]
//! (single household and CSV fan-out respectively), `fsae` calls
//! [`medplan_cost_engine::fsae::calculate`]. No business rule lives here —
//! this binary only parses external input, calls the library, and prints
//! or writes the result.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use rayon::prelude::*;
use serde::Deserialize;

use medplan_cost_engine::config::{load_config_file, prepare, PreparedConfig};
use medplan_cost_engine::engine::{calculate, PlanCallParams, PlanRequest};
use medplan_cost_engine::fsae;
use medplan_cost_engine::household::{Household, Member};
use medplan_cost_engine::ids::{PlanId, RegionId, ServiceId, StatusId};
use medplan_cost_engine::money::Cents;

#[derive(Parser)]
#[command(name = "medplan", about = "Medical plan cost and pre-tax account savings estimator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Price every plan offered in a region for one household scenario.
    Price(PriceArgs),
    /// Run many household scenarios from a CSV file, one row per household.
    Batch(BatchArgs),
    /// Estimate the FSA/HSA contribution and tax savings for one household.
    Fsae(FsaeArgs),
}

#[derive(Parser)]
struct PriceArgs {
    /// Path to the JSON plan configuration.
    #[arg(long)]
    config: PathBuf,
    /// Path to a JSON household-scenario request (see `HouseholdRequest`).
    #[arg(long)]
    household: PathBuf,
}

#[derive(Parser)]
struct BatchArgs {
    /// Path to the JSON plan configuration.
    #[arg(long)]
    config: PathBuf,
    /// Path to a CSV of household scenarios, one row per household.
    #[arg(long)]
    scenarios: PathBuf,
    /// Path to write the per-row/per-plan totals CSV to.
    #[arg(long, default_value = "medplan_batch_output.csv")]
    output: PathBuf,
}

#[derive(Parser)]
struct FsaeArgs {
    /// Path to the JSON plan configuration.
    #[arg(long)]
    config: PathBuf,
    /// Empty string selects the first configured account type.
    #[arg(long, default_value = "")]
    account_type: String,
    #[arg(long, default_value = "single")]
    filing_status: String,
    #[arg(long, default_value_t = 0)]
    dependents: u32,
    #[arg(long)]
    primary_income: f64,
    #[arg(long, default_value_t = 0.0)]
    spouse_income: f64,
    #[arg(long, default_value_t = 0.0)]
    rollover: f64,
    /// One target cost; repeat the flag to sum several.
    #[arg(long = "cost", required = true)]
    costs: Vec<f64>,
}

/// JSON shape for `price --household`: one primary member (required), an
/// optional spouse, any number of children, and optional per-plan call
/// overrides — the direct image of the MPCE call's external inputs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HouseholdRequest {
    region_id: String,
    status_id: String,
    #[serde(default)]
    primary_services: HashMap<String, u32>,
    #[serde(default)]
    spouse_services: Option<HashMap<String, u32>>,
    #[serde(default)]
    children_services: Vec<HashMap<String, u32>>,
    #[serde(default)]
    plan_params: HashMap<String, PlanParamsJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanParamsJson {
    #[serde(default)]
    rollover: f64,
    #[serde(default)]
    voluntary_contribution: f64,
    #[serde(default)]
    premium_adjustment: f64,
    #[serde(default)]
    additional_match: f64,
}

impl From<&PlanParamsJson> for PlanCallParams {
    fn from(p: &PlanParamsJson) -> Self {
        PlanCallParams {
            rollover: Cents::from_dollars(p.rollover),
            voluntary_contribution: Cents::from_dollars(p.voluntary_contribution),
            premium_adjustment: Cents::from_dollars(p.premium_adjustment),
            additional_match: Cents::from_dollars(p.additional_match),
        }
    }
}

fn services_map(raw: &HashMap<String, u32>) -> HashMap<ServiceId, u32> {
    raw.iter().map(|(k, v)| (ServiceId::from(k.as_str()), *v)).collect()
}

fn build_household(req: &HouseholdRequest) -> Result<Household> {
    let mut members = vec![Member::primary("primary").with_services(services_map(&req.primary_services))];
    if let Some(spouse) = &req.spouse_services {
        members.push(Member::spouse("spouse").with_services(services_map(spouse)));
    }
    for (i, child) in req.children_services.iter().enumerate() {
        members.push(Member::child(format!("child{i}")).with_services(services_map(child)));
    }
    Ok(Household::new(members)?)
}

fn build_plan_params(req: &HouseholdRequest) -> PlanRequest {
    req.plan_params.iter().map(|(plan_id, p)| (PlanId::from(plan_id.as_str()), PlanCallParams::from(p))).collect()
}

fn load_prepared_config(path: &PathBuf) -> Result<PreparedConfig> {
    let raw = load_config_file(path).with_context(|| format!("loading {}", path.display()))?;
    prepare(raw).context("validating configuration")
}

fn run_price(args: PriceArgs) -> Result<()> {
    info!("loading configuration from {}", args.config.display());
    let cfg = load_prepared_config(&args.config)?;

    let household_json = std::fs::read_to_string(&args.household).with_context(|| format!("reading {}", args.household.display()))?;
    let request: HouseholdRequest = serde_json::from_str(&household_json).context("parsing household request")?;

    let household = build_household(&request)?;
    let plan_params = build_plan_params(&request);

    debug!("resolving coverage level and evaluating plans for region {}", request.region_id);
    let response = calculate(&cfg, &RegionId::from(request.region_id.as_str()), &StatusId::from(request.status_id.as_str()), &household, &plan_params)?;

    println!("Coverage level: {}", response.coverage_level);
    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>14} {:>12} {:>14} {:>12}",
        "Plan", "Deductible", "Copays", "Coinsurance", "NotCovered", "FundOffset", "Premium", "AnnualTotal"
    );
    let mut cheapest: Option<Cents> = None;
    for plan_id in &cfg.plans_order {
        let Some(r) = response.plans.get(plan_id) else { continue };
        println!(
            "{:<20} {:>12} {:>12} {:>12} {:>14} {:>12} {:>14} {:>12}",
            plan_id.as_str(),
            r.total_deductibles,
            r.total_copays,
            r.total_coinsurance,
            r.total_expenses_not_covered,
            r.total_fund_amount_offset,
            r.annual_premium_after_adjustment,
            r.annual_total,
        );
        cheapest = Some(cheapest.map_or(r.annual_total, |c| c.min(r.annual_total)));
    }

    if let (Some(cheapest_total), Some(account_type_id)) = (cheapest, cfg.account_types_order.first()) {
        let account = &cfg.account_types[account_type_id];
        let suggestion = fsae::calculate_contributions(account, cheapest_total, Cents::ZERO);
        println!(
            "\nFSAE suggestion ({account_type_id}) sized to the cheapest plan's total cost ({cheapest_total}):"
        );
        println!("  Suggested contribution: {}", suggestion.suggested_contribution);
        println!("  Employer match:          {}", suggestion.employer_matching_contribution);
    }

    info!("priced {} plan(s) in {}ms", response.plans.len(), response.elapsed_msec);
    Ok(())
}

/// One row of the batch scenarios CSV: the fixed household-shape columns
/// plus however many `svc:<serviceId>` columns the config's services need.
/// `csv` has no typed support for a variable column set, so rows are read
/// as string records against the header: fixed columns parse straight into
/// their fields, and the open-ended `svc:*` columns fall back to a
/// by-name lookup.
struct ScenarioRow {
    region_id: String,
    status_id: String,
    has_spouse: bool,
    num_children: usize,
    services: HashMap<ServiceId, u32>,
}

fn parse_scenarios(path: &PathBuf) -> Result<Vec<ScenarioRow>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut region_id = String::new();
        let mut status_id = String::new();
        let mut has_spouse = false;
        let mut num_children = 0usize;
        let mut services = HashMap::new();

        for (idx, header) in headers.iter().enumerate() {
            let Some(value) = record.get(idx) else { continue };
            match header {
                "regionId" => region_id = value.to_string(),
                "statusId" => status_id = value.to_string(),
                "hasSpouse" => has_spouse = value.eq_ignore_ascii_case("true") || value == "1",
                "numChildren" => num_children = value.parse().unwrap_or(0),
                other => {
                    if let Some(service_id) = other.strip_prefix("svc:") {
                        if let Ok(count) = value.parse::<u32>() {
                            if count > 0 {
                                services.insert(ServiceId::from(service_id), count);
                            }
                        }
                    }
                }
            }
        }

        rows.push(ScenarioRow { region_id, status_id, has_spouse, num_children, services });
    }
    Ok(rows)
}

fn run_batch(args: BatchArgs) -> Result<()> {
    info!("loading configuration from {}", args.config.display());
    let cfg = load_prepared_config(&args.config)?;

    let rows = parse_scenarios(&args.scenarios)?;
    info!("loaded {} household scenario(s)", rows.len());

    let results: Vec<(usize, Result<medplan_cost_engine::MpceResponse, medplan_cost_engine::CallError>)> = rows
        .par_iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut members = vec![Member::primary("primary").with_services(row.services.clone())];
            if row.has_spouse {
                members.push(Member::spouse("spouse"));
            }
            for i in 0..row.num_children {
                members.push(Member::child(format!("child{i}")));
            }
            let household = Household::new(members).expect("scenario row always carries a primary member");
            let result = calculate(&cfg, &RegionId::from(row.region_id.as_str()), &StatusId::from(row.status_id.as_str()), &household, &PlanRequest::new());
            (idx, result)
        })
        .collect();

    let mut writer = csv::Writer::from_path(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
    writer.write_record(["row", "planId", "deductibles", "copays", "coinsurance", "notCovered", "fundOffset", "premium", "annualTotal"])?;
    for (idx, result) in &results {
        match result {
            Ok(response) => {
                for plan_id in &cfg.plans_order {
                    let Some(r) = response.plans.get(plan_id) else { continue };
                    writer.write_record([
                        idx.to_string(),
                        plan_id.to_string(),
                        r.total_deductibles.to_string(),
                        r.total_copays.to_string(),
                        r.total_coinsurance.to_string(),
                        r.total_expenses_not_covered.to_string(),
                        r.total_fund_amount_offset.to_string(),
                        r.annual_premium_after_adjustment.to_string(),
                        r.annual_total.to_string(),
                    ])?;
                }
            }
            Err(e) => {
                log::warn!("row {idx} failed: {e}");
            }
        }
    }
    writer.flush()?;
    info!("wrote batch results to {}", args.output.display());
    Ok(())
}

fn run_fsae(args: FsaeArgs) -> Result<()> {
    let cfg = load_prepared_config(&args.config)?;

    let request = fsae::FsaeRequest {
        account_type_id: args.account_type,
        filing_status_id: args.filing_status,
        number_of_dependents: args.dependents,
        primary_annual_income: Cents::from_dollars(args.primary_income),
        spouse_annual_income: Cents::from_dollars(args.spouse_income),
        rollover_amount: Cents::from_dollars(args.rollover),
        costs: args.costs.iter().map(|c| Cents::from_dollars(*c)).collect(),
    };
    let result = fsae::calculate(&cfg, &request)?;

    println!("Account type:             {} ({})", result.account_type_id, result.account_type_description);
    println!("Total costs:              {}", result.total_costs);
    println!("Suggested contribution:   {}", result.suggested_contribution);
    println!("Employer match:           {}", result.employer_matching_contribution);
    println!("Federal income tax saved: {}", result.federal_income_tax_savings);
    println!("FICA tax saved:           {}", result.fica_tax_savings);
    println!("Total tax savings:        {}", result.total_tax_savings);
    println!("Total match + savings:    {}", result.total_match_and_tax_savings);
    info!("FSAE estimate for account {} computed in {}ms", result.account_type_id, result.elapsed_msec);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Price(args) => run_price(args),
        Command::Batch(args) => run_batch(args),
        Command::Fsae(args) => run_fsae(args),
    }
}
