//! Medical Plan Cost Engine — a data-driven calculator that estimates the
//! end-of-year out-of-pocket cost a household would incur under each of
//! several candidate medical plans, given a hypothetical utilization of
//! medical services and a household composition.
//!
//! Two pure, synchronous entry points sit on top of a shared configuration
//! pipeline:
//!
//! - [`engine::calculate`] — the Medical Plan Cost Engine (MPCE): applies
//!   per-service coverage rules (deductibles, copays, coinsurance, dollar
//!   caps, combined reimbursement limits) against shared per-person and
//!   per-family budgets, for every plan offered in a region.
//! - [`fsae::calculate`] — the Flexible Spending / HSA Estimator (FSAE):
//!   sizes a pre-tax account contribution and computes the federal income
//!   tax and FICA savings it buys.
//!
//! Both consume a [`config::PreparedConfig`], produced once by
//! [`config::prepare`] from a [`config::RawConfig`] — the validator (C1)
//! and marker (C2) run inside `prepare`, so every other component only ever
//! sees already-validated, already-normalized data.

pub mod config;
pub mod engine;
pub mod error;
pub mod fsae;
pub mod household;
pub mod ids;
pub mod money;

pub use config::{load_config_file, load_config_str, prepare, PreparedConfig, RawConfig};
pub use engine::{calculate, MpceResponse, PlanCallParams, PlanRequest, PlanResult};
pub use error::{CallError, CallResult, ConfigError, ConfigResult};
pub use household::{resolve_coverage_level, Household, Member};
pub use money::Cents;
