//! The cost-estimation engine: C4 (service evaluator), C5 (plan evaluator),
//! and C6 (the public `calculate` entry point), layered on the running
//! budgets in [`budgets`].

pub mod budgets;
pub mod mpce;
pub mod plan_eval;
pub mod service_eval;

pub use mpce::{calculate, MpceResponse, PlanRequest};
pub use plan_eval::{evaluate_plan, PlanCallParams, PlanResult};
