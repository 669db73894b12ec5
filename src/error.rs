//! Error taxonomy for configuration validation and engine calls.
//!
//! Two kinds, matching the two distinct failure modes a caller sees:
//! [`ConfigError`] is produced once by the validator and is always fatal
//! and aggregated; [`CallError`] is produced per-call by the resolver,
//! engine, or FSAE estimator on a bad argument.

use crate::ids::{AccountTypeId, RegionId, StatusId};
use thiserror::Error;

/// A fatal, aggregated configuration problem.
///
/// Carries every distinct issue the validator found, sorted and
/// de-duplicated, so a caller sees the whole story in one report instead
/// of fixing issues one crash at a time.
#[derive(Debug, Error)]
#[error("invalid configuration ({} issue{}): {}", .issues.len(), if .issues.len() == 1 { "" } else { "s" }, .issues.join("; "))]
pub struct ConfigError {
    pub issues: Vec<String>,
}

impl ConfigError {
    pub fn from_issues(mut issues: Vec<String>) -> Self {
        issues.sort();
        issues.dedup();
        Self { issues }
    }
}

/// A fatal, per-call problem: an unknown identifier, a missing required
/// argument, or a household the coverage-level table cannot represent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("unknown region {0:?}")]
    UnknownRegion(RegionId),

    #[error("unknown status {0:?}")]
    UnknownStatus(StatusId),

    #[error("unknown account type {0:?}")]
    UnknownAccountType(AccountTypeId),

    #[error("unknown filing status {0:?}")]
    UnknownFilingStatus(String),

    #[error("household primary member is required")]
    MissingPrimary,

    #[error(
        "no coverage level covers a household with spouse={spouse} and {children} child(ren)"
    )]
    NoCoverageLevelForHousehold { spouse: bool, children: usize },

    /// "Non-sequence children" is a distinct fatal kind for callers whose
    /// `children` argument arrives as something other than an
    /// array (e.g. a dynamically-typed JSON caller). `Household`'s Rust API
    /// only ever accepts `Vec<Member>`, so this variant is unreachable from
    /// in-process Rust callers; it is kept so external serialized-call
    /// entrypoints (the CLI, the Lambda handler) have a matching error kind
    /// to report when they reject malformed request JSON before it ever
    /// reaches `Household::new`.
    #[error("children must be a sequence")]
    NonSequenceChildren,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type CallResult<T> = Result<T, CallError>;
