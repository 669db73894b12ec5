//! Opaque string identifiers for the named entities in a configuration.
//!
//! Every id space (region, plan, status, ...) gets its own newtype so the
//! type system keeps them apart instead of relying on convention — a
//! `PlanId` can never be passed where a `RegionId` is expected.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(Arc::from(s.as_str()))
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(RegionId, "A region identifier, e.g. `\"CA\"` or `\"AZ\"`.");
define_id!(PlanId, "A plan identifier, e.g. `\"PPO_300\"` or `\"CDHP\"`.");
define_id!(StatusId, "An employment status identifier, e.g. `\"fullTime\"`.");
define_id!(CoverageLevelId, "A coverage-level identifier, e.g. `\"employeeOnly\"`.");
define_id!(ServiceId, "A service identifier, e.g. `\"primaryCarePhysician\"`.");
define_id!(CategoryId, "A service-category identifier, e.g. `\"outpatient\"`.");
define_id!(GroupId, "A deductible/OOP limit-group identifier; `\"general\"` is the catch-all.");
define_id!(CombinedLimitId, "A combined-reimbursement-limit identifier.");
define_id!(AccountTypeId, "An FSA/HSA account-type identifier.");

impl GroupId {
    pub fn general() -> Self {
        GroupId::from("general")
    }

    pub fn is_general(&self) -> bool {
        self.as_str() == "general"
    }
}
