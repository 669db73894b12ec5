//! Configuration loading, validation, and preparation.
//!
//! `types` is the raw JSON image; `validate` is the C1 validator;
//! `marker` is the C2 one-shot preparer producing the immutable
//! [`PreparedConfig`](marker::PreparedConfig) every other component consumes;
//! `polymap` resolves the polymorphic amount-map JSON shapes both of the
//! above need; `loader` turns a file or string into a `RawConfig`.

pub mod loader;
pub mod marker;
pub mod polymap;
pub mod types;
pub mod validate;

pub use loader::{load_config_file, load_config_str};
pub use marker::{prepare, PreparedConfig};
pub use types::RawConfig;
