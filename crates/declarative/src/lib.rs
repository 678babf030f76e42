//! # Declarative
//!
//! An idempotent, declarative provisioning engine.
//!
//! A template declares resources, their parameters and the order they must
//! be applied in. Each run walks the resources in dependency order and, for
//! each one, either submits a create-or-update or, for resources marked
//! `create-if-absent`, asks the store whether the resource already exists
//! and creates it only if it does not. Running the same template twice is
//! safe: the second run skips every conditional resource the first one
//! created.
//!
//! ## Core Concepts
//!
//! - **Template**: declared resources, loaded from TOML or JSON
//! - **ExecutionPlan**: the template's resources in a valid apply order
//! - **ResourceStore**: the external system of record
//! - **Provisioner**: applies one resource and returns its [`Outcome`]
//! - **RunReport**: the read-only record of a finished run
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, MemoryStore, execute_simple, load, TemplateFormat};
//! use std::collections::BTreeMap;
//!
//! let source = r#"
//! [[resource]]
//! type = "vault"
//! name = "kv-demo"
//!
//! [[resource]]
//! type = "secret"
//! name = "api-key"
//! parent = "vault/kv-demo"
//! policy = "create-if-absent"
//! [resource.params]
//! value = { generate = { length = 32 } }
//! "#;
//!
//! let store = MemoryStore::new();
//! let plan = load(source, TemplateFormat::Toml, &BTreeMap::new())?;
//! let report = execute_simple(&plan, &store, &ExecuteOptions::default())?;
//! assert!(report.is_success());
//! ```
//!
//! ## Provider Traits
//!
//! - [`ResourceStore`]: existence checks and writes against the real store
//! - [`ProgressCallback`]: receives progress updates
//! - [`RetryCallback`]: notified before each lookup retry
//!
//! Secret parameters are wrapped in [`SecretValue`], whose `Debug` and
//! `Display` output is redacted.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resolver;
pub mod resource;
pub mod retry;
pub mod secret;
pub mod store;
pub mod template;
pub mod types;

use std::collections::BTreeMap;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback, ResourceStore, WriteOutcome};
pub use diff::{PlannedAction, PlannedChange, PreviewSummary, preview};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{Provisioner, execute, execute_simple};
pub use planner::ExecutionPlan;
pub use resolver::ExistenceResolver;
pub use resource::{CreationPolicy, ParamValue, Params, Resource, ResourceId};
pub use retry::{LogCallback, RetryCallback, with_retry};
pub use secret::{Charset, SecretOrigin, SecretValue};
pub use store::{MemoryStore, StoreCall};
pub use template::{Template, TemplateFormat};
pub use types::{
    DeploymentRun, ExecuteOptions, ExecuteSummary, Outcome, Phase, ResourceOutcome, RetryConfig,
    RunReport, RunStatus,
};

/// Parse a template and order its resources
///
/// Fails with [`Error::Parse`] on malformed input or unresolved references
/// and with [`Error::Cycle`] on circular dependencies.
pub fn load(
    source: &str,
    format: TemplateFormat,
    overrides: &BTreeMap<String, String>,
) -> Result<ExecutionPlan> {
    ExecutionPlan::from_template(Template::parse(source, format, overrides)?)
}
