//! Core types for provisioning runs

use crate::resource::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal outcome of applying one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    /// Resource was created
    Created,
    /// Resource existed and was updated in place
    Updated,
    /// Conditional resource was already present; nothing was submitted
    SkippedExisting,
    /// Apply failed
    Failed { error: String },
    /// A dependency did not succeed, so this resource was never attempted
    Blocked { by: ResourceId },
}

impl Outcome {
    /// Check if the outcome lets dependents proceed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::SkippedExisting)
    }

    /// Check if the outcome represents a store mutation
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::SkippedExisting => "skipped-existing",
            Self::Failed { .. } => "failed",
            Self::Blocked { .. } => "blocked",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Blocked { by } => write!(f, "blocked by {by}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Where a resource is in its apply lifecycle
///
/// `Pending -> Checking (conditional only) -> Creating | Skipped -> Done`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Pending,
    /// Existence check in flight
    Checking,
    /// Create or create-or-update submitted
    Creating,
    /// Existence check found the resource; no mutation will follow
    Skipped,
    Done(Outcome),
}

/// Overall status of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome recorded for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub id: ResourceId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// An in-progress deployment run
///
/// Created when a run starts and only ever appended to. [`DeploymentRun::finish`]
/// consumes it and yields the read-only [`RunReport`].
#[derive(Debug)]
pub struct DeploymentRun {
    name: String,
    started_at: DateTime<Utc>,
    template_digest: String,
    outcomes: Vec<ResourceOutcome>,
}

impl DeploymentRun {
    /// Start a run. Without a name, one is derived from the start time.
    pub fn start(name: Option<String>, template_digest: impl Into<String>) -> Self {
        let started_at = Utc::now();
        let name = name.unwrap_or_else(|| format!("deploy-{}", started_at.format("%Y%m%d%H%M%S")));
        Self {
            name,
            started_at,
            template_digest: template_digest.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append the terminal outcome of a resource
    pub fn record(&mut self, id: ResourceId, outcome: Outcome) {
        self.outcomes.push(ResourceOutcome { id, outcome });
    }

    /// Outcome recorded for `id`, if it has reached a terminal state
    pub fn outcome(&self, id: &ResourceId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| &o.id == id)
            .map(|o| &o.outcome)
    }

    /// Finalize the run
    pub fn finish(self) -> RunReport {
        let status = if self.outcomes.iter().all(|o| o.outcome.is_success()) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        RunReport {
            name: self.name,
            started_at: self.started_at,
            finished_at: Utc::now(),
            template_digest: self.template_digest,
            outcomes: self.outcomes,
            status,
        }
    }
}

/// Read-only record of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    name: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    template_digest: String,
    outcomes: Vec<ResourceOutcome>,
    status: RunStatus,
}

impl RunReport {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn template_digest(&self) -> &str {
        &self.template_digest
    }

    /// Outcomes in the order resources were applied
    pub fn outcomes(&self) -> &[ResourceOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, id: &ResourceId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| &o.id == id)
            .map(|o| &o.outcome)
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for o in &self.outcomes {
            summary.add_outcome(&o.outcome);
        }
        summary
    }
}

/// Summary counts of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl ExecuteSummary {
    /// Total number of store mutations
    pub fn total_changes(&self) -> usize {
        self.created + self.updated
    }

    /// Check if execution was fully successful
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed + self.blocked
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::SkippedExisting => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Blocked { .. } => self.blocked += 1,
        }
    }
}

/// Backoff policy for transient lookup failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Options for a deployment run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Run name; derived from the start time when absent
    pub name: Option<String>,
    /// Number of resources applied concurrently within one dependency wave
    pub jobs: usize,
    pub retry: RetryConfig,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            name: None,
            jobs: 1,
            retry: RetryConfig::default(),
        }
    }
}
