//! Store and progress provider traits
//!
//! These traits let the engine run against any system of record (a cloud
//! control plane, a local file, an in-memory fake) and report progress to
//! any UI without depending on either.

use crate::error::Result;
use crate::resource::{Params, ResourceId};
use crate::types::{Outcome, Phase};

/// What a create-or-update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
}

/// External system of record for resource existence and state
///
/// Implementations map their native failures onto
/// [`Error::Lookup`](crate::Error::Lookup) (transient),
/// [`Error::NotAuthorized`](crate::Error::NotAuthorized) and
/// [`Error::AlreadyExists`](crate::Error::AlreadyExists).
pub trait ResourceStore: Send + Sync {
    /// Whether the resource currently exists. May be stale.
    fn exists(&self, id: &ResourceId) -> Result<bool>;

    /// Create a resource. Must fail with `AlreadyExists` if it is present.
    fn create(&self, id: &ResourceId, params: &Params) -> Result<()>;

    /// Replace the parameters of an existing resource.
    fn update(&self, id: &ResourceId, params: &Params) -> Result<()>;

    /// Create the resource, or update it if the create collides.
    ///
    /// Stores with a native upsert should override this.
    fn create_or_update(&self, id: &ResourceId, params: &Params) -> Result<WriteOutcome> {
        match self.create(id, params) {
            Ok(()) => Ok(WriteOutcome::Created),
            Err(e) if e.is_ignorable() => {
                self.update(id, params)?;
                Ok(WriteOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }
}

/// Progress callback for deployment runs
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a batch of resources that share no dependencies
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&mut self, id: &ResourceId, description: &str);

    /// Called on each lifecycle transition of a resource applied sequentially
    fn on_phase(&mut self, _id: &ResourceId, _phase: &Phase) {}

    /// Called when a resource reaches its terminal outcome
    fn on_resource_complete(&mut self, id: &ResourceId, outcome: &Outcome);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _id: &ResourceId, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &ResourceId, _outcome: &Outcome) {}
    fn on_batch_complete(&mut self) {}
}
