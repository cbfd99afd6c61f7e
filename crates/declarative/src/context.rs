//! Apply context and progress reporting
//!
//! The progress trait lets callers route per-resource outcomes to their
//! own sink (logs, terminal, test collector) without this crate knowing
//! about any of them.

use crate::types::ApplyResult;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called once before the first resource is dispatched
    fn on_batch_start(&mut self, jobs: usize, dry_run: bool);

    /// Called when a resource application completes
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called after every dispatched resource has completed
    fn on_batch_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _jobs: usize, _dry_run: bool) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Context passed to resource apply operations
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}
