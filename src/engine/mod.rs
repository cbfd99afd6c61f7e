//! Reconciliation engine for preparer
//!
//! The engine orchestrates:
//! 1. Resolving - Read the node's intent from the KV store
//! 2. Planning - Turn each application into artifact and config resources
//! 3. Dispatching - Apply resources through the bounded worker pool

pub mod differ;
pub mod progress;
pub mod reconciler;

pub use progress::LogProgress;
pub use reconciler::{Plan, PollReport, Reconciler};
