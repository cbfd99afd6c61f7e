//! # Declarative
//!
//! A framework for declarative resource convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging a system to match it.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (an installed
//!   artifact, a generated file)
//! - **ResourceState**: The current or desired state of a resource
//! - **Dispatcher**: The producer side of a zero-capacity hand-off channel
//! - **dispatch**: Streams resources to a bounded worker pool, never applying
//!   two resources with the same lock key at once
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{dispatch, ExecuteOptions, NoProgress};
//!
//! let summary = dispatch(&ExecuteOptions::default(), &mut NoProgress, |d| {
//!     for resource in discover()? {
//!         d.submit(resource)?;
//!     }
//!     Ok(())
//! })?;
//! println!("{} created, {} failed", summary.created, summary.failed);
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: Receives per-resource outcomes
//!
//! Callers plug in their own reporting without this crate depending on a
//! particular logger or terminal library.

pub mod context;
pub mod diff;
pub mod dispatch;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use dispatch::{DispatchError, Dispatcher, dispatch};
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceState};
