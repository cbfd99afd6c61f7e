//! Resources preparer converges
//!
//! Every piece of work is a [`declarative::Resource`]:
//! - [`ArtifactResource`] - an installed `<app>_<version>` directory
//! - [`ConfigResource`] - a content-addressed config object
//!
//! Both lock on their target path, so two resources that would write the
//! same place never run at once.

pub mod artifact;
pub mod config_file;

pub use artifact::ArtifactResource;
pub use config_file::ConfigResource;

pub use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
