//! Installed artifact resource

use anyhow::Result;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::install::{InstallOutcome, Installer};
use crate::intent::WorkItem;
use crate::paths;

/// One (app, version) that must exist under `installs/`
#[derive(Clone)]
pub struct ArtifactResource {
    pub item: WorkItem,
    installer: Installer,
}

impl std::fmt::Debug for ArtifactResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactResource")
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

impl ArtifactResource {
    pub fn new(item: WorkItem, installer: Installer) -> Self {
        Self { item, installer }
    }

    pub fn target(&self) -> PathBuf {
        paths::install_dir(&self.item.basedir, &self.item.app, &self.item.version)
    }

    fn present(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.target().display().to_string()),
        }
    }
}

impl Resource for ArtifactResource {
    fn id(&self) -> String {
        format!("{}@{}", self.item.app, self.item.version)
    }

    fn description(&self) -> String {
        format!(
            "Install {} into {}",
            self.installer.locate(&self.item),
            self.target().display()
        )
    }

    fn resource_type(&self) -> &'static str {
        "artifact"
    }

    fn lock_key(&self) -> String {
        self.target().to_string_lossy().into_owned()
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.installer.is_installed(&self.item) {
            Ok(self.present())
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        self.present()
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            if self.installer.is_installed(&self.item) {
                return Ok(ApplyResult::NoChange);
            }
            return Ok(ApplyResult::Skipped {
                reason: format!("Dry run: would install {}", self.target().display()),
            });
        }

        match self.installer.install(&self.item)? {
            InstallOutcome::AlreadyInstalled => Ok(ApplyResult::NoChange),
            InstallOutcome::Installed(_) => Ok(ApplyResult::Created),
        }
    }
}
