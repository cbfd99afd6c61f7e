//! Artifact installation
//!
//! An artifact is installed when `basedir/installs/<app>_<version>` exists.
//! It gets there in one step: the archive is extracted into a scratch
//! directory under `basedir/tmp/`, which is then renamed into place. A crash
//! at any point leaves either no target or a complete one, plus at worst a
//! stale scratch directory that nothing reads.

pub mod extract;
pub mod source;

pub use extract::{ExtractStats, extract_tar_gz};
pub use source::{ArtifactSource, LocalRepo};

use crate::fsutil;
use crate::intent::WorkItem;
use crate::paths;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for one extraction
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(600);

/// Mode given to an install directory before it is moved into place
const INSTALL_DIR_MODE: u32 = 0o755;

/// Failure to install one artifact
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("could not prepare scratch space in {}: {error}", dir.display())]
    Scratch {
        dir: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("could not open {from} for {}: {error}", to.display())]
    Open {
        from: String,
        to: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("could not extract {from} to {}: {error}", to.display())]
    Extract {
        from: String,
        to: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("could not move {} to {}: {error}", from.display(), to.display())]
    Place {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },
}

/// What `install` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled,
    Installed(ExtractStats),
}

/// Installs artifacts from one source
#[derive(Clone)]
pub struct Installer {
    source: Arc<dyn ArtifactSource>,
    extract_timeout: Duration,
}

impl Installer {
    pub fn new(source: Arc<dyn ArtifactSource>, extract_timeout: Duration) -> Self {
        Self {
            source,
            extract_timeout,
        }
    }

    /// Where the artifact is fetched from, for reporting
    pub fn locate(&self, item: &WorkItem) -> String {
        self.source.locate(&item.app, &item.version)
    }

    /// Whether the target directory exists
    ///
    /// Existence is the whole check: contents are never validated.
    pub fn is_installed(&self, item: &WorkItem) -> bool {
        fsutil::entry_exists(&paths::install_dir(&item.basedir, &item.app, &item.version))
    }

    /// Ensure the artifact is installed, never touching an existing target
    pub fn install(&self, item: &WorkItem) -> Result<InstallOutcome, InstallError> {
        let target = paths::install_dir(&item.basedir, &item.app, &item.version);
        if fsutil::entry_exists(&target) {
            log::info!("{} already installed", target.display());
            return Ok(InstallOutcome::AlreadyInstalled);
        }
        log::info!("{} not installed", target.display());

        let scratch_root = paths::scratch_dir(&item.basedir);
        let scratch = fs::create_dir_all(&scratch_root)
            .and_then(|()| {
                tempfile::Builder::new()
                    .prefix(&format!(".{}-", paths::install_dir_name(&item.app, &item.version)))
                    .tempdir_in(&scratch_root)
            })
            .map_err(|error| InstallError::Scratch {
                dir: scratch_root.clone(),
                error,
            })?;

        let from = self.locate(item);
        log::info!("Extracting {from} to {}", scratch.path().display());

        let reader = self
            .source
            .open(&item.app, &item.version)
            .map_err(|error| InstallError::Open {
                from: from.clone(),
                to: target.clone(),
                error,
            })?;

        let stats = extract_tar_gz(reader, scratch.path(), self.extract_timeout).map_err(|error| {
            InstallError::Extract {
                from: from.clone(),
                to: target.clone(),
                error,
            }
        })?;
        log::debug!(
            "Extracted {} file(s), {} bytes from {from} ({} entries skipped)",
            stats.files,
            stats.bytes,
            stats.skipped
        );

        let place_error = |error| InstallError::Place {
            from: scratch.path().to_path_buf(),
            to: target.clone(),
            error,
        };
        fs::create_dir_all(paths::installs_dir(&item.basedir)).map_err(place_error)?;
        fsutil::set_path_mode(scratch.path(), INSTALL_DIR_MODE).map_err(place_error)?;

        log::info!("Moving {} to {}", scratch.path().display(), target.display());
        // From here on the scratch path is cleaned up by hand
        let scratch_path = scratch.keep();
        if let Err(error) = fs::rename(&scratch_path, &target) {
            if let Err(cleanup) = fs::remove_dir_all(&scratch_path) {
                log::warn!("Could not remove {}: {cleanup}", scratch_path.display());
            }
            return Err(InstallError::Place {
                from: scratch_path,
                to: target,
                error,
            });
        }

        Ok(InstallOutcome::Installed(stats))
    }
}
