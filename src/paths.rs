//! Centralized path resolution for preparer
//!
//! Everything preparer writes lives under an application's basedir:
//!
//! ```text
//! <basedir>/installs/<app>_<version>/   extracted artifacts
//! <basedir>/configs/<hash>.yaml         content-addressed user configs
//! <basedir>/tmp/                        scratch space for extraction
//! ```
//!
//! Scratch space shares the basedir's filesystem so the final rename into
//! `installs/` is atomic.
//!
//! # Environment Variables
//!
//! - `PREPARER_CONFIG` - Override the config file path

use std::path::{Path, PathBuf};

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "PREPARER_CONFIG";

/// Config file used when nothing else is specified
pub const DEFAULT_CONFIG_PATH: &str = "/etc/preparer/preparer.toml";

/// Where the config file comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Named by `--config` or `PREPARER_CONFIG`; must exist
    Explicit(PathBuf),
    /// The system default; may be absent
    Default(PathBuf),
}

impl ConfigLocation {
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Default(path) => path,
        }
    }
}

/// Resolve the config file location
///
/// Priority:
/// 1. `--config` flag
/// 2. `PREPARER_CONFIG` env var
/// 3. `/etc/preparer/preparer.toml`
pub fn config_file(flag: Option<&Path>) -> ConfigLocation {
    if let Some(path) = flag {
        return ConfigLocation::Explicit(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG)
        && !path.is_empty()
    {
        log::debug!("Using config file from {ENV_CONFIG}: {path}");
        return ConfigLocation::Explicit(PathBuf::from(path));
    }

    ConfigLocation::Default(PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Directory holding every installed artifact
pub fn installs_dir(basedir: &Path) -> PathBuf {
    basedir.join("installs")
}

/// Directory name of one installed artifact
pub fn install_dir_name(app: &str, version: &str) -> String {
    format!("{app}_{version}")
}

/// Target directory of one installed artifact
pub fn install_dir(basedir: &Path, app: &str, version: &str) -> PathBuf {
    installs_dir(basedir).join(install_dir_name(app, version))
}

/// Directory holding content-addressed config objects
pub fn configs_dir(basedir: &Path) -> PathBuf {
    basedir.join("configs")
}

/// Path of the config object with the given content hash
pub fn config_object(basedir: &Path, hash: &str) -> PathBuf {
    configs_dir(basedir).join(format!("{hash}.yaml"))
}

/// Scratch space for in-progress extractions
pub fn scratch_dir(basedir: &Path) -> PathBuf {
    basedir.join("tmp")
}
