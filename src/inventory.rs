//! Read-only view of what a basedir holds
//!
//! Nothing here deletes. It exists so a collector outside this process can
//! decide what is safe to remove.

use crate::paths;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// An `installs/<app>_<version>` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifact {
    pub app: String,
    pub version: String,
    pub path: PathBuf,
}

/// A `configs/<hash>.yaml` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub hash: String,
    pub path: PathBuf,
    pub size: u64,
}

pub struct Inventory {
    basedir: PathBuf,
}

impl Inventory {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
        }
    }

    /// Installed artifacts sorted by app then version
    ///
    /// Entries whose name has no `_` separator are not ours and are skipped.
    pub fn installed(&self) -> io::Result<Vec<InstalledArtifact>> {
        let mut found = Vec::new();
        for (name, path) in read_names(&paths::installs_dir(&self.basedir))? {
            if !path.is_dir() {
                continue;
            }
            // Versions never contain '_', app names may
            let Some((app, version)) = name.rsplit_once('_') else {
                log::debug!("Ignoring {}", path.display());
                continue;
            };
            if app.is_empty() || version.is_empty() {
                continue;
            }
            found.push(InstalledArtifact {
                app: app.to_string(),
                version: version.to_string(),
                path,
            });
        }

        found.sort_by(|a, b| (&a.app, &a.version).cmp(&(&b.app, &b.version)));
        Ok(found)
    }

    /// Stored config objects sorted by hash
    pub fn configs(&self) -> io::Result<Vec<StoredConfig>> {
        let mut found = Vec::new();
        for (name, path) in read_names(&paths::configs_dir(&self.basedir))? {
            let Some(hash) = name.strip_suffix(".yaml") else {
                continue;
            };
            // Hidden names are in-flight temp files
            if hash.is_empty() || hash.starts_with('.') {
                continue;
            }
            let metadata = fs::metadata(&path)?;
            if !metadata.is_file() {
                continue;
            }
            found.push(StoredConfig {
                hash: hash.to_string(),
                size: metadata.len(),
                path,
            });
        }

        found.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(found)
    }
}

/// UTF-8 names and paths of a directory's entries; a missing directory is empty
fn read_names(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Ok(name) = entry.file_name().into_string() {
            names.push((name, entry.path()));
        }
    }
    Ok(names)
}
