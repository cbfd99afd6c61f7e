//! Content-addressed config materialization
//!
//! A user config is rendered to canonical YAML (mapping keys sorted at every
//! level), hashed with BLAKE3 and stored as `basedir/configs/<hash>.yaml`.
//! The same logical config always lands on the same path, so an existing
//! file is never rewritten.

use crate::fsutil;
use crate::intent::UserConfig;
use crate::paths;
use serde_json::Value;
use serde_yaml::{Mapping, Number};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Mode of every written config object
const CONFIG_MODE: u32 = 0o644;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("{app}: could not render config as YAML: {error}")]
    Render {
        app: String,
        #[source]
        error: serde_yaml::Error,
    },

    #[error("{app}: could not create {}: {error}", dir.display())]
    CreateDir {
        app: String,
        dir: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("{app}: could not write {}: {error}", path.display())]
    Write {
        app: String,
        path: PathBuf,
        #[source]
        error: io::Error,
    },
}

/// A rendered config and the path it belongs at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigObject {
    pub app: String,
    pub hash: String,
    pub path: PathBuf,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Unchanged,
    Written,
}

impl ConfigObject {
    /// Render `config` and compute its target under `basedir`
    pub fn render(app: &str, config: &UserConfig, basedir: &Path) -> Result<Self, MaterializeError> {
        let content = render_canonical(config).map_err(|error| MaterializeError::Render {
            app: app.to_string(),
            error,
        })?;
        let hash = content_hash(&content);

        Ok(Self {
            app: app.to_string(),
            path: paths::config_object(basedir, &hash),
            hash,
            content,
        })
    }

    pub fn exists(&self) -> bool {
        fsutil::entry_exists(&self.path)
    }

    /// Write the object unless it is already present
    pub fn write(&self) -> Result<MaterializeOutcome, MaterializeError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|error| MaterializeError::CreateDir {
                app: self.app.clone(),
                dir: dir.to_path_buf(),
                error,
            })?;
        }

        if self.exists() {
            log::debug!("{}: config {} already present", self.app, self.path.display());
            return Ok(MaterializeOutcome::Unchanged);
        }

        fsutil::write_file_atomic(&self.path, &self.content, CONFIG_MODE).map_err(|error| {
            MaterializeError::Write {
                app: self.app.clone(),
                path: self.path.clone(),
                error,
            }
        })?;
        log::info!("{}: wrote config {}", self.app, self.path.display());
        Ok(MaterializeOutcome::Written)
    }
}

/// Canonical YAML bytes of a config
pub fn render_canonical(config: &UserConfig) -> Result<Vec<u8>, serde_yaml::Error> {
    let value = canonical(&Value::Object(config.as_map().clone()));
    serde_yaml::to_string(&value).map(String::into_bytes)
}

/// Hex BLAKE3 digest of `content`
pub fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Convert to a YAML value with every mapping's keys in sorted order
fn canonical(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Number(n) => {
            let number = if let Some(i) = n.as_i64() {
                Number::from(i)
            } else if let Some(u) = n.as_u64() {
                Number::from(u)
            } else {
                Number::from(n.as_f64().unwrap_or(f64::NAN))
            };
            serde_yaml::Value::Number(number)
        }
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Array(items) => serde_yaml::Value::Sequence(items.iter().map(canonical).collect()),
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut mapping = Mapping::new();
            for (key, value) in entries {
                mapping.insert(serde_yaml::Value::String(key.clone()), canonical(value));
            }
            serde_yaml::Value::Mapping(mapping)
        }
    }
}
