//! Agent configuration
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! hostname = "web-1"
//! artifact_repo = "https://artifacts.internal/repo"
//! jobs = 1
//!
//! [kv]
//! address = "http://127.0.0.1:8500"
//! token = "..."
//! timeout_secs = 10
//!
//! [install]
//! extract_timeout_secs = 600
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::time::Duration;

use crate::paths::ConfigLocation;

/// Artifact repo used when none is configured
pub const DEFAULT_ARTIFACT_REPO: &str = "/var/lib/preparer/artifacts";

/// Upper bound for every `*_timeout_secs` key (one week)
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreparerConfig {
    /// Node name used for `nodes/<hostname>/`; the system hostname if unset
    pub hostname: Option<String>,
    /// Local directory, `file://` URL or HTTP(S) base URL
    pub artifact_repo: String,
    /// Concurrent applies; 1 keeps installs strictly sequential
    pub jobs: usize,
    pub kv: KvConfig,
    pub install: InstallConfig,
}

impl Default for PreparerConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            artifact_repo: DEFAULT_ARTIFACT_REPO.to_string(),
            jobs: 1,
            kv: KvConfig::default(),
            install: InstallConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KvConfig {
    pub address: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            address: kvstore::consul::DEFAULT_ADDRESS.to_string(),
            token: None,
            timeout_secs: kvstore::consul::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    pub extract_timeout_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            extract_timeout_secs: crate::install::DEFAULT_EXTRACT_TIMEOUT.as_secs(),
        }
    }
}

/// Values given on the command line, applied over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub hostname: Option<String>,
    pub artifact_repo: Option<String>,
    pub kv_address: Option<String>,
    pub kv_token: Option<String>,
    pub jobs: Option<usize>,
}

impl PreparerConfig {
    /// Load from `location`
    ///
    /// A missing default file means defaults; a missing explicit file is an
    /// error.
    pub fn load(location: &ConfigLocation) -> Result<Self> {
        let path = location.path();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let ConfigLocation::Explicit(_) = location {
                    bail!("Config file not found: {}", path.display());
                }
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", path.display()));
            }
        };

        let config =
            Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        if self.artifact_repo.is_empty() {
            bail!("artifact_repo must not be empty");
        }
        check_timeout("kv.timeout_secs", self.kv.timeout_secs)?;
        check_timeout("install.extract_timeout_secs", self.install.extract_timeout_secs)?;
        Ok(())
    }

    pub fn apply(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(hostname) = overrides.hostname {
            self.hostname = Some(hostname);
        }
        if let Some(repo) = overrides.artifact_repo {
            self.artifact_repo = repo;
        }
        if let Some(address) = overrides.kv_address {
            self.kv.address = address;
        }
        if let Some(token) = overrides.kv_token {
            self.kv.token = Some(token);
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        self.validate()
    }

    /// Configured hostname, else the system's
    pub fn hostname(&self) -> Result<String> {
        match self.hostname.as_deref().filter(|h| !h.is_empty()) {
            Some(hostname) => Ok(hostname.to_string()),
            None => system_hostname(),
        }
    }

    pub fn kv_timeout(&self) -> Duration {
        Duration::from_secs(self.kv.timeout_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.install.extract_timeout_secs)
    }
}

fn check_timeout(name: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        bail!("{name} must be at least 1");
    }
    if secs > MAX_TIMEOUT_SECS {
        bail!("{name} must be at most {MAX_TIMEOUT_SECS}");
    }
    Ok(())
}

/// Hostname as reported by the kernel
#[cfg(unix)]
pub fn system_hostname() -> Result<String> {
    let mut buf = [0u8; 256];

    // SAFETY: buf is valid for writes of buf.len() bytes
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::last_os_error()).context("Could not determine hostname");
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let hostname = String::from_utf8_lossy(&buf[..end]).trim().to_string();
    if hostname.is_empty() {
        bail!("System hostname is empty; set `hostname` in the config");
    }
    Ok(hostname)
}

#[cfg(not(unix))]
pub fn system_hostname() -> Result<String> {
    bail!("Hostname detection not supported on this platform; set `hostname` in the config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_defaults() {
        assert_eq!(PreparerConfig::from_toml("").unwrap(), PreparerConfig::default());
    }

    #[test]
    fn test_full_file() {
        let config = PreparerConfig::from_toml(
            r#"
hostname = "testhost"
artifact_repo = "https://artifacts.example.com/repo"
jobs = 4

[kv]
address = "http://consul:8500"
token = "secret"
timeout_secs = 3

[install]
extract_timeout_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(config.hostname().unwrap(), "testhost");
        assert_eq!(config.jobs, 4);
        assert_eq!(config.kv.token.as_deref(), Some("secret"));
        assert_eq!(config.kv_timeout(), Duration::from_secs(3));
        assert_eq!(config.extract_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(PreparerConfig::from_toml("hostnme = \"x\"").is_err());
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(PreparerConfig::from_toml("jobs = 0").is_err());
    }

    #[test]
    fn test_extract_timeout_bounds() {
        assert!(PreparerConfig::from_toml("[install]\nextract_timeout_secs = 0").is_err());

        let mut config = PreparerConfig::default();
        config.install.extract_timeout_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("install.extract_timeout_secs"));

        let max = format!("[install]\nextract_timeout_secs = {MAX_TIMEOUT_SECS}");
        assert!(PreparerConfig::from_toml(&max).is_ok());
    }

    #[test]
    fn test_kv_timeout_bounds() {
        assert!(PreparerConfig::from_toml("[kv]\ntimeout_secs = 0").is_err());
        let over = format!("[kv]\ntimeout_secs = {}", MAX_TIMEOUT_SECS + 1);
        assert!(PreparerConfig::from_toml(&over).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = PreparerConfig::from_toml("hostname = \"file\"\njobs = 2").unwrap();
        config
            .apply(Overrides {
                hostname: Some("flag".into()),
                jobs: Some(8),
                ..Overrides::default()
            })
            .unwrap();

        assert_eq!(config.hostname.as_deref(), Some("flag"));
        assert_eq!(config.jobs, 8);
    }

    #[test]
    fn test_missing_default_file_is_defaults() {
        let dir = TempDir::new().unwrap();
        let location = ConfigLocation::Default(dir.path().join("preparer.toml"));
        assert_eq!(
            PreparerConfig::load(&location).unwrap(),
            PreparerConfig::default()
        );
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let location = ConfigLocation::Explicit(PathBuf::from("/nonexistent/preparer.toml"));
        assert!(PreparerConfig::load(&location).is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preparer.toml");
        fs::write(&path, "artifact_repo = \"/srv/repo\"\n").unwrap();

        let config = PreparerConfig::load(&ConfigLocation::Explicit(path)).unwrap();
        assert_eq!(config.artifact_repo, "/srv/repo");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_hostname_is_not_empty() {
        assert!(!system_hostname().unwrap().is_empty());
    }
}
