//! Artifact repositories
//!
//! Artifacts are laid out as `<repo>/<app>/<app>_<version>.tar.gz`. A repo
//! is either a local directory (bare path or `file://` URL) or an HTTP(S)
//! base URL.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

/// File name of an artifact archive
pub fn artifact_file_name(app: &str, version: &str) -> String {
    format!("{app}_{version}.tar.gz")
}

/// Where artifact archives are fetched from
pub trait ArtifactSource: Send + Sync {
    /// Human-readable location of an artifact, used in logs and errors
    fn locate(&self, app: &str, version: &str) -> String;

    /// Open the gzip-compressed tar stream of an artifact
    fn open(&self, app: &str, version: &str) -> io::Result<Box<dyn Read>>;
}

/// Artifacts on a local (or mounted) filesystem
#[derive(Debug, Clone)]
pub struct LocalRepo {
    root: PathBuf,
}

impl LocalRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, app: &str, version: &str) -> PathBuf {
        self.root.join(app).join(artifact_file_name(app, version))
    }
}

impl ArtifactSource for LocalRepo {
    fn locate(&self, app: &str, version: &str) -> String {
        self.path(app, version).display().to_string()
    }

    fn open(&self, app: &str, version: &str) -> io::Result<Box<dyn Read>> {
        let file = File::open(self.path(app, version))?;
        Ok(Box::new(file))
    }
}

/// Artifacts served over HTTP(S)
pub struct HttpRepo {
    agent: ureq::Agent,
    base: String,
}

impl HttpRepo {
    /// `timeout` bounds connecting and waiting for response headers;
    /// `body_timeout` bounds receiving the archive itself.
    pub fn new(base: impl Into<String>, timeout: Duration, body_timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .timeout_recv_body(Some(body_timeout))
            .build();
        let base: String = base.into();

        Self {
            agent: ureq::Agent::new_with_config(config),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, app: &str, version: &str) -> String {
        format!("{}/{app}/{}", self.base, artifact_file_name(app, version))
    }
}

impl ArtifactSource for HttpRepo {
    fn locate(&self, app: &str, version: &str) -> String {
        self.url(app, version)
    }

    fn open(&self, app: &str, version: &str) -> io::Result<Box<dyn Read>> {
        let url = self.url(app, version);
        log::debug!("GET {url}");

        match self.agent.get(&url).call() {
            Ok(response) => Ok(Box::new(response.into_body().into_reader())),
            Err(ureq::Error::StatusCode(404)) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{url} not found"),
            )),
            Err(ureq::Error::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

/// Build a source from a configured repo location
///
/// `body_timeout` only applies to HTTP(S) repos, where a stalled server
/// would otherwise block a read forever.
pub fn from_location(
    location: &str,
    timeout: Duration,
    body_timeout: Duration,
) -> Box<dyn ArtifactSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Box::new(HttpRepo::new(location, timeout, body_timeout));
    }

    let path = location.strip_prefix("file://").unwrap_or(location);
    Box::new(LocalRepo::new(path))
}
