//! Desired-state resolution
//!
//! Walks `nodes/<host>/` and follows every declared application to its
//! cluster's version set and deploy config. Anything malformed is reported
//! as a [`ResolveIssue`] for that application alone; only failing to list
//! the node itself aborts resolution.

use super::{
    AppIntent, ClusterVersionSet, DeployConfig, NodeDeclaration, UserConfig, deploy_config_key,
    node_key, node_prefix, user_config_key, versions_key,
};
use anyhow::{Context, Result};
use kvstore::KvStore;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A problem with one application's declared state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveIssue {
    #[error("invalid node data for {app} at {key}: {reason}")]
    InvalidNodeData {
        app: String,
        key: String,
        reason: String,
    },

    #[error("no cluster key for {app} at {key}")]
    MissingCluster { app: String, key: String },

    #[error("no or invalid version data for {app} at {key}: {reason}")]
    InvalidVersions {
        app: String,
        key: String,
        reason: String,
    },

    #[error("no or invalid config data for {app} at {key}: {reason}")]
    InvalidDeployConfig {
        app: String,
        key: String,
        reason: String,
    },

    #[error("relative basedir not allowed for {app} at {key}: {basedir:?}")]
    RelativeBasedir {
        app: String,
        key: String,
        basedir: String,
    },

    /// Only the offending version is dropped
    #[error("unsafe version {version:?} for {app} at {key}")]
    UnsafeVersion {
        app: String,
        key: String,
        version: String,
    },

    /// Not fatal for the application: its artifacts still install
    #[error("invalid user config for {app} at {key}: {reason}")]
    InvalidUserConfig {
        app: String,
        key: String,
        reason: String,
    },

    #[error("kv read failed for {app} at {key}: {reason}")]
    KvReadFailed {
        app: String,
        key: String,
        reason: String,
    },
}

impl ResolveIssue {
    /// Application the issue belongs to
    pub fn app(&self) -> &str {
        match self {
            Self::InvalidNodeData { app, .. }
            | Self::MissingCluster { app, .. }
            | Self::InvalidVersions { app, .. }
            | Self::InvalidDeployConfig { app, .. }
            | Self::RelativeBasedir { app, .. }
            | Self::UnsafeVersion { app, .. }
            | Self::InvalidUserConfig { app, .. }
            | Self::KvReadFailed { app, .. } => app,
        }
    }

    /// KV key holding the offending value
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidNodeData { key, .. }
            | Self::MissingCluster { key, .. }
            | Self::InvalidVersions { key, .. }
            | Self::InvalidDeployConfig { key, .. }
            | Self::RelativeBasedir { key, .. }
            | Self::UnsafeVersion { key, .. }
            | Self::InvalidUserConfig { key, .. }
            | Self::KvReadFailed { key, .. } => key,
        }
    }
}

/// Receives every issue found during resolution
pub trait IssueSink {
    fn report(&mut self, issue: ResolveIssue);
}

/// Sink that logs each issue as an error
pub struct LogSink;

impl IssueSink for LogSink {
    fn report(&mut self, issue: ResolveIssue) {
        log::error!("{issue}");
    }
}

impl IssueSink for Vec<ResolveIssue> {
    fn report(&mut self, issue: ResolveIssue) {
        self.push(issue);
    }
}

/// Resolve every application declared for `hostname`
///
/// Each valid application is handed to `emit` as soon as it is resolved,
/// so downstream work can start before the whole node has been read.
///
/// # Errors
/// Fails if the node's declarations cannot be listed, or if `emit` fails.
pub fn resolve<E>(
    kv: &dyn KvStore,
    hostname: &str,
    issues: &mut dyn IssueSink,
    mut emit: E,
) -> Result<()>
where
    E: FnMut(AppIntent) -> Result<()>,
{
    let prefix = node_prefix(hostname);
    let declared = kv
        .list(&prefix)
        .with_context(|| format!("Failed to list declared applications under {prefix}"))?;

    if declared.is_empty() {
        log::info!("No applications declared for {hostname}");
        return Ok(());
    }
    log::debug!("{} application(s) declared for {hostname}", declared.len());

    for (app, node_value) in declared {
        let mut intent = match resolve_app(kv, hostname, &app, node_value) {
            Ok(intent) => intent,
            Err(issue) => {
                issues.report(issue);
                continue;
            }
        };

        for version in intent.versions.remove_unsafe() {
            issues.report(ResolveIssue::UnsafeVersion {
                app: app.clone(),
                key: versions_key(&app, &intent.cluster),
                version,
            });
        }

        match fetch_user_config(kv, &intent) {
            Ok(config) => intent.user_config = config,
            Err(issue) => issues.report(issue),
        }

        if intent.versions.is_empty() {
            log::debug!("{app}: no versions declared in cluster {}", intent.cluster);
        }
        emit(intent)?;
    }

    Ok(())
}

/// Resolve into a vector, for callers that want the whole picture at once
pub fn collect_intents(
    kv: &dyn KvStore,
    hostname: &str,
    issues: &mut dyn IssueSink,
) -> Result<Vec<AppIntent>> {
    let mut intents = Vec::new();
    resolve(kv, hostname, issues, |intent| {
        intents.push(intent);
        Ok(())
    })?;
    Ok(intents)
}

fn resolve_app(
    kv: &dyn KvStore,
    hostname: &str,
    app: &str,
    node_value: Value,
) -> Result<AppIntent, ResolveIssue> {
    let key = node_key(hostname, app);
    let declaration: NodeDeclaration =
        serde_json::from_value(node_value).map_err(|e| ResolveIssue::InvalidNodeData {
            app: app.to_string(),
            key: key.clone(),
            reason: e.to_string(),
        })?;

    let cluster = declaration
        .cluster()
        .ok_or_else(|| ResolveIssue::MissingCluster {
            app: app.to_string(),
            key,
        })?
        .to_string();

    let key = versions_key(app, &cluster);
    let versions: ClusterVersionSet = fetch_required(kv, app, &key, |reason| {
        ResolveIssue::InvalidVersions {
            app: app.to_string(),
            key: key.clone(),
            reason,
        }
    })?;

    let key = deploy_config_key(app, &cluster);
    let deploy: DeployConfig = fetch_required(kv, app, &key, |reason| {
        ResolveIssue::InvalidDeployConfig {
            app: app.to_string(),
            key: key.clone(),
            reason,
        }
    })?;

    if !deploy.basedir.is_absolute() {
        return Err(ResolveIssue::RelativeBasedir {
            app: app.to_string(),
            key,
            basedir: deploy.basedir.display().to_string(),
        });
    }

    Ok(AppIntent {
        app: app.to_string(),
        cluster,
        versions,
        deploy,
        user_config: None,
    })
}

fn fetch_user_config(
    kv: &dyn KvStore,
    intent: &AppIntent,
) -> Result<Option<UserConfig>, ResolveIssue> {
    let key = user_config_key(&intent.app, &intent.cluster);
    match fetch::<UserConfig>(kv, &intent.app, &key)? {
        None => Ok(None),
        Some(Ok(config)) => Ok(Some(config)),
        Some(Err(reason)) => Err(ResolveIssue::InvalidUserConfig {
            app: intent.app.clone(),
            key,
            reason,
        }),
    }
}

/// Read and decode a key that must be present
fn fetch_required<T, F>(kv: &dyn KvStore, app: &str, key: &str, invalid: F) -> Result<T, ResolveIssue>
where
    T: DeserializeOwned,
    F: FnOnce(String) -> ResolveIssue,
{
    match fetch(kv, app, key)? {
        Some(Ok(value)) => Ok(value),
        Some(Err(reason)) => Err(invalid(reason)),
        None => Err(invalid("missing".to_string())),
    }
}

/// Read and decode a key; the inner error is the decode failure
fn fetch<T: DeserializeOwned>(
    kv: &dyn KvStore,
    app: &str,
    key: &str,
) -> Result<Option<Result<T, String>>, ResolveIssue> {
    let value = kv.get(key).map_err(|e| ResolveIssue::KvReadFailed {
        app: app.to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    Ok(value.map(|value| serde_json::from_value(value).map_err(|e| e.to_string())))
}
