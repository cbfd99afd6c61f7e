//! Desired node state as declared in the KV store
//!
//! Layout of the keys this module reads:
//!
//! - `nodes/<host>/<app>` - [`NodeDeclaration`], names the app's cluster
//! - `clusters/<app>/<cluster>/versions` - [`ClusterVersionSet`]
//! - `clusters/<app>/<cluster>/deploy_config` - [`DeployConfig`]
//! - `clusters/<app>/<cluster>/config` - optional [`UserConfig`]

pub mod resolver;

pub use resolver::{IssueSink, LogSink, ResolveIssue, collect_intents, resolve};

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Prefix listing every application declared for a node
pub fn node_prefix(hostname: &str) -> String {
    format!("nodes/{hostname}/")
}

/// Key of one application's declaration on a node
pub fn node_key(hostname: &str, app: &str) -> String {
    format!("nodes/{hostname}/{app}")
}

pub fn versions_key(app: &str, cluster: &str) -> String {
    format!("clusters/{app}/{cluster}/versions")
}

pub fn deploy_config_key(app: &str, cluster: &str) -> String {
    format!("clusters/{app}/{cluster}/deploy_config")
}

pub fn user_config_key(app: &str, cluster: &str) -> String {
    format!("clusters/{app}/{cluster}/config")
}

/// Per-node declaration of one application
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct NodeDeclaration(BTreeMap<String, String>);

impl NodeDeclaration {
    /// Cluster the application belongs to, if declared and non-empty
    pub fn cluster(&self) -> Option<&str> {
        self.0
            .get("cluster")
            .map(String::as_str)
            .filter(|cluster| !cluster.is_empty())
    }
}

/// Lifecycle tag attached to a version (`prep`, `active`, ...)
///
/// Carried through resolution but never consulted: every listed version is
/// installed and activation belongs to whoever supervises the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LifecycleState(String);

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Versions declared for one application in one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClusterVersionSet(BTreeMap<String, LifecycleState>);

impl ClusterVersionSet {
    /// Versions in key order with their lifecycle tags
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LifecycleState)> {
        self.0.iter().map(|(version, state)| (version.as_str(), state))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop versions that cannot name an install directory, returning them
    pub fn remove_unsafe(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        self.0.retain(|version, _| {
            let safe = is_path_safe(version);
            if !safe {
                removed.push(version.clone());
            }
            safe
        });
        removed
    }
}

/// Whether `name` can be used as one path component on its own
fn is_path_safe(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Where and as whom an application is deployed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployConfig {
    pub basedir: PathBuf,
    /// Accepted for compatibility; nothing runs as this identity yet
    #[serde(default)]
    pub runas: Option<String>,
}

/// Free-form per-application configuration, always a JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct UserConfig(Map<String, Value>);

impl UserConfig {
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// One (app, version) pair to install under a basedir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub app: String,
    pub version: String,
    pub basedir: PathBuf,
}

/// Fully validated intent for one application on this node
#[derive(Debug, Clone, PartialEq)]
pub struct AppIntent {
    pub app: String,
    pub cluster: String,
    pub versions: ClusterVersionSet,
    pub deploy: DeployConfig,
    pub user_config: Option<UserConfig>,
}

impl AppIntent {
    /// One work item per declared version, regardless of lifecycle state
    pub fn work_items(&self) -> impl Iterator<Item = WorkItem> + '_ {
        self.versions.iter().map(|(version, _)| WorkItem {
            app: self.app.clone(),
            version: version.to_string(),
            basedir: self.deploy.basedir.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_layout() {
        assert_eq!(node_prefix("testhost"), "nodes/testhost/");
        assert_eq!(node_key("testhost", "testapp"), "nodes/testhost/testapp");
        assert_eq!(versions_key("testapp", "test"), "clusters/testapp/test/versions");
        assert_eq!(
            deploy_config_key("testapp", "test"),
            "clusters/testapp/test/deploy_config"
        );
        assert_eq!(user_config_key("testapp", "test"), "clusters/testapp/test/config");
    }

    #[test]
    fn test_node_declaration_cluster() {
        let decl: NodeDeclaration = serde_json::from_value(json!({"cluster": "test"})).unwrap();
        assert_eq!(decl.cluster(), Some("test"));

        let empty: NodeDeclaration = serde_json::from_value(json!({"cluster": ""})).unwrap();
        assert_eq!(empty.cluster(), None);

        let missing: NodeDeclaration = serde_json::from_value(json!({"other": "x"})).unwrap();
        assert_eq!(missing.cluster(), None);
    }

    #[test]
    fn test_node_declaration_rejects_non_mapping() {
        assert!(serde_json::from_value::<NodeDeclaration>(json!(34)).is_err());
        assert!(serde_json::from_value::<NodeDeclaration>(json!({"cluster": 1})).is_err());
    }

    #[test]
    fn test_deploy_config_accepts_null_runas() {
        let deploy: DeployConfig =
            serde_json::from_value(json!({"basedir": "/sometmp", "runas": null})).unwrap();
        assert_eq!(deploy.basedir, PathBuf::from("/sometmp"));
        assert_eq!(deploy.runas, None);
    }

    #[test]
    fn test_work_items_ignore_lifecycle_state() {
        let intent = AppIntent {
            app: "testapp".into(),
            cluster: "test".into(),
            versions: serde_json::from_value(json!({"abc123": "prep", "def456": "retired"}))
                .unwrap(),
            deploy: DeployConfig {
                basedir: PathBuf::from("/sometmp"),
                runas: None,
            },
            user_config: None,
        };

        let versions: Vec<String> = intent.work_items().map(|item| item.version).collect();
        assert_eq!(versions, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_remove_unsafe_versions() {
        let mut versions: ClusterVersionSet = serde_json::from_value(json!({
            "abc123": "prep",
            "../../../pwned": "prep",
            "a/b": "prep",
            "..": "prep",
            "": "prep",
        }))
        .unwrap();

        let mut removed = versions.remove_unsafe();
        removed.sort();
        assert_eq!(removed, vec!["", "..", "../../../pwned", "a/b"]);
        let kept: Vec<&str> = versions.iter().map(|(version, _)| version).collect();
        assert_eq!(kept, vec!["abc123"]);
    }
}
