//! One reconciliation pass over a node
//!
//! The resolver runs on the calling thread and feeds resources straight into
//! the dispatch channel as each application resolves.

use anyhow::Result;
use declarative::{BoxedResource, ExecuteOptions, ExecuteSummary, ProgressCallback, dispatch};
use kvstore::KvStore;
use std::sync::Arc;

use crate::install::Installer;
use crate::intent::{AppIntent, IssueSink, ResolveIssue, resolve};
use crate::materialize::ConfigObject;
use crate::resource::{ArtifactResource, ConfigResource};

/// Outcome of one poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Applications that resolved cleanly
    pub apps: usize,
    /// Validation issues and configs that could not be rendered
    pub issues: usize,
    pub summary: ExecuteSummary,
}

impl PollReport {
    pub fn is_clean(&self) -> bool {
        self.issues == 0 && self.summary.is_success()
    }
}

pub struct Reconciler {
    kv: Arc<dyn KvStore>,
    hostname: String,
    installer: Installer,
    options: ExecuteOptions,
}

impl Reconciler {
    pub fn new(
        kv: Arc<dyn KvStore>,
        hostname: impl Into<String>,
        installer: Installer,
        options: ExecuteOptions,
    ) -> Self {
        Self {
            kv,
            hostname: hostname.into(),
            installer,
            options,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    /// Resources needed to satisfy one application
    ///
    /// A config that cannot be rendered is logged and left out; its
    /// artifacts are still returned.
    pub fn plan(&self, intent: &AppIntent) -> Plan {
        let mut plan = Plan::default();

        for item in intent.work_items() {
            plan.resources
                .push(Box::new(ArtifactResource::new(item, self.installer.clone())));
        }

        if let Some(config) = &intent.user_config {
            match ConfigObject::render(&intent.app, config, &intent.deploy.basedir) {
                Ok(object) => plan.resources.push(Box::new(ConfigResource::new(object))),
                Err(e) => {
                    log::error!("{e}");
                    plan.errors += 1;
                }
            }
        }

        plan
    }

    /// Resolve the node and converge everything it declares
    ///
    /// # Errors
    /// Fails only when the node's declarations cannot be listed; every
    /// per-application problem is reported and counted instead.
    pub fn poll_once<P: ProgressCallback>(
        &self,
        issues: &mut dyn IssueSink,
        progress: &mut P,
    ) -> Result<PollReport> {
        let mut counting = CountingSink {
            inner: issues,
            count: 0,
        };
        let mut apps = 0;
        let mut plan_errors = 0;

        log::debug!("Polling intent for {}", self.hostname);
        let summary = dispatch(&self.options, progress, |dispatcher| {
            resolve(self.kv(), &self.hostname, &mut counting, |intent| {
                apps += 1;
                let plan = self.plan(&intent);
                plan_errors += plan.errors;
                for resource in plan.resources {
                    dispatcher.submit(resource)?;
                }
                Ok(())
            })
        })?;

        let report = PollReport {
            apps,
            issues: counting.count + plan_errors,
            summary,
        };
        log::info!(
            "Poll complete for {}: {} app(s), {} created, {} unchanged, {} skipped, {} failed, {} issue(s)",
            self.hostname,
            report.apps,
            report.summary.created,
            report.summary.no_change,
            report.summary.skipped,
            report.summary.failed,
            report.issues
        );
        Ok(report)
    }
}

/// Resources planned for one application
#[derive(Debug, Default)]
pub struct Plan {
    pub resources: Vec<BoxedResource>,
    pub errors: usize,
}

struct CountingSink<'a> {
    inner: &'a mut dyn IssueSink,
    count: usize,
}

impl IssueSink for CountingSink<'_> {
    fn report(&mut self, issue: ResolveIssue) {
        self.count += 1;
        self.inner.report(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::extract::tests::tar_gz;
    use crate::install::{DEFAULT_EXTRACT_TIMEOUT, LocalRepo};
    use crate::paths;
    use declarative::{ApplyResult, NoProgress};
    use kvstore::MemoryKv;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        kv: MemoryKv,
        repo: TempDir,
        basedir: TempDir,
    }

    impl Fixture {
        fn new(versions: &[&str]) -> Self {
            let fixture = Self {
                kv: MemoryKv::new(),
                repo: TempDir::new().unwrap(),
                basedir: TempDir::new().unwrap(),
            };

            let app_dir = fixture.repo.path().join("testapp");
            fs::create_dir_all(&app_dir).unwrap();
            let mut declared = serde_json::Map::new();
            for version in versions {
                let readme = format!("Hello from {version}");
                fs::write(
                    app_dir.join(format!("testapp_{version}.tar.gz")),
                    tar_gz(&[("README", readme.as_bytes(), 0o644)]),
                )
                .unwrap();
                declared.insert((*version).to_string(), json!("active"));
            }

            let kv = &fixture.kv;
            kv.put("nodes/testhost/testapp", &json!({"cluster": "test"}))
                .unwrap();
            kv.put("clusters/testapp/test/versions", &declared.into())
                .unwrap();
            kv.put(
                "clusters/testapp/test/deploy_config",
                &json!({"basedir": fixture.basedir.path(), "runas": null}),
            )
            .unwrap();
            fixture
        }

        fn reconciler(&self, jobs: usize, dry_run: bool) -> Reconciler {
            let installer = Installer::new(
                Arc::new(LocalRepo::new(self.repo.path())),
                DEFAULT_EXTRACT_TIMEOUT,
            );
            let options = ExecuteOptions { dry_run, jobs };
            Reconciler::new(Arc::new(self.kv.clone()), "testhost", installer, options)
        }

        fn installed(&self, version: &str) -> bool {
            paths::install_dir(self.basedir.path(), "testapp", version).is_dir()
        }
    }

    #[derive(Default)]
    struct Collect(Vec<(String, ApplyResult)>);

    impl ProgressCallback for Collect {
        fn on_batch_start(&mut self, _jobs: usize, _dry_run: bool) {}
        fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
            self.0.push((id.to_string(), result.clone()));
        }
        fn on_batch_complete(&mut self) {}
    }

    fn readme(basedir: &Path, version: &str) -> String {
        fs::read_to_string(paths::install_dir(basedir, "testapp", version).join("README")).unwrap()
    }

    #[test]
    fn test_poll_installs_every_version() {
        let fixture = Fixture::new(&["abc123", "def456"]);
        let mut issues = Vec::new();
        let mut progress = Collect::default();

        let report = fixture
            .reconciler(1, false)
            .poll_once(&mut issues, &mut progress)
            .unwrap();

        assert_eq!(report.apps, 1);
        assert_eq!(report.summary.created, 2);
        assert!(report.is_clean());
        assert_eq!(readme(fixture.basedir.path(), "abc123"), "Hello from abc123");
        assert_eq!(readme(fixture.basedir.path(), "def456"), "Hello from def456");

        let mut ids: Vec<_> = progress.0.iter().map(|(id, _)| id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["testapp@abc123", "testapp@def456"]);
    }

    #[test]
    fn test_second_poll_changes_nothing() {
        let fixture = Fixture::new(&["abc123"]);
        let reconciler = fixture.reconciler(1, false);

        reconciler.poll_once(&mut Vec::new(), &mut NoProgress).unwrap();
        let report = reconciler.poll_once(&mut Vec::new(), &mut NoProgress).unwrap();
        assert_eq!(report.summary.created, 0);
        assert_eq!(report.summary.no_change, 1);
    }

    #[test]
    fn test_parallel_poll_installs_every_version() {
        let versions = ["v1", "v2", "v3", "v4", "v5", "v6"];
        let fixture = Fixture::new(&versions);

        let report = fixture
            .reconciler(4, false)
            .poll_once(&mut Vec::new(), &mut NoProgress)
            .unwrap();
        assert_eq!(report.summary.created, versions.len());
        assert!(versions.iter().all(|v| fixture.installed(v)));
        assert!(
            fs::read_dir(paths::scratch_dir(fixture.basedir.path()))
                .unwrap()
                .next()
                .is_none()
        );
    }

    #[test]
    fn test_dry_run_installs_nothing() {
        let fixture = Fixture::new(&["abc123"]);
        let report = fixture
            .reconciler(1, true)
            .poll_once(&mut Vec::new(), &mut NoProgress)
            .unwrap();

        assert_eq!(report.summary.skipped, 1);
        assert!(!fixture.installed("abc123"));
    }

    #[test]
    fn test_missing_artifact_fails_only_that_version() {
        let fixture = Fixture::new(&["abc123"]);
        fixture
            .kv
            .put(
                "clusters/testapp/test/versions",
                &json!({"abc123": "active", "missing": "prep"}),
            )
            .unwrap();

        let mut progress = Collect::default();
        let report = fixture
            .reconciler(1, false)
            .poll_once(&mut Vec::new(), &mut progress)
            .unwrap();

        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(fixture.installed("abc123"));
        assert!(!fixture.installed("missing"));

        let failed = progress
            .0
            .iter()
            .find(|(id, _)| id == "testapp@missing")
            .unwrap();
        assert!(matches!(failed.1, ApplyResult::Failed { .. }));
    }

    #[test]
    fn test_user_config_is_materialized() {
        let fixture = Fixture::new(&["abc123"]);
        fixture
            .kv
            .put("clusters/testapp/test/config", &json!({"port": 8080}))
            .unwrap();

        let report = fixture
            .reconciler(1, false)
            .poll_once(&mut Vec::new(), &mut NoProgress)
            .unwrap();
        assert_eq!(report.summary.created, 2);

        let configs: Vec<_> = fs::read_dir(paths::configs_dir(fixture.basedir.path()))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(configs.len(), 1);
        assert_eq!(fs::read_to_string(&configs[0]).unwrap(), "port: 8080\n");
    }

    #[test]
    fn test_issues_are_counted_and_forwarded() {
        let fixture = Fixture::new(&["abc123"]);
        fixture
            .kv
            .put("nodes/testhost/broken", &json!({"nope": "x"}))
            .unwrap();

        let mut issues = Vec::new();
        let report = fixture
            .reconciler(1, false)
            .poll_once(&mut issues, &mut NoProgress)
            .unwrap();

        assert_eq!(report.issues, 1);
        assert_eq!(issues.len(), 1);
        assert!(!report.is_clean());
        assert!(fixture.installed("abc123"));
    }

    #[test]
    fn test_unreachable_store_fails_the_poll() {
        let fixture = Fixture::new(&["abc123"]);
        fixture.kv.set_offline(true);

        let result = fixture
            .reconciler(1, false)
            .poll_once(&mut Vec::new(), &mut NoProgress);
        assert!(result.is_err());
        assert!(!fixture.installed("abc123"));
    }
}
