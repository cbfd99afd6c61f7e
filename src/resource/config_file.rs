//! Content-addressed config object resource

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::materialize::{ConfigObject, MaterializeOutcome};

/// Hash prefix length shown in ids
const SHORT_HASH: usize = 12;

#[derive(Debug, Clone)]
pub struct ConfigResource {
    object: ConfigObject,
}

impl ConfigResource {
    pub fn new(object: ConfigObject) -> Self {
        Self { object }
    }

    fn present(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.object.path.display().to_string()),
        }
    }
}

impl Resource for ConfigResource {
    fn id(&self) -> String {
        let hash = &self.object.hash;
        format!("{}:{}", self.object.app, &hash[..hash.len().min(SHORT_HASH)])
    }

    fn description(&self) -> String {
        format!(
            "Write {} config to {}",
            self.object.app,
            self.object.path.display()
        )
    }

    fn resource_type(&self) -> &'static str {
        "config"
    }

    fn lock_key(&self) -> String {
        self.object.path.to_string_lossy().into_owned()
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.object.exists() {
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
            if self.object.exists() {
                return Ok(ApplyResult::NoChange);
            }
            return Ok(ApplyResult::Skipped {
                reason: format!("Dry run: would write {}", self.object.path.display()),
            });
        }

        match self.object.write()? {
            MaterializeOutcome::Unchanged => Ok(ApplyResult::NoChange),
            MaterializeOutcome::Written => Ok(ApplyResult::Created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::UserConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn resource(basedir: &TempDir) -> ConfigResource {
        let config: UserConfig = serde_json::from_value(json!({"port": 8080})).unwrap();
        ConfigResource::new(ConfigObject::render("testapp", &config, basedir.path()).unwrap())
    }

    #[test]
    fn test_identity() {
        let basedir = TempDir::new().unwrap();
        let r = resource(&basedir);

        assert_eq!(r.id().len(), "testapp:".len() + SHORT_HASH);
        assert!(r.id().starts_with("testapp:"));
        assert!(r.lock_key().ends_with(".yaml"));
    }

    #[test]
    fn test_apply_writes_once() {
        let basedir = TempDir::new().unwrap();
        let r = resource(&basedir);
        let mut ctx = ApplyContext::new(false);

        assert_eq!(r.current_state().unwrap(), ResourceState::Absent);
        assert!(matches!(r.apply(&mut ctx).unwrap(), ApplyResult::Created));
        assert!(matches!(r.apply(&mut ctx).unwrap(), ApplyResult::NoChange));
        assert!(!r.needs_apply().unwrap());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let basedir = TempDir::new().unwrap();
        let r = resource(&basedir);

        let result = r.apply(&mut ApplyContext::new(true)).unwrap();
        assert!(matches!(result, ApplyResult::Skipped { .. }));
        assert!(!r.object.exists());
    }
}
