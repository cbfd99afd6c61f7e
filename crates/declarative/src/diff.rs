//! Diff computation for resources

use crate::resource::Resource;
use crate::types::ResourceState;
use anyhow::Result;
use std::collections::BTreeMap;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        }))
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }
}

/// Compute diffs for a list of resources
///
/// Returns only resources that have differences between current and desired state.
/// A resource whose state cannot be read is reported as `Unknown`.
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|r| match ResourceDiff::from_resource(r.as_ref()) {
            Ok(diff) => diff,
            Err(e) => Some(ResourceDiff {
                resource_id: r.id(),
                resource_type: r.resource_type().to_string(),
                description: format!("{} ({e})", r.description()),
                current: ResourceState::Unknown,
                desired: r.desired_state(),
            }),
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources whose state could not be read
    pub unknown: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else {
                summary.unknown += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.unknown
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type, in type order
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ApplyResult;

    #[derive(Debug)]
    struct Flag {
        id: &'static str,
        present: Option<bool>,
    }

    impl Resource for Flag {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            format!("flag {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "flag"
        }

        fn current_state(&self) -> Result<ResourceState> {
            match self.present {
                Some(true) => Ok(ResourceState::Present { details: None }),
                Some(false) => Ok(ResourceState::Absent),
                None => anyhow::bail!("permission denied"),
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    #[test]
    fn test_compute_diffs_skips_converged_resources() {
        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(Flag {
                id: "done",
                present: Some(true),
            }),
            Box::new(Flag {
                id: "missing",
                present: Some(false),
            }),
        ];

        let diffs = compute_diffs(&resources);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].resource_id, "missing");
        assert!(diffs[0].is_addition());
    }

    #[test]
    fn test_unreadable_state_is_reported_unknown() {
        let resources: Vec<Box<dyn Resource>> = vec![Box::new(Flag {
            id: "locked",
            present: None,
        })];

        let diffs = compute_diffs(&resources);
        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(diffs[0].current, ResourceState::Unknown);
        assert!(diffs[0].description.contains("permission denied"));
        assert_eq!(summary.unknown, 1);
        assert!(summary.has_changes());
    }
}
