//! Diff display - preparer-specific UI

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceState, group_by_type};

/// Section heading for a resource type
fn type_name(resource_type: &str) -> &str {
    match resource_type {
        "artifact" => "Artifacts",
        "config" => "Configs",
        other => other,
    }
}

/// State transition shown after a resource id
pub fn state_description(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => format!(
            "(missing){}",
            details
                .as_ref()
                .map(|d| format!(" -> {d}"))
                .unwrap_or_default()
        ),
        (ResourceState::Unknown, _) => "(state unknown)".to_string(),
        _ => String::new(),
    }
}

/// Display what a poll would change
pub fn display_diff(hostname: &str, diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} {hostname} is up to date", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        format!("Pending for {hostname}").bold()
    );
    println!("│");

    for (resource_type, type_diffs) in group_by_type(diffs) {
        println!("│ {}", type_name(&resource_type).bold());
        for diff in type_diffs {
            let symbol = if diff.is_addition() {
                "+".green()
            } else {
                "?".dimmed()
            };
            println!(
                "│   {symbol} {:<30} {}",
                diff.resource_id,
                state_description(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} pending ({} missing, {} unknown)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.unknown.to_string().yellow()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(current: ResourceState) -> ResourceDiff {
        ResourceDiff {
            resource_id: "testapp@abc123".into(),
            resource_type: "artifact".into(),
            description: "Install testapp".into(),
            current,
            desired: ResourceState::Present {
                details: Some("/sometmp/installs/testapp_abc123".into()),
            },
        }
    }

    #[test]
    fn test_describe_missing() {
        assert_eq!(
            state_description(&diff(ResourceState::Absent)),
            "(missing) -> /sometmp/installs/testapp_abc123"
        );
    }

    #[test]
    fn test_describe_unknown() {
        assert_eq!(
            state_description(&diff(ResourceState::Unknown)),
            "(state unknown)"
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name("artifact"), "Artifacts");
        assert_eq!(type_name("config"), "Configs");
        assert_eq!(type_name("other"), "other");
    }
}
