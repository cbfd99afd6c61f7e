//! `preparer status` - desired vs. installed, read-only

use anyhow::Result;
use colored::Colorize;
use declarative::{BoxedResource, compute_diffs};
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::NodeArgs;
use crate::engine::differ;
use crate::intent::{ResolveIssue, collect_intents};
use crate::ui;

pub fn run(ctx: &Context, args: NodeArgs) -> Result<()> {
    let config = super::load_config(ctx, &args, None)?;
    let reconciler = super::reconciler(&config, true)?;
    let hostname = reconciler.hostname();

    let mut issues = Vec::new();
    let intents = collect_intents(reconciler.kv(), hostname, &mut issues)?;
    let resources: Vec<BoxedResource> = intents
        .iter()
        .flat_map(|intent| reconciler.plan(intent).resources)
        .collect();
    let diffs = compute_diffs(&resources);

    ui::header(&format!("Node {hostname}"));
    ui::kv("KV store", &config.kv.address);
    ui::kv("Artifacts", &config.artifact_repo);
    ui::kv("Applications", &intents.len().to_string());
    ui::kv("Resources", &resources.len().to_string());

    if !ctx.quiet {
        for intent in &intents {
            ui::section(&intent.app);
            ui::kv("Cluster", &intent.cluster);
            ui::kv("Basedir", &intent.deploy.basedir.display().to_string());
            for (version, state) in intent.versions.iter() {
                ui::dim(&format!("{version} ({state})"));
            }
        }
    }

    if !issues.is_empty() {
        ui::section("Issues");
        let mut by_app: BTreeMap<&str, Vec<&ResolveIssue>> = BTreeMap::new();
        for issue in &issues {
            by_app.entry(issue.app()).or_default().push(issue);
        }
        for (app, app_issues) in by_app {
            println!("  {} {}", "✗".red(), app.bold());
            for issue in app_issues {
                println!("      {issue}");
                ui::dim(&format!("    key: {}", issue.key()));
            }
        }
    }

    differ::display_diff(hostname, &diffs);
    Ok(())
}
