//! `preparer list` - what a basedir holds

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use std::path::Path;

use crate::inventory::Inventory;
use crate::ui;

pub fn run(basedir: &Path) -> Result<()> {
    let inventory = Inventory::new(basedir);
    let installed = inventory
        .installed()
        .with_context(|| format!("Could not list installs under {}", basedir.display()))?;
    let configs = inventory
        .configs()
        .with_context(|| format!("Could not list configs under {}", basedir.display()))?;

    ui::header(&format!("Inventory of {}", basedir.display()));

    ui::section("Installed artifacts");
    if installed.is_empty() {
        ui::dim("none");
    }
    for artifact in &installed {
        println!(
            "  {} {:<24} {}",
            "•".green(),
            artifact.app,
            artifact.version.dimmed()
        );
    }

    ui::section("Configs");
    if configs.is_empty() {
        ui::dim("none");
    }
    for config in &configs {
        println!(
            "  {} {} {}",
            "•".green(),
            config.hash,
            ui::format_size(config.size).dimmed()
        );
    }

    println!();
    Ok(())
}
