//! Subcommand implementations

pub mod list;
pub mod run;
pub mod status;

use anyhow::{Context as AnyhowContext, Result};
use declarative::ExecuteOptions;
use kvstore::ConsulKv;
use std::sync::Arc;

use crate::Context;
use crate::cli::NodeArgs;
use crate::config::PreparerConfig;
use crate::engine::Reconciler;
use crate::install::{Installer, source};
use crate::paths;

/// Load the config file and apply command-line overrides
pub fn load_config(ctx: &Context, node: &NodeArgs, jobs: Option<usize>) -> Result<PreparerConfig> {
    let location = paths::config_file(ctx.config.as_deref());
    let mut config = PreparerConfig::load(&location)?;
    config
        .apply(node.overrides(jobs))
        .context("Invalid command-line override")?;
    Ok(config)
}

/// Wire the KV client, artifact source and installer for one node
pub fn reconciler(config: &PreparerConfig, dry_run: bool) -> Result<Reconciler> {
    let hostname = config.hostname()?;
    let kv = ConsulKv::new(
        config.kv.address.clone(),
        config.kv.token.clone(),
        config.kv_timeout(),
    );
    let source = source::from_location(
        &config.artifact_repo,
        config.kv_timeout(),
        config.extract_timeout(),
    );
    let installer = Installer::new(Arc::from(source), config.extract_timeout());

    log::debug!(
        "Node {hostname}, KV at {}, artifacts from {}",
        kv.address(),
        config.artifact_repo
    );

    let options = ExecuteOptions {
        dry_run,
        jobs: config.jobs,
    };
    Ok(Reconciler::new(Arc::new(kv), hostname, installer, options))
}
