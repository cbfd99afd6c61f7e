//! `preparer run` - converge the node once or on an interval

use anyhow::Result;
use std::thread;
use std::time::Duration;

use crate::Context;
use crate::cli::RunArgs;
use crate::engine::{LogProgress, PollReport, Reconciler};
use crate::intent::LogSink;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let config = super::load_config(ctx, &args.node, args.jobs)?;
    let reconciler = super::reconciler(&config, args.dry_run)?;

    if args.dry_run {
        log::info!("Dry run: nothing will be installed or written");
    }

    match args.interval {
        None => {
            let report = poll(&reconciler)?;
            if !report.is_clean() {
                log::warn!("Some applications were not fully prepared; see errors above");
            }
            Ok(())
        }
        Some(secs) => poll_forever(&reconciler, Duration::from_secs(secs.max(1))),
    }
}

fn poll(reconciler: &Reconciler) -> Result<PollReport> {
    reconciler.poll_once(&mut LogSink, &mut LogProgress::default())
}

/// Keep polling; a failed poll is logged and retried on the next tick
fn poll_forever(reconciler: &Reconciler, interval: Duration) -> Result<()> {
    log::info!(
        "Polling intent for {} every {}s",
        reconciler.hostname(),
        interval.as_secs()
    );

    loop {
        if let Err(e) = poll(reconciler) {
            log::error!("Poll failed: {e:#}");
        }
        thread::sleep(interval);
    }
}
