//! Progress reporting through the `log` facade

use declarative::{ApplyResult, ProgressCallback};

/// Logs every resource outcome as soon as its apply finishes
#[derive(Debug, Default)]
pub struct LogProgress {
    completed: usize,
}

impl ProgressCallback for LogProgress {
    fn on_batch_start(&mut self, jobs: usize, dry_run: bool) {
        self.completed = 0;
        log::debug!(
            "Dispatching with {jobs} worker(s){}",
            if dry_run { " (dry run)" } else { "" }
        );
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        self.completed += 1;
        match result {
            ApplyResult::Created => log::info!("{id}: created"),
            ApplyResult::NoChange => log::debug!("{id}: up to date"),
            ApplyResult::Skipped { reason } => log::info!("{id}: skipped ({reason})"),
            ApplyResult::Failed { error } => log::error!("{id}: {error}"),
        }
    }

    fn on_batch_complete(&mut self) {
        log::debug!("{} resource(s) processed", self.completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_completed_resources() {
        let mut progress = LogProgress::default();
        progress.on_batch_start(1, false);
        progress.on_resource_complete("testapp@abc123", &ApplyResult::Created);
        progress.on_resource_complete(
            "testapp@def456",
            &ApplyResult::Failed {
                error: "boom".into(),
            },
        );
        progress.on_batch_complete();
        assert_eq!(progress.completed, 2);

        progress.on_batch_start(1, false);
        assert_eq!(progress.completed, 0);
    }
}
