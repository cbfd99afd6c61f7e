//! Dispatch engine - streams resources from a producer to a bounded worker pool
//!
//! The producer hands resources over a zero-capacity channel, so every
//! `submit` blocks until a worker takes the item. With one job this is a
//! strict one-at-a-time pipeline. With more jobs, distinct lock keys apply
//! in parallel while equal keys stay serialized.

use crate::context::{ApplyContext, ProgressCallback};
use crate::resource::{BoxedResource, Resource};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Condvar, Mutex, PoisonError};

/// Errors raised by the dispatch machinery itself
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No worker is left to accept the resource
    #[error("dispatch channel closed before {0} was accepted")]
    Closed(String),

    /// The worker pool could not be started
    #[error("failed to create worker pool: {0}")]
    Pool(String),
}

/// Producer-side handle of the dispatch channel
pub struct Dispatcher {
    tx: SyncSender<BoxedResource>,
}

impl Dispatcher {
    /// Hand a resource to a worker, blocking until one accepts it
    pub fn submit(&self, resource: BoxedResource) -> Result<(), DispatchError> {
        let id = resource.id();
        self.tx.send(resource).map_err(|_| DispatchError::Closed(id))
    }
}

/// Run `produce` on the calling thread and apply everything it submits
///
/// # Arguments
/// * `opts` - Execution options (dry_run, jobs)
/// * `progress` - Receives each result as soon as its apply finishes
/// * `produce` - Producer; its error is returned after in-flight work drains
///
/// # Returns
/// Summary of execution results
pub fn dispatch<P, F>(opts: &ExecuteOptions, progress: &mut P, produce: F) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    F: FnOnce(&Dispatcher) -> Result<()>,
{
    let jobs = opts.jobs.max(1);
    // One extra thread collects results while the consumers run
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs + 1)
        .thread_name(|i| format!("dispatch-{i}"))
        .build()
        .map_err(|e| DispatchError::Pool(e.to_string()))?;

    let (tx, rx) = mpsc::sync_channel::<BoxedResource>(0);
    let rx = Mutex::new(rx);
    let (results_tx, results_rx) = mpsc::channel::<(String, ApplyResult)>();
    let locks = KeyedLocks::default();
    let ctx = ApplyContext::new(opts.dry_run);
    let mut summary = ExecuteSummary::default();

    progress.on_batch_start(jobs, opts.dry_run);

    // The producer stays on this thread; all pool threads are consumers
    // except the collector.
    let produced = pool.in_place_scope(|scope| {
        let summary = &mut summary;
        let progress = &mut *progress;
        scope.spawn(move |_| {
            for (id, result) in results_rx {
                progress.on_resource_complete(&id, &result);
                summary.add_result(&result);
            }
        });

        for _ in 0..jobs {
            let results_tx = results_tx.clone();
            let rx = &rx;
            let locks = &locks;
            scope.spawn(move |_| {
                while let Some(resource) = next_resource(rx) {
                    let result = {
                        let _held = locks.acquire(resource.lock_key());
                        apply_resource(resource.as_ref(), ctx)
                    };
                    if results_tx.send((resource.id(), result)).is_err() {
                        break;
                    }
                }
            });
        }
        // The collector finishes once every consumer has dropped its sender
        drop(results_tx);

        let dispatcher = Dispatcher { tx };
        let produced = produce(&dispatcher);
        drop(dispatcher);
        produced
    });
    progress.on_batch_complete();

    produced?;
    Ok(summary)
}

fn next_resource(rx: &Mutex<Receiver<BoxedResource>>) -> Option<BoxedResource> {
    let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
    rx.recv().ok()
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, ctx: ApplyContext) -> ApplyResult {
    let mut ctx = ctx;
    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Set of lock keys currently being applied
#[derive(Default)]
struct KeyedLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl KeyedLocks {
    fn acquire(&self, key: String) -> KeyGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.clone());
        KeyGuard { locks: self, key }
    }
}

struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
        self.locks.released.notify_all();
    }
}
