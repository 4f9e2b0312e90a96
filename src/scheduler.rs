//! Bounded-concurrency batch scheduler
//!
//! Runs a list of tasks with at most `W` fetches in flight:
//! 1. Acquires a permit from the admission gate, in input order
//! 2. Spawns a worker holding that permit for the task's whole lifetime
//! 3. The worker fetches, records successes in the ledger and bumps the
//!    batch counters
//! 4. Once every worker has been joined, stops the progress reporter and
//!    returns the tally
//!
//! Tasks may complete in any order. There is no retry and no cancellation: a
//! failed task is counted and never attempted again in the same run.

use crate::fetch::FetchInvoker;
use crate::ledger::DedupLedger;
use crate::mode::ModeConfig;
use crate::progress::{ProgressReporterParams, ProgressSink, SilentProgress, spawn_progress_reporter};
use crate::types::{BatchSummary, Event, FailedTask, Outcome, ProgressSnapshot, Task};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Default interval between progress renders
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome counters for one run
///
/// Updated with lock-free atomic increments by the workers and read by the
/// progress reporter. Skips count toward `succeeded` as well.
#[derive(Debug, Default)]
pub struct BatchStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl BatchStats {
    /// Count a fetched task
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a task that was already present
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed task
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks that ended in success, skips included
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Tasks that failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Tasks skipped without invoking the collaborator
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Current counters against a batch of `total` tasks
    pub fn snapshot(&self, total: u64) -> ProgressSnapshot {
        let succeeded = self.succeeded();
        let failed = self.failed();
        ProgressSnapshot {
            completed: succeeded + failed,
            total,
            succeeded,
            failed,
        }
    }
}

/// Fans a batch out over a bounded number of workers
pub struct Scheduler {
    invoker: Arc<FetchInvoker>,
    ledger: Arc<DedupLedger>,
    event_tx: broadcast::Sender<Event>,
    progress_interval: Duration,
    progress_sink: Arc<dyn ProgressSink>,
}

/// Shared state handed to every worker
#[derive(Clone)]
struct WorkerContext {
    invoker: Arc<FetchInvoker>,
    ledger: Arc<DedupLedger>,
    stats: Arc<BatchStats>,
    event_tx: broadcast::Sender<Event>,
    mode: ModeConfig,
}

impl Scheduler {
    /// Create a scheduler without console progress
    pub fn new(
        invoker: Arc<FetchInvoker>,
        ledger: Arc<DedupLedger>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            invoker,
            ledger,
            event_tx,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_sink: Arc::new(SilentProgress),
        }
    }

    /// Render progress to `sink` every `interval`
    #[must_use]
    pub fn with_progress(mut self, interval: Duration, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_interval = interval;
        self.progress_sink = sink;
        self
    }

    /// Run every task with at most `workers` in flight and wait for all of them
    ///
    /// `workers` below one is treated as one. `mode` is copied into each
    /// worker, so later mode changes do not affect a running batch. On return,
    /// `succeeded + failed` equals the number of tasks.
    pub async fn run(&self, tasks: Vec<Task>, workers: usize, mode: ModeConfig) -> BatchSummary {
        let total = tasks.len() as u64;
        let workers = workers.max(1);
        let started_at = Utc::now();
        let start = Instant::now();

        info!(total, workers, mode = %mode.active_mode(), "starting batch");
        self.event_tx
            .send(Event::BatchStarted { total, workers })
            .ok();

        let stats = Arc::new(BatchStats::default());
        let done = CancellationToken::new();
        let reporter = spawn_progress_reporter(ProgressReporterParams {
            total,
            stats: Arc::clone(&stats),
            interval: self.progress_interval,
            sink: Arc::clone(&self.progress_sink),
            event_tx: self.event_tx.clone(),
            done: done.clone(),
        });

        let ctx = WorkerContext {
            invoker: Arc::clone(&self.invoker),
            ledger: Arc::clone(&self.ledger),
            stats: Arc::clone(&stats),
            event_tx: self.event_tx.clone(),
            mode,
        };

        let gate = Arc::new(Semaphore::new(workers));
        let mut running = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(tasks.len());
        let mut failures = Vec::new();

        for (index, task) in tasks.into_iter().enumerate() {
            // Blocks while `workers` tasks are running
            let permit = match Arc::clone(&gate).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(index, task = %task, error = %e, "admission gate closed");
                    stats.record_failure();
                    failures.push(FailedTask {
                        task,
                        reason: "admission gate closed".to_string(),
                    });
                    continue;
                }
            };

            let worker_ctx = ctx.clone();
            let worker_task = task.clone();
            let handle = running.spawn(async move {
                let _permit = permit;
                run_task(worker_ctx, index, worker_task).await
            });
            in_flight.insert(handle.id(), task);
        }

        while let Some(joined) = running.join_next_with_id().await {
            match joined {
                Ok((id, failure)) => {
                    in_flight.remove(&id);
                    failures.extend(failure);
                }
                Err(e) => {
                    // the worker died before counting its task
                    stats.record_failure();
                    let reason = format!("worker panicked: {e}");
                    match in_flight.remove(&e.id()) {
                        Some(task) => {
                            error!(task = %task, error = %e, "worker panicked");
                            failures.push(FailedTask { task, reason });
                        }
                        None => error!(error = %e, "worker panicked for unknown task"),
                    }
                }
            }
        }

        done.cancel();
        if let Err(e) = reporter.await {
            warn!(error = %e, "progress reporter ended abnormally");
        }

        let elapsed = start.elapsed();
        let summary = BatchSummary {
            total,
            succeeded: stats.succeeded(),
            failed: stats.failed(),
            skipped: stats.skipped(),
            workers,
            started_at,
            elapsed,
            failures,
        };

        info!(
            total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch complete"
        );
        self.event_tx
            .send(Event::BatchComplete {
                succeeded: summary.succeeded,
                failed: summary.failed,
                elapsed,
            })
            .ok();

        summary
    }
}

/// Handle one task from `running` to `succeeded` or `failed`
///
/// Returns the failure, if any, for the batch summary.
async fn run_task(ctx: WorkerContext, index: usize, task: Task) -> Option<FailedTask> {
    ctx.event_tx
        .send(Event::TaskStarted {
            index,
            task: task.clone(),
        })
        .ok();

    let outcome = match ctx.invoker.fetch(&task, &ctx.mode).await {
        Ok(outcome) => outcome,
        Err(e) => Outcome::Failed {
            reason: e.to_string(),
        },
    };

    let skipped = outcome == Outcome::Skipped;
    match outcome {
        Outcome::Success | Outcome::Skipped => {
            if !task.is_direct() {
                let key = task.key();
                if let Err(e) = ctx.ledger.record(&key).await {
                    error!(key = %key, error = %e, "failed to persist completion");
                    ctx.event_tx
                        .send(Event::LedgerWriteFailed {
                            key,
                            error: e.to_string(),
                        })
                        .ok();
                }
            }

            let event = if skipped {
                ctx.stats.record_skipped();
                Event::TaskSkipped { index, task }
            } else {
                ctx.stats.record_success();
                info!(task = %task, "fetched");
                Event::TaskSucceeded { index, task }
            };
            ctx.event_tx.send(event).ok();
            None
        }
        Outcome::Failed { reason } => {
            ctx.stats.record_failure();
            warn!(task = %task, reason = %reason, "task failed");
            ctx.event_tx
                .send(Event::TaskFailed {
                    index,
                    task: task.clone(),
                    reason: reason.clone(),
                })
                .ok();
            Some(FailedTask { task, reason })
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::fetch::{CollaboratorOutput, FetchCollaborator, FetchTarget, Invocation};
    use crate::mode::SystemResources;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Collaborator that sleeps, tracks concurrency and fails selected queries
    #[derive(Default)]
    struct FakeCollaborator {
        delay: Duration,
        fail_containing: Option<&'static str>,
        panic_containing: Option<&'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        targets: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FetchCollaborator for FakeCollaborator {
        async fn run(&self, invocation: &Invocation) -> crate::Result<CollaboratorOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            let target = match &invocation.target {
                FetchTarget::Search { expression } => expression.clone(),
                FetchTarget::Url(url) => url.to_string(),
            };
            self.targets.lock().unwrap().push(target.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(marker) = self.panic_containing
                && target.contains(marker)
            {
                panic!("collaborator blew up on {target}");
            }
            match self.fail_containing {
                Some(marker) if target.contains(marker) => Ok(CollaboratorOutput::failure(
                    1,
                    "ERROR: [youtube] x: Video unavailable\n",
                )),
                _ => Ok(CollaboratorOutput::success("[download] 100%\n")),
            }
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    /// Counts renders and finishes
    #[derive(Default)]
    struct CountingSink {
        renders: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ProgressSink for CountingSink {
        fn render(&self, _snapshot: &ProgressSnapshot) {
            self.renders.fetch_add(1, Ordering::SeqCst);
        }

        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn mode() -> ModeConfig {
        ModeConfig::new(SystemResources {
            cores: 2,
            memory_bytes: 0,
        })
    }

    async fn scheduler(
        dir: &std::path::Path,
        collab: Arc<FakeCollaborator>,
    ) -> (Scheduler, Arc<DedupLedger>, broadcast::Receiver<Event>) {
        let ledger = Arc::new(DedupLedger::load(dir.join("downloaded.txt")).await.unwrap());
        let invoker = Arc::new(FetchInvoker::new(
            collab,
            Arc::clone(&ledger),
            FetchConfig::default(),
            dir.join("out"),
        ));
        let (event_tx, event_rx) = broadcast::channel(1024);
        (
            Scheduler::new(invoker, Arc::clone(&ledger), event_tx),
            ledger,
            event_rx,
        )
    }

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task::search(format!("artist {}", i % 3), format!("song {i}")))
            .collect()
    }

    #[tokio::test]
    async fn never_exceeds_worker_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let (scheduler, _, _rx) = scheduler(dir.path(), Arc::clone(&collab)).await;

        let summary = scheduler.run(tasks(20), 4, mode()).await;

        assert_eq!(summary.total, 20);
        assert_eq!(summary.succeeded + summary.failed, 20);
        let max = collab.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 4, "saw {max} concurrent invocations");
        assert!(max >= 2, "workers should overlap, saw {max}");
    }

    #[tokio::test]
    async fn successes_are_recorded_in_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator::default());
        let (scheduler, ledger, _rx) = scheduler(dir.path(), collab).await;

        let summary = scheduler
            .run(vec![Task::search("adele", "rolling in the deep")], 4, mode())
            .await;

        assert_eq!(summary.succeeded, 1);
        assert!(
            ledger
                .contains(&crate::types::LedgerKey::new("adele", "rolling in the deep"))
                .await
        );
    }

    #[tokio::test]
    async fn failures_are_counted_and_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator {
            fail_containing: Some("song 1"),
            ..Default::default()
        });
        let (scheduler, ledger, _rx) = scheduler(dir.path(), collab).await;

        let summary = scheduler.run(tasks(3), 2, mode()).await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].task.query, "song 1");
        assert_eq!(summary.failures[0].reason, "[youtube] x: Video unavailable");
        assert!(!ledger.contains(&summary.failures[0].task.key()).await);
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn ledger_hits_never_reach_collaborator() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator::default());
        let (scheduler, ledger, _rx) = scheduler(dir.path(), Arc::clone(&collab)).await;

        let done = Task::search("queen", "bohemian rhapsody");
        ledger.record(&done.key()).await.unwrap();

        let summary = scheduler
            .run(vec![done, Task::search("queen", "under pressure")], 2, mode())
            .await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            collab.targets.lock().unwrap().clone(),
            vec!["queen under pressure".to_string()]
        );
    }

    #[tokio::test]
    async fn direct_tasks_are_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator::default());
        let (scheduler, ledger, _rx) = scheduler(dir.path(), collab).await;

        let url = url::Url::parse("https://example.com/v/42").unwrap();
        let summary = scheduler
            .run(vec![Task::direct("queen", url)], 1, mode())
            .await;

        assert_eq!(summary.succeeded, 1);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn panicking_worker_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator {
            panic_containing: Some("song 2"),
            ..Default::default()
        });
        let (scheduler, _, _rx) = scheduler(dir.path(), collab).await;

        let summary = scheduler.run(tasks(4), 2, mode()).await;

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].task.query, "song 2");
        assert!(summary.failures[0].reason.contains("panicked"));
    }

    #[tokio::test]
    async fn zero_workers_still_makes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator::default());
        let (scheduler, _, _rx) = scheduler(dir.path(), Arc::clone(&collab)).await;

        let summary = scheduler.run(tasks(3), 0, mode()).await;

        assert_eq!(summary.workers, 1);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(collab.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator::default());
        let (scheduler, _, mut rx) = scheduler(dir.path(), collab).await;

        let summary = scheduler.run(Vec::new(), 4, mode()).await;

        assert_eq!(summary.total, 0);
        assert!(summary.all_succeeded());
        assert!(matches!(rx.recv().await.unwrap(), Event::BatchStarted { total: 0, .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::BatchComplete { .. }));
    }

    #[tokio::test]
    async fn batch_complete_is_the_last_event() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator {
            delay: Duration::from_millis(5),
            fail_containing: Some("song 0"),
            ..Default::default()
        });
        let (scheduler, _, mut rx) = scheduler(dir.path(), collab).await;

        scheduler.run(tasks(5), 3, mode()).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(Event::BatchStarted { total: 5, .. })));
        assert!(matches!(
            events.last(),
            Some(Event::BatchComplete {
                succeeded: 4,
                failed: 1,
                ..
            })
        ));
        let started = events
            .iter()
            .filter(|e| matches!(e, Event::TaskStarted { .. }))
            .count();
        assert_eq!(started, 5);
    }

    #[test]
    fn stats_snapshot_counts_skips_as_successes() {
        let stats = BatchStats::default();
        stats.record_success();
        stats.record_skipped();
        stats.record_failure();

        let snap = stats.snapshot(5);
        assert_eq!(snap.completed, 3);
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(stats.skipped(), 1);
    }

    #[tokio::test]
    async fn progress_renders_only_while_batch_runs() {
        let dir = tempfile::tempdir().unwrap();
        let collab = Arc::new(FakeCollaborator {
            delay: Duration::from_millis(40),
            ..Default::default()
        });
        let (scheduler, _, mut rx) = scheduler(dir.path(), collab).await;
        let sink = Arc::new(CountingSink::default());
        let scheduler = scheduler.with_progress(Duration::from_millis(10), sink.clone());

        let summary = scheduler.run(tasks(8), 2, mode()).await;
        assert_eq!(summary.succeeded, 8);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let complete = events
            .iter()
            .position(|e| matches!(e, Event::BatchComplete { .. }))
            .unwrap();
        assert_eq!(complete, events.len() - 1);

        let progress: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Progress(_)))
            .map(|(i, _)| i)
            .collect();
        assert!(!progress.is_empty(), "no progress while the batch ran");
        assert!(progress.iter().all(|&i| i < complete));

        let renders = sink.renders.load(Ordering::SeqCst);
        assert!(renders > 0);
        assert_eq!(renders, progress.len());
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }
}
