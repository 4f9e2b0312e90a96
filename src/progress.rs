//! Live progress reporting for a running batch.
//!
//! The reporter is an observer: it wakes on a fixed interval, loads the
//! batch counters with relaxed atomics and renders them. It never takes a lock
//! the workers need, so a snapshot may be up to one interval stale.

use crate::scheduler::BatchStats;
use crate::types::{Event, ProgressSnapshot};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Destination for rendered progress
pub trait ProgressSink: Send + Sync {
    /// Render one snapshot, replacing the previous one
    fn render(&self, snapshot: &ProgressSnapshot);

    /// Called exactly once after the last render of a batch
    fn finish(&self) {}
}

/// Overwrites a single console line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    /// Text of one progress line, without the leading carriage return
    #[must_use]
    pub fn format_line(snapshot: &ProgressSnapshot) -> String {
        format!(
            "Progress: {:.1}% ({}/{}) - ok {} / failed {}",
            snapshot.percent(),
            snapshot.completed,
            snapshot.total,
            snapshot.succeeded,
            snapshot.failed
        )
    }
}

impl ProgressSink for ConsoleProgress {
    fn render(&self, snapshot: &ProgressSnapshot) {
        let mut stdout = std::io::stdout().lock();
        // progress is advisory; a closed stdout must not disturb the batch
        let _ = write!(stdout, "\r{}", Self::format_line(snapshot));
        let _ = stdout.flush();
    }

    fn finish(&self) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout);
        let _ = stdout.flush();
    }
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn render(&self, _snapshot: &ProgressSnapshot) {}
}

/// Parameters for spawning a progress reporter background task
pub(crate) struct ProgressReporterParams {
    /// Tasks in the batch
    pub total: u64,
    /// Counters updated by the workers
    pub stats: Arc<BatchStats>,
    /// Time between renders
    pub interval: Duration,
    /// Where snapshots are rendered
    pub sink: Arc<dyn ProgressSink>,
    /// Event broadcast sender
    pub event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Cancelled by the scheduler once every task has finished
    pub done: tokio_util::sync::CancellationToken,
}

/// Spawn a background task that periodically reports batch progress.
///
/// The first render happens one full interval after the start. The task ends
/// when `done` is cancelled and calls [`ProgressSink::finish`] once, only if
/// it rendered anything.
pub(crate) fn spawn_progress_reporter(
    params: ProgressReporterParams,
) -> tokio::task::JoinHandle<()> {
    let ProgressReporterParams {
        total,
        stats,
        interval,
        sink,
        event_tx,
        done,
    } = params;

    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut rendered = false;

        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = stats.snapshot(total);
                    sink.render(&snapshot);
                    rendered = true;
                    event_tx.send(Event::Progress(snapshot)).ok();
                }
            }
        }

        if rendered {
            sink.finish();
        }
    })
}
