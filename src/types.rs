//! Core types and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Separator joining subject and descriptor in a ledger key
pub const KEY_SEPARATOR: &str = " - ";

/// One unit of work: a subject/descriptor pair or a direct source URL
///
/// Built by [`parse_line`](crate::parser::parse_line); immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Grouping key (performer); names the output directory
    pub subject: String,
    /// Descriptor text, used as the search query when there is no source URL
    pub query: String,
    /// Direct location to fetch instead of searching
    pub source_url: Option<Url>,
}

impl Task {
    /// Build a search task
    pub fn search(subject: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            query: query.into(),
            source_url: None,
        }
    }

    /// Build a task fetching a direct URL, grouped under `subject`
    pub fn direct(subject: impl Into<String>, url: Url) -> Self {
        Self {
            subject: subject.into(),
            query: url.to_string(),
            source_url: Some(url),
        }
    }

    /// Whether this task fetches a direct URL
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.source_url.is_some()
    }

    /// Ledger key identifying this task across runs
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(&self.subject, &self.query)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.subject, KEY_SEPARATOR, self.query)
    }
}

/// Completion key, `subject + " - " + descriptor`
///
/// Comparison is exact and case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerKey(String);

impl LedgerKey {
    /// Derive a key from its parts
    pub fn new(subject: &str, descriptor: &str) -> Self {
        Self(format!("{subject}{KEY_SEPARATOR}{descriptor}"))
    }

    /// Wrap a line read back from the ledger file
    pub fn from_line(line: &str) -> Self {
        Self(line.to_string())
    }

    /// The key as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one fetch attempt
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The retrieval tool completed the fetch
    Success,
    /// Already present (ledger or disk); the tool was not invoked
    Skipped,
    /// The fetch failed
    Failed {
        /// First error reported by the tool, or a generic description
        reason: String,
    },
}

impl Outcome {
    /// Whether this outcome counts toward the succeeded tally
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Skipped)
    }
}

/// A task that failed during a batch, with the reason surfaced to the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    /// The task that failed
    pub task: Task,
    /// Why it failed
    pub reason: String,
}

/// Final tally of one scheduling run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of tasks handed to the scheduler
    pub total: u64,
    /// Tasks that ended in success (including skips)
    pub succeeded: u64,
    /// Tasks that ended in failure
    pub failed: u64,
    /// Successes that did not invoke the retrieval tool
    pub skipped: u64,
    /// Worker ceiling used for the run
    pub workers: usize,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Failed tasks in completion order
    pub failures: Vec<FailedTask>,
}

impl BatchSummary {
    /// Whether every task succeeded
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Point-in-time view of a running batch
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Tasks finished so far (succeeded + failed)
    pub completed: u64,
    /// Tasks in the batch
    pub total: u64,
    /// Succeeded so far
    pub succeeded: u64,
    /// Failed so far
    pub failed: u64,
}

impl ProgressSnapshot {
    /// Completion percentage (0.0 to 100.0); an empty batch is complete
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Event emitted while a batch runs
///
/// Delivered through the broadcast channel returned by
/// [`BulkFetcher::subscribe`](crate::BulkFetcher::subscribe). Slow subscribers
/// may miss events; the scheduler never waits on them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was admitted to the scheduler
    BatchStarted {
        /// Number of tasks in the batch
        total: u64,
        /// Worker ceiling
        workers: usize,
    },

    /// A worker started handling a task
    TaskStarted {
        /// Position in the batch (0-based)
        index: usize,
        /// The task
        task: Task,
    },

    /// A task was already present and the tool was not invoked
    TaskSkipped {
        /// Position in the batch (0-based)
        index: usize,
        /// The task
        task: Task,
    },

    /// A task was fetched successfully
    TaskSucceeded {
        /// Position in the batch (0-based)
        index: usize,
        /// The task
        task: Task,
    },

    /// A task failed
    TaskFailed {
        /// Position in the batch (0-based)
        index: usize,
        /// The task
        task: Task,
        /// Failure reason
        reason: String,
    },

    /// Periodic aggregate progress
    Progress(ProgressSnapshot),

    /// A completion could not be persisted to the ledger file
    LedgerWriteFailed {
        /// Key that stayed in memory only
        key: LedgerKey,
        /// I/O error text
        error: String,
    },

    /// Every task in the batch has finished
    BatchComplete {
        /// Tasks that ended in success
        succeeded: u64,
        /// Tasks that ended in failure
        failed: u64,
        /// Wall-clock duration
        elapsed: Duration,
    },
}
