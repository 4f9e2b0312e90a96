//! # bulk-dl
//!
//! Concurrent bulk media acquisition on top of an external retrieval tool.
//!
//! A task list of `subject - descriptor` lines is parsed, tasks already
//! recorded in the completion ledger are dropped, and the rest are fetched
//! with a bounded number of concurrent `yt-dlp` invocations. Each success is
//! appended to the ledger so a rerun never fetches the same item twice.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_dl::{BulkFetcher, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = BulkFetcher::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = fetcher
//!         .run_lines(["pearl jam - even flow", "adele - rolling in the deep"])
//!         .await;
//!     println!("{} succeeded, {} failed", report.summary.succeeded, report.summary.failed);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Task source planning
pub mod batch;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Single-task retrieval through the external tool
pub mod fetch;
/// Top-level fetcher handle
pub mod fetcher;
/// Persistent completion ledger
pub mod ledger;
/// Performance modes and worker sizing
pub mod mode;
/// Task line parsing
pub mod parser;
/// Live progress rendering
pub mod progress;
/// Bounded-concurrency batch execution
pub mod scheduler;
/// External binary discovery
pub mod tools;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use batch::{BatchPlan, BatchReport};
pub use config::Config;
pub use error::{Error, Result};
pub use fetch::{CliFetcher, FetchCollaborator, FetchInvoker};
pub use fetcher::BulkFetcher;
pub use ledger::DedupLedger;
pub use mode::{Mode, ModeConfig, QualityParam, SystemResources};
pub use progress::{ConsoleProgress, ProgressSink, SilentProgress};
pub use scheduler::{BatchStats, Scheduler};
pub use tools::ToolReport;
pub use types::{BatchSummary, Event, FailedTask, LedgerKey, Outcome, ProgressSnapshot, Task};
