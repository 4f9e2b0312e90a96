//! Fetch collaborator integration
//!
//! The actual retrieval (network fetch, transcoding, tagging) is done by an
//! external executable. This module builds its invocation for one task, runs
//! it through the [`FetchCollaborator`] trait and classifies the combined
//! output into an [`Outcome`](crate::types::Outcome).
//!
//! ## Architecture
//!
//! - [`FetchCollaborator`]: runs one [`Invocation`] and returns its output
//! - [`CliFetcher`]: production collaborator spawning the `yt-dlp` binary
//! - [`FetchInvoker`]: pre-flight de-duplication, directory setup, invocation
//!   and classification for one task
//!
//! ## Usage
//!
//! ```no_run
//! use bulk_dl::fetch::{CliFetcher, FetchInvoker};
//! use bulk_dl::{Config, DedupLedger, ModeConfig, Task};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let fetcher = CliFetcher::from_path().ok_or("yt-dlp not found")?;
//!     let ledger = Arc::new(DedupLedger::load(&config.paths.ledger_path).await?);
//!
//!     let invoker = FetchInvoker::new(
//!         Arc::new(fetcher),
//!         ledger,
//!         config.fetch.clone(),
//!         config.paths.output_dir.clone(),
//!     );
//!
//!     let outcome = invoker
//!         .fetch(&Task::search("adele", "hello"), &ModeConfig::detect())
//!         .await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

mod classify;
mod cli;
mod invocation;
mod invoker;
mod traits;

pub use classify::{
    BATCH_FINISHED_MARKER, BENIGN_CHALLENGE_MARKER, ERROR_PREFIX, ExitStatus, classify_output,
    first_error_line,
};
pub use cli::{CliFetcher, DEFAULT_FETCHER_BINARY};
pub use invocation::{FetchTarget, Invocation, OUTPUT_TEMPLATE};
pub use invoker::FetchInvoker;
pub use traits::{CollaboratorOutput, FetchCollaborator};
