//! Top-level handle tying config, ledger, mode and collaborator together

use crate::batch::{BatchReport, plan_file, plan_lines};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{CliFetcher, FetchCollaborator, FetchInvoker};
use crate::ledger::DedupLedger;
use crate::mode::ModeConfig;
use crate::progress::{ConsoleProgress, ProgressSink, SilentProgress};
use crate::scheduler::Scheduler;
use crate::tools::ToolReport;
use crate::types::{BatchSummary, Event, Task};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Bulk fetcher instance
///
/// Owns everything a run needs. Mode changes take `&mut self`, so they can
/// only happen between runs; each run works on a copy of the current mode.
pub struct BulkFetcher {
    config: Arc<Config>,
    ledger: Arc<DedupLedger>,
    mode: ModeConfig,
    collaborator: Arc<dyn FetchCollaborator>,
    progress_sink: Arc<dyn ProgressSink>,
    event_tx: broadcast::Sender<Event>,
}

impl BulkFetcher {
    /// Create a fetcher driving the `yt-dlp` binary
    ///
    /// This will:
    /// - Validate the configuration
    /// - Locate the retrieval tool, failing if it is missing
    /// - Warn if the transcoder is missing
    /// - Create the output directory and load the ledger
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bulk_dl::{BulkFetcher, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let mut fetcher = BulkFetcher::new(Config::default()).await?;
    ///     fetcher.mode_mut().enable_turbo();
    ///
    ///     let report = fetcher.run_file().await?;
    ///     println!("{} ok, {} failed", report.summary.succeeded, report.summary.failed);
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: Config) -> Result<Self> {
        let tools = ToolReport::discover(&config.tools);
        let fetcher_path = tools.fetcher.require()?.to_path_buf();
        if let Err(e) = tools.transcoder.require() {
            tracing::warn!(error = %e, "audio extraction will fail without the transcoder");
        }

        tracing::info!(
            collaborator = %fetcher_path.display(),
            "Retrieval tool located"
        );
        Self::with_collaborator(config, Arc::new(CliFetcher::new(fetcher_path))).await
    }

    /// Create a fetcher around an arbitrary collaborator
    ///
    /// Skips tool discovery. Mode is sized for the current host.
    pub async fn with_collaborator(
        config: Config,
        collaborator: Arc<dyn FetchCollaborator>,
    ) -> Result<Self> {
        config.validate()?;

        let output_dir = &config.paths.output_dir;
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create output directory '{}': {}",
                    output_dir.display(),
                    e
                ),
            ))
        })?;

        let ledger = DedupLedger::load(&config.paths.ledger_path).await?;

        let progress_sink: Arc<dyn ProgressSink> = if config.progress.show_progress {
            Arc::new(ConsoleProgress)
        } else {
            Arc::new(SilentProgress)
        };

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            ledger: Arc::new(ledger),
            mode: ModeConfig::detect(),
            collaborator,
            progress_sink,
            event_tx,
        })
    }

    /// Replace the mode, e.g. one sized for a known host
    #[must_use]
    pub fn with_mode(mut self, mode: ModeConfig) -> Self {
        self.mode = mode;
        self
    }

    /// Replace where live progress is rendered
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = sink;
        self
    }

    /// Subscribe to batch events
    ///
    /// Each subscriber receives every event sent after it subscribed. A
    /// subscriber lagging by more than the channel capacity gets
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The active configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The completion ledger
    pub fn ledger(&self) -> &Arc<DedupLedger> {
        &self.ledger
    }

    /// The current mode
    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    /// Mutable access to the mode, only possible between runs
    pub fn mode_mut(&mut self) -> &mut ModeConfig {
        &mut self.mode
    }

    /// Worker count the next run will use
    pub fn optimal_workers(&self) -> usize {
        self.mode.compute_optimal_workers()
    }

    /// Resolve the external binaries against the current configuration
    pub fn check_tools(&self) -> ToolReport {
        ToolReport::discover(&self.config.tools)
    }

    /// Run `tasks` as one batch
    ///
    /// Ledger hits among `tasks` are still pre-flight checked by the invoker
    /// and reported as skipped.
    pub async fn run_tasks(&self, tasks: Vec<Task>) -> BatchSummary {
        let mode = self.mode;
        let workers = mode.compute_optimal_workers();
        self.scheduler().run(tasks, workers, mode).await
    }

    /// Parse `lines`, drop ledger hits and run the rest
    pub async fn run_lines<'a, I>(&self, lines: I) -> BatchReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let plan = plan_lines(lines, &self.ledger).await;
        let already_done = plan.already_done.len();
        let summary = self.run_tasks(plan.tasks).await;
        BatchReport {
            summary,
            already_done,
            malformed: plan.malformed,
        }
    }

    /// Run the configured task file
    ///
    /// # Errors
    ///
    /// [`Error::TaskFileMissing`] when the file does not exist (an example is
    /// written in its place), [`Error::Io`] when it cannot be read.
    pub async fn run_file(&self) -> Result<BatchReport> {
        self.run_file_at(&self.config.paths.task_file).await
    }

    /// Run the task file at `path`
    ///
    /// # Errors
    ///
    /// Same as [`run_file`](Self::run_file).
    pub async fn run_file_at(&self, path: &Path) -> Result<BatchReport> {
        let plan = plan_file(path, &self.ledger).await?;
        let already_done = plan.already_done.len();
        let summary = self.run_tasks(plan.tasks).await;
        Ok(BatchReport {
            summary,
            already_done,
            malformed: plan.malformed,
        })
    }

    fn scheduler(&self) -> Scheduler {
        let invoker = FetchInvoker::new(
            Arc::clone(&self.collaborator),
            Arc::clone(&self.ledger),
            self.config.fetch.clone(),
            self.config.paths.output_dir.clone(),
        )
        .with_transcoder_path(self.config.tools.transcoder_path.clone());
        Scheduler::new(
            Arc::new(invoker),
            Arc::clone(&self.ledger),
            self.event_tx.clone(),
        )
        .with_progress(
            self.config.progress.interval(),
            Arc::clone(&self.progress_sink),
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathsConfig, ProgressConfig, ToolsConfig};
    use crate::fetch::{CollaboratorOutput, Invocation};
    use crate::mode::SystemResources;
    use async_trait::async_trait;

    struct AlwaysOk;

    #[async_trait]
    impl FetchCollaborator for AlwaysOk {
        async fn run(&self, _invocation: &Invocation) -> crate::Result<CollaboratorOutput> {
            Ok(CollaboratorOutput::success(""))
        }

        fn name(&self) -> &'static str {
            "always-ok"
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            paths: PathsConfig {
                output_dir: dir.join("music"),
                ledger_path: dir.join("downloaded.txt"),
                task_file: dir.join("songs.txt"),
            },
            progress: ProgressConfig {
                show_progress: false,
                ..ProgressConfig::default()
            },
            ..Config::default()
        }
    }

    fn resources() -> ModeConfig {
        ModeConfig::new(SystemResources {
            cores: 2,
            memory_bytes: 4 << 30,
        })
    }

    #[tokio::test]
    async fn with_collaborator_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = BulkFetcher::with_collaborator(config(dir.path()), Arc::new(AlwaysOk))
            .await
            .unwrap();

        assert!(dir.path().join("music").is_dir());
        assert!(fetcher.ledger().is_empty().await);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.fetch.audio_format = String::new();

        let result = BulkFetcher::with_collaborator(config, Arc::new(AlwaysOk)).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn new_fails_without_retrieval_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.tools = ToolsConfig {
            search_path: false,
            ..ToolsConfig::default()
        };

        let result = BulkFetcher::new(config).await;
        assert!(matches!(result, Err(Error::ToolMissing { .. })));
    }

    #[tokio::test]
    async fn mode_changes_drive_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = BulkFetcher::with_collaborator(config(dir.path()), Arc::new(AlwaysOk))
            .await
            .unwrap()
            .with_mode(resources());

        assert_eq!(fetcher.optimal_workers(), 4);
        fetcher.mode_mut().enable_turbo();
        assert_eq!(fetcher.optimal_workers(), 4);
        assert_eq!(fetcher.mode().active_mode(), crate::mode::Mode::Turbo);
    }

    #[tokio::test]
    async fn run_lines_reports_already_done() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = BulkFetcher::with_collaborator(config(dir.path()), Arc::new(AlwaysOk))
            .await
            .unwrap()
            .with_mode(resources());

        let first = fetcher.run_lines(["oasis - wonderwall"]).await;
        assert_eq!(first.summary.succeeded, 1);
        assert_eq!(first.already_done, 0);

        let second = fetcher.run_lines(["oasis - wonderwall"]).await;
        assert_eq!(second.summary.total, 0);
        assert_eq!(second.already_done, 1);
    }

    #[tokio::test]
    async fn run_file_missing_writes_example() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = BulkFetcher::with_collaborator(config(dir.path()), Arc::new(AlwaysOk))
            .await
            .unwrap();

        let result = fetcher.run_file().await;

        assert!(matches!(
            result,
            Err(Error::TaskFileMissing {
                example_created: true,
                ..
            })
        ));
        assert!(dir.path().join("songs.txt").is_file());
    }
}
