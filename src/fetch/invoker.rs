//! Per-task fetch: pre-flight de-duplication, invocation and classification

use super::classify::classify_output;
use super::invocation::Invocation;
use super::traits::FetchCollaborator;
use crate::config::FetchConfig;
use crate::error::Result;
use crate::ledger::DedupLedger;
use crate::mode::ModeConfig;
use crate::types::{Outcome, Task};
use crate::utils::{has_matching_artifact, sanitize_subject};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs the fetch collaborator for single tasks
///
/// Cheap to share: the scheduler wraps one invoker in an `Arc` and hands it to
/// every worker.
pub struct FetchInvoker {
    collaborator: Arc<dyn FetchCollaborator>,
    ledger: Arc<DedupLedger>,
    settings: FetchConfig,
    output_dir: PathBuf,
    transcoder_path: Option<PathBuf>,
}

impl FetchInvoker {
    /// Create an invoker writing subject directories under `output_dir`
    pub fn new(
        collaborator: Arc<dyn FetchCollaborator>,
        ledger: Arc<DedupLedger>,
        settings: FetchConfig,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            collaborator,
            ledger,
            settings,
            output_dir,
            transcoder_path: None,
        }
    }

    /// Hand the retrieval tool an explicit transcoder location
    #[must_use]
    pub fn with_transcoder_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcoder_path = path;
        self
    }

    /// Directory receiving the task's artifacts
    #[must_use]
    pub fn subject_dir(&self, task: &Task) -> PathBuf {
        self.output_dir.join(sanitize_subject(&task.subject))
    }

    /// Whether a search task is already done, per ledger or disk
    ///
    /// Direct URL tasks are never considered done: their descriptor is the URL,
    /// which does not appear in artifact names.
    pub async fn already_present(&self, task: &Task) -> bool {
        if task.is_direct() {
            return false;
        }
        if self.ledger.contains(&task.key()).await {
            return true;
        }
        has_matching_artifact(
            &self.subject_dir(task),
            &task.query,
            &self.settings.audio_format,
        )
        .await
    }

    /// Fetch one task
    ///
    /// Creates the subject directory, returns [`Outcome::Skipped`] without
    /// invoking the collaborator when the task is already present, and
    /// otherwise classifies the collaborator's output.
    ///
    /// # Errors
    ///
    /// Fails when the subject directory cannot be created or the collaborator
    /// cannot be executed. A retrieval that ran and failed is
    /// `Ok(Outcome::Failed { .. })`.
    pub async fn fetch(&self, task: &Task, mode: &ModeConfig) -> Result<Outcome> {
        let subject_dir = self.subject_dir(task);
        tokio::fs::create_dir_all(&subject_dir).await?;

        if self.already_present(task).await {
            info!(task = %task, "already present, skipping retrieval");
            return Ok(Outcome::Skipped);
        }

        let invocation = Invocation::for_task(task, &subject_dir, mode, &self.settings)
            .with_transcoder(self.transcoder_path.clone());
        debug!(
            task = %task,
            collaborator = self.collaborator.name(),
            target = %invocation.target_arg(),
            quality = %invocation.quality,
            "invoking retrieval tool"
        );

        let output = self.collaborator.run(&invocation).await?;
        let outcome = classify_output(
            &output.output,
            output.exit,
            output.code,
            invocation.credentials_enabled(),
        );

        match &outcome {
            Outcome::Failed { reason } => {
                warn!(task = %task, code = ?output.code, reason = %reason, "retrieval failed");
            }
            _ if !output.exit.is_success() => {
                debug!(task = %task, code = ?output.code, "tolerated non-zero exit");
            }
            _ => {}
        }

        Ok(outcome)
    }
}
