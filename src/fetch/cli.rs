//! CLI-based collaborator using the external `yt-dlp` binary

use super::classify::ExitStatus;
use super::invocation::Invocation;
use super::traits::{CollaboratorOutput, FetchCollaborator};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Binary name searched for on PATH
pub const DEFAULT_FETCHER_BINARY: &str = "yt-dlp";

/// Collaborator that spawns the retrieval binary once per invocation
///
/// Stdout and stderr are captured in full and concatenated; the child is
/// killed if the future is dropped.
///
/// # Examples
///
/// ```no_run
/// use bulk_dl::fetch::CliFetcher;
/// use std::path::PathBuf;
///
/// // Explicit path
/// let fetcher = CliFetcher::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let fetcher = CliFetcher::from_path().expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct CliFetcher {
    binary_path: PathBuf,
}

impl CliFetcher {
    /// Create a collaborator with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find the retrieval binary in PATH
    pub fn from_path() -> Option<Self> {
        which::which(DEFAULT_FETCHER_BINARY).ok().map(Self::new)
    }

    /// Path of the binary this collaborator runs
    #[must_use]
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl FetchCollaborator for CliFetcher {
    async fn run(&self, invocation: &Invocation) -> crate::Result<CollaboratorOutput> {
        let output = Command::new(&self.binary_path)
            .args(invocation.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                crate::Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }

        Ok(CollaboratorOutput {
            exit: ExitStatus::from(output.status.success()),
            code: output.status.code(),
            output: combined,
        })
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}
