//! Trait and types for the external fetch collaborator

use super::classify::ExitStatus;
use super::invocation::Invocation;
use async_trait::async_trait;

/// What the collaborator reported for one invocation
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorOutput {
    /// Whether the process exited successfully
    pub exit: ExitStatus,
    /// Raw exit code, when the process exited normally
    pub code: Option<i32>,
    /// Combined stdout and stderr text
    pub output: String,
}

impl CollaboratorOutput {
    /// Output of a successful run
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit: ExitStatus::Success,
            code: Some(0),
            output: output.into(),
        }
    }

    /// Output of a run that exited with `code`
    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit: ExitStatus::Failure,
            code: Some(code),
            output: output.into(),
        }
    }
}

/// External executable that performs the actual retrieval
///
/// Implementations run synchronously from the caller's point of view: the
/// returned future resolves once the retrieval has finished. The combined
/// output text is the only channel used to decide success or failure.
///
/// # Errors
///
/// `run` fails only when the collaborator could not be executed at all
/// (missing binary, spawn failure). A retrieval that ran and failed is a
/// successful `run` whose output says so.
#[async_trait]
pub trait FetchCollaborator: Send + Sync {
    /// Execute one invocation to completion
    async fn run(&self, invocation: &Invocation) -> crate::Result<CollaboratorOutput>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
