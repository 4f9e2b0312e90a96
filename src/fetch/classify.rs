//! Classification of collaborator output

use crate::types::Outcome;

/// Prefix the collaborator puts on error lines
pub const ERROR_PREFIX: &str = "ERROR:";

/// Printed when a multi-item batch finished despite per-item errors
pub const BATCH_FINISHED_MARKER: &str = "Finished downloading playlist";

/// Anti-automation challenge; tolerable only without credential access
pub const BENIGN_CHALLENGE_MARKER: &str = "Sign in to confirm you're not a bot";

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command exited successfully (exit code 0)
    Success,
    /// The command exited with a non-zero exit code or was killed
    Failure,
}

impl ExitStatus {
    /// Returns `true` if the exit status represents success
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ExitStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Decide the outcome of one collaborator run
///
/// - a successful exit is a success
/// - a failed exit whose output reports the batch as finished is a success
/// - a failed exit whose error lines are all the anti-automation challenge is
///   a success when `credentials_enabled` is false, and a failure otherwise
/// - anything else is a failure carrying the first error line as its reason
///
/// `exit_code` is only used to describe failures that printed no error line.
pub fn classify_output(
    output: &str,
    exit: ExitStatus,
    exit_code: Option<i32>,
    credentials_enabled: bool,
) -> Outcome {
    if exit.is_success() {
        return Outcome::Success;
    }

    if output.contains(BATCH_FINISHED_MARKER) {
        return Outcome::Success;
    }

    if only_benign_errors(output, credentials_enabled) {
        return Outcome::Success;
    }

    let reason = match first_error_line(output) {
        Some(line) => line.to_string(),
        None => match exit_code {
            Some(code) => format!("retrieval tool exited with code {code}"),
            None => "retrieval tool was terminated".to_string(),
        },
    };
    Outcome::Failed { reason }
}

/// First error line with the prefix stripped
pub fn first_error_line(output: &str) -> Option<&str> {
    error_lines(output).next()
}

fn error_lines(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(ERROR_PREFIX))
        .map(str::trim)
}

// True when there is at least one error line and each one is a challenge we
// may ignore. Credentials make the challenge a real error.
fn only_benign_errors(output: &str, credentials_enabled: bool) -> bool {
    if credentials_enabled {
        return false;
    }
    let mut seen = false;
    for line in error_lines(output) {
        if !line.contains(BENIGN_CHALLENGE_MARKER) {
            return false;
        }
        seen = true;
    }
    seen
}
