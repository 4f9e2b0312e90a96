//! Error types for bulk-dl
//!
//! Every fallible operation in the crate returns [`Result`]. Variants carry
//! enough context (paths, tool names, configuration keys) to be reported to a
//! user without further lookup. None of these errors are fatal to the process;
//! callers abort only the single operation that produced them.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bulk-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bulk-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "audio_format")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The completion ledger could not be read or appended to
    #[error("ledger error at {}: {source}", path.display())]
    Ledger {
        /// Path of the ledger file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// External tool execution failed (spawn failure, broken pipe, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A required external tool could not be located
    #[error("required tool '{name}' not found (install hint: {hint})")]
    ToolMissing {
        /// Binary name that was searched for
        name: String,
        /// How to install the tool
        hint: String,
    },

    /// The task file does not exist
    #[error("task file not found: {}", path.display())]
    TaskFileMissing {
        /// Path that was expected to hold the task list
        path: PathBuf,
        /// Whether an example task file was written in its place
        example_created: bool,
    },

    /// A task could not be built from the given input
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
