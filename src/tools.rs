//! Discovery of the external binaries a run depends on
//!
//! The retrieval tool does the actual fetching; the transcoder is what it
//! shells out to for audio extraction. Each is resolved from an explicit path
//! in [`ToolsConfig`] first, then from `PATH` when `search_path` is enabled.

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::fetch::DEFAULT_FETCHER_BINARY;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Binary name of the transcoder searched for on PATH
pub const DEFAULT_TRANSCODER_BINARY: &str = "ffmpeg";

/// Install hint shown when the retrieval tool is missing
pub const FETCHER_INSTALL_HINT: &str = "pip install yt-dlp";

/// Install hint shown when the transcoder is missing
pub const TRANSCODER_INSTALL_HINT: &str =
    "apt install ffmpeg / brew install ffmpeg / winget install Gyan.FFmpeg";

/// Resolution result for one binary
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    /// Binary name
    pub name: &'static str,
    /// Resolved location, `None` when missing
    pub path: Option<PathBuf>,
    /// How to install it
    pub hint: &'static str,
}

impl ToolStatus {
    fn resolve(
        name: &'static str,
        hint: &'static str,
        explicit: Option<&Path>,
        search_path: bool,
    ) -> Self {
        let path = match explicit {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => {
                tracing::warn!(tool = name, path = %path.display(), "configured tool path does not exist");
                None
            }
            None if search_path => which::which(name).ok(),
            None => None,
        };
        Self { name, path, hint }
    }

    /// Whether the binary was found
    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }

    /// Path of the binary, or [`Error::ToolMissing`]
    pub fn require(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| Error::ToolMissing {
            name: self.name.to_string(),
            hint: self.hint.to_string(),
        })
    }
}

/// Availability of every external binary
#[derive(Clone, Debug, Serialize)]
pub struct ToolReport {
    /// The retrieval tool (`yt-dlp`)
    pub fetcher: ToolStatus,
    /// The transcoder (`ffmpeg`)
    pub transcoder: ToolStatus,
}

impl ToolReport {
    /// Resolve both binaries according to `config`
    pub fn discover(config: &ToolsConfig) -> Self {
        Self {
            fetcher: ToolStatus::resolve(
                DEFAULT_FETCHER_BINARY,
                FETCHER_INSTALL_HINT,
                config.fetcher_path.as_deref(),
                config.search_path,
            ),
            transcoder: ToolStatus::resolve(
                DEFAULT_TRANSCODER_BINARY,
                TRANSCODER_INSTALL_HINT,
                config.transcoder_path.as_deref(),
                config.search_path,
            ),
        }
    }

    /// Whether nothing is missing
    pub fn all_available(&self) -> bool {
        self.fetcher.is_available() && self.transcoder.is_available()
    }

    /// Every binary that could not be found
    pub fn missing(&self) -> impl Iterator<Item = &ToolStatus> {
        [&self.fetcher, &self.transcoder]
            .into_iter()
            .filter(|tool| !tool.is_available())
    }
}
