//! Configuration types for bulk-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Filesystem locations (output root, ledger, task list)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Root under which one directory per subject is created (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Append-only completion ledger (default: "downloaded.txt")
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Default task list read by file runs (default: "songs.txt")
    #[serde(default = "default_task_file")]
    pub task_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ledger_path: default_ledger_path(),
            task_file: default_task_file(),
        }
    }
}

/// Parameters handed to the external retrieval tool on every invocation
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    /// Audio container the retrieval tool transcodes to (default: "mp3")
    ///
    /// Also used as the extension when looking for artifacts already on disk.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Prefix turning a plain query into a single-result search (default: "ytsearch1:")
    #[serde(default = "default_search_prefix")]
    pub search_prefix: String,

    /// Network socket timeout in seconds (default: 30)
    #[serde(default = "default_socket_timeout_secs")]
    pub socket_timeout_secs: u64,

    /// Retries the tool performs internally for a failed request (default: 3)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Retries for individual media fragments (default: 3)
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    /// Embed the thumbnail as cover art (default: true)
    #[serde(default = "default_true")]
    pub embed_thumbnail: bool,

    /// Write title/artist metadata into the artifact (default: true)
    #[serde(default = "default_true")]
    pub add_metadata: bool,

    /// Browser whose cookies the tool may read (None = credential access disabled)
    ///
    /// When set, anti-automation challenges are treated as real failures,
    /// since the credentials should have prevented them.
    #[serde(default)]
    pub cookies_from_browser: Option<String>,
}

impl FetchConfig {
    /// Whether credential-based access is enabled for the retrieval tool
    #[must_use]
    pub fn credentials_enabled(&self) -> bool {
        self.cookies_from_browser.is_some()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            audio_format: default_audio_format(),
            search_prefix: default_search_prefix(),
            socket_timeout_secs: default_socket_timeout_secs(),
            retries: default_retries(),
            fragment_retries: default_retries(),
            embed_thumbnail: true,
            add_metadata: true,
            cookies_from_browser: None,
        }
    }
}

/// External tool paths
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Path to the retrieval tool (auto-detected as `yt-dlp` if None)
    #[serde(default)]
    pub fetcher_path: Option<PathBuf>,

    /// Path to the transcoder the retrieval tool relies on (auto-detected as `ffmpeg` if None)
    #[serde(default)]
    pub transcoder_path: Option<PathBuf>,

    /// Whether to search PATH for binaries when explicit paths are not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetcher_path: None,
            transcoder_path: None,
            search_path: true,
        }
    }
}

/// Live progress line settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    /// Milliseconds between progress renders (default: 2000)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Render the progress line to the console (default: true)
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl ProgressConfig {
    /// Interval between progress renders
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            show_progress: true,
        }
    }
}

/// Main configuration for [`BulkFetcher`](crate::BulkFetcher)
///
/// Sub-configs are flattened for serialization, so a configuration file is a
/// single flat JSON object:
///
/// ```json
/// { "output_dir": "music", "audio_format": "m4a", "cookies_from_browser": "firefox" }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Output root, ledger and task file locations
    #[serde(flatten)]
    pub paths: PathsConfig,

    /// Retrieval tool parameters
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// External binary locations
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Progress reporting
    #[serde(flatten)]
    pub progress: ProgressConfig,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.fetch.audio_format.trim().is_empty() {
            return Err(Error::config("audio_format", "audio format must not be empty"));
        }
        if self.fetch.audio_format.contains(['/', '\\', '.']) {
            return Err(Error::config(
                "audio_format",
                format!(
                    "audio format '{}' must be a bare extension",
                    self.fetch.audio_format
                ),
            ));
        }
        if self.fetch.socket_timeout_secs == 0 {
            return Err(Error::config(
                "socket_timeout_secs",
                "socket timeout must be at least one second",
            ));
        }
        if self.progress.progress_interval_ms == 0 {
            return Err(Error::config(
                "progress_interval_ms",
                "progress interval must be positive",
            ));
        }
        if let Some(browser) = &self.fetch.cookies_from_browser
            && browser.trim().is_empty()
        {
            return Err(Error::config(
                "cookies_from_browser",
                "browser name must not be empty",
            ));
        }
        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("downloaded.txt")
}

fn default_task_file() -> PathBuf {
    PathBuf::from("songs.txt")
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_search_prefix() -> String {
    "ytsearch1:".to_string()
}

fn default_socket_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_progress_interval_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
