//! Command line for one retrieval

use crate::config::FetchConfig;
use crate::mode::{ModeConfig, QualityParam};
use crate::types::Task;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use url::Url;

/// File name template expanded by the collaborator (title and extension)
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// What the collaborator should retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// Best match for a free-text search
    Search {
        /// `subject + " " + query`
        expression: String,
    },
    /// A direct source location
    Url(Url),
}

/// Fully resolved parameters of one collaborator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// What to retrieve
    pub target: FetchTarget,
    /// Output path template inside the subject directory
    pub output_template: PathBuf,
    /// Encode quality for the active mode
    pub quality: QualityParam,
    /// Retrieval tool settings
    pub settings: FetchConfig,
    /// Transcoder handed to the retrieval tool, when not left to its own lookup
    pub transcoder_path: Option<PathBuf>,
}

impl Invocation {
    /// Build the invocation for `task`, writing into `subject_dir`
    pub fn for_task(
        task: &Task,
        subject_dir: &Path,
        mode: &ModeConfig,
        settings: &FetchConfig,
    ) -> Self {
        let target = match &task.source_url {
            Some(url) => FetchTarget::Url(url.clone()),
            None => FetchTarget::Search {
                expression: format!("{} {}", task.subject, task.query),
            },
        };

        Self {
            target,
            output_template: subject_dir.join(OUTPUT_TEMPLATE),
            quality: mode.quality_param(),
            settings: settings.clone(),
            transcoder_path: None,
        }
    }

    /// Point the retrieval tool at a specific transcoder binary
    #[must_use]
    pub fn with_transcoder(mut self, path: Option<PathBuf>) -> Self {
        self.transcoder_path = path;
        self
    }

    /// Final positional argument: the URL, or the prefixed search expression
    #[must_use]
    pub fn target_arg(&self) -> String {
        match &self.target {
            FetchTarget::Search { expression } => {
                format!("{}{}", self.settings.search_prefix, expression)
            }
            FetchTarget::Url(url) => url.to_string(),
        }
    }

    /// Whether the anti-automation challenge should be treated as an error
    #[must_use]
    pub fn credentials_enabled(&self) -> bool {
        self.settings.credentials_enabled()
    }

    /// Complete argument list, target last
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let s = &self.settings;
        let mut args: Vec<OsString> = vec![
            "--extract-audio".into(),
            "--audio-format".into(),
            s.audio_format.clone().into(),
            "--audio-quality".into(),
            self.quality.as_arg().into(),
        ];

        if s.embed_thumbnail {
            args.push("--embed-thumbnail".into());
        }
        if s.add_metadata {
            args.push("--add-metadata".into());
        }

        args.extend([
            "--no-overwrites".into(),
            "--no-playlist".into(),
            "--socket-timeout".into(),
            s.socket_timeout_secs.to_string().into(),
            "--retries".into(),
            s.retries.to_string().into(),
            "--fragment-retries".into(),
            s.fragment_retries.to_string().into(),
            "--ignore-errors".into(),
            "--no-warnings".into(),
            "--output".into(),
            self.output_template.clone().into_os_string(),
        ]);

        if let Some(transcoder) = &self.transcoder_path {
            args.push("--ffmpeg-location".into());
            args.push(transcoder.clone().into_os_string());
        }

        if let Some(browser) = &s.cookies_from_browser {
            args.push("--cookies-from-browser".into());
            args.push(browser.into());
        }

        args.push(self.target_arg().into());
        args
    }
}
