//! Utility functions for output paths and on-disk artifact detection

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Longest directory name produced by [`sanitize_subject`], in characters
pub const MAX_FOLDER_NAME_LEN: usize = 50;

/// Name used when sanitization leaves nothing
pub const PLACEHOLDER_FOLDER_NAME: &str = "UnnamedFolder";

#[allow(clippy::expect_used)]
static ILLEGAL_FOLDER_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static pattern is valid"));

/// Turn a subject into a directory name that is valid on every major platform
///
/// Characters illegal in Windows file names become `_`, trailing dots and
/// spaces are removed, the result is capped at [`MAX_FOLDER_NAME_LEN`]
/// characters and an empty result becomes [`PLACEHOLDER_FOLDER_NAME`].
///
/// # Examples
///
/// ```
/// use bulk_dl::utils::sanitize_subject;
///
/// assert_eq!(sanitize_subject("AC/DC"), "AC_DC");
/// assert_eq!(sanitize_subject("Mr. "), "Mr");
/// assert_eq!(sanitize_subject("..."), "UnnamedFolder");
/// ```
#[must_use]
pub fn sanitize_subject(subject: &str) -> String {
    let replaced = ILLEGAL_FOLDER_CHARS.replace_all(subject, "_");
    let trimmed = replaced.trim_end_matches(['.', ' ']).trim();

    let capped: String = trimmed.chars().take(MAX_FOLDER_NAME_LEN).collect();

    if capped.is_empty() {
        PLACEHOLDER_FOLDER_NAME.to_string()
    } else {
        capped
    }
}

/// Whether `dir` already holds an artifact whose name mentions `descriptor`
///
/// Only files with the given extension are considered; matching is a
/// case-insensitive substring test on the file name. A missing or unreadable
/// directory holds nothing.
pub async fn has_matching_artifact(dir: &Path, descriptor: &str, extension: &str) -> bool {
    let needle = descriptor.to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return false;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !ext_matches {
            continue;
        }
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.to_lowercase().contains(&needle)
        {
            return true;
        }
    }

    false
}
