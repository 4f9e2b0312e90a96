//! Task list parsing
//!
//! Turns one line of text into a [`Task`]. The subject and descriptor are
//! separated by the first recognized separator token; a descriptor that is an
//! absolute `http(s)` URL turns the task into a direct fetch.

use crate::error::Error;
use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Separators tried in order
pub const SEPARATORS: &[&str] = &[" - ", " | ", " :: ", " -> "];

/// Marker starting a comment line
pub const COMMENT_PREFIX: char = '#';

/// A line that could not be turned into a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedLine {
    /// 1-based line number in the source
    pub line_number: usize,
    /// The offending line, trimmed
    pub content: String,
}

/// Whether a trimmed line carries no task at all (blank or comment)
#[must_use]
pub fn is_ignorable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with(COMMENT_PREFIX)
}

/// Parse one line into a task
///
/// Returns `None` when no separator yields two non-empty parts. Blank and
/// comment lines should be filtered with [`is_ignorable`] before calling this.
///
/// # Examples
///
/// ```
/// use bulk_dl::parser::parse_line;
///
/// let task = parse_line("pearl jam - even flow").unwrap();
/// assert_eq!(task.subject, "pearl jam");
/// assert_eq!(task.query, "even flow");
///
/// assert!(parse_line("not a valid line").is_none());
/// ```
#[must_use]
pub fn parse_line(line: &str) -> Option<Task> {
    let line = line.trim();

    for separator in SEPARATORS {
        let Some((subject, descriptor)) = line.split_once(separator) else {
            continue;
        };
        let subject = subject.trim();
        let descriptor = descriptor.trim();
        if subject.is_empty() || descriptor.is_empty() {
            continue;
        }

        return Some(match direct_url(descriptor) {
            Some(url) => Task::direct(subject, url),
            None => Task::search(subject, descriptor),
        });
    }

    None
}

/// Parse a whole task list
///
/// Blank and comment lines are dropped silently; every other line either
/// becomes a task or is reported as malformed.
pub fn parse_tasks<'a, I>(lines: I) -> (Vec<Task>, Vec<MalformedLine>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tasks = Vec::new();
    let mut malformed = Vec::new();

    for (idx, line) in lines.into_iter().enumerate() {
        if is_ignorable(line) {
            continue;
        }
        match parse_line(line) {
            Some(task) => tasks.push(task),
            None => malformed.push(MalformedLine {
                line_number: idx + 1,
                content: line.trim().to_string(),
            }),
        }
    }

    (tasks, malformed)
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s).ok_or_else(|| {
            Error::InvalidTask(format!("expected `subject - descriptor`, got {:?}", s.trim()))
        })
    }
}

fn direct_url(text: &str) -> Option<Url> {
    if !(text.starts_with("http://") || text.starts_with("https://")) {
        return None;
    }
    Url::parse(text)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
}
