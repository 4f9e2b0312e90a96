//! Batch planning: from a task source to the list of tasks worth running

use crate::error::{Error, Result};
use crate::ledger::DedupLedger;
use crate::parser::{MalformedLine, parse_tasks};
use crate::types::{BatchSummary, Task};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Written in place of a missing task file
pub const EXAMPLE_TASK_FILE: &str = "# Songs file to download
# Format: artist - song

pearl jam - even flow
justin bieber - baby
queen - bohemian rhapsody
metallica - enter sandman
adele - rolling in the deep
coldplay - yellow
ed sheeran - shape of you
taylor swift - shake it off
nirvana - smells like teen spirit
oasis - wonderwall
";

/// Tasks parsed from a source, split by what should happen to them
#[derive(Clone, Debug, Default)]
pub struct BatchPlan {
    /// Tasks to hand to the scheduler, in source order
    pub tasks: Vec<Task>,
    /// Tasks whose key is already in the ledger
    pub already_done: Vec<Task>,
    /// Lines that did not parse
    pub malformed: Vec<MalformedLine>,
}

impl BatchPlan {
    /// Whether there is nothing to run
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Outcome of running a planned batch
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    /// Tally of the scheduled tasks
    pub summary: BatchSummary,
    /// Tasks dropped before scheduling because the ledger had them
    pub already_done: usize,
    /// Lines that did not parse
    pub malformed: Vec<MalformedLine>,
}

/// Parse `lines` and drop the ones the ledger already holds
///
/// Direct URL tasks are never dropped. Each malformed line is logged.
pub async fn plan_lines<'a, I>(lines: I, ledger: &DedupLedger) -> BatchPlan
where
    I: IntoIterator<Item = &'a str>,
{
    let (parsed, malformed) = parse_tasks(lines);

    for line in &malformed {
        warn!(line = line.line_number, content = %line.content, "invalid task line, skipping");
    }

    let mut plan = BatchPlan {
        malformed,
        ..BatchPlan::default()
    };
    for task in parsed {
        if !task.is_direct() && ledger.contains(&task.key()).await {
            info!(task = %task, "already downloaded");
            plan.already_done.push(task);
        } else {
            plan.tasks.push(task);
        }
    }

    info!(
        new = plan.tasks.len(),
        already_done = plan.already_done.len(),
        malformed = plan.malformed.len(),
        "batch planned"
    );
    plan
}

/// Read the task file at `path` and plan it
///
/// # Errors
///
/// A missing file yields [`Error::TaskFileMissing`], after an example file
/// has been written at `path`. Other read failures are [`Error::Io`].
pub async fn plan_file(path: &Path, ledger: &DedupLedger) -> Result<BatchPlan> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "task file not found, creating example");
            let example_created = match write_example_task_file(path).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to create example task file");
                    false
                }
            };
            return Err(Error::TaskFileMissing {
                path: path.to_path_buf(),
                example_created,
            });
        }
        Err(e) => return Err(e.into()),
    };

    Ok(plan_lines(content.lines(), ledger).await)
}

/// Write [`EXAMPLE_TASK_FILE`] to `path`, never overwriting an existing file
pub async fn write_example_task_file(path: &Path) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(EXAMPLE_TASK_FILE.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
