//! Event collection and ledger assertions

use bulk_dl::Event;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Drain `events` until `BatchComplete` arrives or `timeout` elapses
///
/// Returns everything received, `BatchComplete` included when it arrived.
pub async fn collect_until_complete(events: &mut Receiver<Event>, timeout: Duration) -> Vec<Event> {
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, Event::BatchComplete { .. });
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

/// Lines of the ledger file at `path`, in file order
pub fn ledger_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => panic!("failed to read ledger {}: {e}", path.display()),
    }
}

/// Assert the ledger file holds exactly `expected`, in any order
pub fn assert_ledger_contains_exactly(path: &Path, expected: &[&str]) {
    let mut actual = ledger_lines(path);
    actual.sort();
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(actual, expected, "ledger contents at {}", path.display());
}
