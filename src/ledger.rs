//! Completion ledger
//!
//! Durable record of tasks that already completed, used to skip redundant work
//! across runs. Backed by an append-only text file holding one key per line.
//!
//! The in-memory set sits behind a readers-writer lock: any number of workers
//! may check for a key concurrently, while [`DedupLedger::record`] takes the
//! lock exclusively for both the insert and the file append, so the log order
//! always matches insertion order and no reader sees a half-recorded key.

use crate::error::{Error, Result};
use crate::types::LedgerKey;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Append-only completion ledger
#[derive(Debug)]
pub struct DedupLedger {
    path: PathBuf,
    keys: RwLock<HashSet<LedgerKey>>,
}

impl DedupLedger {
    /// Load the ledger from `path`
    ///
    /// A missing file is an empty ledger. Lines are trimmed and blank lines
    /// ignored; duplicate lines collapse into one key.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let keys = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(LedgerKey::from_line)
                .collect::<HashSet<_>>(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger file yet, starting empty");
                HashSet::new()
            }
            Err(source) => return Err(Error::Ledger { path, source }),
        };

        info!(path = %path.display(), entries = keys.len(), "loaded completion ledger");

        Ok(Self {
            path,
            keys: RwLock::new(keys),
        })
    }

    /// Whether `key` has been recorded
    pub async fn contains(&self, key: &LedgerKey) -> bool {
        self.keys.read().await.contains(key)
    }

    /// Record `key` as completed
    ///
    /// Returns `Ok(true)` when the key was new and appended to the file,
    /// `Ok(false)` when it was already present (nothing is written).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ledger`] when the append fails. The key stays recorded
    /// in memory regardless, so the current process will not fetch it again.
    pub async fn record(&self, key: &LedgerKey) -> Result<bool> {
        let mut keys = self.keys.write().await;
        if !keys.insert(key.clone()) {
            return Ok(false);
        }

        self.append_line(key.as_str())
            .await
            .map_err(|source| Error::Ledger {
                path: self.path.clone(),
                source,
            })?;

        debug!(key = %key, "recorded completion");
        Ok(true)
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await
    }

    /// Number of recorded keys
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Whether nothing has been recorded yet
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    /// Sorted snapshot of every recorded key
    pub async fn keys(&self) -> Vec<LedgerKey> {
        let mut keys: Vec<_> = self.keys.read().await.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
