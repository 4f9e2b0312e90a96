//! Test configuration helpers for creating fetchers in temporary directories

use super::MockCollaborator;
use bulk_dl::config::{PathsConfig, ProgressConfig, ToolsConfig};
use bulk_dl::{BulkFetcher, Config, ModeConfig, SystemResources};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Configuration rooted in `dir`, with progress output disabled
pub fn test_config(dir: &Path) -> Config {
    Config {
        paths: PathsConfig {
            output_dir: dir.join("music"),
            ledger_path: dir.join("downloaded.txt"),
            task_file: dir.join("songs.txt"),
        },
        tools: ToolsConfig {
            search_path: false,
            ..ToolsConfig::default()
        },
        progress: ProgressConfig {
            show_progress: false,
            ..ProgressConfig::default()
        },
        ..Config::default()
    }
}

/// Mode for a small host: 2 cores, 4 GiB, giving 4 workers in every mode
pub fn small_host_mode() -> ModeConfig {
    ModeConfig::new(SystemResources {
        cores: 2,
        memory_bytes: 4 << 30,
    })
}

/// Create a fetcher in a fresh temp directory driven by `collaborator`
pub async fn create_test_fetcher(
    collaborator: Arc<MockCollaborator>,
) -> (BulkFetcher, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let fetcher = create_fetcher_in(test_config(temp_dir.path()), collaborator).await;
    (fetcher, temp_dir)
}

/// Create a fetcher with an explicit `config`
pub async fn create_fetcher_in(
    config: Config,
    collaborator: Arc<MockCollaborator>,
) -> BulkFetcher {
    BulkFetcher::with_collaborator(config, collaborator)
        .await
        .unwrap()
        .with_mode(small_host_mode())
}
