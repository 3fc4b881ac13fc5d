//! Commands for backup files and data maintenance

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::report;
use crate::services::{Backup, ClearSummary, ImportSummary};
use crate::AppState;

/// Result of writing a backup to disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupWritten {
    pub path: PathBuf,
    pub tasks: usize,
    pub checkins: usize,
}

/// Snapshot every task and check-in
pub async fn export_backup(state: &AppState) -> Result<Backup, String> {
    state.backup().export().await.map_err(report("export_backup"))
}

/// Write a backup file to `path`
pub async fn save_backup(state: &AppState, path: &Path) -> Result<BackupWritten, String> {
    let backup = export_backup(state).await?;
    let json = backup.to_json().map_err(report("save_backup"))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| report("save_backup")(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(BackupWritten {
        path: path.to_path_buf(),
        tasks: backup.tasks.len(),
        checkins: backup.checkins.len(),
    })
}

/// Merge a backup file into the store
pub async fn import_backup(state: &AppState, path: &Path) -> Result<ImportSummary, String> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| report("import_backup")(format!("Failed to read {}: {}", path.display(), e)))?;
    state.backup().import_json(&json).await.map_err(report("import_backup"))
}

/// Remove tasks whose parent no longer exists; returns how many were removed
pub async fn fix_ghosts(state: &AppState) -> Result<usize, String> {
    state.maintenance().fix_ghosts().await.map_err(report("fix_ghosts"))
}

/// Wipe every task and check-in
pub async fn clear_all(state: &AppState) -> Result<ClearSummary, String> {
    state.maintenance().clear_all().await.map_err(report("clear_all"))
}
