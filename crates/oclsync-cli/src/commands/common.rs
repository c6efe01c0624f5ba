use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use oclsync_core::db::Database;
use oclsync_core::{EngineConfig, UpdateRecord, UpdateStatus};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct UpdateItem {
    pub id: i64,
    pub status: UpdateStatus,
    pub started_at: i64,
    pub started_at_iso: String,
    pub stopped_at: Option<i64>,
    pub duration_ms: Option<i64>,
    pub remote_started_at: Option<i64>,
    pub last_downloaded_release: Option<String>,
    pub error_message: Option<String>,
}

pub fn update_to_item(update: &UpdateRecord) -> UpdateItem {
    UpdateItem {
        id: update.id.get(),
        status: update.status(),
        started_at: update.started_at,
        started_at_iso: format_timestamp(update.started_at),
        stopped_at: update.stopped_at,
        duration_ms: update.duration_ms(),
        remote_started_at: update.remote_started_at,
        last_downloaded_release: update.last_downloaded_release.clone(),
        error_message: update.error_message.clone(),
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |datetime| datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_duration(duration_ms: i64) -> String {
    let seconds = duration_ms / 1000;
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 60 * 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

pub fn format_update_line(update: &UpdateRecord) -> String {
    let mut line = format!(
        "#{:<5} {:<9} {}",
        update.id,
        update.status(),
        format_timestamp(update.started_at)
    );

    if let Some(duration_ms) = update.duration_ms() {
        line.push_str(&format!("  ({})", format_duration(duration_ms)));
    }
    if let Some(release) = update.last_downloaded_release.as_deref() {
        line.push_str(&format!("  release {release}"));
    }
    if let Some(error) = update.error_message.as_deref() {
        line.push_str(&format!("  error: {error}"));
    }
    line
}

pub fn format_update_lines(updates: &[UpdateRecord]) -> Vec<String> {
    updates.iter().map(format_update_line).collect()
}

/// Database path: flag, then config/env, then the platform data directory
pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    config: &EngineConfig,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| config.db_path.clone()) {
        return Ok(path);
    }
    default_db_path()
}

fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("oclsync").join("oclsync.db"))
        .ok_or(CliError::NoDataDir)
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}
