use std::path::PathBuf;

use oclsync_core::db::{LibSqlUpdateRepository, UpdateRepository};
use oclsync_core::{EngineConfig, Subscription, UpdateCompletion, UpdateId, UpdateRecord};
use pretty_assertions::assert_eq;

use crate::commands::common::{
    format_duration, format_timestamp, format_update_line, open_database, resolve_db_path,
    update_to_item,
};
use crate::commands::subscription::format_subscription_lines;
use crate::commands::updates::parse_update_id;
use crate::error::CliError;

fn record(id: i64) -> UpdateRecord {
    UpdateRecord {
        id: UpdateId::new(id),
        started_at: 1_700_000_000_000,
        stopped_at: None,
        remote_started_at: None,
        last_downloaded_release: None,
        error_message: None,
    }
}

#[test]
fn parse_update_id_accepts_hash_prefix_and_whitespace() {
    assert_eq!(parse_update_id("42").unwrap(), UpdateId::new(42));
    assert_eq!(parse_update_id(" #7 ").unwrap(), UpdateId::new(7));
}

#[test]
fn parse_update_id_rejects_garbage() {
    let error = parse_update_id("abc").unwrap_err();
    assert!(matches!(error, CliError::InvalidUpdateId(raw) if raw == "abc"));
}

#[test]
fn format_timestamp_renders_utc() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_duration_scales_units() {
    assert_eq!(format_duration(4_500), "4s");
    assert_eq!(format_duration(125_000), "2m05s");
    assert_eq!(format_duration(3_900_000), "1h05m");
}

#[test]
fn running_update_line_has_no_duration() {
    let line = format_update_line(&record(3));
    assert!(line.starts_with("#3"));
    assert!(line.contains("running"));
    assert!(!line.contains('('));
}

#[test]
fn finished_update_line_includes_release_and_error() {
    let mut succeeded = record(4);
    succeeded.stopped_at = Some(succeeded.started_at + 61_000);
    succeeded.last_downloaded_release = Some("v2024-01-15".to_string());
    let line = format_update_line(&succeeded);
    assert!(line.contains("(1m01s)"));
    assert!(line.contains("release v2024-01-15"));

    let mut failed = record(5);
    failed.stopped_at = Some(failed.started_at + 1_000);
    failed.error_message = Some("Transport error: timed out".to_string());
    assert!(format_update_line(&failed).contains("error: Transport error: timed out"));
}

#[test]
fn update_item_serializes_status() {
    let mut update = record(9);
    update.stopped_at = Some(update.started_at + 2_000);
    let json = serde_json::to_value(update_to_item(&update)).unwrap();
    assert_eq!(json["id"], 9);
    assert_eq!(json["duration_ms"], 2_000);
    assert_eq!(json["status"], serde_json::to_value(update.status()).unwrap());
}

#[test]
fn subscription_lines_hide_token() {
    let subscription = Subscription::new("https://api.example.org/orgs/CIEL/sources/CIEL")
        .with_token("secret")
        .with_interval(1, 0, 30)
        .with_snapshot_updates(true);
    let lines = format_subscription_lines(&subscription);
    assert!(lines.iter().all(|line| !line.contains("secret")));
    assert!(lines.contains(&"Token:    set".to_string()));
    assert!(lines.contains(&"Interval: every 1d 0h 30m".to_string()));
    assert!(lines.contains(&"Mode:     snapshot".to_string()));
}

#[test]
fn manual_subscription_reports_manual_interval() {
    let lines = format_subscription_lines(&Subscription::new("https://example.org"));
    assert!(lines.contains(&"Interval: manual".to_string()));
    assert!(lines.contains(&"Mode:     release".to_string()));
}

#[test]
fn db_path_prefers_flag_then_config() {
    let config = EngineConfig {
        db_path: Some(PathBuf::from("/tmp/from-env.db")),
        ..EngineConfig::default()
    };
    assert_eq!(
        resolve_db_path(Some(PathBuf::from("/tmp/flag.db")), &config).unwrap(),
        PathBuf::from("/tmp/flag.db")
    );
    assert_eq!(
        resolve_db_path(None, &config).unwrap(),
        PathBuf::from("/tmp/from-env.db")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn open_database_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("oclsync.db");
    let db = open_database(&path).await.unwrap();
    assert!(path.exists());

    let repo = LibSqlUpdateRepository::new(db.connection());
    let update = repo.start().await.unwrap();
    repo.stop(update.id, UpdateCompletion::failed("boom"))
        .await
        .unwrap();
    assert_eq!(repo.list(0, 10).await.unwrap().len(), 1);
}
