//! Update ledger repository

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{UpdateCompletion, UpdateId, UpdateRecord};
use crate::util::unix_millis_now;
use libsql::Connection;

use super::rows::{nullable_i64, nullable_text};

const UPDATE_COLUMNS: &str = "update_id, started_at, stopped_at, remote_started_at, \
                              last_downloaded_release, error_message";

/// Append-only history of update runs.
///
/// At most one record may be active (not stopped) at any time; `start` is
/// the only place that claims the active slot.
#[allow(async_fn_in_trait)]
pub trait UpdateRepository {
    /// Append a new active record, failing with `Error::Conflict` if one exists
    async fn start(&self) -> Result<UpdateRecord>;

    /// Stop an active record with the given outcome
    async fn stop(&self, id: UpdateId, completion: UpdateCompletion) -> Result<UpdateRecord>;

    /// Record the remote-side start time on an active record
    async fn record_remote_start(&self, id: UpdateId, remote_started_at: i64)
        -> Result<UpdateRecord>;

    /// Get a record by ID, failing with `Error::NotFound` if absent
    async fn get(&self, id: UpdateId) -> Result<UpdateRecord>;

    /// List records, most recent first
    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<UpdateRecord>>;

    /// Most recent record that stopped without an error
    async fn last_successful(&self) -> Result<Option<UpdateRecord>>;

    /// The active record, if any
    async fn active(&self) -> Result<Option<UpdateRecord>>;

    /// Force-close active records started at or before `cutoff` (Unix ms)
    async fn abandon_stale(&self, cutoff: i64, message: &str) -> Result<Vec<UpdateRecord>>;
}

/// libSQL implementation of `UpdateRepository`
pub struct LibSqlUpdateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlUpdateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an update from a database row
    fn parse_update(row: &libsql::Row) -> Result<UpdateRecord> {
        Ok(UpdateRecord {
            id: UpdateId::new(row.get(0)?),
            started_at: row.get(1)?,
            stopped_at: nullable_i64(row, 2)?,
            remote_started_at: nullable_i64(row, 3)?,
            last_downloaded_release: nullable_text(row, 4)?,
            error_message: nullable_text(row, 5)?,
        })
    }

    async fn query_updates(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<UpdateRecord>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut updates = Vec::new();
        while let Some(row) = rows.next().await? {
            updates.push(Self::parse_update(&row)?);
        }
        Ok(updates)
    }

    async fn find(&self, id: UpdateId) -> Result<Option<UpdateRecord>> {
        let sql = format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE update_id = ?");
        Ok(self
            .query_updates(&sql, libsql::params![id.get()])
            .await?
            .into_iter()
            .next())
    }

    /// Explain why a guarded write on `id` touched no row
    async fn inactive_error(&self, id: UpdateId) -> Result<Error> {
        Ok(match self.find(id).await? {
            None => Error::NotFound(id.to_string()),
            Some(_) => Error::AlreadyStopped(id),
        })
    }

    async fn active_conflict(&self) -> Result<Error> {
        let detail = match self.active().await? {
            Some(active) => format!("update {} started at {}", active.id, active.started_at),
            None => "another update claimed the slot".to_string(),
        };
        Ok(Error::Conflict(detail))
    }
}

fn is_single_active_violation(error: &libsql::Error) -> bool {
    let message = error.to_string();
    message.contains("idx_updates_single_active") || message.contains("UNIQUE constraint failed")
}

impl UpdateRepository for LibSqlUpdateRepository<'_> {
    async fn start(&self) -> Result<UpdateRecord> {
        let now = unix_millis_now();

        // Check and insert in one statement so the write lock covers both
        let inserted = match self
            .conn
            .execute(
                "INSERT INTO updates (started_at)
                 SELECT ? WHERE NOT EXISTS (SELECT 1 FROM updates WHERE stopped_at IS NULL)",
                libsql::params![now],
            )
            .await
        {
            Ok(inserted) => inserted,
            Err(e) if is_single_active_violation(&e) => return Err(self.active_conflict().await?),
            Err(e) => return Err(e.into()),
        };

        if inserted == 0 {
            return Err(self.active_conflict().await?);
        }

        let id = UpdateId::new(self.conn.last_insert_rowid());
        tracing::debug!("Started update {id}");
        self.get(id).await
    }

    async fn stop(&self, id: UpdateId, completion: UpdateCompletion) -> Result<UpdateRecord> {
        let now = unix_millis_now();
        let (release, remote_started_at, error_message) = match completion {
            UpdateCompletion::Succeeded {
                release,
                remote_started_at,
            } => (release, remote_started_at, None),
            UpdateCompletion::Failed { message } => (None, None, Some(message)),
        };

        let changed = self
            .conn
            .execute(
                "UPDATE updates
                 SET stopped_at = ?,
                     last_downloaded_release = ?,
                     remote_started_at = COALESCE(?, remote_started_at),
                     error_message = ?
                 WHERE update_id = ? AND stopped_at IS NULL",
                libsql::params![now, release, remote_started_at, error_message, id.get()],
            )
            .await?;

        if changed == 0 {
            return Err(self.inactive_error(id).await?);
        }

        self.get(id).await
    }

    async fn record_remote_start(
        &self,
        id: UpdateId,
        remote_started_at: i64,
    ) -> Result<UpdateRecord> {
        let changed = self
            .conn
            .execute(
                "UPDATE updates SET remote_started_at = ?
                 WHERE update_id = ? AND stopped_at IS NULL",
                libsql::params![remote_started_at, id.get()],
            )
            .await?;

        if changed == 0 {
            return Err(self.inactive_error(id).await?);
        }

        self.get(id).await
    }

    async fn get(&self, id: UpdateId) -> Result<UpdateRecord> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<UpdateRecord>> {
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM updates
             ORDER BY update_id DESC
             LIMIT ? OFFSET ?"
        );
        self.query_updates(&sql, libsql::params![limit as i64, offset as i64])
            .await
    }

    async fn last_successful(&self) -> Result<Option<UpdateRecord>> {
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM updates
             WHERE stopped_at IS NOT NULL AND error_message IS NULL
             ORDER BY update_id DESC
             LIMIT 1"
        );
        Ok(self.query_updates(&sql, ()).await?.into_iter().next())
    }

    async fn active(&self) -> Result<Option<UpdateRecord>> {
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM updates
             WHERE stopped_at IS NULL
             ORDER BY update_id DESC
             LIMIT 1"
        );
        Ok(self.query_updates(&sql, ()).await?.into_iter().next())
    }

    async fn abandon_stale(&self, cutoff: i64, message: &str) -> Result<Vec<UpdateRecord>> {
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM updates
             WHERE stopped_at IS NULL AND started_at <= ?"
        );
        let stale = self.query_updates(&sql, libsql::params![cutoff]).await?;

        let mut abandoned = Vec::with_capacity(stale.len());
        for update in stale {
            match self.stop(update.id, UpdateCompletion::failed(message)).await {
                Ok(stopped) => abandoned.push(stopped),
                // Its owner finished it between our read and write
                Err(Error::AlreadyStopped(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_and_get() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let update = repo.start().await.unwrap();
        assert!(!update.is_stopped());
        assert!(update.started_at > 0);

        let fetched = repo.get(update.id).await.unwrap();
        assert_eq!(fetched, update);
        assert_eq!(repo.active().await.unwrap(), Some(update));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_is_not_found() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let error = repo.get(UpdateId::new(0)).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_while_active_is_conflict() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let first = repo.start().await.unwrap();
        let error = repo.start().await.unwrap_err();
        assert!(error.is_conflict());
        assert!(error.to_string().contains(&first.id.to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_unknown_is_not_found() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let error = repo
            .stop(UpdateId::new(99), UpdateCompletion::succeeded())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_twice_is_already_stopped() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let update = repo.start().await.unwrap();
        repo.stop(update.id, UpdateCompletion::succeeded())
            .await
            .unwrap();

        let error = repo
            .stop(update.id, UpdateCompletion::succeeded())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::AlreadyStopped(id) if id == update.id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_stop_start_scenario() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let a = repo.start().await.unwrap();
        assert!(repo.start().await.unwrap_err().is_conflict());

        repo.stop(a.id, UpdateCompletion::succeeded()).await.unwrap();

        let b = repo.start().await.unwrap();
        assert!(b.id > a.id);
        assert!(!b.is_stopped());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_is_descending_by_id() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let first = repo.start().await.unwrap();
        repo.stop(first.id, UpdateCompletion::succeeded())
            .await
            .unwrap();
        let second = repo.start().await.unwrap();
        repo.stop(second.id, UpdateCompletion::failed("boom"))
            .await
            .unwrap();
        let third = repo.start().await.unwrap();

        let updates = repo.list(0, 20).await.unwrap();
        assert_eq!(updates, vec![third, second.clone(), first]);

        let page = repo.list(1, 1).await.unwrap();
        assert_eq!(page, vec![second]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_records_outcome() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let update = repo.start().await.unwrap();
        repo.record_remote_start(update.id, 1_700_000_000_000)
            .await
            .unwrap();
        let stopped = repo
            .stop(
                update.id,
                UpdateCompletion::Succeeded {
                    release: Some("v1.2".to_string()),
                    remote_started_at: None,
                },
            )
            .await
            .unwrap();

        assert!(stopped.is_successful());
        assert_eq!(stopped.last_downloaded_release.as_deref(), Some("v1.2"));
        // The anchor recorded while running survives a stop without one
        assert_eq!(stopped.remote_started_at, Some(1_700_000_000_000));
        assert!(stopped.stopped_at.unwrap() >= stopped.started_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_last_successful_skips_failures() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        assert_eq!(repo.last_successful().await.unwrap(), None);

        let ok = repo.start().await.unwrap();
        repo.stop(
            ok.id,
            UpdateCompletion::Succeeded {
                release: Some("v1".to_string()),
                remote_started_at: None,
            },
        )
        .await
        .unwrap();

        let failed = repo.start().await.unwrap();
        repo.stop(failed.id, UpdateCompletion::failed("timeout"))
            .await
            .unwrap();

        let running = repo.start().await.unwrap();

        let last = repo.last_successful().await.unwrap().unwrap();
        assert_eq!(last, ok);
        assert_eq!(last.last_downloaded_release.as_deref(), Some("v1"));
        assert_ne!(last, running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_stop_discards_release() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let update = repo.start().await.unwrap();
        let stopped = repo
            .stop(update.id, UpdateCompletion::failed("bad payload"))
            .await
            .unwrap();

        assert_eq!(stopped.error_message.as_deref(), Some("bad payload"));
        assert_eq!(stopped.last_downloaded_release, None);
        assert!(!stopped.is_successful());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_abandon_stale_closes_only_old_runs() {
        let db = setup().await;
        let repo = LibSqlUpdateRepository::new(db.connection());

        let update = repo.start().await.unwrap();

        let none = repo
            .abandon_stale(update.started_at - 1, "abandoned")
            .await
            .unwrap();
        assert!(none.is_empty());

        let closed = repo
            .abandon_stale(update.started_at, "abandoned")
            .await
            .unwrap();
        assert_eq!(closed, vec![update]);
        assert_eq!(closed[0].error_message.as_deref(), Some("abandoned"));

        repo.start().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_starts_admit_exactly_one() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ledger.db");

        let handles = {
            let mut handles = Vec::new();
            for _ in 0..4 {
                handles.push(Database::open(&path).await.unwrap());
            }
            handles
        };

        let mut tasks = Vec::new();
        for db in handles {
            tasks.push(tokio::spawn(async move {
                LibSqlUpdateRepository::new(db.connection()).start().await
            }));
        }

        let mut started = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => started += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(started, 1);
        assert_eq!(conflicts, 3);
    }
}
