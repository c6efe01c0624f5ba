//! Subscription repository implementation
//!
//! The subscription lives in the key/value `settings` table, one row per
//! field, so saving overwrites the previous subscription in place.

use crate::error::{Error, Result};
use crate::models::Subscription;
use libsql::Connection;

const URL_KEY: &str = "openconceptlab.url";
const TOKEN_KEY: &str = "openconceptlab.token";
const DAYS_KEY: &str = "openconceptlab.days";
const HOURS_KEY: &str = "openconceptlab.hours";
const MINUTES_KEY: &str = "openconceptlab.minutes";
const SNAPSHOT_KEY: &str = "openconceptlab.fetchSnapshotUpdates";

/// Trait for subscription storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SubscriptionRepository {
    /// Load the subscription, or `None` when nothing is configured
    async fn load(&self) -> Result<Option<Subscription>>;

    /// Replace the stored subscription
    async fn save(&self, subscription: &Subscription) -> Result<()>;

    /// Remove the subscription entirely
    async fn remove(&self) -> Result<()>;
}

/// libSQL implementation of `SubscriptionRepository`
pub struct LibSqlSubscriptionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSubscriptionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SubscriptionRepository for LibSqlSubscriptionRepository<'_> {
    async fn load(&self) -> Result<Option<Subscription>> {
        let Some(url) = self.get_setting(URL_KEY).await? else {
            return Ok(None);
        };

        let mut subscription = Subscription::new(url);
        subscription.token = self.get_setting(TOKEN_KEY).await?;
        subscription.days = self.get_number(DAYS_KEY).await?;
        subscription.hours = self.get_number(HOURS_KEY).await?;
        subscription.minutes = self.get_number(MINUTES_KEY).await?;

        if let Some(value) = self.get_setting(SNAPSHOT_KEY).await? {
            subscription.fetch_snapshot_updates = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(Some(subscription))
    }

    async fn save(&self, subscription: &Subscription) -> Result<()> {
        self.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

        if let Err(e) = self.write_fields(subscription).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        tracing::info!("Saved subscription to {}", subscription.url);
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM settings WHERE key LIKE 'openconceptlab.%'",
                (),
            )
            .await?;
        tracing::info!("Removed subscription");
        Ok(())
    }
}

impl LibSqlSubscriptionRepository<'_> {
    async fn write_fields(&self, subscription: &Subscription) -> Result<()> {
        self.set_setting(URL_KEY, &subscription.url).await?;
        match subscription.token.as_deref() {
            Some(token) => self.set_setting(TOKEN_KEY, token).await?,
            None => self.delete_setting(TOKEN_KEY).await?,
        }
        self.set_setting(DAYS_KEY, &subscription.days.to_string())
            .await?;
        self.set_setting(HOURS_KEY, &subscription.hours.to_string())
            .await?;
        self.set_setting(MINUTES_KEY, &subscription.minutes.to_string())
            .await?;
        self.set_setting(
            SNAPSHOT_KEY,
            if subscription.fetch_snapshot_updates {
                "true"
            } else {
                "false"
            },
        )
        .await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn get_number(&self, key: &str) -> Result<u32> {
        match self.get_setting(key).await? {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidInput(format!("Stored {key} is not a number: {value}"))),
            None => Ok(0),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}
