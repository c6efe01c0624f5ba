//! Subscription model

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// The remote source this installation follows.
///
/// At most one subscription exists; saving a new one replaces the old.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscription {
    /// Source endpoint, e.g. `https://api.openconceptlab.org/orgs/CIEL/sources/CIEL/`
    pub url: String,
    /// API token for the remote service
    #[serde(default)]
    pub token: Option<String>,
    /// Poll interval, days part
    #[serde(default)]
    pub days: u32,
    /// Poll interval, hours part
    #[serde(default)]
    pub hours: u32,
    /// Poll interval, minutes part
    #[serde(default)]
    pub minutes: u32,
    /// Fetch full snapshots instead of release-by-release updates
    #[serde(default)]
    pub fetch_snapshot_updates: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("days", &self.days)
            .field("hours", &self.hours)
            .field("minutes", &self.minutes)
            .field("fetch_snapshot_updates", &self.fetch_snapshot_updates)
            .finish()
    }
}

impl Subscription {
    /// Create a subscription to the given source URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub const fn with_interval(mut self, days: u32, hours: u32, minutes: u32) -> Self {
        self.days = days;
        self.hours = hours;
        self.minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_snapshot_updates(mut self, enabled: bool) -> Self {
        self.fetch_snapshot_updates = enabled;
        self
    }

    /// Polling cadence for an external scheduler; `None` when manual only
    pub fn poll_interval(&self) -> Option<Duration> {
        let minutes = u64::from(self.days) * 24 * 60
            + u64::from(self.hours) * 60
            + u64::from(self.minutes);
        (minutes > 0).then(|| Duration::from_secs(minutes * 60))
    }

    /// Trim fields and check the URL scheme.
    pub fn normalized(self) -> Result<Self> {
        let url = normalize_text_option(Some(self.url))
            .ok_or_else(|| Error::InvalidInput("Subscription URL is required".into()))?;
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(
                "Subscription URL must include http:// or https://".into(),
            ));
        }

        Ok(Self {
            url,
            token: normalize_text_option(self.token),
            ..self
        })
    }
}
