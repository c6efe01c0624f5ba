//! Engine configuration.
//!
//! `EngineConfig` carries the few knobs the engine needs at runtime: where
//! the database lives, how long an active run may sit before startup treats
//! it as abandoned, and how much of a failure message the ledger keeps.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_ORPHAN_GRACE_MINUTES: u64 = 12 * 60;
const DEFAULT_ERROR_MESSAGE_LIMIT: usize = 1024;

pub const DB_PATH_ENV: &str = "OCLSYNC_DB_PATH";
pub const ORPHAN_GRACE_ENV: &str = "OCLSYNC_ORPHAN_GRACE_MINUTES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Database file; `None` lets the host pick a default location
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Active runs older than this are force-closed on startup
    #[serde(default = "default_orphan_grace", with = "duration_minutes")]
    pub orphan_grace: Duration,
    /// Maximum characters of a failure message kept in the ledger
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            orphan_grace: default_orphan_grace(),
            error_message_limit: DEFAULT_ERROR_MESSAGE_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Build configuration from `OCLSYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = normalize_text_option(lookup(DB_PATH_ENV)) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = normalize_text_option(lookup(ORPHAN_GRACE_ENV)) {
            let minutes: u64 = raw.parse().map_err(|_| {
                Error::InvalidInput(format!("{ORPHAN_GRACE_ENV} must be a whole number of minutes"))
            })?;
            config.orphan_grace = minutes_to_duration(minutes).ok_or_else(|| {
                Error::InvalidInput(format!("{ORPHAN_GRACE_ENV} is out of range"))
            })?;
        }

        Ok(config)
    }

    /// Parse configuration from a JSON document.
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    #[must_use]
    pub const fn with_orphan_grace(mut self, grace: Duration) -> Self {
        self.orphan_grace = grace;
        self
    }
}

const fn default_orphan_grace() -> Duration {
    Duration::from_secs(DEFAULT_ORPHAN_GRACE_MINUTES * 60)
}

fn minutes_to_duration(minutes: u64) -> Option<Duration> {
    minutes.checked_mul(60).map(Duration::from_secs)
}

const fn default_error_message_limit() -> usize {
    DEFAULT_ERROR_MESSAGE_LIMIT
}

mod duration_minutes {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs() / 60)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let minutes = u64::deserialize(deserializer)?;
        super::minutes_to_duration(minutes)
            .ok_or_else(|| D::Error::custom("orphan_grace is out of range"))
    }
}
