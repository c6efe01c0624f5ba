//! Update record model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Ledger-issued identifier of an update run (autoincrement, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(i64);

impl UpdateId {
    /// Wrap a raw row id
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw row id as stored in the database
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UpdateId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Status derived from the stop fields of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// No stop time yet
    Running,
    /// Stopped without an error message
    Succeeded,
    /// Stopped with an error message
    Failed,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One synchronization attempt, as stored in the ledger.
///
/// Two records are equal when their ids are equal, even if one of them is a
/// stale read taken before the run was stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Ledger-issued identifier
    pub id: UpdateId,
    /// Local start time (Unix ms)
    pub started_at: i64,
    /// Local stop time (Unix ms); `None` while the run is active
    pub stopped_at: Option<i64>,
    /// Start time reported by the remote source (Unix ms)
    pub remote_started_at: Option<i64>,
    /// Release applied by this run, the cursor for the next release fetch
    pub last_downloaded_release: Option<String>,
    /// Failure description; set only when the run failed
    pub error_message: Option<String>,
}

impl UpdateRecord {
    /// Whether the run has been stopped
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Whether the run stopped without an error
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        self.is_stopped() && self.error_message.is_none()
    }

    #[must_use]
    pub const fn status(&self) -> UpdateStatus {
        if !self.is_stopped() {
            UpdateStatus::Running
        } else if self.error_message.is_none() {
            UpdateStatus::Succeeded
        } else {
            UpdateStatus::Failed
        }
    }

    /// Wall-clock duration of a stopped run in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.stopped_at
            .map(|stopped_at| stopped_at.saturating_sub(self.started_at))
    }
}

impl PartialEq for UpdateRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UpdateRecord {}

impl Hash for UpdateRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// How a run ended, written by `UpdateRepository::stop`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCompletion {
    /// The run applied everything the remote offered
    Succeeded {
        /// Release identifier reported by the remote
        release: Option<String>,
        /// Remote-side start of the exported data (Unix ms)
        remote_started_at: Option<i64>,
    },
    /// The run failed; partial progress does not move the cursor
    Failed {
        /// Human-readable failure description
        message: String,
    },
}

impl UpdateCompletion {
    /// Success without release information
    #[must_use]
    pub const fn succeeded() -> Self {
        Self::Succeeded {
            release: None,
            remote_started_at: None,
        }
    }

    /// Failure with the given message
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record(id: i64) -> UpdateRecord {
        UpdateRecord {
            id: UpdateId::new(id),
            started_at: 1_000,
            stopped_at: None,
            remote_started_at: None,
            last_downloaded_release: None,
            error_message: None,
        }
    }

    #[test]
    fn test_status_transitions() {
        let mut update = record(1);
        assert_eq!(update.status(), UpdateStatus::Running);
        assert!(!update.is_successful());

        update.stopped_at = Some(2_500);
        assert_eq!(update.status(), UpdateStatus::Succeeded);
        assert!(update.is_successful());
        assert_eq!(update.duration_ms(), Some(1_500));

        update.error_message = Some("connection reset".to_string());
        assert_eq!(update.status(), UpdateStatus::Failed);
        assert!(!update.is_successful());
    }

    #[test]
    fn test_equality_is_by_id_only() {
        let stale = record(7);
        let mut fresh = record(7);
        fresh.stopped_at = Some(9_000);
        fresh.last_downloaded_release = Some("v1.2".to_string());

        assert_eq!(stale, fresh);
        assert_ne!(stale, record(8));

        let set: HashSet<_> = [stale, fresh].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_update_id_parse() {
        let id: UpdateId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("abc".parse::<UpdateId>().is_err());
    }
}
