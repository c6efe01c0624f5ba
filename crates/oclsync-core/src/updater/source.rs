//! Seam between the updater and the remote dictionary client.

use std::fmt;

use thiserror::Error;

use crate::models::{ImportedConcept, Subscription, UpdateRecord};

/// What the next run asks the remote source for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Nothing was ever applied; load the whole dictionary
    Initial,
    /// Full snapshot requested by the subscription; the cursor is ignored
    Snapshot,
    /// Changes after `since`; `None` means from the first release
    Release { since: Option<String> },
}

impl FetchPlan {
    /// Release the fetch starts after, if any
    pub fn since(&self) -> Option<&str> {
        match self {
            Self::Release { since } => since.as_deref(),
            Self::Initial | Self::Snapshot => None,
        }
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => f.write_str("initial load"),
            Self::Snapshot => f.write_str("snapshot"),
            Self::Release { since: Some(since) } => write!(f, "releases after {since}"),
            Self::Release { since: None } => f.write_str("all releases"),
        }
    }
}

/// Pick the fetch for the next run.
///
/// Snapshot mode always wins; without a successful run to continue from the
/// run is an initial load; otherwise it continues from that run's release.
pub fn plan_fetch(subscription: &Subscription, last_successful: Option<&UpdateRecord>) -> FetchPlan {
    if subscription.fetch_snapshot_updates {
        return FetchPlan::Snapshot;
    }

    match last_successful {
        None => FetchPlan::Initial,
        Some(update) => FetchPlan::Release {
            since: update.last_downloaded_release.clone(),
        },
    }
}

/// Failures raised by a `ConceptSource`
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or remote service failure
    #[error("Transport error: {0}")]
    Transport(String),
    /// The payload could not be turned into concepts
    #[error("Format error: {0}")]
    Format(String),
}

/// Remote dictionary client.
///
/// Implementations download what `plan` asks for and hand back a batch that
/// yields concepts lazily.
#[allow(async_fn_in_trait)]
pub trait ConceptSource {
    type Batch: ConceptBatch;

    async fn open(
        &self,
        subscription: &Subscription,
        plan: &FetchPlan,
    ) -> Result<Self::Batch, FetchError>;
}

/// Concepts of one downloaded release or snapshot
#[allow(async_fn_in_trait)]
pub trait ConceptBatch {
    /// Release identifier the remote reports for this download
    fn release_id(&self) -> Option<&str>;

    /// Remote-side start time of the export (Unix ms)
    fn remote_started_at(&self) -> Option<i64>;

    /// Next concept, or `None` once the batch is exhausted
    async fn next_concept(&mut self) -> Result<Option<ImportedConcept>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UpdateId;

    fn successful(release: Option<&str>) -> UpdateRecord {
        UpdateRecord {
            id: UpdateId::new(3),
            started_at: 1,
            stopped_at: Some(2),
            remote_started_at: None,
            last_downloaded_release: release.map(ToString::to_string),
            error_message: None,
        }
    }

    #[test]
    fn plan_is_initial_without_prior_success() {
        let subscription = Subscription::new("https://example.org");
        assert_eq!(plan_fetch(&subscription, None), FetchPlan::Initial);
    }

    #[test]
    fn plan_continues_from_last_release() {
        let subscription = Subscription::new("https://example.org");
        let last = successful(Some("v1.2"));

        let plan = plan_fetch(&subscription, Some(&last));
        assert_eq!(
            plan,
            FetchPlan::Release {
                since: Some("v1.2".to_string())
            }
        );
        assert_eq!(plan.since(), Some("v1.2"));
    }

    #[test]
    fn plan_without_cursor_starts_from_beginning() {
        let subscription = Subscription::new("https://example.org");
        let last = successful(None);

        assert_eq!(
            plan_fetch(&subscription, Some(&last)),
            FetchPlan::Release { since: None }
        );
    }

    #[test]
    fn snapshot_mode_ignores_cursor() {
        let subscription = Subscription::new("https://example.org").with_snapshot_updates(true);
        let last = successful(Some("some_outdated_version_v4.2.0"));

        let plan = plan_fetch(&subscription, Some(&last));
        assert_eq!(plan, FetchPlan::Snapshot);
        assert_eq!(plan.since(), None);
    }
}
