//! Update orchestration.
//!
//! `Updater` drives one synchronization run at a time: it claims the active
//! slot in the ledger, plans the fetch from the subscription and the last
//! successful run, imports each concept through the duplicate name resolver,
//! and closes the run with either the new release cursor or an error message.
//! Fetch and apply failures end up in the ledger; they are never returned to
//! the caller.

mod duplicates;
mod source;

use std::future::Future;

use thiserror::Error;

use crate::config::EngineConfig;
use crate::db::{
    ConceptRepository, Database, LibSqlConceptRepository, LibSqlSubscriptionRepository,
    LibSqlUpdateRepository, SubscriptionRepository, UpdateRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    DemotedName, ImportedConcept, Subscription, UpdateCompletion, UpdateId, UpdateRecord,
};
use crate::util::{compact_text, unix_millis_now};

pub use duplicates::change_duplicate_concept_names_to_index_terms;
pub use source::{plan_fetch, ConceptBatch, ConceptSource, FetchError, FetchPlan};

/// Outcome of a single `run_task` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// No subscription is configured
    NotConfigured,
    /// Another run holds the active slot; this invocation did nothing
    AlreadyRunning,
    /// The run applied everything and advanced the cursor
    Completed {
        update: UpdateRecord,
        plan: FetchPlan,
        imported: usize,
        demoted: Vec<DemotedName>,
    },
    /// The run failed; the error message is on the record
    Failed { update: UpdateRecord },
    /// Shutdown interrupted the run; the record stays active until recovered
    Cancelled { update_id: UpdateId },
}

/// Why a started run could not finish
#[derive(Debug, Error)]
enum RunFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Local store error: {0}")]
    Local(#[from] Error),
}

struct Applied {
    plan: FetchPlan,
    release: Option<String>,
    remote_started_at: Option<i64>,
    imported: usize,
    demoted: Vec<DemotedName>,
}

/// Synchronization orchestrator
pub struct Updater<S> {
    db: Database,
    source: S,
    config: EngineConfig,
}

impl<S> Updater<S> {
    pub const fn new(db: Database, source: S, config: EngineConfig) -> Self {
        Self { db, source, config }
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    fn ledger(&self) -> LibSqlUpdateRepository<'_> {
        LibSqlUpdateRepository::new(self.db.connection())
    }

    fn subscriptions(&self) -> LibSqlSubscriptionRepository<'_> {
        LibSqlSubscriptionRepository::new(self.db.connection())
    }

    fn concepts(&self) -> LibSqlConceptRepository<'_> {
        LibSqlConceptRepository::new(self.db.connection())
    }

    /// Close runs a crashed process left active.
    pub async fn recover_abandoned_runs(&self) -> Result<Vec<UpdateRecord>> {
        recover_abandoned_runs(&self.db, &self.config).await
    }

    /// Resolve name clashes of a concept against the local store.
    pub async fn change_duplicate_concept_names_to_index_terms(
        &self,
        concept: &mut ImportedConcept,
    ) -> Result<Vec<DemotedName>> {
        change_duplicate_concept_names_to_index_terms(&self.concepts(), concept).await
    }

    pub async fn get_update(&self, id: UpdateId) -> Result<UpdateRecord> {
        self.ledger().get(id).await
    }

    /// Updates, most recent first
    pub async fn updates_in_order(&self, offset: usize, limit: usize) -> Result<Vec<UpdateRecord>> {
        self.ledger().list(offset, limit).await
    }

    pub async fn last_successful_update(&self) -> Result<Option<UpdateRecord>> {
        self.ledger().last_successful().await
    }

    /// Validate and store the subscription, replacing any previous one
    pub async fn save_subscription(&self, subscription: Subscription) -> Result<Subscription> {
        let subscription = subscription.normalized()?;
        self.subscriptions().save(&subscription).await?;
        Ok(subscription)
    }

    pub async fn subscription(&self) -> Result<Option<Subscription>> {
        self.subscriptions().load().await
    }

    pub async fn remove_subscription(&self) -> Result<()> {
        self.subscriptions().remove().await
    }
}

impl<S: ConceptSource> Updater<S> {
    /// Run one synchronization to completion.
    pub async fn run_task(&self) -> Result<RunReport> {
        self.run_task_until(std::future::pending()).await
    }

    /// Run one synchronization, giving up when `shutdown` resolves first.
    ///
    /// Only ledger failures while claiming or closing the run are returned as
    /// errors. A close that fails is retried once as a failed stop; if that
    /// write fails too, the record stays active. A cancelled run also keeps
    /// its active record. In both cases the next startup's
    /// `recover_abandoned_runs` closes it.
    pub async fn run_task_until(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RunReport> {
        let Some(subscription) = self.subscriptions().load().await? else {
            tracing::debug!("No subscription configured, skipping update");
            return Ok(RunReport::NotConfigured);
        };

        let ledger = self.ledger();
        let update = match ledger.start().await {
            Ok(update) => update,
            Err(error) if error.is_conflict() => {
                tracing::debug!("Skipping update: {error}");
                return Ok(RunReport::AlreadyRunning);
            }
            Err(error) => return Err(error),
        };
        tracing::info!("Started update {} from {}", update.id, subscription.url);

        let applied = tokio::select! {
            biased;
            () = shutdown => {
                tracing::warn!("Update {} interrupted by shutdown; left active", update.id);
                return Ok(RunReport::Cancelled { update_id: update.id });
            }
            applied = self.apply(&subscription, update.id) => applied,
        };

        match applied {
            Ok(applied) => {
                let completion = UpdateCompletion::Succeeded {
                    release: applied.release,
                    remote_started_at: applied.remote_started_at,
                };
                let stopped = self.close_run(&ledger, update.id, completion).await?;
                if !stopped.is_successful() {
                    return Ok(RunReport::Failed { update: stopped });
                }
                tracing::info!(
                    "Update {} finished: {} concepts imported, {} names demoted, release {}",
                    stopped.id,
                    applied.imported,
                    applied.demoted.len(),
                    stopped.last_downloaded_release.as_deref().unwrap_or("unknown")
                );
                Ok(RunReport::Completed {
                    update: stopped,
                    plan: applied.plan,
                    imported: applied.imported,
                    demoted: applied.demoted,
                })
            }
            Err(failure) => {
                let message = compact_text(&failure.to_string(), self.config.error_message_limit);
                tracing::warn!("Update {} failed: {message}", update.id);
                let stopped = self
                    .close_run(&ledger, update.id, UpdateCompletion::failed(message))
                    .await?;
                Ok(RunReport::Failed { update: stopped })
            }
        }
    }

    /// Stop the run, retrying once as a failed stop when the first write errors.
    async fn close_run(
        &self,
        ledger: &LibSqlUpdateRepository<'_>,
        id: UpdateId,
        completion: UpdateCompletion,
    ) -> Result<UpdateRecord> {
        let error = match ledger.stop(id, completion).await {
            Ok(stopped) => return Ok(stopped),
            Err(error @ (Error::NotFound(_) | Error::AlreadyStopped(_))) => return Err(error),
            Err(error) => error,
        };

        tracing::warn!("Could not close update {id}: {error}; retrying as failed");
        let message = compact_text(
            &format!("Could not record completion: {error}"),
            self.config.error_message_limit,
        );
        match ledger.stop(id, UpdateCompletion::failed(message)).await {
            Ok(stopped) => Ok(stopped),
            Err(retry_error) => {
                tracing::error!("Update {id} left active: {retry_error}");
                Err(error)
            }
        }
    }

    async fn apply(
        &self,
        subscription: &Subscription,
        update_id: UpdateId,
    ) -> std::result::Result<Applied, RunFailure> {
        let ledger = self.ledger();
        let last_successful = ledger.last_successful().await?;
        let plan = plan_fetch(subscription, last_successful.as_ref());
        tracing::info!("Update {update_id} fetching {plan}");

        let mut batch = self.source.open(subscription, &plan).await?;
        let remote_started_at = batch.remote_started_at();
        if let Some(remote_started_at) = remote_started_at {
            ledger
                .record_remote_start(update_id, remote_started_at)
                .await?;
        }

        // A release fetch that reports no new release keeps the old cursor
        let release = batch
            .release_id()
            .map(ToString::to_string)
            .or_else(|| plan.since().map(ToString::to_string));

        let concepts = self.concepts();
        let mut imported = 0;
        let mut demoted = Vec::new();
        while let Some(mut concept) = batch.next_concept().await? {
            let renamed =
                change_duplicate_concept_names_to_index_terms(&concepts, &mut concept).await?;
            demoted.extend(renamed);
            concepts.save(&concept).await?;
            imported += 1;
        }

        Ok(Applied {
            plan,
            release,
            remote_started_at,
            imported,
            demoted,
        })
    }
}

/// Close runs a crashed process left active.
///
/// Any active record older than `EngineConfig::orphan_grace` is stopped with
/// an error so the ledger accepts new runs again. Hosts call this on startup.
pub async fn recover_abandoned_runs(
    db: &Database,
    config: &EngineConfig,
) -> Result<Vec<UpdateRecord>> {
    let grace_ms = i64::try_from(config.orphan_grace.as_millis()).unwrap_or(i64::MAX);
    let cutoff = unix_millis_now().saturating_sub(grace_ms);
    let message = format!(
        "Update abandoned: still running after {} minutes, presumably interrupted",
        config.orphan_grace.as_secs() / 60
    );

    let abandoned = LibSqlUpdateRepository::new(db.connection())
        .abandon_stale(cutoff, &message)
        .await?;
    for update in &abandoned {
        tracing::warn!(
            "Closed abandoned update {} started at {}",
            update.id,
            update.started_at
        );
    }
    Ok(abandoned)
}
