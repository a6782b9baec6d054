//! Sync engine: replays the offline queue and pulls offline snapshots.

pub mod dedup;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use wordquiz_core::types::ActionPayload;

use crate::db::{with_store, DbError, SharedStore};
use crate::outbox::OutboxQueue;
use crate::remote::{RemoteApi, RemoteError};

/// Consecutive failures after which a drain gives up.
pub const DEFAULT_FAILURE_THRESHOLD: usize = 3;

/// Sync errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Sync already in progress")]
    AlreadyInProgress,

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Actions attempted after dedup.
    pub total: usize,
    pub applied: usize,
    /// Accepted as done because the target no longer exists remotely.
    pub stale: usize,
    pub failed: usize,
    pub superseded: usize,
    /// Stopped by the circuit breaker.
    pub aborted: bool,
    /// Queue length once the drain ended.
    pub remaining: usize,
}

/// Result of an offline preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    pub words: usize,
    pub folders: usize,
    pub synced_at: DateTime<Utc>,
}

/// Inner state shared across clones.
struct SyncEngineInner {
    remote: Arc<dyn RemoteApi>,
    store: SharedStore,
    outbox: OutboxQueue,
    in_flight: AtomicBool,
    failure_threshold: usize,
}

/// Releases the single-flight flag, even if the drain future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sync engine for replaying queued actions.
///
/// Clone-able; all clones share the same in-flight flag.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(remote: Arc<dyn RemoteApi>, store: SharedStore) -> Self {
        Self::with_failure_threshold(remote, store, DEFAULT_FAILURE_THRESHOLD)
    }

    pub fn with_failure_threshold(
        remote: Arc<dyn RemoteApi>,
        store: SharedStore,
        failure_threshold: usize,
    ) -> Self {
        Self {
            inner: Arc::new(SyncEngineInner {
                remote,
                outbox: OutboxQueue::new(store.clone()),
                store,
                in_flight: AtomicBool::new(false),
                failure_threshold: failure_threshold.max(1),
            }),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn outbox(&self) -> &OutboxQueue {
        &self.inner.outbox
    }

    pub fn remote(&self) -> &Arc<dyn RemoteApi> {
        &self.inner.remote
    }

    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    fn try_begin(&self) -> Result<InFlightGuard<'_>, SyncError> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyInProgress)?;
        Ok(InFlightGuard(&self.inner.in_flight))
    }

    /// Replay the offline queue against the remote.
    ///
    /// Superseded actions are deleted first. Survivors are replayed one at a
    /// time in id order; `on_progress(done, total)` fires after each attempt.
    /// A failed action stays queued and does not block the next one, but
    /// `failure_threshold` consecutive failures abort the drain.
    pub async fn drain<F>(&self, on_progress: F) -> Result<DrainReport, SyncError>
    where
        F: FnMut(usize, usize) + Send,
    {
        let _guard = self.try_begin()?;

        let result = self.drain_inner(on_progress).await;
        if let Err(e) = &result {
            warn!(error = %e, "drain failed");
        }
        result
    }

    async fn drain_inner<F>(&self, mut on_progress: F) -> Result<DrainReport, SyncError>
    where
        F: FnMut(usize, usize) + Send,
    {
        let outbox = &self.inner.outbox;
        let plan = dedup::plan(outbox.list_all()?);

        let mut report = DrainReport {
            total: plan.survivors.len(),
            superseded: plan.superseded.len(),
            ..Default::default()
        };

        if !plan.superseded.is_empty() {
            outbox.remove_many(&plan.superseded)?;
            info!(count = plan.superseded.len(), "superseded actions dropped");
        }

        if report.total == 0 {
            return Ok(report);
        }

        info!(total = report.total, "drain started");

        let mut consecutive_failures = 0;
        for (index, action) in plan.survivors.iter().enumerate() {
            match self.replay(&action.payload).await {
                Ok(()) => {
                    outbox.remove(action.id)?;
                    report.applied += 1;
                    consecutive_failures = 0;
                }
                Err(e) if e.is_stale() => {
                    info!(id = action.id, error = %e, "stale action dropped");
                    outbox.remove(action.id)?;
                    report.stale += 1;
                    consecutive_failures = 0;
                }
                Err(e) => {
                    warn!(
                        id = action.id,
                        kind = action.payload.kind().as_str(),
                        error = %e,
                        "action replay failed"
                    );
                    report.failed += 1;
                    consecutive_failures += 1;
                }
            }

            on_progress(index + 1, report.total);

            if consecutive_failures >= self.inner.failure_threshold {
                warn!(
                    failures = consecutive_failures,
                    "too many consecutive failures, aborting drain"
                );
                report.aborted = true;
                break;
            }
        }

        report.remaining = outbox.len()?;
        info!(
            applied = report.applied,
            stale = report.stale,
            failed = report.failed,
            remaining = report.remaining,
            "drain finished"
        );
        Ok(report)
    }

    async fn replay(&self, payload: &ActionPayload) -> Result<(), RemoteError> {
        let remote = &self.inner.remote;
        match payload {
            ActionPayload::ToggleMemorized(toggle) => remote.toggle_memorized(toggle).await,
            ActionPayload::QuizProgress(progress) => remote.save_quiz_progress(progress).await,
            ActionPayload::QuizResult(result) => remote.save_quiz_result(result).await,
            ActionPayload::ClearSession => remote.clear_quiz_session().await,
        }
    }

    /// Pull the full snapshot and overwrite the local words and folders.
    pub async fn prepare_offline(&self) -> Result<PrepareReport, SyncError> {
        let snapshot = self.inner.remote.get_offline_snapshot().await?;
        let synced_at = Utc::now();

        let (words, folders) =
            with_store(&self.inner.store, |repo| repo.store_snapshot(&snapshot, synced_at))?;
        let report = PrepareReport {
            words,
            folders,
            synced_at,
        };

        info!(
            words = report.words,
            folders = report.folders,
            "offline snapshot stored"
        );
        Ok(report)
    }
}
