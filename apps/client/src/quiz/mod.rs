//! Quiz answer path.
//!
//! Online, answers go straight to the remote and the result is mirrored into
//! the local store. Offline, the level is computed locally and the answer is
//! queued for replay. Both paths use the same scheduler.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use wordquiz_core::srs::{schedule, SchedulingResult};
use wordquiz_core::types::{
    ActionPayload, MemorizedToggle, QuizProgressRecord, QuizResultRecord, QuizSessionSnapshot,
};

use crate::connectivity::MonitorHandle;
use crate::db::{with_store, DbError, SharedStore, WordRepository};
use crate::outbox::OutboxQueue;
use crate::remote::{RemoteApi, RemoteError};
use crate::session::SessionStore;

/// Foreground failures of the online path.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

#[derive(Clone)]
pub struct QuizRecorder {
    remote: Arc<dyn RemoteApi>,
    store: SharedStore,
    outbox: OutboxQueue,
    sessions: SessionStore,
    monitor: Option<MonitorHandle>,
}

impl QuizRecorder {
    pub fn new(remote: Arc<dyn RemoteApi>, store: SharedStore, sessions: SessionStore) -> Self {
        Self {
            remote,
            outbox: OutboxQueue::new(store.clone()),
            store,
            sessions,
            monitor: None,
        }
    }

    /// Notify `monitor` whenever something is queued.
    pub fn with_monitor(mut self, monitor: MonitorHandle) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Record a memorized/not-memorized answer.
    ///
    /// Returns the locally scheduled state, or `None` if the word is not in
    /// the local store. Only the online remote write can fail.
    pub async fn answer(
        &self,
        word_id: &str,
        memorized: bool,
        online: bool,
    ) -> Result<Option<SchedulingResult>, QuizError> {
        let toggle = MemorizedToggle::new(word_id, memorized);

        if online {
            self.remote.toggle_memorized(&toggle).await?;
            return Ok(self.apply_locally(word_id, memorized));
        }

        let result = self.apply_locally(word_id, memorized);
        if result.is_none() {
            warn!(word_id, "answered word missing locally, queueing anyway");
        }
        self.enqueue(ActionPayload::ToggleMemorized(toggle));
        Ok(result)
    }

    /// Save running totals of an unfinished quiz.
    pub async fn record_progress(
        &self,
        progress: QuizProgressRecord,
        online: bool,
    ) -> Result<(), QuizError> {
        if online {
            self.remote.save_quiz_progress(&progress).await?;
        } else {
            self.enqueue(ActionPayload::QuizProgress(progress));
        }
        Ok(())
    }

    /// Persist the resumable session. Failures are logged, never raised.
    pub fn save_session(&self, snapshot: QuizSessionSnapshot) {
        if let Err(e) = self.sessions.save(snapshot) {
            warn!(error = %e, "failed to save quiz session");
        }
    }

    /// Record a finished quiz and drop the resumable session.
    pub async fn finish(&self, result: QuizResultRecord, online: bool) -> Result<(), QuizError> {
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "failed to clear quiz session");
        }

        if online {
            self.remote.save_quiz_result(&result).await?;
            self.remote.clear_quiz_session().await?;
        } else {
            self.enqueue(ActionPayload::QuizResult(result));
            self.enqueue(ActionPayload::ClearSession);
        }
        Ok(())
    }

    fn apply_locally(&self, word_id: &str, memorized: bool) -> Option<SchedulingResult> {
        let outcome = with_store(&self.store, |repo| {
            let Some(word) = repo.get_word(word_id)? else {
                return Ok(None);
            };
            let result = schedule(word.level, memorized, Utc::now());
            repo.update_word(word_id, &result.to_changes())?;
            Ok::<_, DbError>(Some(result))
        });

        match outcome {
            Ok(result) => {
                if let Some(r) = &result {
                    debug!(word_id, level = r.level, "local word rescheduled");
                }
                result
            }
            Err(e) => {
                warn!(word_id, error = %e, "failed to update local word");
                None
            }
        }
    }

    fn enqueue(&self, payload: ActionPayload) {
        if let Err(e) = self.outbox.append(payload) {
            warn!(error = %e, "failed to queue offline action");
            return;
        }
        if let Some(monitor) = &self.monitor {
            monitor.refresh_pending();
        }
    }
}
