//! Durable FIFO of actions taken while offline.
//!
//! Thin facade over the `pending_actions` table. Deduplication is not done
//! here; the sync engine plans it right before a drain.

use chrono::Utc;
use tracing::debug;
use wordquiz_core::types::{ActionPayload, PendingAction};

use crate::db::{with_store, DbError, OutboxRepository, SharedStore};

#[derive(Clone)]
pub struct OutboxQueue {
    store: SharedStore,
}

impl OutboxQueue {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Append an action, stamping it with a fresh id and `created_at = now`.
    pub fn append(&self, payload: ActionPayload) -> Result<i64, DbError> {
        let id = with_store(&self.store, |repo| repo.append_action(&payload, Utc::now()))?;
        debug!(id, kind = payload.kind().as_str(), "action queued");
        Ok(id)
    }

    /// All queued actions in insertion order.
    pub fn list_all(&self) -> Result<Vec<PendingAction>, DbError> {
        with_store(&self.store, |repo| repo.list_actions())
    }

    pub fn remove(&self, id: i64) -> Result<bool, DbError> {
        with_store(&self.store, |repo| repo.remove_action(id))
    }

    /// Remove several actions in one transaction.
    pub fn remove_many(&self, ids: &[i64]) -> Result<usize, DbError> {
        with_store(&self.store, |repo| repo.remove_actions(ids))
    }

    pub fn clear(&self) -> Result<usize, DbError> {
        with_store(&self.store, |repo| repo.clear_actions())
    }

    pub fn len(&self) -> Result<usize, DbError> {
        with_store(&self.store, |repo| repo.pending_count())
    }

    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.len()? == 0)
    }
}
