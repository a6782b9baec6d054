//! Resumable quiz session, one slot per user.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use wordquiz_core::types::QuizSessionSnapshot;

use crate::db::{with_store, DbError, MetaRepository, SharedStore};

/// Sessions older than this are discarded on load.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Meta key of the session slot for `user_id`.
pub fn session_key(user_id: &str) -> String {
    format!("quizSession:{}", user_id)
}

/// Caller's answer to the resume prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    Resume,
    Discard,
}

#[derive(Clone)]
pub struct SessionStore {
    store: SharedStore,
    key: String,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(store: SharedStore, user_id: &str) -> Self {
        Self {
            store,
            key: session_key(user_id),
            ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Overwrite the slot, stamping `saved_at = now`.
    pub fn save(&self, snapshot: QuizSessionSnapshot) -> Result<(), DbError> {
        self.save_at(snapshot, Utc::now())
    }

    pub fn save_at(&self, mut snapshot: QuizSessionSnapshot, now: DateTime<Utc>) -> Result<(), DbError> {
        snapshot.saved_at = now;
        let value = serde_json::to_value(&snapshot)?;
        with_store(&self.store, |repo| repo.set_meta(&self.key, &value))?;
        debug!(index = snapshot.current_index, "quiz session saved");
        Ok(())
    }

    /// The live session, if any.
    ///
    /// An expired, invalid or unreadable slot is cleared and reported as absent.
    pub fn load(&self) -> Option<QuizSessionSnapshot> {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> Option<QuizSessionSnapshot> {
        let raw = match with_store(&self.store, |repo| repo.get_meta(&self.key)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "failed to read quiz session");
                return None;
            }
        };

        let snapshot = match serde_json::from_value::<QuizSessionSnapshot>(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "unreadable quiz session discarded");
                self.discard();
                return None;
            }
        };

        if now - snapshot.saved_at > self.ttl {
            info!(saved_at = %snapshot.saved_at, "quiz session expired");
            self.discard();
            return None;
        }

        if let Err(e) = snapshot.validate() {
            warn!(error = %e, "invalid quiz session discarded");
            self.discard();
            return None;
        }

        Some(snapshot)
    }

    pub fn clear(&self) -> Result<(), DbError> {
        with_store(&self.store, |repo| repo.delete_meta(&self.key))
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to clear quiz session");
        }
    }

    /// Gate run on quiz entry: a session to offer for resuming, if any.
    pub fn check_resume(&self) -> Option<QuizSessionSnapshot> {
        self.load()
    }

    /// Apply the caller's resume decision.
    ///
    /// `Resume` hands the snapshot back verbatim; `Discard` clears the slot.
    pub fn resolve(
        &self,
        choice: ResumeChoice,
        snapshot: QuizSessionSnapshot,
    ) -> Option<QuizSessionSnapshot> {
        match choice {
            ResumeChoice::Resume => Some(snapshot),
            ResumeChoice::Discard => {
                self.discard();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{shared, SqliteRepository};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wordquiz_core::types::{QuizMode, QuizWord};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 18, 0, 0).unwrap()
    }

    fn snapshot() -> QuizSessionSnapshot {
        let word = |id: &str| QuizWord {
            id: id.to_string(),
            word: format!("word-{id}"),
            meaning: format!("meaning-{id}"),
            memorized: false,
        };
        QuizSessionSnapshot {
            words: vec![word("a"), word("b"), word("c")],
            current_index: 1,
            memorized_count: 1,
            folder_ids: Some(vec!["f1".into()]),
            quiz_mode: QuizMode::Reverse,
            manual_reveal: true,
            wrong_words: vec![word("a")],
            saved_at: now() - Duration::days(30),
        }
    }

    fn sessions() -> (SessionStore, SharedStore) {
        let store = shared(SqliteRepository::open_in_memory().unwrap());
        (SessionStore::new(store.clone(), "user-1"), store)
    }

    fn slot_exists(store: &SharedStore) -> bool {
        with_store(store, |repo| repo.get_meta(&session_key("user-1")))
            .unwrap()
            .is_some()
    }

    #[test]
    fn save_stamps_saved_at_and_load_restores_verbatim() {
        let (sessions, _) = sessions();
        sessions.save_at(snapshot(), now()).unwrap();

        let loaded = sessions.load_at(now()).unwrap();
        assert_eq!(loaded.saved_at, now());
        assert_eq!(loaded.wrong_words.len(), 1);
        assert_eq!(loaded.quiz_mode, QuizMode::Reverse);
        assert!(loaded.manual_reveal);
    }

    #[test]
    fn expired_session_is_cleared_on_load() {
        let (sessions, store) = sessions();
        let saved = now() - Duration::days(SESSION_TTL_DAYS) - Duration::milliseconds(1);
        sessions.save_at(snapshot(), saved).unwrap();

        assert!(sessions.load_at(now()).is_none());
        assert!(!slot_exists(&store));
    }

    #[test]
    fn session_exactly_at_ttl_is_still_live() {
        let (sessions, _) = sessions();
        sessions
            .save_at(snapshot(), now() - Duration::days(SESSION_TTL_DAYS))
            .unwrap();
        assert!(sessions.load_at(now()).is_some());
    }

    #[test]
    fn invalid_session_is_cleared_on_load() {
        let (sessions, store) = sessions();
        let mut broken = snapshot();
        broken.current_index = 3;
        sessions.save_at(broken, now()).unwrap();

        assert!(sessions.load_at(now()).is_none());
        assert!(!slot_exists(&store));
    }

    #[test]
    fn unreadable_session_is_cleared_on_load() {
        let (sessions, store) = sessions();
        with_store(&store, |repo| {
            repo.set_meta(&session_key("user-1"), &json!({"words": "nope"}))
        })
        .unwrap();

        assert!(sessions.load_at(now()).is_none());
        assert!(!slot_exists(&store));
    }

    #[test]
    fn slots_are_per_user() {
        let (sessions, store) = sessions();
        sessions.save_at(snapshot(), now()).unwrap();
        let other = SessionStore::new(store, "user-2");
        assert!(other.load_at(now()).is_none());
    }

    #[test]
    fn discard_clears_and_resume_returns_verbatim() {
        let (sessions, store) = sessions();
        sessions.save(snapshot()).unwrap();

        let pending = sessions.check_resume().unwrap();
        let resumed = sessions
            .resolve(ResumeChoice::Resume, pending.clone())
            .unwrap();
        assert_eq!(resumed, pending);
        assert!(slot_exists(&store));

        assert!(sessions.resolve(ResumeChoice::Discard, pending).is_none());
        assert!(!slot_exists(&store));
    }
}
