//! Common test utilities for integration tests.
//!
//! - `FakeRemote`: in-process stand-in for the server. It keeps its own word
//!   levels, re-derives them with the shared scheduler, honours request ids
//!   and can be told to fail.
//! - `TestContext`: offline services wired to a `FakeRemote` and an
//!   in-memory store.

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use wordquiz_client::db::SqliteRepository;
use wordquiz_client::remote::{RemoteApi, RemoteError};
use wordquiz_client::state::{OfflineServices, ServiceSettings};
use wordquiz_core::srs::schedule;
use wordquiz_core::types::{
    LocalFolder, LocalWord, MemorizedToggle, OfflineSnapshot, QuizMode, QuizProgressRecord,
    QuizResultRecord, SnapshotStats,
};

/// A remote call that reached the fake, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Toggle { word_id: String, memorized: bool },
    Progress(QuizMode),
    Result(QuizMode),
    ClearSession,
}

#[derive(Default)]
struct FakeState {
    words: HashMap<String, LocalWord>,
    folders: Vec<LocalFolder>,
    applied_requests: HashSet<Uuid>,
    attempts: Vec<RemoteCall>,
    fail_next: usize,
    offline: bool,
    results: Vec<QuizResultRecord>,
    progress: HashMap<QuizMode, QuizProgressRecord>,
    sessions_cleared: usize,
}

impl FakeState {
    /// Record the attempt and decide whether it fails.
    fn attempt(&mut self, call: RemoteCall) -> Result<(), RemoteError> {
        self.attempts.push(call);
        if self.offline {
            return Err(RemoteError::Network("connection refused".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(RemoteError::Backend {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(())
    }

    /// Whether `request_id` was seen before; marks it seen.
    fn already_applied(&mut self, request_id: Uuid) -> bool {
        !self.applied_requests.insert(request_id)
    }
}

#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new(words: Vec<LocalWord>, folders: Vec<LocalFolder>) -> Self {
        let state = FakeState {
            words: words.into_iter().map(|w| (w.id.clone(), w)).collect(),
            folders,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Fail the next `n` calls with a 503.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().fail_next = n;
    }

    pub fn delete_word(&self, id: &str) {
        self.state.lock().unwrap().words.remove(id);
    }

    pub fn word(&self, id: &str) -> Option<LocalWord> {
        self.state.lock().unwrap().words.get(id).cloned()
    }

    pub fn level(&self, id: &str) -> Option<u8> {
        self.word(id).map(|w| w.level)
    }

    pub fn attempts(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn results(&self) -> Vec<QuizResultRecord> {
        self.state.lock().unwrap().results.clone()
    }

    pub fn progress(&self, mode: QuizMode) -> Option<QuizProgressRecord> {
        self.state.lock().unwrap().progress.get(&mode).cloned()
    }

    pub fn sessions_cleared(&self) -> usize {
        self.state.lock().unwrap().sessions_cleared
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn toggle_memorized(&self, toggle: &MemorizedToggle) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.attempt(RemoteCall::Toggle {
            word_id: toggle.word_id.clone(),
            memorized: toggle.memorized,
        })?;

        if !state.words.contains_key(&toggle.word_id) {
            return Err(RemoteError::StaleReference(toggle.word_id.clone()));
        }
        if state.already_applied(toggle.request_id) {
            return Ok(());
        }

        if let Some(word) = state.words.get_mut(&toggle.word_id) {
            let result = schedule(word.level, toggle.memorized, Utc::now());
            result.to_changes().apply(word);
        }
        Ok(())
    }

    async fn save_quiz_result(&self, result: &QuizResultRecord) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.attempt(RemoteCall::Result(result.quiz_mode))?;
        if !state.already_applied(result.request_id) {
            state.results.push(result.clone());
        }
        Ok(())
    }

    async fn save_quiz_progress(&self, progress: &QuizProgressRecord) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.attempt(RemoteCall::Progress(progress.quiz_mode))?;
        state.progress.insert(progress.quiz_mode, progress.clone());
        Ok(())
    }

    async fn clear_quiz_session(&self) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.attempt(RemoteCall::ClearSession)?;
        state.sessions_cleared += 1;
        Ok(())
    }

    async fn get_offline_snapshot(&self) -> Result<OfflineSnapshot, RemoteError> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(RemoteError::Network("connection refused".into()));
        }
        let mut words: Vec<LocalWord> = state.words.values().cloned().collect();
        words.sort_by(|a, b| a.id.cmp(&b.id));
        let memorized_count = words.iter().filter(|w| w.memorized).count() as u64;
        Ok(OfflineSnapshot {
            stats: SnapshotStats {
                total_words: words.len() as u64,
                memorized_count,
            },
            words,
            folders: state.folders.clone(),
        })
    }

    async fn check_connectivity(&self) -> bool {
        !self.state.lock().unwrap().offline
    }
}

/// Offline services backed by a fake remote and an in-memory store.
pub struct TestContext {
    pub remote: Arc<FakeRemote>,
    pub services: OfflineServices,
}

impl TestContext {
    pub fn new(remote: FakeRemote) -> Self {
        Self::with_settings(remote, ServiceSettings::default())
    }

    pub fn with_settings(remote: FakeRemote, settings: ServiceSettings) -> Self {
        let remote = Arc::new(remote);
        let repo = SqliteRepository::open_in_memory().expect("in-memory store");
        let services = OfflineServices::new(remote.clone(), repo, "test-user", settings);
        Self { remote, services }
    }

    /// Context with `n` fresh words already pulled into the local store.
    pub async fn prepared(n: usize) -> Self {
        let ctx = Self::new(FakeRemote::new(
            fixtures::words(n),
            vec![fixtures::folder("f1", 0)],
        ));
        ctx.services
            .engine
            .prepare_offline()
            .await
            .expect("prepare offline");
        ctx
    }

    pub fn pending(&self) -> usize {
        self.services.engine.outbox().len().expect("pending count")
    }
}
