//! Core types for the vocabulary quiz.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SnapshotError;

/// Folder color used when the server has none recorded.
pub const DEFAULT_FOLDER_COLOR: &str = "#3B82F6";

/// Vocabulary item mirrored from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalWord {
    pub id: String,
    pub word: String,
    pub meaning: String,
    pub memorized: bool,
    pub level: u8,
    pub next_review_at: DateTime<Utc>,
    pub folder_id: Option<String>,
}

/// Partial update applied to a stored word. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordChanges {
    pub word: Option<String>,
    pub meaning: Option<String>,
    pub memorized: Option<bool>,
    pub level: Option<u8>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub folder_id: Option<Option<String>>,
}

impl WordChanges {
    /// Apply these changes on top of an existing word.
    pub fn apply(&self, word: &mut LocalWord) {
        if let Some(text) = &self.word {
            word.word = text.clone();
        }
        if let Some(meaning) = &self.meaning {
            word.meaning = meaning.clone();
        }
        if let Some(memorized) = self.memorized {
            word.memorized = memorized;
        }
        if let Some(level) = self.level {
            word.level = level;
        }
        if let Some(next) = self.next_review_at {
            word.next_review_at = next;
        }
        if let Some(folder_id) = &self.folder_id {
            word.folder_id = folder_id.clone();
        }
    }
}

fn default_folder_color() -> String {
    DEFAULT_FOLDER_COLOR.to_string()
}

/// Folder mirrored from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFolder {
    pub id: String,
    pub name: String,
    #[serde(default = "default_folder_color")]
    pub color: String,
    pub sort_order: i64,
}

/// Quiz presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuizMode {
    Normal,
    Reverse,
    MultipleChoice,
}

impl Default for QuizMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl QuizMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Reverse => "reverse",
            Self::MultipleChoice => "multipleChoice",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "reverse" => Some(Self::Reverse),
            "multipleChoice" => Some(Self::MultipleChoice),
            _ => None,
        }
    }
}

/// Word as captured in a quiz run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizWord {
    pub id: String,
    pub word: String,
    pub meaning: String,
    pub memorized: bool,
}

impl From<&LocalWord> for QuizWord {
    fn from(word: &LocalWord) -> Self {
        Self {
            id: word.id.clone(),
            word: word.word.clone(),
            meaning: word.meaning.clone(),
            memorized: word.memorized,
        }
    }
}

/// Resumable quiz state. One slot per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSessionSnapshot {
    pub words: Vec<QuizWord>,
    pub current_index: usize,
    pub memorized_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_ids: Option<Vec<String>>,
    #[serde(default)]
    pub quiz_mode: QuizMode,
    #[serde(default)]
    pub manual_reveal: bool,
    #[serde(default)]
    pub wrong_words: Vec<QuizWord>,
    pub saved_at: DateTime<Utc>,
}

impl QuizSessionSnapshot {
    /// Check the structural invariants of a persisted snapshot.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.words.is_empty() {
            return Err(SnapshotError::NoWords);
        }
        if self.current_index >= self.words.len() {
            return Err(SnapshotError::IndexOutOfRange {
                index: self.current_index,
                len: self.words.len(),
            });
        }
        if self.words.iter().any(|w| w.id.is_empty()) {
            return Err(SnapshotError::MissingWordId);
        }
        Ok(())
    }
}

/// Memorized/not-memorized outcome for one word.
///
/// Carries only the boolean; the receiver re-derives the level from its own state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizedToggle {
    pub request_id: Uuid,
    pub word_id: String,
    pub memorized: bool,
}

impl MemorizedToggle {
    pub fn new(word_id: impl Into<String>, memorized: bool) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            word_id: word_id.into(),
            memorized,
        }
    }
}

/// Running totals of an unfinished quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgressRecord {
    pub request_id: Uuid,
    pub total_answered: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub quiz_mode: QuizMode,
}

impl QuizProgressRecord {
    pub fn new(total_answered: u32, correct_count: u32, wrong_count: u32, quiz_mode: QuizMode) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            total_answered,
            correct_count,
            wrong_count,
            quiz_mode,
        }
    }
}

/// Totals of a finished quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultRecord {
    pub request_id: Uuid,
    pub total_words: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub quiz_mode: QuizMode,
}

impl QuizResultRecord {
    pub fn new(total_words: u32, correct_count: u32, wrong_count: u32, quiz_mode: QuizMode) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            total_words,
            correct_count,
            wrong_count,
            quiz_mode,
        }
    }
}

/// Kind of a deferred mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    ToggleMemorized,
    QuizProgress,
    QuizResult,
    ClearSession,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToggleMemorized => "TOGGLE_MEMORIZED",
            Self::QuizProgress => "QUIZ_PROGRESS",
            Self::QuizResult => "QUIZ_RESULT",
            Self::ClearSession => "CLEAR_SESSION",
        }
    }
}

/// Payload of a deferred mutation, typed per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPayload {
    ToggleMemorized(MemorizedToggle),
    QuizProgress(QuizProgressRecord),
    QuizResult(QuizResultRecord),
    ClearSession,
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::ToggleMemorized(_) => ActionKind::ToggleMemorized,
            Self::QuizProgress(_) => ActionKind::QuizProgress,
            Self::QuizResult(_) => ActionKind::QuizResult,
            Self::ClearSession => ActionKind::ClearSession,
        }
    }
}

/// Queued mutation awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: i64,
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts shipped with a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub total_words: u64,
    pub memorized_count: u64,
}

/// Full pull used to seed the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSnapshot {
    pub words: Vec<LocalWord>,
    pub folders: Vec<LocalFolder>,
    #[serde(default)]
    pub stats: SnapshotStats,
}
