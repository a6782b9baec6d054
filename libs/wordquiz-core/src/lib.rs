//! Core vocabulary-quiz library shared by the offline client and the server.
//!
//! Provides:
//! - Level-ladder spaced repetition scheduling
//! - Shared types (words, folders, queued actions, quiz sessions)

pub mod error;
pub mod srs;
pub mod types;

pub use error::SnapshotError;
pub use srs::{interval_for, schedule, SchedulingResult, MAX_LEVEL, SRS_INTERVALS};
pub use types::{
    ActionKind, ActionPayload, LocalFolder, LocalWord, MemorizedToggle, OfflineSnapshot,
    PendingAction, QuizMode, QuizProgressRecord, QuizResultRecord, QuizSessionSnapshot, QuizWord,
    SnapshotStats, WordChanges, DEFAULT_FOLDER_COLOR,
};
