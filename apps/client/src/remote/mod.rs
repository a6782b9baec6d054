//! Remote collaborator seam.
//!
//! The server owns the canonical data. Everything the offline engine needs
//! from it goes through [`RemoteApi`], so the sync engine and the quiz path
//! can be driven by the HTTP client or by an in-process fake.

pub mod http;

use async_trait::async_trait;
use wordquiz_core::types::{MemorizedToggle, OfflineSnapshot, QuizProgressRecord, QuizResultRecord};

pub use http::HttpRemote;

/// Remote call errors.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    /// The targeted entity no longer exists server-side.
    #[error("Stale reference: {0}")]
    StaleReference(String),
}

impl RemoteError {
    /// Whether the error means there is nothing left to reconcile.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleReference(_))
    }
}

/// Operations the engine consumes from the server.
///
/// Every mutation carries a request id; implementations must treat a repeated
/// id as already applied.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Record a memorized/not-memorized answer. The server re-derives the level itself.
    async fn toggle_memorized(&self, toggle: &MemorizedToggle) -> Result<(), RemoteError>;

    /// Append a finished quiz to the daily record.
    async fn save_quiz_result(&self, result: &QuizResultRecord) -> Result<(), RemoteError>;

    /// Upsert the running totals for today and mode.
    async fn save_quiz_progress(&self, progress: &QuizProgressRecord) -> Result<(), RemoteError>;

    /// Drop the server-side copy of the quiz session, if any.
    async fn clear_quiz_session(&self) -> Result<(), RemoteError>;

    /// Full pull used to seed the local store.
    async fn get_offline_snapshot(&self) -> Result<OfflineSnapshot, RemoteError>;

    /// Whether the server answers at all.
    async fn check_connectivity(&self) -> bool;
}
