//! Error types for wordquiz-core.

use thiserror::Error;

/// Reasons a persisted quiz session snapshot cannot be resumed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot has no words")]
    NoWords,

    #[error("current index {index} out of range for {len} words")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("snapshot word without id")]
    MissingWordId,
}
