//! Local SQLite database operations.

pub mod error;
pub mod repository;
pub mod schema;

use std::sync::{Arc, Mutex};

pub use error::DbError;
pub use repository::{
    to_db_timestamp, FolderRepository, MetaRepository, OutboxRepository, SqliteRepository,
    WordRepository, META_LAST_SYNC_AT, META_MEMORIZED_COUNT, META_WORD_COUNT,
};

/// Store handle shared by the quiz path, the sync engine and the monitor.
pub type SharedStore = Arc<Mutex<SqliteRepository>>;

/// Wrap a repository for sharing.
pub fn shared(repo: SqliteRepository) -> SharedStore {
    Arc::new(Mutex::new(repo))
}

/// Run `f` with the store locked. The lock is never held across an await.
pub fn with_store<T>(
    store: &SharedStore,
    f: impl FnOnce(&SqliteRepository) -> Result<T, DbError>,
) -> Result<T, DbError> {
    let repo = store.lock().map_err(|_| DbError::LockPoisoned)?;
    f(&repo)
}
