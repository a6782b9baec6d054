//! Repository pattern for local store access.

use crate::db::error::DbError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tracing::debug;
use wordquiz_core::types::{
    ActionPayload, LocalFolder, LocalWord, OfflineSnapshot, PendingAction, WordChanges,
};

type Result<T> = std::result::Result<T, DbError>;

/// Meta key holding the time of the last offline preparation.
pub const META_LAST_SYNC_AT: &str = "lastSyncAt";
/// Meta key holding the word count reported by the last snapshot.
pub const META_WORD_COUNT: &str = "wordCount";
/// Meta key holding the memorized count reported by the last snapshot.
pub const META_MEMORIZED_COUNT: &str = "memorizedCount";

/// Repository for word operations.
pub trait WordRepository {
    fn replace_words(&self, words: &[LocalWord]) -> Result<usize>;
    fn get_word(&self, id: &str) -> Result<Option<LocalWord>>;
    fn query_words(
        &self,
        folder_ids: Option<&[String]>,
        memorized: Option<bool>,
    ) -> Result<Vec<LocalWord>>;
    fn query_due_for_review(
        &self,
        folder_ids: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LocalWord>>;
    fn update_word(&self, id: &str, changes: &WordChanges) -> Result<bool>;
}

/// Repository for folder operations.
pub trait FolderRepository {
    fn replace_folders(&self, folders: &[LocalFolder]) -> Result<usize>;
    fn get_folders(&self) -> Result<Vec<LocalFolder>>;
}

/// Repository for scalar metadata.
pub trait MetaRepository {
    fn get_meta(&self, key: &str) -> Result<Option<Value>>;
    fn set_meta(&self, key: &str, value: &Value) -> Result<()>;
    fn delete_meta(&self, key: &str) -> Result<()>;
}

/// Repository for the pending action log.
pub trait OutboxRepository {
    fn append_action(&self, payload: &ActionPayload, created_at: DateTime<Utc>) -> Result<i64>;
    fn list_actions(&self) -> Result<Vec<PendingAction>>;
    fn remove_action(&self, id: i64) -> Result<bool>;
    fn remove_actions(&self, ids: &[i64]) -> Result<usize>;
    fn clear_actions(&self) -> Result<usize>;
    fn pending_count(&self) -> Result<usize>;
}

/// Format a timestamp the way it is stored.
pub fn to_db_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_db_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |source| DbError::StorageUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let conn = Connection::open(path).map_err(unavailable)?;
        let repo = Self { conn };
        repo.initialize().map_err(|e| match e {
            DbError::Sqlite(source) => unavailable(source),
            other => other,
        })?;
        debug!(path = %path.display(), "local store opened");
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute_batch(super::schema::INIT_SCHEMA_VERSION)?;
        Ok(())
    }

    /// Time of the last offline preparation, if any.
    pub fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        let value = self.get_meta(META_LAST_SYNC_AT)?;
        Ok(value.and_then(|v| serde_json::from_value(v).ok()))
    }

    /// Replace words, folders and snapshot meta in one transaction.
    ///
    /// Returns the stored word and folder counts. On error nothing changes.
    pub fn store_snapshot(
        &self,
        snapshot: &OfflineSnapshot,
        synced_at: DateTime<Utc>,
    ) -> Result<(usize, usize)> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_words(&tx, &snapshot.words)?;
        Self::write_folders(&tx, &snapshot.folders)?;
        Self::write_meta(&tx, META_LAST_SYNC_AT, &serde_json::to_value(synced_at)?)?;
        Self::write_meta(&tx, META_WORD_COUNT, &snapshot.stats.total_words.into())?;
        Self::write_meta(&tx, META_MEMORIZED_COUNT, &snapshot.stats.memorized_count.into())?;
        tx.commit()?;
        Ok((snapshot.words.len(), snapshot.folders.len()))
    }

    /// Whether a snapshot has ever been pulled into this store.
    pub fn is_offline_ready(&self) -> Result<bool> {
        Ok(self.get_meta(META_LAST_SYNC_AT)?.is_some())
    }

    fn row_to_word(row: &rusqlite::Row) -> rusqlite::Result<LocalWord> {
        let next_review_at: String = row.get(5)?;
        Ok(LocalWord {
            id: row.get(0)?,
            word: row.get(1)?,
            meaning: row.get(2)?,
            memorized: row.get(3)?,
            level: row.get(4)?,
            next_review_at: parse_db_timestamp(5, &next_review_at)?,
            folder_id: row.get(6)?,
        })
    }

    fn write_words(conn: &Connection, words: &[LocalWord]) -> Result<()> {
        conn.execute("DELETE FROM words", [])?;
        for word in words {
            Self::insert_word(conn, word)?;
        }
        Ok(())
    }

    fn write_folders(conn: &Connection, folders: &[LocalFolder]) -> Result<()> {
        conn.execute("DELETE FROM folders", [])?;
        for folder in folders {
            conn.execute(
                "INSERT OR REPLACE INTO folders (id, name, color, sort_order) VALUES (?1, ?2, ?3, ?4)",
                params![folder.id, folder.name, folder.color, folder.sort_order],
            )?;
        }
        Ok(())
    }

    fn write_meta(conn: &Connection, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, raw],
        )?;
        Ok(())
    }

    fn insert_word(conn: &Connection, word: &LocalWord) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO words (id, word, meaning, memorized, level, next_review_at, folder_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                word.id,
                word.word,
                word.meaning,
                word.memorized,
                word.level,
                to_db_timestamp(word.next_review_at),
                word.folder_id,
            ],
        )?;
        Ok(())
    }

    fn select_words(&self, filter_sql: &str, values: Vec<SqlValue>) -> Result<Vec<LocalWord>> {
        let sql = format!(
            "SELECT id, word, meaning, memorized, level, next_review_at, folder_id
             FROM words WHERE 1 = 1{}",
            filter_sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let words = stmt
            .query_map(params_from_iter(values), Self::row_to_word)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(words)
    }
}

/// Append `AND folder_id IN (...)` when a non-empty folder filter is given.
///
/// Words without a folder never match a folder filter.
fn push_folder_filter(sql: &mut String, values: &mut Vec<SqlValue>, folder_ids: Option<&[String]>) {
    if let Some(ids) = folder_ids.filter(|ids| !ids.is_empty()) {
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        sql.push_str(&format!(" AND folder_id IN ({})", placeholders));
        values.extend(ids.iter().map(|id| SqlValue::Text(id.clone())));
    }
}

impl WordRepository for SqliteRepository {
    fn replace_words(&self, words: &[LocalWord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_words(&tx, words)?;
        tx.commit()?;
        Ok(words.len())
    }

    fn get_word(&self, id: &str) -> Result<Option<LocalWord>> {
        self.conn
            .query_row(
                "SELECT id, word, meaning, memorized, level, next_review_at, folder_id
                 FROM words WHERE id = ?1",
                params![id],
                Self::row_to_word,
            )
            .optional()
            .map_err(Into::into)
    }

    fn query_words(
        &self,
        folder_ids: Option<&[String]>,
        memorized: Option<bool>,
    ) -> Result<Vec<LocalWord>> {
        let mut sql = String::new();
        let mut values = Vec::new();
        if let Some(memorized) = memorized {
            sql.push_str(" AND memorized = ?");
            values.push(SqlValue::Integer(i64::from(memorized)));
        }
        push_folder_filter(&mut sql, &mut values, folder_ids);
        sql.push_str(" ORDER BY id");
        self.select_words(&sql, values)
    }

    fn query_due_for_review(
        &self,
        folder_ids: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LocalWord>> {
        let mut sql = String::from(" AND next_review_at <= ?");
        let mut values = vec![SqlValue::Text(to_db_timestamp(now))];
        push_folder_filter(&mut sql, &mut values, folder_ids);
        sql.push_str(" ORDER BY next_review_at, id");
        self.select_words(&sql, values)
    }

    fn update_word(&self, id: &str, changes: &WordChanges) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = tx
            .query_row(
                "SELECT id, word, meaning, memorized, level, next_review_at, folder_id
                 FROM words WHERE id = ?1",
                params![id],
                Self::row_to_word,
            )
            .optional()?;

        // Deleted server-side since the last pull.
        let Some(mut word) = existing else {
            return Ok(false);
        };

        changes.apply(&mut word);
        Self::insert_word(&tx, &word)?;
        tx.commit()?;
        Ok(true)
    }
}

impl FolderRepository for SqliteRepository {
    fn replace_folders(&self, folders: &[LocalFolder]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_folders(&tx, folders)?;
        tx.commit()?;
        Ok(folders.len())
    }

    fn get_folders(&self) -> Result<Vec<LocalFolder>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, sort_order FROM folders ORDER BY sort_order, id")?;

        let folders = stmt
            .query_map([], |row| {
                Ok(LocalFolder {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                    sort_order: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(folders)
    }
}

impl MetaRepository for SqliteRepository {
    fn get_meta(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_meta(&self, key: &str, value: &Value) -> Result<()> {
        Self::write_meta(&self.conn, key, value)
    }

    fn delete_meta(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM meta WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl OutboxRepository for SqliteRepository {
    fn append_action(&self, payload: &ActionPayload, created_at: DateTime<Utc>) -> Result<i64> {
        let raw = serde_json::to_string(payload)?;
        self.conn.execute(
            "INSERT INTO pending_actions (kind, payload, created_at) VALUES (?1, ?2, ?3)",
            params![payload.kind().as_str(), raw, to_db_timestamp(created_at)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_actions(&self) -> Result<Vec<PendingAction>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, payload, created_at FROM pending_actions ORDER BY id")?;

        let rows = stmt
            .query_map([], |row| {
                let created_at: String = row.get(2)?;
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    parse_db_timestamp(2, &created_at)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, raw, created_at)| {
                let payload: ActionPayload = serde_json::from_str(&raw).map_err(|e| {
                    DbError::InvalidData(format!("pending action {} payload: {}", id, e))
                })?;
                Ok(PendingAction {
                    id,
                    payload,
                    created_at,
                })
            })
            .collect()
    }

    fn remove_action(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM pending_actions WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    fn remove_actions(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for id in ids {
            count += tx.execute("DELETE FROM pending_actions WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(count)
    }

    fn clear_actions(&self) -> Result<usize> {
        let count = self.conn.execute("DELETE FROM pending_actions", [])?;
        Ok(count)
    }

    fn pending_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_actions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
