//! SQLite schema definitions.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema for the local offline store.
///
/// Timestamps are RFC 3339 UTC with millisecond precision, so string
/// comparison matches chronological order.
pub const SCHEMA: &str = r#"
-- Words (full snapshot from the server, replaced on each offline preparation)
CREATE TABLE IF NOT EXISTS words (
    id TEXT PRIMARY KEY,
    word TEXT NOT NULL,
    meaning TEXT NOT NULL,
    memorized INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 0,
    next_review_at TEXT NOT NULL,
    folder_id TEXT
);

-- Folders (full snapshot from the server)
CREATE TABLE IF NOT EXISTS folders (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0
);

-- Actions taken while offline, replayed in id order
CREATE TABLE IF NOT EXISTS pending_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Scalar key/value pairs (JSON encoded values)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_words_folder ON words(folder_id);
CREATE INDEX IF NOT EXISTS idx_words_memorized ON words(memorized);
CREATE INDEX IF NOT EXISTS idx_words_next_review ON words(next_review_at);
"#;

/// Record the schema version if not exists.
pub const INIT_SCHEMA_VERSION: &str = r#"
INSERT OR IGNORE INTO schema_version (version) VALUES (1);
"#;
