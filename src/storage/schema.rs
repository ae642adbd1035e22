//! Database schema definitions and migration fragments.
//!
//! All DDL uses `IF NOT EXISTS` and the event-column upgrades probe for
//! column existence first, so running migrations repeatedly neither throws
//! nor duplicates columns.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Canonical event journal (one row per persisted event)
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    role TEXT,
    content TEXT NOT NULL,
    timestamp TEXT,
    payload TEXT NOT NULL,  -- full canonical event JSON
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);

-- Assessment chunks (upserted by id on re-runs)
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    start_index INTEGER NOT NULL,
    end_index INTEGER NOT NULL,
    importance_avg REAL NOT NULL,
    token_estimate INTEGER NOT NULL,
    consensus_score REAL,
    events TEXT NOT NULL,  -- JSON array of member events
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_session ON chunks(session_id);

-- Per-provider chunk ratings
CREATE TABLE IF NOT EXISTS assessments (
    id TEXT PRIMARY KEY,
    chunk_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    score INTEGER NOT NULL,
    rationale TEXT NOT NULL,
    model TEXT,
    tokens_used INTEGER,
    latency_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_assessments_chunk ON assessments(chunk_id);

-- Discovered session files from other assistants
CREATE TABLE IF NOT EXISTS external_sessions (
    file_path TEXT PRIMARY KEY,
    platform TEXT NOT NULL,
    session_id TEXT,
    file_size INTEGER NOT NULL,
    modified_at TEXT NOT NULL,
    last_distilled_at TEXT
);

-- Write-ahead queue for the external memory service
CREATE TABLE IF NOT EXISTS _sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    synced_at INTEGER
);

-- FTS5 index over chunk content for keyword retrieval
CREATE VIRTUAL TABLE IF NOT EXISTS chunk_fts USING fts5(
    chunk_id UNINDEXED,
    content,
    tokenize='porter unicode61'
);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// Scoring columns retrofitted onto the `events` table.
///
/// Older journals predate real-time scoring; each column is added only
/// after a `PRAGMA table_info` probe shows it missing.
pub const EVENT_COLUMN_UPGRADES: &[(&str, &str)] = &[
    (
        "importance_score",
        "ALTER TABLE events ADD COLUMN importance_score INTEGER",
    ),
    ("chunk_id", "ALTER TABLE events ADD COLUMN chunk_id TEXT"),
    (
        "consensus_score",
        "ALTER TABLE events ADD COLUMN consensus_score REAL",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        const _: () = assert!(CURRENT_SCHEMA_VERSION >= 1);
    }

    #[test]
    fn test_schema_sql_is_idempotent_ddl() {
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS"));
        assert!(SCHEMA_SQL.contains("CREATE VIRTUAL TABLE IF NOT EXISTS chunk_fts"));
        // Every CREATE in the schema is guarded
        for line in SCHEMA_SQL.lines() {
            if line.trim_start().starts_with("CREATE") {
                assert!(line.contains("IF NOT EXISTS"), "unguarded DDL: {line}");
            }
        }
    }

    #[test]
    fn test_event_upgrades_cover_scoring_columns() {
        let columns: Vec<&str> = EVENT_COLUMN_UPGRADES.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns, vec!["importance_score", "chunk_id", "consensus_score"]);
    }
}
