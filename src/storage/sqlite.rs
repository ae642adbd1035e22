//! `SQLite` storage for chunks, assessments, sessions, and the sync queue.
//!
//! A single connection behind a mutex enforces the single-writer
//! discipline: every component that needs persistence goes through this
//! owner object, so parallel assessment tasks can never deadlock the
//! database.

// SQLite stores all integers as i64; stored values are non-negative and
// fit the unsigned types they round-trip through.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::assess::{Assessment, ProviderKind};
use crate::core::{CanonicalEvent, Chunk, ScannedSession};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CURRENT_SCHEMA_VERSION, EVENT_COLUMN_UPGRADES, SCHEMA_SQL, SET_VERSION_SQL,
};

/// A stored chunk with its persisted consensus score.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// The chunk payload.
    pub chunk: Chunk,
    /// Consensus score, once assessments were aggregated.
    pub consensus: Option<f64>,
}

/// A pending or synced row of the memory-service write-ahead queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQueueEntry {
    /// Monotonic row id; defines retry order.
    pub id: i64,
    /// Operation discriminator (e.g. `store_observation`).
    pub operation: String,
    /// Serialized operation payload.
    pub payload: String,
    /// Unix timestamp of enqueue.
    pub created_at: i64,
    /// Unix timestamp of successful sync; `None` while pending.
    pub synced_at: Option<i64>,
}

/// Aggregate storage statistics for `status` reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Persisted chunks.
    pub chunk_count: usize,
    /// Persisted assessments.
    pub assessment_count: usize,
    /// Journaled events.
    pub event_count: usize,
    /// Tracked external session files.
    pub external_session_count: usize,
    /// Pending sync-queue rows.
    pub sync_queue_pending: usize,
    /// Schema version.
    pub schema_version: u32,
}

/// Owner of the local database.
pub struct DistillStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl DistillStore {
    /// Opens or creates the database at `path` and runs migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Creates an in-memory database, used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or migrated.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Returns the database path (`None` for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs idempotent migrations: guarded DDL plus probed column adds.
    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        for (column, ddl) in EVENT_COLUMN_UPGRADES {
            if !Self::column_exists(conn, "events", column)? {
                conn.execute(ddl, [])
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
            }
        }

        conn.execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(())
    }

    fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .map_err(StorageError::from)?;
        let mut rows = stmt.query([]).map_err(StorageError::from)?;
        while let Some(row) = rows.next().map_err(StorageError::from)? {
            let name: String = row.get(1).map_err(StorageError::from)?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()).into())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    // ==================== Event journal ====================

    /// Appends a canonical event to the journal, returning its row id.
    pub fn insert_event(&self, session_id: &str, event: &CanonicalEvent) -> Result<i64> {
        let payload = serde_json::to_string(event).map_err(StorageError::from)?;
        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT INTO events (
                session_id, event_type, role, content, timestamp, payload,
                importance_score, chunk_id, consensus_score, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
            params![
                session_id,
                event.event.event_type,
                event.event.role.map(|r| format!("{r:?}").to_lowercase()),
                event.event.content,
                event.event.timestamp,
                payload,
                event.importance_score.map(i64::from),
                event.chunk_id,
                event.consensus_score,
                Self::now(),
            ],
        )
        .map_err(StorageError::from)?;
        Ok(conn.last_insert_rowid())
    }

    /// Links journaled events to the chunk they were grouped into.
    pub fn annotate_events(
        &self,
        session_id: &str,
        chunk_id: &str,
        consensus: Option<f64>,
    ) -> Result<usize> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                r"
            UPDATE events SET chunk_id = ?, consensus_score = ?
            WHERE session_id = ? AND chunk_id IS NULL
        ",
                params![chunk_id, consensus, session_id],
            )
            .map_err(StorageError::from)?;
        Ok(updated)
    }

    // ==================== Chunks ====================

    /// Upserts a chunk by id and refreshes its FTS row.
    pub fn upsert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let events_json = serde_json::to_string(&chunk.events).map_err(StorageError::from)?;
        let content = chunk.combined_content();
        let conn = self.lock()?;

        conn.execute(
            r"
            INSERT INTO chunks (
                id, session_id, start_index, end_index, importance_avg,
                token_estimate, events, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                session_id = excluded.session_id,
                start_index = excluded.start_index,
                end_index = excluded.end_index,
                importance_avg = excluded.importance_avg,
                token_estimate = excluded.token_estimate,
                events = excluded.events
        ",
            params![
                chunk.id,
                chunk.session_id,
                chunk.start_index as i64,
                chunk.end_index as i64,
                chunk.importance_avg,
                chunk.token_estimate as i64,
                events_json,
                Self::now(),
            ],
        )
        .map_err(StorageError::from)?;

        // Standalone FTS table: delete-then-insert keeps it in sync with
        // the upsert above.
        conn.execute("DELETE FROM chunk_fts WHERE chunk_id = ?", params![chunk.id])
            .map_err(StorageError::from)?;
        conn.execute(
            "INSERT INTO chunk_fts (chunk_id, content) VALUES (?, ?)",
            params![chunk.id, content],
        )
        .map_err(StorageError::from)?;

        Ok(())
    }

    /// Loads one chunk by id.
    pub fn get_chunk(&self, id: &str) -> Result<Option<StoredChunk>> {
        let conn = self.lock()?;
        conn.query_row(
            r"
            SELECT id, session_id, start_index, end_index, importance_avg,
                   token_estimate, consensus_score, events
            FROM chunks WHERE id = ?
        ",
            params![id],
            row_to_stored_chunk,
        )
        .optional()
        .map_err(StorageError::from)?
        .map(|r| r.map_err(Into::into))
        .transpose()
    }

    /// Loads every chunk with its consensus, ordered by `start_index`.
    pub fn all_chunks(&self) -> Result<Vec<StoredChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r"
            SELECT id, session_id, start_index, end_index, importance_avg,
                   token_estimate, consensus_score, events
            FROM chunks ORDER BY start_index
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], row_to_stored_chunk)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|r| r.map_err(Into::into))
            .collect::<Result<Vec<_>>>()
    }

    /// Records a chunk's aggregated consensus score.
    pub fn set_consensus(&self, chunk_id: &str, consensus: f64) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE chunks SET consensus_score = ? WHERE id = ?",
                params![consensus, chunk_id],
            )
            .map_err(StorageError::from)?;
        if updated == 0 {
            return Err(StorageError::ChunkNotFound {
                id: chunk_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // ==================== Assessments ====================

    /// Persists one assessment (idempotent by id).
    pub fn insert_assessment(&self, assessment: &Assessment) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT OR REPLACE INTO assessments (
                id, chunk_id, provider, score, rationale, model,
                tokens_used, latency_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
            params![
                assessment.id,
                assessment.chunk_id,
                assessment.provider.as_str(),
                i64::from(assessment.score),
                assessment.rationale,
                assessment.model,
                assessment.tokens_used.map(|t| t as i64),
                assessment.latency_ms as i64,
                assessment.created_at.to_rfc3339(),
            ],
        )
        .map_err(StorageError::from)?;
        Ok(())
    }

    /// Loads all assessments for one chunk.
    pub fn assessments_for_chunk(&self, chunk_id: &str) -> Result<Vec<Assessment>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r"
            SELECT id, chunk_id, provider, score, rationale, model,
                   tokens_used, latency_ms, created_at
            FROM assessments WHERE chunk_id = ? ORDER BY created_at
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![chunk_id], |row| {
                let provider: String = row.get(2)?;
                let created_at: String = row.get(8)?;
                Ok(Assessment {
                    id: row.get(0)?,
                    chunk_id: row.get(1)?,
                    provider: provider
                        .parse::<ProviderKind>()
                        .unwrap_or(ProviderKind::Claude),
                    score: row.get::<_, i64>(3)? as u8,
                    rationale: row.get(4)?,
                    model: row.get(5)?,
                    tokens_used: row.get::<_, Option<i64>>(6)?.map(|t| t as u64),
                    latency_ms: row.get::<_, i64>(7)? as u64,
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|t| t.with_timezone(&chrono::Utc))
                        .unwrap_or_default(),
                })
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(rows)
    }

    // ==================== External sessions ====================

    /// Upserts a discovered session file.
    pub fn record_external_session(&self, session: &ScannedSession) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r"
            INSERT INTO external_sessions (file_path, platform, session_id, file_size, modified_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(file_path) DO UPDATE SET
                file_size = excluded.file_size,
                modified_at = excluded.modified_at
        ",
            params![
                session.file_path.to_string_lossy(),
                session.platform.as_str(),
                session.session_id,
                session.file_size as i64,
                session.modified_at.to_rfc3339(),
            ],
        )
        .map_err(StorageError::from)?;
        Ok(())
    }

    /// Stamps a session file as distilled.
    pub fn mark_session_distilled(&self, file_path: &Path) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE external_sessions SET last_distilled_at = ? WHERE file_path = ?",
            params![
                chrono::Utc::now().to_rfc3339(),
                file_path.to_string_lossy()
            ],
        )
        .map_err(StorageError::from)?;
        Ok(())
    }

    // ==================== FTS ====================

    /// Matches chunks against an FTS query string, best matches first.
    ///
    /// The query must already be an FTS expression (the question distiller
    /// OR-joins its tokens before calling).
    pub fn search_chunks(&self, fts_query: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        if fts_query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r"
            SELECT c.id, c.session_id, c.start_index, c.end_index, c.importance_avg,
                   c.token_estimate, c.consensus_score, c.events
            FROM chunk_fts f
            JOIN chunks c ON c.id = f.chunk_id
            WHERE chunk_fts MATCH ?
            ORDER BY bm25(chunk_fts)
            LIMIT ?
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![fts_query, limit as i64], row_to_stored_chunk)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|r| r.map_err(Into::into))
            .collect::<Result<Vec<_>>>()
    }

    // ==================== Sync queue ====================

    /// Appends a pending operation, returning its monotonic id.
    pub fn sync_queue_append(&self, operation: &str, payload: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO _sync_queue (operation, payload, created_at) VALUES (?, ?, ?)",
            params![operation, payload, Self::now()],
        )
        .map_err(StorageError::from)?;
        Ok(conn.last_insert_rowid())
    }

    /// Pending rows in retry order (ascending id).
    pub fn sync_queue_pending(&self) -> Result<Vec<SyncQueueEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r"
            SELECT id, operation, payload, created_at, synced_at
            FROM _sync_queue WHERE synced_at IS NULL ORDER BY id ASC
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SyncQueueEntry {
                    id: row.get(0)?,
                    operation: row.get(1)?,
                    payload: row.get(2)?,
                    created_at: row.get(3)?,
                    synced_at: row.get(4)?,
                })
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    /// Marks one row as synced.
    pub fn sync_queue_mark_synced(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE _sync_queue SET synced_at = ? WHERE id = ?",
            params![Self::now(), id],
        )
        .map_err(StorageError::from)?;
        Ok(())
    }

    /// Count of pending rows.
    pub fn sync_queue_size(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM _sync_queue WHERE synced_at IS NULL",
                [],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    // ==================== Stats ====================

    /// Aggregate table counts for status reporting.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(StorageError::from)?;
            Ok(n as usize)
        };

        let schema_version: u32 = conn
            .query_row(crate::storage::schema::GET_VERSION_SQL, [], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(StorageError::from)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(StoreStats {
            chunk_count: count("SELECT COUNT(*) FROM chunks")?,
            assessment_count: count("SELECT COUNT(*) FROM assessments")?,
            event_count: count("SELECT COUNT(*) FROM events")?,
            external_session_count: count("SELECT COUNT(*) FROM external_sessions")?,
            sync_queue_pending: count(
                "SELECT COUNT(*) FROM _sync_queue WHERE synced_at IS NULL",
            )?,
            schema_version,
        })
    }
}

type ChunkRowResult = std::result::Result<StoredChunk, StorageError>;

fn row_to_stored_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRowResult> {
    let events_json: String = row.get(7)?;
    let id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let start_index: i64 = row.get(2)?;
    let end_index: i64 = row.get(3)?;
    let importance_avg: f64 = row.get(4)?;
    let token_estimate: i64 = row.get(5)?;
    let consensus: Option<f64> = row.get(6)?;

    Ok(serde_json::from_str(&events_json)
        .map_err(StorageError::from)
        .map(|events| StoredChunk {
            chunk: Chunk {
                id,
                session_id,
                events,
                start_index: start_index as usize,
                end_index: end_index as usize,
                importance_avg,
                token_estimate: token_estimate as usize,
                source: None,
            },
            consensus,
        }))
}
