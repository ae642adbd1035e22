//! Local persistence: tables, FTS index, and the sync queue.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DistillStore, StoreStats, StoredChunk, SyncQueueEntry};

use std::sync::Arc;

use crate::core::CanonicalEvent;
use crate::error::Result;
use crate::scoring::EventRecorder;

/// [`EventRecorder`] that mirrors journal writes into the database.
///
/// Used alongside the NDJSON journal so queries over `events` see the
/// same stream the on-disk session file does.
pub struct StoreRecorder {
    store: Arc<DistillStore>,
    session_id: String,
}

impl StoreRecorder {
    /// Binds a recorder to one session's journal rows.
    #[must_use]
    pub fn new(store: Arc<DistillStore>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
        }
    }
}

impl EventRecorder for StoreRecorder {
    fn record(&mut self, event: CanonicalEvent) -> Result<()> {
        self.store.insert_event(&self.session_id, &event)?;
        Ok(())
    }
}
