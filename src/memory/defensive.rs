//! Write-local-first wrapper over the memory service.
//!
//! The sync-queue row is the source of truth; the remote service is an
//! eventually consistent replica. Stores enqueue locally before any
//! network attempt, so an offline service can never lose work, and reads
//! degrade to empty rather than failing.

use std::sync::Arc;

use serde_json::Value;

use crate::core::{Chunk, ParsedEvent, Role, estimate_tokens};
use crate::error::Result;
use crate::memory::{MemoryService, ObservationBody};
use crate::storage::DistillStore;

/// Session id attached to synthetic memory chunks.
const MEMORY_SOURCE: &str = "claudemem";

/// Outcome of a [`DefensiveMemory::flush_sync_queue`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Rows synced this pass.
    pub synced: usize,
    /// Rows that failed and remain pending.
    pub failed: usize,
}

/// Defensive wrapper: local write-ahead queue plus chunk-shaped reads.
pub struct DefensiveMemory {
    store: Arc<DistillStore>,
    service: Arc<dyn MemoryService>,
    session_id: String,
    cwd: String,
}

impl DefensiveMemory {
    /// Builds the wrapper for one session context.
    #[must_use]
    pub fn new(
        store: Arc<DistillStore>,
        service: Arc<dyn MemoryService>,
        session_id: impl Into<String>,
        cwd: impl Into<String>,
    ) -> Self {
        Self {
            store,
            service,
            session_id: session_id.into(),
            cwd: cwd.into(),
        }
    }

    /// Stores an observation: queue locally, then best-effort sync.
    ///
    /// The local append happens first and is the only operation that can
    /// fail; a dead or erroring service leaves the row pending for
    /// [`Self::flush_sync_queue`] and is invisible to the caller.
    pub async fn store_observation(&self, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "text": text,
            "ts": chrono::Utc::now().to_rfc3339(),
        });
        let row_id = self
            .store
            .sync_queue_append("store_observation", &payload.to_string())?;

        match self.service.store_observation(&self.observation(text)).await {
            Ok(()) => self.store.sync_queue_mark_synced(row_id)?,
            Err(error) => {
                tracing::debug!(%error, row_id, "observation queued for later sync");
            }
        }
        Ok(())
    }

    /// Retries every pending row in id order, marking each individually.
    ///
    /// A failing row is left pending and the iteration continues; repeated
    /// retries of the same payload are safe because the payload carries
    /// its original timestamp.
    pub async fn flush_sync_queue(&self) -> FlushStats {
        let pending = self.store.sync_queue_pending().unwrap_or_default();
        let mut stats = FlushStats::default();

        for entry in pending {
            let text = serde_json::from_str::<Value>(&entry.payload)
                .ok()
                .and_then(|p| p.get("text").and_then(Value::as_str).map(ToString::to_string))
                .unwrap_or_else(|| entry.payload.clone());

            match self.service.store_observation(&self.observation(&text)).await {
                Ok(()) => {
                    if self.store.sync_queue_mark_synced(entry.id).is_ok() {
                        stats.synced += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
                Err(error) => {
                    tracing::debug!(%error, row_id = entry.id, "sync retry failed");
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    /// Searches the memory service, wrapping each result block as a
    /// synthetic chunk. Errors and service-side failures yield empty.
    pub async fn search_as_chunks(&self, query: &str, max: usize) -> Vec<Chunk> {
        let response = match self.service.search(query, max, None).await {
            Ok(response) if response.is_error != Some(true) => response,
            Ok(_) | Err(_) => return Vec::new(),
        };

        let total = response.content.len();
        response
            .content
            .into_iter()
            .take(max)
            .enumerate()
            .map(|(rank, block)| Self::synthetic_chunk(&block.text, rank, total))
            .collect()
    }

    /// Pending sync-queue rows (0 when the store itself is unreadable).
    #[must_use]
    pub fn sync_queue_size(&self) -> usize {
        self.store.sync_queue_size().unwrap_or(0)
    }

    fn observation(&self, text: &str) -> ObservationBody {
        ObservationBody {
            content_session_id: self.session_id.clone(),
            cwd: self.cwd.clone(),
            tool_name: "observation".to_string(),
            tool_input: serde_json::json!({}),
            tool_response: text.to_string(),
        }
    }

    /// Wraps one result block as a chunk: rank-derived similarity maps to
    /// `importance_avg`, rank becomes a monotonic `start_index`.
    #[allow(clippy::cast_precision_loss)]
    fn synthetic_chunk(text: &str, rank: usize, total: usize) -> Chunk {
        let similarity = 1.0 - (rank as f64) / (total.max(1) as f64);
        let mut event = ParsedEvent::new("memory", text);
        event.role = Some(Role::Assistant);

        let mut chunk = Chunk::from_events(MEMORY_SOURCE, vec![event], &[], rank, rank);
        chunk.source = Some(MEMORY_SOURCE.to_string());
        chunk.importance_avg = (similarity * 100.0).round();
        chunk.token_estimate = estimate_tokens(text);
        chunk
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeMemoryService;
    use super::*;

    fn wrapper(service: Arc<FakeMemoryService>) -> DefensiveMemory {
        let store = Arc::new(DistillStore::in_memory().unwrap());
        DefensiveMemory::new(store, service, "sess-1", "/work")
    }

    #[tokio::test]
    async fn test_store_online_syncs_immediately() {
        let service = Arc::new(FakeMemoryService::online_with_hits(&[]));
        let memory = wrapper(Arc::clone(&service));

        memory.store_observation("learned a thing").await.unwrap();

        assert_eq!(memory.sync_queue_size(), 0);
        assert_eq!(service.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_queues_then_flush_drains() {
        let service = Arc::new(FakeMemoryService::default());
        let memory = wrapper(Arc::clone(&service));

        for n in 0..4 {
            memory
                .store_observation(&format!("observation {n}"))
                .await
                .unwrap();
        }
        assert_eq!(memory.sync_queue_size(), 4);
        assert!(service.stored.lock().unwrap().is_empty());

        service.set_online(true);
        let stats = memory.flush_sync_queue().await;
        assert_eq!(stats, FlushStats { synced: 4, failed: 0 });
        assert_eq!(memory.sync_queue_size(), 0);

        // Nothing lost and order preserved
        let stored = service.stored.lock().unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0], "observation 0");
        assert_eq!(stored[3], "observation 3");
    }

    #[tokio::test]
    async fn test_flush_continues_past_failures() {
        let service = Arc::new(FakeMemoryService::default());
        let memory = wrapper(Arc::clone(&service));

        memory.store_observation("a").await.unwrap();
        memory.store_observation("b").await.unwrap();

        // Still offline: both rows fail but both are attempted
        let stats = memory.flush_sync_queue().await;
        assert_eq!(stats, FlushStats { synced: 0, failed: 2 });
        assert_eq!(memory.sync_queue_size(), 2);
    }

    #[tokio::test]
    async fn test_search_as_chunks_shapes() {
        let service = Arc::new(FakeMemoryService::online_with_hits(&[
            "first memory block",
            "second memory block",
        ]));
        let memory = wrapper(service);

        let chunks = memory.search_as_chunks("query", 20).await;
        assert_eq!(chunks.len(), 2);

        assert_eq!(chunks[0].source.as_deref(), Some("claudemem"));
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[1].start_index, 1);
        // similarity 1.0 → 100, 0.5 → 50
        assert!((chunks[0].importance_avg - 100.0).abs() < f64::EPSILON);
        assert!((chunks[1].importance_avg - 50.0).abs() < f64::EPSILON);
        assert_eq!(
            chunks[0].token_estimate,
            estimate_tokens("first memory block")
        );
    }

    #[tokio::test]
    async fn test_search_errors_yield_empty() {
        let service = Arc::new(FakeMemoryService::default());
        let memory = wrapper(service);
        assert!(memory.search_as_chunks("query", 5).await.is_empty());
    }
}
