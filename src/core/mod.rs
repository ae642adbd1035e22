//! Core domain types: events, chunks, and session-level results.

pub mod chunk;
pub mod event;
pub mod session;

pub use chunk::{Chunk, estimate_tokens};
pub use event::{CanonicalEvent, ParsedEvent, Platform, Role, ToolCallRecord};
pub use session::{
    DistilledSession, DroppedChunks, QueryDistillResult, ScannedSession, SearchStats,
};
