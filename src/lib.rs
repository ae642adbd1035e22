//! # unified-distill
//!
//! Conversation distillation pipeline for the unified coding-assistant
//! orchestrator. Sessions from Claude, Codex, and Gemini are parsed into
//! a canonical event model, importance-scored, grouped into chunks,
//! rated by a multi-provider consensus of assistant CLIs, and distilled
//! into context-windowed session files that replay into a fresh session.
//!
//! ## Pipeline
//!
//! - **Parsing**: streaming per-platform parsers behind a registry
//! - **Scoring**: synchronous importance scoring on the persistence path
//! - **Chunking**: token-budgeted windows with overlap
//! - **Assessment**: parallel provider subprocess fan-out with consensus
//! - **Distillation**: hybrid-ranked budget selection, plus a
//!   question-driven path over FTS and the external memory store
//! - **Output**: replayable native session files per target assistant

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod assess;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod distill;
pub mod error;
pub mod io;
pub mod memory;
pub mod output;
pub mod parser;
pub mod scoring;
pub mod session;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    CanonicalEvent, Chunk, DistilledSession, ParsedEvent, Platform, QueryDistillResult, Role,
    ScannedSession, estimate_tokens,
};

// Re-export pipeline entry points
pub use assess::{AssessConfig, Assessor, AssessmentQueue, ProviderKind, compute_consensus};
pub use chunking::{ChunkerConfig, EventChunker, ScoredEvent};
pub use config::DistillConfig;
pub use distill::{DistillerConfig, QuestionDistiller, SortMode, distill};
pub use memory::{DefensiveMemory, HttpMemoryClient, MemoryService};
pub use parser::{ParserRegistry, SessionParser, parse_session_file};
pub use scoring::{EventRecorder, JsonlRecorder, ScoringRecorder, score_event};
pub use session::{ScanFilter, SessionScanner, SessionWatcher};
pub use storage::DistillStore;
