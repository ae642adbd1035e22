//! Distillation: selecting assessed chunks into replayable context.

pub mod budget;
pub mod question;
pub mod synthesis;

pub use budget::{DistillerConfig, SortMode, distill};
pub use question::{QuestionConfig, QuestionDistiller};
pub use synthesis::{SynthesizedTurn, Topic, TopicSection, synthesize_topics, topic_turns};

use crate::core::Chunk;

/// A chunk paired with its consensus score, the distiller's input unit.
///
/// Entries keep their insertion order; ranking ties are broken by it.
#[derive(Debug, Clone)]
pub struct ChunkEntry {
    /// The chunk payload.
    pub chunk: Chunk,
    /// Aggregated consensus score in `[0, 10]`.
    pub consensus: f64,
}

impl ChunkEntry {
    /// Pairs a chunk with its consensus.
    #[must_use]
    pub const fn new(chunk: Chunk, consensus: f64) -> Self {
        Self { chunk, consensus }
    }
}
