//! Topic synthesis: classification, dedup, and narrative turn generation.
//!
//! Selected chunks are sorted into a fixed topic set by keyword hits,
//! near-duplicates within a topic collapse (later timestamp wins), and
//! the result renders as alternating user/assistant turns ready for the
//! output generators.

use std::collections::HashSet;

use crate::core::{Chunk, Role};

/// Jaccard similarity at or above which two chunks count as duplicates.
const DEDUP_THRESHOLD: f64 = 0.6;

/// The fixed topic set, in narrative emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// What the project is.
    Overview,
    /// How it is put together.
    Architecture,
    /// Where things live on disk.
    FileStructure,
    /// Conventions and idioms in use.
    Patterns,
    /// Third-party crates and services.
    Dependencies,
    /// How it ships.
    Deployment,
    /// Choices made and their alternatives.
    Decisions,
    /// What changed lately.
    RecentChanges,
    /// What is known to be broken.
    KnownIssues,
}

impl Topic {
    /// Topics in narrative order.
    pub const ORDER: [Self; 9] = [
        Self::Overview,
        Self::Architecture,
        Self::FileStructure,
        Self::Patterns,
        Self::Dependencies,
        Self::Deployment,
        Self::Decisions,
        Self::RecentChanges,
        Self::KnownIssues,
    ];

    /// Stable label used in output metadata.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Architecture => "architecture",
            Self::FileStructure => "file-structure",
            Self::Patterns => "patterns",
            Self::Dependencies => "dependencies",
            Self::Deployment => "deployment",
            Self::Decisions => "decisions",
            Self::RecentChanges => "recent-changes",
            Self::KnownIssues => "known-issues",
        }
    }

    /// Classification keywords.
    const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Overview => &["project", "overview", "goal", "purpose", "readme"],
            Self::Architecture => &[
                "architecture",
                "design",
                "component",
                "module",
                "layer",
                "pipeline",
                "service",
            ],
            Self::FileStructure => &["file", "directory", "folder", "path", "tree", "src"],
            Self::Patterns => &["pattern", "convention", "idiom", "style", "approach"],
            Self::Dependencies => &[
                "dependency",
                "dependencies",
                "crate",
                "package",
                "library",
                "version",
            ],
            Self::Deployment => &[
                "deploy",
                "deployment",
                "docker",
                "kubernetes",
                "release",
                "pipeline",
                "build",
            ],
            Self::Decisions => &["decided", "decision", "chose", "tradeoff", "instead"],
            Self::RecentChanges => &[
                "changed",
                "updated",
                "added",
                "removed",
                "refactored",
                "fixed",
                "migrated",
            ],
            Self::KnownIssues => &[
                "bug",
                "issue",
                "broken",
                "fails",
                "failing",
                "error",
                "workaround",
                "flaky",
            ],
        }
    }

    /// The templated question that opens this topic's Q&A pair.
    #[must_use]
    pub fn question(self) -> String {
        let subject = match self {
            Self::Overview => "this project overall",
            Self::Architecture => "the architecture of this project",
            Self::FileStructure => "the file and directory layout",
            Self::Patterns => "the coding patterns and conventions used here",
            Self::Dependencies => "the dependencies this project relies on",
            Self::Deployment => "how this project is built and deployed",
            Self::Decisions => "the design decisions made in this project",
            Self::RecentChanges => "recent changes to this project",
            Self::KnownIssues => "known issues and open problems",
        };
        format!("What do you know about {subject}?")
    }
}

/// Chunks grouped under one topic, post-dedup.
#[derive(Debug, Clone)]
pub struct TopicSection {
    /// The topic.
    pub topic: Topic,
    /// Surviving chunks, in input order.
    pub chunks: Vec<Chunk>,
}

/// One synthesized conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedTurn {
    /// User or assistant.
    pub role: Role,
    /// Turn text.
    pub content: String,
}

/// Classifies, dedupes, and orders chunks into topic sections.
///
/// Each chunk lands on its highest-scoring topic (ties go to the earlier
/// topic in narrative order, no hits mean overview). Within a topic,
/// pairs at or above the Jaccard threshold collapse to the chunk with
/// the later timestamp, so contradicting restatements resolve forward.
/// Empty topics are omitted.
#[must_use]
pub fn synthesize_topics(chunks: &[Chunk]) -> Vec<TopicSection> {
    let mut buckets: Vec<Vec<Chunk>> = vec![Vec::new(); Topic::ORDER.len()];
    for chunk in chunks {
        let slot = classify(chunk);
        buckets[slot].push(chunk.clone());
    }

    Topic::ORDER
        .iter()
        .zip(buckets)
        .filter_map(|(&topic, bucket)| {
            let deduped = dedup_bucket(bucket);
            if deduped.is_empty() {
                None
            } else {
                Some(TopicSection {
                    topic,
                    chunks: deduped,
                })
            }
        })
        .collect()
}

/// Renders sections as alternating user/assistant turns.
#[must_use]
pub fn topic_turns(sections: &[TopicSection]) -> Vec<SynthesizedTurn> {
    let mut turns = Vec::with_capacity(sections.len() * 2);
    for section in sections {
        turns.push(SynthesizedTurn {
            role: Role::User,
            content: section.topic.question(),
        });
        let answer = section
            .chunks
            .iter()
            .map(Chunk::combined_content)
            .collect::<Vec<_>>()
            .join("\n\n");
        turns.push(SynthesizedTurn {
            role: Role::Assistant,
            content: answer,
        });
    }
    turns
}

fn classify(chunk: &Chunk) -> usize {
    let content = chunk.combined_content().to_lowercase();
    let mut best = 0usize;
    let mut best_hits = 0usize;
    for (slot, topic) in Topic::ORDER.iter().enumerate() {
        let hits: usize = topic
            .keywords()
            .iter()
            .map(|keyword| content.matches(keyword).count())
            .sum();
        if hits > best_hits {
            best_hits = hits;
            best = slot;
        }
    }
    best
}

fn dedup_bucket(bucket: Vec<Chunk>) -> Vec<Chunk> {
    let mut kept: Vec<(Chunk, HashSet<String>)> = Vec::new();

    'outer: for chunk in bucket {
        let tokens = token_set(&chunk.combined_content());
        for (existing, existing_tokens) in &mut kept {
            if jaccard(&tokens, existing_tokens) >= DEDUP_THRESHOLD {
                if is_later(&chunk, existing) {
                    *existing = chunk;
                    *existing_tokens = tokens;
                }
                continue 'outer;
            }
        }
        kept.push((chunk, tokens));
    }

    kept.into_iter().map(|(chunk, _)| chunk).collect()
}

fn token_set(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Later timestamp wins; an untimestamped challenger never displaces a
/// timestamped incumbent.
fn is_later(challenger: &Chunk, incumbent: &Chunk) -> bool {
    match (challenger.last_timestamp(), incumbent.last_timestamp()) {
        (Some(c), Some(i)) => c > i,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParsedEvent;

    fn chunk_with(content: &str, timestamp: Option<&str>) -> Chunk {
        let mut event = ParsedEvent::new("assistant", content);
        event.timestamp = timestamp.map(ToString::to_string);
        Chunk::from_events("sess", vec![event], &[50], 0, 0)
    }

    #[test]
    fn test_classification_by_keywords() {
        let sections = synthesize_topics(&[
            chunk_with("we chose sqlite instead of postgres, a deliberate tradeoff", None),
            chunk_with("there is a flaky bug where the watcher fails on startup", None),
            chunk_with("the crate depends on tokio and serde, pinned by version", None),
        ]);

        let topics: Vec<&str> = sections.iter().map(|s| s.topic.label()).collect();
        // Narrative order, not input order
        assert_eq!(topics, vec!["dependencies", "decisions", "known-issues"]);
    }

    #[test]
    fn test_no_hits_lands_on_overview() {
        let sections = synthesize_topics(&[chunk_with("miscellaneous chatter", None)]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].topic, Topic::Overview);
    }

    #[test]
    fn test_dedup_later_timestamp_wins() {
        let early = chunk_with(
            "the deploy pipeline uses docker and a release build stage",
            Some("2026-01-01T00:00:00Z"),
        );
        let late = chunk_with(
            "the deploy pipeline uses docker and a release build target",
            Some("2026-02-01T00:00:00Z"),
        );

        let sections = synthesize_topics(&[early, late]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].chunks.len(), 1);
        assert!(sections[0].chunks[0]
            .combined_content()
            .contains("release build target"));
    }

    #[test]
    fn test_distinct_chunks_within_topic_both_kept() {
        let a = chunk_with("the deploy step builds a docker image for staging", None);
        let b = chunk_with(
            "kubernetes manifests control the production deployment rollout and replica counts",
            None,
        );
        let sections = synthesize_topics(&[a, b]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].chunks.len(), 2);
    }

    #[test]
    fn test_turns_alternate_and_template() {
        let sections = synthesize_topics(&[
            chunk_with("we decided to keep the tradeoff simple", None),
            chunk_with("a bug makes the error path flaky", None),
        ]);
        let turns = topic_turns(&sections);

        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, Role::User);
        assert!(turns[0].content.starts_with("What do you know about"));
        assert_eq!(turns[1].role, Role::Assistant);
        assert!(turns[1].content.contains("tradeoff"));
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[3].role, Role::Assistant);
    }

    #[test]
    fn test_empty_input() {
        assert!(synthesize_topics(&[]).is_empty());
        assert!(topic_turns(&[]).is_empty());
    }

    #[test]
    fn test_jaccard_threshold() {
        let a = token_set("alpha beta gamma delta epsilon");
        let b = token_set("alpha beta gamma delta zeta");
        // 4 shared of 6 union ≈ 0.67
        assert!(jaccard(&a, &b) >= DEDUP_THRESHOLD);

        let c = token_set("entirely different words here");
        assert!(jaccard(&a, &c) < DEDUP_THRESHOLD);
    }
}
