//! Claude-native generators: full conversation replay and compact summary.
//!
//! The conversation generator fabricates a structurally valid Claude
//! session: a strict `uuid`/`parentUuid` chain, monotonically increasing
//! timestamps with realistic jitter, and full assistant message envelopes,
//! so `claude --resume` accepts the file as a real session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::core::{DistilledSession, Role, estimate_tokens};
use crate::distill::{synthesize_topics, topic_turns, SynthesizedTurn};
use crate::error::Result;
use crate::output::{GeneratorOptions, OutputGenerator, write_artifact};

/// Seconds added before a user turn (lower bound).
const USER_GAP_MIN: i64 = 30;
/// Seconds added before a user turn (upper bound).
const USER_GAP_MAX: i64 = 120;
/// Seconds added before an assistant turn (lower bound).
const ASSISTANT_GAP_MIN: i64 = 5;
/// Seconds added before an assistant turn (upper bound).
const ASSISTANT_GAP_MAX: i64 = 30;

/// Emits a replayable Claude conversation session (NDJSON).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeConversationGenerator;

impl OutputGenerator for ClaudeConversationGenerator {
    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn generate(
        &self,
        distilled: &DistilledSession,
        path: &Path,
        options: &GeneratorOptions,
    ) -> Result<PathBuf> {
        let turns = build_turns(distilled, options);

        let session_id = Uuid::new_v4().to_string();
        let mut rng = rand::rng();
        let mut timestamp: DateTime<Utc> = distilled.distilled_at;
        let mut parent_uuid: Option<String> = None;

        let mut lines = Vec::with_capacity(turns.len());
        for turn in &turns {
            let gap = match turn.role {
                Role::User => rng.random_range(USER_GAP_MIN..=USER_GAP_MAX),
                _ => rng.random_range(ASSISTANT_GAP_MIN..=ASSISTANT_GAP_MAX),
            };
            timestamp += Duration::seconds(gap);

            let uuid = Uuid::new_v4().to_string();
            let record = make_record(
                turn,
                &uuid,
                parent_uuid.as_deref(),
                &session_id,
                timestamp,
                options,
            );
            lines.push(serde_json::to_string(&record)?);
            parent_uuid = Some(uuid);
        }

        write_artifact(path, &(lines.join("\n") + "\n"))?;
        Ok(path.to_path_buf())
    }
}

/// Preamble pair plus one Q&A pair per topic (or per chunk when synthesis
/// is bypassed).
fn build_turns(distilled: &DistilledSession, options: &GeneratorOptions) -> Vec<SynthesizedTurn> {
    let mut turns = vec![
        SynthesizedTurn {
            role: Role::User,
            content: "Restore the distilled context for this project from previous sessions."
                .to_string(),
        },
        SynthesizedTurn {
            role: Role::Assistant,
            content: format!(
                "Restored context distilled from {} session(s) across {} platform(s): \
                 {} chunk(s), ~{} tokens, built {}.",
                distilled.source_session_ids.len(),
                distilled.source_platforms.len().max(1),
                distilled.chunks.len(),
                distilled.total_tokens,
                distilled.distilled_at.format("%Y-%m-%d %H:%M UTC"),
            ),
        },
    ];

    if options.synthesize {
        turns.extend(topic_turns(&synthesize_topics(&distilled.chunks)));
    } else {
        for chunk in &distilled.chunks {
            turns.push(SynthesizedTurn {
                role: Role::User,
                content: format!(
                    "What happened in session {} around events {}-{}?",
                    chunk.session_id, chunk.start_index, chunk.end_index
                ),
            });
            turns.push(SynthesizedTurn {
                role: Role::Assistant,
                content: chunk.combined_content(),
            });
        }
    }
    turns
}

fn make_record(
    turn: &SynthesizedTurn,
    uuid: &str,
    parent_uuid: Option<&str>,
    session_id: &str,
    timestamp: DateTime<Utc>,
    options: &GeneratorOptions,
) -> Value {
    let (record_type, message) = if turn.role == Role::User {
        (
            "user",
            json!({
                "role": "user",
                "content": turn.content,
            }),
        )
    } else {
        (
            "assistant",
            json!({
                "model": options.model,
                "id": format!("msg_{}", Uuid::new_v4().simple()),
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": turn.content}],
                "stop_reason": "end_turn",
                "stop_sequence": null,
                "usage": {
                    "input_tokens": 0,
                    "output_tokens": estimate_tokens(&turn.content),
                    "service_tier": "standard",
                },
            }),
        )
    };

    json!({
        "uuid": uuid,
        "parentUuid": parent_uuid,
        "sessionId": session_id,
        "cwd": options.cwd,
        "timestamp": timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "version": options.version,
        "gitBranch": options.git_branch,
        "isSidechain": false,
        "userType": "external",
        "type": record_type,
        "message": message,
    })
}

/// Emits the compact summary form: a boundary header plus one
/// `<system-reminder>`-wrapped assistant record per chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeSummaryGenerator;

impl OutputGenerator for ClaudeSummaryGenerator {
    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn generate(
        &self,
        distilled: &DistilledSession,
        path: &Path,
        _options: &GeneratorOptions,
    ) -> Result<PathBuf> {
        let mut lines = Vec::with_capacity(distilled.chunks.len() + 1);

        let header = json!({
            "type": "system",
            "subtype": "compact_boundary",
            "isSidechain": true,
            "compactBoundary": true,
            "sourceSessionIds": distilled.source_session_ids,
            "sourcePlatforms": distilled.source_platforms,
            "totalTokens": distilled.total_tokens,
            "chunkCount": distilled.chunks.len(),
            "distilledAt": distilled.distilled_at.to_rfc3339(),
        });
        lines.push(serde_json::to_string(&header)?);

        for chunk in &distilled.chunks {
            let record = json!({
                "type": "assistant",
                "isSidechain": true,
                "message": {
                    "role": "assistant",
                    "content": [{
                        "type": "text",
                        "text": format!(
                            "<system-reminder>\n{}\n</system-reminder>",
                            chunk.combined_content()
                        ),
                    }],
                },
                "metadata": {
                    "chunkId": chunk.id,
                    "sessionId": chunk.session_id,
                    "startIndex": chunk.start_index,
                    "endIndex": chunk.end_index,
                    "importanceAvg": chunk.importance_avg,
                    "tokenEstimate": chunk.token_estimate,
                },
            });
            lines.push(serde_json::to_string(&record)?);
        }

        write_artifact(path, &(lines.join("\n") + "\n"))?;
        Ok(path.to_path_buf())
    }
}
