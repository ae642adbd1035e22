//! Canonical event model shared by every pipeline stage.
//!
//! Every platform parser normalizes its session records into
//! [`ParsedEvent`]; the persistence path extends events into
//! [`CanonicalEvent`] with scoring and chunk linkage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Coding-assistant platform identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Claude Code sessions (`~/.claude/projects`).
    Claude,
    /// Codex CLI sessions (`~/.codex/sessions`).
    Codex,
    /// Gemini CLI sessions (`~/.gemini/sessions`).
    Gemini,
    /// The orchestrator's own journal (`~/.unified-agent/sessions`).
    Unified,
}

impl Platform {
    /// Returns the lowercase platform label used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Unified => "unified",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "codex" => Ok(Self::Codex),
            "gemini" => Ok(Self::Gemini),
            "unified" => Ok(Self::Unified),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Conversation role of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human prompt.
    User,
    /// Assistant response.
    Assistant,
    /// Platform system record.
    System,
    /// Tool invocation or result.
    Tool,
}

/// A single tool invocation carried on an assistant event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name as reported by the platform.
    pub name: String,
    /// Tool input payload, if captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Tool output, if captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Platform-agnostic session event emitted by the parsers.
///
/// Immutable once emitted; heterogeneous platform fields that have no
/// canonical slot travel in `metadata`, and structurally unknown records
/// keep their raw JSON in `raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    /// Platform record type (e.g. `assistant`, `tool_result`, `item.completed`).
    #[serde(rename = "type")]
    pub event_type: String,

    /// Conversation role, when the record has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Primary textual content.
    #[serde(default)]
    pub content: String,

    /// Platform timestamp, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Tool name, for tool-use events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Tool input payload, for tool-use events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,

    /// Tool output, for tool-result events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,

    /// Whether a tool result reported an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,

    /// Uncategorized platform fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,

    /// Raw record for unknown types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ParsedEvent {
    /// Creates an event with just a type and content.
    #[must_use]
    pub fn new(event_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// True when the event carries a tool invocation or its input.
    #[must_use]
    pub const fn has_tool_use(&self) -> bool {
        self.tool_name.is_some() || self.tool_input.is_some()
    }
}

/// Runtime persistence record: a [`ParsedEvent`] plus pipeline annotations.
///
/// Only the decorating stages write the extra fields; the embedded event
/// payload is never modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    /// The original parsed event payload.
    #[serde(flatten)]
    pub event: ParsedEvent,

    /// Importance score assigned on the persistence path (0-100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance_score: Option<u8>,

    /// Chunk this event was grouped into, once chunked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,

    /// Consensus score propagated from the chunk's assessments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_score: Option<f64>,

    /// Session the event was parsed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_session_id: Option<String>,

    /// Platform the event was parsed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_platform: Option<Platform>,

    /// Tool invocations embedded in an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

impl CanonicalEvent {
    /// Wraps a parsed event with no annotations.
    #[must_use]
    pub fn from_parsed(event: ParsedEvent) -> Self {
        Self {
            event,
            ..Self::default()
        }
    }
}

impl From<ParsedEvent> for CanonicalEvent {
    fn from(event: ParsedEvent) -> Self {
        Self::from_parsed(event)
    }
}
