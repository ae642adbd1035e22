//! Codex CLI session parser.
//!
//! Codex rollout files are NDJSON streams of `item.completed` records
//! (messages, reasoning, command executions, function calls) punctuated by
//! `turn.completed` records carrying model and token usage.

use std::io::BufRead;
use std::path::Path;

use serde_json::Value;

use crate::core::{ParsedEvent, Platform, Role};
use crate::parser::{NdjsonEvents, SessionParser, unknown_event, value_to_text};

/// Parser for Codex rollout journals.
pub struct CodexParser;

impl SessionParser for CodexParser {
    fn platform(&self) -> Platform {
        Platform::Codex
    }

    fn detect(&self, path: &Path) -> bool {
        let s = path.to_string_lossy();
        s.contains("/.codex/") && s.ends_with(".jsonl")
    }

    fn sniff(&self, prefix: &str) -> bool {
        serde_json::from_str::<Value>(prefix).is_ok_and(|value| {
            matches!(
                value.get("type").and_then(Value::as_str),
                Some("item.completed" | "turn.completed")
            )
        })
    }

    fn parse_reader<'a>(
        &self,
        reader: Box<dyn BufRead + 'a>,
    ) -> Box<dyn Iterator<Item = ParsedEvent> + 'a> {
        Box::new(NdjsonEvents::new(reader, map_record))
    }
}

fn map_record(value: &Value) -> Vec<ParsedEvent> {
    let event = match value.get("type").and_then(Value::as_str) {
        Some("item.completed") => map_item(value),
        Some("turn.completed") => Some(map_turn(value)),
        _ => Some(unknown_event(value)),
    };
    event.into_iter().collect()
}

fn map_item(value: &Value) -> Option<ParsedEvent> {
    let item = value.get("item")?;
    let item_type = item
        .get("type")
        .or_else(|| item.get("item_type"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let role = item.get("role").and_then(Value::as_str);

    let event = match (item_type, role) {
        ("command_execution" | "function_call", _) => map_tool_use(value, item, item_type),
        ("reasoning", _) | (_, Some("assistant")) => {
            let mut event = ParsedEvent::new("assistant", item_text(item));
            event.role = Some(Role::Assistant);
            event.timestamp = timestamp_of(value);
            event
        }
        (_, Some("user")) => {
            let mut event = ParsedEvent::new("user", item_text(item));
            event.role = Some(Role::User);
            event.timestamp = timestamp_of(value);
            event
        }
        _ => unknown_event(value),
    };

    Some(event)
}

fn map_tool_use(value: &Value, item: &Value, item_type: &str) -> ParsedEvent {
    let tool_name = item
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(item_type)
        .to_string();
    let arguments = item
        .get("arguments")
        .or_else(|| item.get("command"))
        .cloned();
    let output = item
        .get("aggregated_output")
        .or_else(|| item.get("output"))
        .or_else(|| item.get("content"))
        .map(value_to_text)
        .unwrap_or_default();
    let failed = item.get("status").and_then(Value::as_str) == Some("failed");

    let mut event = ParsedEvent::new("tool_use", output.clone());
    event.role = Some(Role::Tool);
    event.timestamp = timestamp_of(value);
    event.tool_name = Some(tool_name);
    event.tool_input = arguments;
    event.tool_output = Some(output);
    event.is_error = Some(failed);
    event
}

/// Turn boundary: emitted as a `usage` event with model and token counts
/// in metadata so cost accounting survives normalization.
fn map_turn(value: &Value) -> ParsedEvent {
    let mut event = ParsedEvent::new("usage", String::new());
    event.timestamp = timestamp_of(value);
    if let Some(model) = value.get("model").and_then(Value::as_str) {
        event
            .metadata
            .insert("model".to_string(), Value::String(model.to_string()));
    }
    if let Some(usage) = value.get("usage") {
        event.metadata.insert("usage".to_string(), usage.clone());
    }
    event
}

fn item_text(item: &Value) -> String {
    item.get("text")
        .or_else(|| item.get("content"))
        .map(value_to_text)
        .unwrap_or_default()
}

fn timestamp_of(value: &Value) -> Option<String> {
    value
        .get("timestamp")
        .or_else(|| value.get("ts"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
