//! Gemini CLI session parser.
//!
//! Gemini stores sessions either as a single JSON array of content records
//! (`{role, parts:[...]}`) or as newline-delimited typed records. Both
//! shapes are accepted; the array form is parsed whole-document.

use std::io::BufRead;
use std::path::Path;

use serde_json::Value;

use crate::core::{ParsedEvent, Platform, Role};
use crate::parser::{NdjsonEvents, SessionParser, unknown_event, value_to_text};

/// Parser for Gemini CLI session files.
pub struct GeminiParser;

impl SessionParser for GeminiParser {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    fn detect(&self, path: &Path) -> bool {
        let s = path.to_string_lossy();
        s.contains("/.gemini/") && (s.ends_with(".json") || s.ends_with(".jsonl"))
    }

    fn sniff(&self, prefix: &str) -> bool {
        if prefix.starts_with('[') {
            return true;
        }
        let Ok(value) = serde_json::from_str::<Value>(prefix) else {
            return false;
        };
        if matches!(
            value.get("type").and_then(Value::as_str),
            Some("message" | "tool_call" | "tool_use" | "tool_result")
        ) {
            return true;
        }
        has_parts(&value)
    }

    fn parse_reader<'a>(
        &self,
        mut reader: Box<dyn BufRead + 'a>,
    ) -> Box<dyn Iterator<Item = ParsedEvent> + 'a> {
        let starts_array = reader.fill_buf().is_ok_and(|buf| {
            buf.iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|&b| b == b'[')
        });

        if starts_array {
            let mut document = String::new();
            let events: Vec<ParsedEvent> = match reader.read_to_string(&mut document) {
                Ok(_) => serde_json::from_str::<Value>(&document)
                    .ok()
                    .and_then(|v| v.as_array().cloned())
                    .map(|records| records.iter().flat_map(map_record).collect())
                    .unwrap_or_default(),
                Err(_) => Vec::new(),
            };
            Box::new(events.into_iter())
        } else {
            Box::new(NdjsonEvents::new(reader, map_record))
        }
    }
}

fn has_parts(value: &Value) -> bool {
    value.get("parts").is_some_and(Value::is_array)
        || value
            .get("content")
            .and_then(|c| c.get("parts"))
            .is_some_and(Value::is_array)
}

fn map_record(value: &Value) -> Vec<ParsedEvent> {
    // Typed records are a secondary shape used by some exporters.
    match value.get("type").and_then(Value::as_str) {
        Some("message") => return map_typed_message(value).into_iter().collect(),
        Some("tool_call" | "tool_use") => return vec![map_typed_tool_call(value)],
        Some("tool_result") => return vec![map_typed_tool_result(value)],
        Some(_) => return vec![unknown_event(value)],
        None => {}
    }

    if has_parts(value) {
        return map_content_record(value);
    }
    vec![unknown_event(value)]
}

/// Native content record: text parts coalesce into one message event,
/// function calls and responses each get their own event.
fn map_content_record(value: &Value) -> Vec<ParsedEvent> {
    let role = map_role(value.get("role").and_then(Value::as_str));
    let parts = value
        .get("parts")
        .or_else(|| value.get("content").and_then(|c| c.get("parts")))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let timestamp = timestamp_of(value);

    let mut events = Vec::new();
    let mut texts: Vec<&str> = Vec::new();

    for part in &parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            texts.push(text);
        } else if let Some(call) = part.get("functionCall") {
            let mut event = ParsedEvent::new("tool_call", String::new());
            event.role = Some(Role::Tool);
            event.timestamp = timestamp.clone();
            event.tool_name = call
                .get("name")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            event.tool_input = call.get("args").cloned();
            events.push(event);
        } else if let Some(response) = part.get("functionResponse") {
            let output = response
                .get("response")
                .map(value_to_text)
                .unwrap_or_default();
            let mut event = ParsedEvent::new("tool_result", output.clone());
            event.role = Some(Role::Tool);
            event.timestamp = timestamp.clone();
            event.tool_name = response
                .get("name")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            event.tool_output = Some(output);
            events.push(event);
        }
    }

    if !texts.is_empty() {
        let event_type = match role {
            Some(Role::Assistant) => "assistant",
            Some(Role::System) => "system",
            _ => "user",
        };
        let mut event = ParsedEvent::new(event_type, texts.join("\n"));
        event.role = role;
        event.timestamp = timestamp;
        // Message text precedes the tool traffic it triggered
        events.insert(0, event);
    }

    events
}

fn map_typed_message(value: &Value) -> Option<ParsedEvent> {
    let role = map_role(value.get("role").and_then(Value::as_str));
    let content = value.get("content").map(value_to_text).unwrap_or_default();
    let event_type = if role == Some(Role::Assistant) {
        "assistant"
    } else {
        "user"
    };
    let mut event = ParsedEvent::new(event_type, content);
    event.role = role;
    event.timestamp = timestamp_of(value);
    Some(event)
}

fn map_typed_tool_call(value: &Value) -> ParsedEvent {
    let mut event = ParsedEvent::new("tool_call", String::new());
    event.role = Some(Role::Tool);
    event.timestamp = timestamp_of(value);
    event.tool_name = value
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    event.tool_input = value.get("input").or_else(|| value.get("args")).cloned();
    event
}

fn map_typed_tool_result(value: &Value) -> ParsedEvent {
    let output = value
        .get("output")
        .or_else(|| value.get("content"))
        .map(value_to_text)
        .unwrap_or_default();
    let mut event = ParsedEvent::new("tool_result", output.clone());
    event.role = Some(Role::Tool);
    event.timestamp = timestamp_of(value);
    event.tool_output = Some(output);
    event.is_error = value.get("isError").and_then(Value::as_bool);
    event
}

/// `model` is Gemini's name for the assistant role.
fn map_role(role: Option<&str>) -> Option<Role> {
    match role {
        Some("model" | "assistant") => Some(Role::Assistant),
        Some("user") => Some(Role::User),
        Some("system") => Some(Role::System),
        Some("tool") => Some(Role::Tool),
        _ => None,
    }
}

fn timestamp_of(value: &Value) -> Option<String> {
    value
        .get("timestamp")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
