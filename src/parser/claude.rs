//! Claude Code session parser.
//!
//! Claude sessions are NDJSON files under `~/.claude/projects/<project>/`.
//! Records wrap an Anthropic `message` object; assistant content is an
//! array of `text` / `tool_use` blocks, and tool results arrive as `user`
//! records carrying a `tool_result` block.

use std::io::BufRead;
use std::path::Path;

use serde_json::Value;

use crate::core::{ParsedEvent, Platform, Role};
use crate::parser::{NdjsonEvents, SessionParser, unknown_event, value_to_text};

/// Parser for Claude Code session journals.
pub struct ClaudeParser;

impl SessionParser for ClaudeParser {
    fn platform(&self) -> Platform {
        Platform::Claude
    }

    fn detect(&self, path: &Path) -> bool {
        let s = path.to_string_lossy();
        s.contains("/.claude/") && s.ends_with(".jsonl")
    }

    fn sniff(&self, prefix: &str) -> bool {
        let Ok(value) = serde_json::from_str::<Value>(prefix) else {
            return false;
        };
        let Some(record_type) = value.get("type").and_then(Value::as_str) else {
            return false;
        };
        match record_type {
            "assistant" | "user" => value.get("message").is_some(),
            "system" | "summary" => true,
            _ => false,
        }
    }

    fn parse_reader<'a>(
        &self,
        reader: Box<dyn BufRead + 'a>,
    ) -> Box<dyn Iterator<Item = ParsedEvent> + 'a> {
        Box::new(NdjsonEvents::new(reader, map_record))
    }
}

fn map_record(value: &Value) -> Vec<ParsedEvent> {
    let Some(record_type) = value.get("type").and_then(Value::as_str) else {
        return vec![unknown_event(value)];
    };

    let event = match record_type {
        "assistant" => map_assistant(value),
        "user" => map_user(value),
        "system" => Some(map_system(value)),
        "summary" => Some(map_summary(value)),
        _ => Some(unknown_event(value)),
    };

    event.into_iter().collect()
}

/// Assistant record: one event concatenating the text blocks; embedded
/// `tool_use` blocks populate the tool fields and `metadata.toolCalls`.
fn map_assistant(value: &Value) -> Option<ParsedEvent> {
    let message = value.get("message")?;
    let blocks = message.get("content").and_then(Value::as_array);

    let mut texts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();
    if let Some(blocks) = blocks {
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        texts.push(text);
                    }
                }
                Some("tool_use") => {
                    let name = block
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    tool_calls.push(serde_json::json!({
                        "name": name,
                        "input": block.get("input").cloned().unwrap_or(Value::Null),
                    }));
                }
                _ => {}
            }
        }
    }

    let mut event = ParsedEvent::new("assistant", texts.join("\n"));
    event.role = Some(Role::Assistant);
    event.timestamp = timestamp_of(value);

    if let Some(first) = tool_calls.first() {
        event.tool_name = first
            .get("name")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        event.tool_input = first.get("input").cloned();
    }
    if !tool_calls.is_empty() {
        event
            .metadata
            .insert("toolCalls".to_string(), Value::Array(tool_calls));
    }
    if let Some(model) = message.get("model").and_then(Value::as_str) {
        event
            .metadata
            .insert("model".to_string(), Value::String(model.to_string()));
    }

    Some(event)
}

/// User record: either a plain prompt or a wrapped `tool_result` block.
fn map_user(value: &Value) -> Option<ParsedEvent> {
    let message = value.get("message")?;
    let content = message.get("content")?;

    if let Some(blocks) = content.as_array()
        && let Some(result) = blocks
            .iter()
            .find(|b| b.get("type").and_then(Value::as_str) == Some("tool_result"))
    {
        let output = result.get("content").map(value_to_text).unwrap_or_default();
        let mut event = ParsedEvent::new("tool_result", output.clone());
        event.role = Some(Role::Tool);
        event.timestamp = timestamp_of(value);
        event.tool_output = Some(output);
        event.is_error = Some(
            result
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        );
        if let Some(id) = result.get("tool_use_id").and_then(Value::as_str) {
            event
                .metadata
                .insert("toolUseId".to_string(), Value::String(id.to_string()));
        }
        return Some(event);
    }

    let mut event = ParsedEvent::new("user", value_to_text(content));
    event.role = Some(Role::User);
    event.timestamp = timestamp_of(value);
    Some(event)
}

fn map_system(value: &Value) -> ParsedEvent {
    let content = value
        .get("content")
        .map(value_to_text)
        .unwrap_or_else(|| value.to_string());
    let mut event = ParsedEvent::new("system", content);
    event.role = Some(Role::System);
    event.timestamp = timestamp_of(value);
    event.raw = Some(value.clone());
    event
}

fn map_summary(value: &Value) -> ParsedEvent {
    let content = value
        .get("summary")
        .map(value_to_text)
        .unwrap_or_else(|| value.to_string());
    let mut event = ParsedEvent::new("summary", content);
    event.timestamp = timestamp_of(value);
    if let Some(subtype) = value.get("subtype").and_then(Value::as_str) {
        event
            .metadata
            .insert("subtype".to_string(), Value::String(subtype.to_string()));
    }
    event.raw = Some(value.clone());
    event
}

fn timestamp_of(value: &Value) -> Option<String> {
    value
        .get("timestamp")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<ParsedEvent> {
        ClaudeParser.parse_str(input)
    }

    #[test]
    fn test_four_line_session() {
        let input = concat!(
            r#"{"type":"user","message":{"content":"please save the file"}}"#,
            "\n",
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Saving now."}]}}"#,
            "\n",
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"File saved successfully","is_error":false}]}}"#,
            "\n",
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Done."}]}}"#,
            "\n",
        );

        let events = parse(input);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].role, Some(Role::User));
        assert_eq!(events[1].role, Some(Role::Assistant));
        assert_eq!(events[2].role, Some(Role::Tool));
        assert_eq!(events[3].role, Some(Role::Assistant));
        assert_eq!(
            events[2].tool_output.as_deref(),
            Some("File saved successfully")
        );
        assert_eq!(events[2].is_error, Some(false));
    }

    #[test]
    fn test_assistant_tool_use_blocks() {
        let input = r#"{"type":"assistant","message":{"model":"claude-sonnet","content":[{"type":"text","text":"Editing."},{"type":"tool_use","name":"Edit","input":{"file_path":"src/main.rs"}},{"type":"tool_use","name":"Bash","input":{"command":"ls"}}]}}"#;

        let events = parse(input);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.content, "Editing.");
        assert_eq!(event.tool_name.as_deref(), Some("Edit"));
        assert_eq!(
            event.tool_input.as_ref().unwrap()["file_path"],
            "src/main.rs"
        );
        let calls = event.metadata["toolCalls"].as_array().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1]["name"], "Bash");
        assert_eq!(event.metadata["model"], "claude-sonnet");
    }

    #[test]
    fn test_multiple_text_blocks_concatenated() {
        let input = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"one"},{"type":"text","text":"two"}]}}"#;
        let events = parse(input);
        assert_eq!(events[0].content, "one\ntwo");
    }

    #[test]
    fn test_summary_subtype_in_metadata() {
        let input = r#"{"type":"summary","summary":"Worked on the parser","subtype":"compact"}"#;
        let events = parse(input);
        assert_eq!(events[0].event_type, "summary");
        assert_eq!(events[0].content, "Worked on the parser");
        assert_eq!(events[0].metadata["subtype"], "compact");
        assert!(events[0].raw.is_some());
    }

    #[test]
    fn test_unknown_type_kept_raw() {
        let input = r#"{"type":"file-history-snapshot","messageId":"m1"}"#;
        let events = parse(input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "file-history-snapshot");
        assert!(events[0].raw.is_some());
        assert!(events[0].content.contains("messageId"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let input = concat!(
            "not json at all\n",
            r#"{"type":"user","message":{"content":"hi"}}"#,
            "\n",
            "{\"type\":\"assistant\",\n", // truncated record
        );
        let events = parse(input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "user");
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let input = r#"{"type":"user","message":{"content":"tail"}}"#;
        let events = parse(input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content, "tail");
    }

    #[test]
    fn test_detect_path() {
        assert!(ClaudeParser.detect(Path::new("/home/u/.claude/projects/p/s.jsonl")));
        assert!(!ClaudeParser.detect(Path::new("/home/u/.codex/sessions/s.jsonl")));
    }
}
