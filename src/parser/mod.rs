//! Cross-assistant session parsers and the platform registry.
//!
//! Each platform parser streams a session file into canonical
//! [`ParsedEvent`]s. Parsing is line-oriented for newline-delimited inputs
//! and whole-document for JSON-array inputs; malformed records are skipped
//! per record and never terminate the stream.

pub mod claude;
pub mod codex;
pub mod gemini;

pub use claude::ClaudeParser;
pub use codex::CodexParser;
pub use gemini::GeminiParser;

use std::collections::VecDeque;
use std::io::{BufRead, Cursor};
use std::path::Path;

use crate::core::{ParsedEvent, Platform};
use crate::error::{ParseError, Result};
use crate::io::SessionFileReader;

/// Streaming parser for one platform's session files.
pub trait SessionParser: Send + Sync {
    /// Platform this parser handles.
    fn platform(&self) -> Platform;

    /// Path heuristic: does this file layout belong to the platform?
    fn detect(&self, path: &Path) -> bool;

    /// Shape heuristic over the first non-empty record or document prefix.
    fn sniff(&self, prefix: &str) -> bool;

    /// Streams events from a buffered reader.
    ///
    /// Never fails: malformed records are skipped, partial trailing lines
    /// are flushed at end-of-stream, and unknown record types are emitted
    /// with their raw JSON attached.
    fn parse_reader<'a>(
        &self,
        reader: Box<dyn BufRead + 'a>,
    ) -> Box<dyn Iterator<Item = ParsedEvent> + 'a>;

    /// Parses an in-memory string through the same machinery.
    fn parse_str(&self, input: &str) -> Vec<ParsedEvent> {
        self.parse_reader(Box::new(Cursor::new(input.as_bytes().to_vec())))
            .collect()
    }
}

/// Lazy NDJSON event stream: reads one line at a time and maps each
/// structurally valid record through a platform-specific mapper.
pub(crate) struct NdjsonEvents<'a> {
    reader: Box<dyn BufRead + 'a>,
    map_record: fn(&serde_json::Value) -> Vec<ParsedEvent>,
    pending: VecDeque<ParsedEvent>,
    done: bool,
}

impl<'a> NdjsonEvents<'a> {
    pub(crate) fn new(
        reader: Box<dyn BufRead + 'a>,
        map_record: fn(&serde_json::Value) -> Vec<ParsedEvent>,
    ) -> Self {
        Self {
            reader,
            map_record,
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl Iterator for NdjsonEvents<'_> {
    type Item = ParsedEvent;

    fn next(&mut self) -> Option<ParsedEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }

            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                // EOF: read_line already flushed any unterminated tail into
                // `line` on the previous call, so nothing is left behind.
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<serde_json::Value>(trimmed) {
                        Ok(value) => self.pending.extend((self.map_record)(&value)),
                        // Malformed record: skip and advance the stream.
                        Err(_) => continue,
                    }
                }
                // I/O failure mid-stream ends the sequence without error.
                Err(_) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

/// Fallback event for a structurally recognizable record of unknown type.
pub(crate) fn unknown_event(value: &serde_json::Value) -> ParsedEvent {
    let event_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown")
        .to_string();
    let mut event = ParsedEvent::new(event_type, value.to_string());
    event.raw = Some(value.clone());
    event
}

/// Coerces a JSON value that may be a string, a text-block array, or any
/// other shape into display text.
pub(crate) fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| {
                    b.get("text")
                        .and_then(|t| t.as_str())
                        .or_else(|| b.as_str())
                })
                .collect();
            texts.join("\n")
        }
        other => other.to_string(),
    }
}

/// Resolves a parser by path heuristics, then by first-record shape.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn SessionParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Builds a registry holding all platform parsers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(ClaudeParser),
                Box::new(CodexParser),
                Box::new(GeminiParser),
            ],
        }
    }

    /// Returns the parser for a specific platform, if registered.
    #[must_use]
    pub fn by_platform(&self, platform: Platform) -> Option<&dyn SessionParser> {
        self.parsers
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.platform() == platform)
    }

    /// Resolves a parser for a file: path heuristics win, otherwise the
    /// first non-empty line (or document prefix) is shape-sniffed.
    ///
    /// Returns `None` when nothing matches; resolution never fails with an
    /// error even for unreadable files.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<&dyn SessionParser> {
        if let Some(parser) = self
            .parsers
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.detect(path))
        {
            return Some(parser);
        }

        let prefix = read_sniff_prefix(path)?;
        self.sniff(&prefix)
    }

    /// Resolves a parser from a content prefix alone.
    #[must_use]
    pub fn sniff(&self, prefix: &str) -> Option<&dyn SessionParser> {
        let trimmed = prefix.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        self.parsers
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.sniff(trimmed))
    }
}

/// Reads the first non-empty line (or up to 8KB of a JSON-array document)
/// for shape sniffing. Returns `None` on any I/O failure.
fn read_sniff_prefix(path: &Path) -> Option<String> {
    const SNIFF_CAP: usize = 8 * 1024;

    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return None,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let mut prefix = trimmed.to_string();
                prefix.truncate(SNIFF_CAP);
                return Some(prefix);
            }
            Err(_) => return None,
        }
    }
}

/// Parses a session file end-to-end with the registry.
///
/// # Errors
///
/// Returns [`ParseError::NoParserMatched`] when no parser claims the file
/// and [`ParseError::Unreadable`] when it cannot be opened. Record-level
/// failures inside the stream stay silent per the parsing contract.
pub fn parse_session_file(registry: &ParserRegistry, path: &Path) -> Result<Vec<ParsedEvent>> {
    let parser = registry
        .resolve(path)
        .ok_or_else(|| ParseError::NoParserMatched {
            path: path.to_string_lossy().to_string(),
        })?;

    let content = SessionFileReader::open(path)
        .and_then(|r| r.read_to_string())
        .map_err(|e| ParseError::Unreadable {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

    Ok(parser.parse_str(&content))
}
