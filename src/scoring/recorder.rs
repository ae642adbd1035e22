//! Event recorder seam and the scoring decorator.
//!
//! The journal write path is expressed as a small [`EventRecorder`]
//! capability so scoring composes in front of any sink without the sink
//! knowing about it.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::CanonicalEvent;
use crate::error::{IoError, Result};
use crate::scoring::score_event;

/// Sink for canonical events on the persistence path.
pub trait EventRecorder {
    /// Persists one event.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying sink cannot accept the write.
    fn record(&mut self, event: CanonicalEvent) -> Result<()>;
}

/// Decorator that assigns `importance_score` before delegating.
///
/// Scoring is synchronous, pure, and cannot fail, so the wrapped sink sees
/// the exact event it would have seen otherwise, plus the score. An event
/// that already carries a score is passed through untouched.
pub struct ScoringRecorder<R: EventRecorder> {
    inner: R,
}

impl<R: EventRecorder> ScoringRecorder<R> {
    /// Wraps a recorder with the scoring hook.
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Consumes the decorator, returning the wrapped recorder.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: EventRecorder> EventRecorder for ScoringRecorder<R> {
    fn record(&mut self, mut event: CanonicalEvent) -> Result<()> {
        if event.importance_score.is_none() {
            event.importance_score = Some(score_event(&event.event));
        }
        self.inner.record(event)
    }
}

/// Append-only NDJSON journal writer for a single session.
pub struct JsonlRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlRecorder {
    /// Opens (or creates) the journal at `path`, creating parent
    /// directories as needed. Writes append to existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
                path: parent.to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| IoError::WriteFailed {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Returns the journal path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventRecorder for JsonlRecorder {
    fn record(&mut self, event: CanonicalEvent) -> Result<()> {
        let line = serde_json::to_string(&event)?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(|e| IoError::WriteFailed {
                path: self.path.to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParsedEvent;

    #[derive(Default)]
    struct CaptureRecorder {
        events: Vec<CanonicalEvent>,
    }

    impl EventRecorder for CaptureRecorder {
        fn record(&mut self, event: CanonicalEvent) -> Result<()> {
            self.events.push(event);
            Ok(())
        }
    }

    #[test]
    fn test_scoring_recorder_assigns_score() {
        let mut recorder = ScoringRecorder::new(CaptureRecorder::default());
        let event = CanonicalEvent::from_parsed(ParsedEvent::new("assistant", "hello"));
        recorder.record(event).unwrap();

        let inner = recorder.into_inner();
        assert_eq!(inner.events.len(), 1);
        assert_eq!(inner.events[0].importance_score, Some(50));
        // Payload untouched
        assert_eq!(inner.events[0].event.content, "hello");
    }

    #[test]
    fn test_scoring_recorder_keeps_existing_score() {
        let mut recorder = ScoringRecorder::new(CaptureRecorder::default());
        let mut event = CanonicalEvent::from_parsed(ParsedEvent::new("assistant", "hello"));
        event.importance_score = Some(99);
        recorder.record(event).unwrap();

        assert_eq!(recorder.into_inner().events[0].importance_score, Some(99));
    }

    #[test]
    fn test_jsonl_recorder_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions").join("sess-1.jsonl");

        let mut recorder =
            ScoringRecorder::new(JsonlRecorder::open(&path).unwrap());
        let mut prompt = ParsedEvent::new("user", "one");
        prompt.role = Some(crate::core::Role::User);
        recorder
            .record(CanonicalEvent::from_parsed(prompt))
            .unwrap();
        recorder
            .record(CanonicalEvent::from_parsed(ParsedEvent::new("assistant", "two")))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["importanceScore"], 60); // user prompt: 50 + 10
    }
}
