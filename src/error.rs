//! Error types for the distillation pipeline.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! pipeline operations including parsing, storage, assessment, distillation,
//! memory sync, and CLI commands.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session parsing and registry errors.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Assessment engine errors.
    #[error("assessment error: {0}")]
    Assess(#[from] AssessError),

    /// Distillation errors.
    #[error("distillation error: {0}")]
    Distill(#[from] DistillError),

    /// Memory-service errors.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Chunk not found by ID.
    #[error("chunk not found: {id}")]
    ChunkNotFound {
        /// Chunk ID that was not found.
        id: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the parser registry and session scanner.
///
/// Per-record parse failures inside a parser are silently skipped and never
/// surface here; these variants cover the cases where the caller named a
/// file and the pipeline cannot do anything with it.
#[derive(Error, Debug)]
pub enum ParseError {
    /// No registered parser recognises the file.
    #[error("no parser matched: {path}")]
    NoParserMatched {
        /// Path that no parser claimed.
        path: String,
    },

    /// Session file missing or unreadable.
    #[error("session file unreadable: {path}: {reason}")]
    Unreadable {
        /// Path to the session file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Assessment engine errors.
#[derive(Error, Debug)]
pub enum AssessError {
    /// Provider subprocess could not be spawned.
    #[error("failed to spawn {provider}: {reason}")]
    Spawn {
        /// Provider CLI that failed to start.
        provider: String,
        /// Reason for failure.
        reason: String,
    },

    /// Provider subprocess exceeded its deadline and was terminated.
    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout {
        /// Provider CLI that timed out.
        provider: String,
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Provider exited non-zero.
    #[error("{provider} exited with status {status}")]
    NonZeroExit {
        /// Provider CLI that failed.
        provider: String,
        /// Exit status code (-1 when killed by signal).
        status: i32,
    },

    /// Provider stdout did not contain a parseable rating.
    #[error("{provider} returned no parseable rating")]
    UnparseableRating {
        /// Provider CLI whose output could not be parsed.
        provider: String,
    },

    /// Batch orchestration failure (task join, semaphore closed).
    #[error("assessment orchestration failed: {0}")]
    Orchestration(String),
}

/// Distillation errors.
#[derive(Error, Debug)]
pub enum DistillError {
    /// No chunks survived filtering; nothing to emit.
    #[error("no chunks to distill")]
    Empty,

    /// Generator output could not be serialized.
    #[error("output serialization failed: {0}")]
    Serialization(String),

    /// No distilled build found for the loader.
    #[error("no distilled build found: {path}")]
    BuildNotFound {
        /// Directory or file that was searched.
        path: String,
    },
}

/// Memory-service errors.
///
/// These never propagate out of the defensive wrapper's store path; they
/// exist for the HTTP client itself and for diagnostics.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// HTTP transport failure.
    #[error("memory service unreachable: {0}")]
    Http(String),

    /// Service responded with a non-success status.
    #[error("memory service returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response body did not match the expected shape.
    #[error("unexpected memory service response: {0}")]
    BadResponse(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(StorageError::Serialization(err.to_string()))
    }
}

impl From<serde_json::Error> for DistillError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
