//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Unified distillation CLI: mine coding-assistant history into
/// replayable context.
#[derive(Parser, Debug)]
#[command(name = "distill")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory override.
    #[arg(long, env = "UNIFIED_AGENT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output rendering (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub output: String,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List discoverable session files across platforms.
    Scan {
        /// Restrict to one platform (claude, codex, gemini, unified).
        #[arg(long)]
        platform: Option<String>,

        /// Keep at most this many results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run the full pipeline: parse, score, chunk, assess, persist.
    Run {
        /// Restrict to these session ids (default: all discovered).
        session_ids: Vec<String>,

        /// Comma-separated provider list override.
        #[arg(long)]
        providers: Option<String>,

        /// Process at most this many sessions.
        #[arg(long)]
        limit: Option<usize>,

        /// Only sessions whose files belong to this project path.
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Token budget override for subsequent builds.
        #[arg(long)]
        budget: Option<usize>,
    },

    /// Distill assessed chunks into a replayable session file.
    Build {
        /// Working directory stamped on the build.
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Use at most this many chunks.
        #[arg(long)]
        limit: Option<usize>,

        /// Token budget override.
        #[arg(long)]
        budget: Option<usize>,

        /// Artifact form (conversation, summary).
        #[arg(long, default_value = "conversation")]
        format: String,

        /// Comma-separated provider list override.
        #[arg(long)]
        providers: Option<String>,

        /// Report selection statistics without writing the artifact.
        #[arg(long)]
        dry_run: bool,

        /// Natural-language filter over chunk content.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Answer-driven distillation: search, re-rank, emit.
    Ask {
        /// The question to distill for.
        question: String,

        /// Target assistant for the artifact (claude, codex, gemini).
        #[arg(long, default_value = "claude")]
        platform: String,

        /// Comma-separated provider list override.
        #[arg(long)]
        providers: Option<String>,
    },

    /// Keyword search over stored chunks.
    Query {
        /// Search text.
        text: String,
    },

    /// Summarize stored chunks and their consensus distribution.
    Report,

    /// Re-assess a single chunk by id.
    Assess {
        /// Chunk id.
        chunk_id: String,
    },

    /// Show pipeline status and storage statistics.
    Status,

    /// Control the session watcher.
    Watch {
        /// `on` runs the watcher in the foreground, `off` is a no-op
        /// reminder that the watcher dies with its process.
        state: String,
    },

    /// Import a platform's sessions as importance-scored chunks without
    /// assessment.
    Seed {
        /// Platform to import (claude, codex, gemini, unified).
        platform: String,
    },

    /// Load the latest distilled build for injection.
    Load {
        /// Explicit build file (default: latest matching build).
        path: Option<PathBuf>,

        /// Project path used to pick the matching build.
        #[arg(long)]
        cwd: Option<PathBuf>,
    },

    /// Forget the actively loaded distilled context.
    Unload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from(["distill", "scan", "--platform", "codex", "--limit", "5"])
            .unwrap();
        match cli.command {
            Commands::Scan { platform, limit } => {
                assert_eq!(platform.as_deref(), Some("codex"));
                assert_eq!(limit, Some(5));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from([
            "distill", "build", "--budget", "4000", "--format", "summary", "--dry-run",
            "--filter", "auth flow",
        ])
        .unwrap();
        match cli.command {
            Commands::Build {
                budget,
                format,
                dry_run,
                filter,
                ..
            } => {
                assert_eq!(budget, Some(4000));
                assert_eq!(format, "summary");
                assert!(dry_run);
                assert_eq!(filter.as_deref(), Some("auth flow"));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_ask_defaults() {
        let cli = Cli::try_parse_from(["distill", "ask", "how does auth work"]).unwrap();
        match cli.command {
            Commands::Ask {
                question, platform, ..
            } => {
                assert_eq!(question, "how does auth work");
                assert_eq!(platform, "claude");
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_run_session_ids() {
        let cli =
            Cli::try_parse_from(["distill", "run", "sess-a", "sess-b", "--limit", "2"]).unwrap();
        match cli.command {
            Commands::Run {
                session_ids, limit, ..
            } => {
                assert_eq!(session_ids, vec!["sess-a", "sess-b"]);
                assert_eq!(limit, Some(2));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_global_output_flag() {
        let cli = Cli::try_parse_from(["distill", "--output", "json", "status"]).unwrap();
        assert_eq!(cli.output, "json");
    }
}
