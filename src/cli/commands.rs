//! Command execution: wires the pipeline components behind each
//! subcommand.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use crate::assess::assessor::{Assessor, ProgressCallback};
use crate::assess::consensus::compute_consensus;
use crate::assess::{ProviderKind, TokioProcessRunner};
use crate::chunking::{ChunkerConfig, EventChunker, ScoredEvent};
use crate::cli::output::{OutputFormat, render};
use crate::cli::parser::{Cli, Commands};
use crate::config::DistillConfig;
use crate::core::{ParsedEvent, Platform, ScannedSession};
use crate::distill::question::{QuestionDistiller, fts_or_query};
use crate::distill::{ChunkEntry, distill};
use crate::error::{CommandError, Error, Result};
use crate::memory::{DefensiveMemory, HttpMemoryClient, MemoryService};
use crate::output::{
    ClaudeConversationGenerator, ClaudeSummaryGenerator, CodexGenerator, DistillationLoader,
    GeminiGenerator, GeneratorOptions, OutputGenerator, artifact_path,
};
use crate::parser::{ParserRegistry, parse_session_file};
use crate::scoring::score_event;
use crate::session::{ScanFilter, SessionScanner, SessionWatcher, WatcherConfig};
use crate::storage::DistillStore;

/// Marker file recording the actively loaded distilled context.
const ACTIVE_CONTEXT_FILE: &str = "active-context.json";

/// Executes the parsed CLI, returning the text to print.
///
/// # Errors
///
/// Returns an error for malformed arguments, unrecoverable I/O, or an
/// explicitly requested file that does not exist. Degraded pipeline
/// states (no chunks, no providers reachable) report statistics instead.
pub async fn execute(cli: &Cli) -> Result<String> {
    let mut builder = DistillConfig::builder();
    if let Some(dir) = &cli.data_dir {
        builder = builder.data_dir(dir);
    }
    let config = builder.from_env()?.build()?;
    let format = OutputFormat::parse(&cli.output);

    match &cli.command {
        Commands::Scan { platform, limit } => cmd_scan(&config, format, platform.as_deref(), *limit),
        Commands::Run {
            session_ids,
            providers,
            limit,
            cwd,
            budget,
        } => {
            cmd_run(
                &config,
                format,
                session_ids,
                providers.as_deref(),
                *limit,
                cwd.as_deref(),
                *budget,
            )
            .await
        }
        Commands::Build {
            cwd,
            limit,
            budget,
            format: build_format,
            providers: _,
            dry_run,
            filter,
        } => cmd_build(
            &config,
            format,
            cwd.as_deref(),
            *limit,
            *budget,
            build_format,
            *dry_run,
            filter.as_deref(),
        ),
        Commands::Ask {
            question,
            platform,
            providers,
        } => cmd_ask(&config, format, question, platform, providers.as_deref()).await,
        Commands::Query { text } => cmd_query(&config, format, text),
        Commands::Report => cmd_report(&config, format),
        Commands::Assess { chunk_id } => cmd_assess(&config, format, chunk_id).await,
        Commands::Status => cmd_status(&config, format),
        Commands::Watch { state } => cmd_watch(&config, state).await,
        Commands::Seed { platform } => cmd_seed(&config, format, platform),
        Commands::Load { path, cwd } => cmd_load(&config, format, path.as_deref(), cwd.as_deref()),
        Commands::Unload => cmd_unload(&config),
    }
}

fn open_store(config: &DistillConfig) -> Result<Arc<DistillStore>> {
    Ok(Arc::new(DistillStore::open(config.db_path())?))
}

fn parse_provider_list(raw: Option<&str>) -> Result<Option<Vec<ProviderKind>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let providers = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect::<std::result::Result<Vec<ProviderKind>, _>>()
        .map_err(|e| Error::Command(CommandError::InvalidArgument(e)))?;
    Ok(Some(providers))
}

fn parse_platform(raw: &str) -> Result<Platform> {
    raw.parse()
        .map_err(|e: String| Error::Command(CommandError::InvalidArgument(e)))
}

/// Annotates parsed events with their provenance so downstream stages can
/// collect source platforms without re-threading the scan result.
fn tag_events(events: &mut [ParsedEvent], session: &ScannedSession) {
    for event in events {
        event.metadata.insert(
            "sourcePlatform".to_string(),
            json!(session.platform.as_str()),
        );
        if let Some(session_id) = &session.session_id {
            event
                .metadata
                .insert("sourceSessionId".to_string(), json!(session_id));
        }
    }
}

fn cmd_scan(
    config: &DistillConfig,
    format: OutputFormat,
    platform: Option<&str>,
    limit: Option<usize>,
) -> Result<String> {
    let platforms = platform.map(parse_platform).transpose()?.map(|p| vec![p]);
    let scanner = SessionScanner::with_default_roots(&config.data_dir);
    let sessions = scanner.scan(&ScanFilter {
        platforms,
        limit,
        modified_after: None,
    });

    let store = open_store(config)?;
    for session in &sessions {
        store.record_external_session(session)?;
    }

    Ok(render(&sessions, format, |sessions| {
        if sessions.is_empty() {
            return "no session files found".to_string();
        }
        let mut out = format!("{} session file(s):\n", sessions.len());
        for session in sessions {
            let _ = writeln!(
                out,
                "  {:>8}  {:>10}  {}",
                session.platform.as_str(),
                session.file_size,
                session.file_path.display(),
            );
        }
        out
    }))
}

#[allow(clippy::too_many_lines)]
async fn cmd_run(
    config: &DistillConfig,
    format: OutputFormat,
    session_ids: &[String],
    providers: Option<&str>,
    limit: Option<usize>,
    cwd: Option<&Path>,
    budget: Option<usize>,
) -> Result<String> {
    let store = open_store(config)?;
    let registry = ParserRegistry::new();
    let scanner = SessionScanner::with_default_roots(&config.data_dir);

    let mut sessions = scanner.scan(&ScanFilter {
        platforms: None,
        limit: None,
        modified_after: None,
    });
    if !session_ids.is_empty() {
        sessions.retain(|s| {
            s.session_id
                .as_ref()
                .is_some_and(|id| session_ids.contains(id))
        });
    }
    if let Some(cwd) = cwd {
        let needle = cwd.to_string_lossy().replace('/', "-");
        sessions.retain(|s| s.file_path.to_string_lossy().contains(&needle));
    }
    if let Some(limit) = limit {
        sessions.truncate(limit);
    }

    let mut assess_cfg = config.assess_config();
    if let Some(providers) = parse_provider_list(providers)? {
        assess_cfg.providers = providers;
    }
    let chunker = EventChunker::new(ChunkerConfig {
        max_tokens_per_chunk: budget.unwrap_or(crate::chunking::DEFAULT_MAX_TOKENS),
        ..ChunkerConfig::default()
    });

    let mut all_chunks = Vec::new();
    let mut parsed_sessions = 0usize;
    let mut total_events = 0usize;
    for session in &sessions {
        let Ok(mut events) = parse_session_file(&registry, &session.file_path) else {
            continue;
        };
        tag_events(&mut events, session);
        total_events += events.len();

        let scored: Vec<ScoredEvent> = events
            .into_iter()
            .map(|event| {
                let importance = score_event(&event);
                ScoredEvent::new(event, importance)
            })
            .collect();

        let session_id = session
            .session_id
            .clone()
            .unwrap_or_else(|| session.file_path.to_string_lossy().into_owned());
        let chunks = chunker.chunk_events(&session_id, &scored);
        for chunk in &chunks {
            store.upsert_chunk(chunk)?;
        }
        store.record_external_session(session)?;
        store.mark_session_distilled(&session.file_path)?;
        all_chunks.extend(chunks);
        parsed_sessions += 1;
    }

    let assessor = Assessor::new(Arc::new(TokioProcessRunner));
    let total = all_chunks.len();
    let on_progress: ProgressCallback = Arc::new(move |done, total| {
        tracing::info!(done, total, "chunk assessed");
    });
    let results = assessor
        .assess_chunks(&all_chunks, &assess_cfg, Some(on_progress))
        .await;

    let consensus_cfg = config.consensus_config();
    let mut assessed = 0usize;
    let mut rated = 0usize;
    for (chunk_id, assessments) in &results {
        for assessment in assessments {
            store.insert_assessment(assessment)?;
        }
        if !assessments.is_empty() {
            rated += 1;
        }
        let all = store.assessments_for_chunk(chunk_id)?;
        let consensus = compute_consensus(&all, &consensus_cfg);
        store.set_consensus(chunk_id, consensus)?;
        assessed += 1;
    }

    let summary = json!({
        "sessions": parsed_sessions,
        "events": total_events,
        "chunks": total,
        "assessed": assessed,
        "withRatings": rated,
    });
    Ok(render(&summary, format, |s| {
        format!(
            "processed {} session(s): {} events -> {} chunk(s), {} assessed ({} with ratings)",
            s["sessions"], s["events"], s["chunks"], s["assessed"], s["withRatings"],
        )
    }))
}

#[allow(clippy::too_many_arguments)]
fn cmd_build(
    config: &DistillConfig,
    format: OutputFormat,
    cwd: Option<&Path>,
    limit: Option<usize>,
    budget: Option<usize>,
    build_format: &str,
    dry_run: bool,
    filter: Option<&str>,
) -> Result<String> {
    let store = open_store(config)?;

    let mut stored = store.all_chunks()?;
    if let Some(filter) = filter {
        let query = fts_or_query(filter);
        let matched: std::collections::HashSet<String> = store
            .search_chunks(&query, 10_000)
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.chunk.id)
            .collect();
        stored.retain(|s| matched.contains(&s.chunk.id));
    }
    if let Some(limit) = limit {
        // Most recent chunks are the most likely to matter; cap there.
        stored.sort_by(|a, b| b.chunk.start_index.cmp(&a.chunk.start_index));
        stored.truncate(limit);
        stored.sort_by_key(|s| s.chunk.start_index);
    }

    if stored.is_empty() {
        return Ok("no stored chunks; run `distill run` first".to_string());
    }

    let entries: Vec<ChunkEntry> = stored
        .into_iter()
        .map(|s| ChunkEntry::new(s.chunk, s.consensus.unwrap_or(0.0)))
        .collect();

    let mut distiller_cfg = config.distiller_config();
    if let Some(budget) = budget {
        distiller_cfg.max_tokens = budget;
    }
    let distilled = distill(entries, &distiller_cfg);

    let stats = json!({
        "selected": distilled.chunks.len(),
        "totalTokens": distilled.total_tokens,
        "droppedByConsensus": distilled.dropped_chunks.by_consensus,
        "droppedByBudget": distilled.dropped_chunks.by_budget,
        "sources": distilled.source_session_ids.len(),
    });

    if dry_run {
        return Ok(render(&stats, format, |s| {
            format!(
                "dry run: {} chunk(s), ~{} tokens ({} dropped by consensus, {} by budget)",
                s["selected"], s["totalTokens"], s["droppedByConsensus"], s["droppedByBudget"],
            )
        }));
    }

    let options = GeneratorOptions {
        cwd: cwd
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| GeneratorOptions::default().cwd),
        ..GeneratorOptions::default()
    };

    let path = match build_format {
        "conversation" => {
            let generator = ClaudeConversationGenerator;
            let path = artifact_path(&config.distilled_dir(), "build", generator.extension());
            generator.generate(&distilled, &path, &options)?
        }
        "summary" => {
            let generator = ClaudeSummaryGenerator;
            let path = artifact_path(&config.distilled_dir(), "summary", generator.extension());
            generator.generate(&distilled, &path, &options)?
        }
        other => {
            return Err(CommandError::InvalidArgument(format!(
                "unknown build format: {other}"
            ))
            .into());
        }
    };

    let result = json!({
        "artifact": path.to_string_lossy(),
        "stats": stats,
    });
    Ok(render(&result, format, |r| {
        format!(
            "wrote {} ({} chunk(s), ~{} tokens)",
            r["artifact"].as_str().unwrap_or_default(),
            r["stats"]["selected"],
            r["stats"]["totalTokens"],
        )
    }))
}

async fn cmd_ask(
    config: &DistillConfig,
    format: OutputFormat,
    question: &str,
    platform: &str,
    providers: Option<&str>,
) -> Result<String> {
    let target = parse_platform(platform)?;
    let store = open_store(config)?;

    let service: Arc<dyn MemoryService> = Arc::new(HttpMemoryClient::default());
    let memory = Arc::new(DefensiveMemory::new(
        Arc::clone(&store),
        service,
        uuid::Uuid::new_v4().to_string(),
        GeneratorOptions::default().cwd,
    ));
    let assessor = Assessor::new(Arc::new(TokioProcessRunner));
    let distiller = QuestionDistiller::new(Arc::clone(&store), memory, assessor);

    let mut question_cfg = config.question_config();
    if let Some(providers) = parse_provider_list(providers)? {
        question_cfg.assess.providers = providers;
    }

    let result = distiller.distill(question, &question_cfg).await;

    if result.session.chunks.is_empty() {
        return Ok(render(&result.search_stats, format, |s| {
            format!(
                "no matching context found (fts: {}, memory: {})",
                s.fts_matches, s.memory_matches
            )
        }));
    }

    let options = GeneratorOptions::default();
    let distilled_dir = config.distilled_dir();
    let path = match target {
        Platform::Claude | Platform::Unified => {
            let generator = ClaudeConversationGenerator;
            let path = artifact_path(&distilled_dir, "ask", generator.extension());
            generator.generate(&result.session, &path, &options)?
        }
        Platform::Codex => {
            let generator = CodexGenerator;
            let path = artifact_path(&distilled_dir, "ask", generator.extension());
            generator.generate(&result.session, &path, &options)?
        }
        Platform::Gemini => {
            let generator = GeminiGenerator;
            let path = artifact_path(&distilled_dir, "ask", generator.extension());
            generator.generate(&result.session, &path, &options)?
        }
    };

    let summary = json!({
        "artifact": path.to_string_lossy(),
        "question": result.question,
        "searchStats": result.search_stats,
        "selected": result.session.chunks.len(),
        "totalTokens": result.session.total_tokens,
    });
    Ok(render(&summary, format, |s| {
        format!(
            "wrote {} ({} chunk(s), ~{} tokens; fts {}, memory {}, re-ranked {})",
            s["artifact"].as_str().unwrap_or_default(),
            s["selected"],
            s["totalTokens"],
            s["searchStats"]["ftsMatches"],
            s["searchStats"]["memoryMatches"],
            s["searchStats"]["afterReRank"],
        )
    }))
}

fn cmd_query(config: &DistillConfig, format: OutputFormat, text: &str) -> Result<String> {
    let store = open_store(config)?;
    let query = fts_or_query(text);
    let hits = store.search_chunks(&query, 20).unwrap_or_default();

    let listing: Vec<serde_json::Value> = hits
        .iter()
        .map(|hit| {
            json!({
                "chunkId": hit.chunk.id,
                "sessionId": hit.chunk.session_id,
                "consensus": hit.consensus,
                "importanceAvg": hit.chunk.importance_avg,
                "tokens": hit.chunk.token_estimate,
                "preview": hit.chunk.primary_content().chars().take(80).collect::<String>(),
            })
        })
        .collect();

    Ok(render(&listing, format, |listing| {
        if listing.is_empty() {
            return "no matches".to_string();
        }
        let mut out = format!("{} match(es):\n", listing.len());
        for hit in listing {
            let _ = writeln!(
                out,
                "  {}  consensus={}  {}",
                hit["chunkId"].as_str().unwrap_or_default(),
                hit["consensus"],
                hit["preview"].as_str().unwrap_or_default(),
            );
        }
        out
    }))
}

fn cmd_report(config: &DistillConfig, format: OutputFormat) -> Result<String> {
    let store = open_store(config)?;
    let chunks = store.all_chunks()?;

    let with_consensus: Vec<f64> = chunks.iter().filter_map(|c| c.consensus).collect();
    let selectable = with_consensus
        .iter()
        .filter(|&&c| c >= config.min_consensus)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let avg = if with_consensus.is_empty() {
        0.0
    } else {
        with_consensus.iter().sum::<f64>() / with_consensus.len() as f64
    };

    let report = json!({
        "chunks": chunks.len(),
        "assessed": with_consensus.len(),
        "selectable": selectable,
        "avgConsensus": (avg * 100.0).round() / 100.0,
        "totalTokens": chunks.iter().map(|c| c.chunk.token_estimate).sum::<usize>(),
    });
    Ok(render(&report, format, |r| {
        format!(
            "{} chunk(s), {} assessed, {} above the consensus floor (avg {}), ~{} tokens stored",
            r["chunks"], r["assessed"], r["selectable"], r["avgConsensus"], r["totalTokens"],
        )
    }))
}

async fn cmd_assess(config: &DistillConfig, format: OutputFormat, chunk_id: &str) -> Result<String> {
    let store = open_store(config)?;
    let Some(stored) = store.get_chunk(chunk_id)? else {
        return Err(crate::error::StorageError::ChunkNotFound {
            id: chunk_id.to_string(),
        }
        .into());
    };

    let assessor = Assessor::new(Arc::new(TokioProcessRunner));
    let assessments = assessor
        .assess_chunk(&stored.chunk, &config.assess_config())
        .await;
    for assessment in &assessments {
        store.insert_assessment(assessment)?;
    }

    let all = store.assessments_for_chunk(chunk_id)?;
    let consensus = compute_consensus(&all, &config.consensus_config());
    store.set_consensus(chunk_id, consensus)?;

    let providers: Vec<String> = assessments
        .iter()
        .map(|a| format!("{}={}", a.provider, a.score))
        .collect();
    let summary = json!({
        "chunkId": chunk_id,
        "newRatings": providers,
        "totalAssessments": all.len(),
        "consensus": consensus,
    });
    Ok(render(&summary, format, |s| {
        format!(
            "chunk {}: {} assessment(s), consensus {}",
            s["chunkId"].as_str().unwrap_or_default(),
            s["totalAssessments"],
            s["consensus"],
        )
    }))
}

fn cmd_status(config: &DistillConfig, format: OutputFormat) -> Result<String> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    let artifact_count = std::fs::read_dir(config.distilled_dir())
        .map(|entries| entries.flatten().count())
        .unwrap_or(0);

    let status = json!({
        "enabled": config.enabled,
        "dataDir": config.data_dir.to_string_lossy(),
        "providers": config.providers,
        "tokenBudget": config.token_budget,
        "minConsensus": config.min_consensus,
        "chunks": stats.chunk_count,
        "assessments": stats.assessment_count,
        "events": stats.event_count,
        "externalSessions": stats.external_session_count,
        "syncQueuePending": stats.sync_queue_pending,
        "distilledArtifacts": artifact_count,
        "schemaVersion": stats.schema_version,
    });
    Ok(render(&status, format, |s| {
        format!(
            "distillation {}: {} chunk(s), {} assessment(s), {} event(s), \
             {} external session(s), {} pending sync row(s), {} artifact(s)",
            if s["enabled"].as_bool().unwrap_or(false) {
                "enabled"
            } else {
                "disabled"
            },
            s["chunks"],
            s["assessments"],
            s["events"],
            s["externalSessions"],
            s["syncQueuePending"],
            s["distilledArtifacts"],
        )
    }))
}

async fn cmd_watch(config: &DistillConfig, state: &str) -> Result<String> {
    match state {
        "on" => {
            let scanner = SessionScanner::with_default_roots(&config.data_dir);
            let dirs: Vec<PathBuf> = scanner.roots().iter().map(|r| r.dir.clone()).collect();
            let mut watcher = SessionWatcher::new(WatcherConfig::new(dirs));

            watcher.start(
                Arc::new(|path: &Path| {
                    tracing::info!(path = %path.display(), "new session file");
                }),
                Arc::new(|message: &str| {
                    tracing::warn!(message, "watcher scan error");
                }),
            );

            tokio::signal::ctrl_c()
                .await
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
            watcher.stop(false);
            Ok("watcher stopped".to_string())
        }
        "off" => Ok("watcher runs in the foreground; stop it with ctrl-c".to_string()),
        other => Err(CommandError::InvalidArgument(format!(
            "watch takes on|off, got: {other}"
        ))
        .into()),
    }
}

fn cmd_seed(config: &DistillConfig, format: OutputFormat, platform: &str) -> Result<String> {
    let platform = parse_platform(platform)?;
    let store = open_store(config)?;
    let registry = ParserRegistry::new();
    let scanner = SessionScanner::with_default_roots(&config.data_dir);
    let chunker = EventChunker::default();

    let sessions = scanner.scan(&ScanFilter {
        platforms: Some(vec![platform]),
        limit: None,
        modified_after: None,
    });

    let mut seeded_chunks = 0usize;
    let mut seeded_sessions = 0usize;
    for session in &sessions {
        let Ok(mut events) = parse_session_file(&registry, &session.file_path) else {
            continue;
        };
        tag_events(&mut events, session);

        let scored: Vec<ScoredEvent> = events
            .into_iter()
            .map(|event| {
                let importance = score_event(&event);
                ScoredEvent::new(event, importance)
            })
            .collect();

        let session_id = session
            .session_id
            .clone()
            .unwrap_or_else(|| session.file_path.to_string_lossy().into_owned());
        for chunk in chunker.chunk_events(&session_id, &scored) {
            store.upsert_chunk(&chunk)?;
            seeded_chunks += 1;
        }
        store.record_external_session(session)?;
        seeded_sessions += 1;
    }

    let summary = json!({
        "platform": platform.as_str(),
        "sessions": seeded_sessions,
        "chunks": seeded_chunks,
    });
    Ok(render(&summary, format, |s| {
        format!(
            "seeded {} chunk(s) from {} {} session(s)",
            s["chunks"],
            s["sessions"],
            s["platform"].as_str().unwrap_or_default(),
        )
    }))
}

fn cmd_load(
    config: &DistillConfig,
    format: OutputFormat,
    path: Option<&Path>,
    cwd: Option<&Path>,
) -> Result<String> {
    let loader = DistillationLoader::new(config.distilled_dir());
    let build_path = match path {
        Some(path) => path.to_path_buf(),
        None => loader.find_latest_build(cwd)?,
    };
    let build = loader.load(&build_path)?;

    // Remember the active context so `unload` has something to forget.
    let marker = config.data_dir.join(ACTIVE_CONTEXT_FILE);
    let marker_body = json!({
        "path": build.file_path.to_string_lossy(),
        "loadedAt": chrono::Utc::now().to_rfc3339(),
    });
    crate::output::write_artifact(&marker, &marker_body.to_string())?;

    let summary = json!({
        "path": build.file_path.to_string_lossy(),
        "turns": build.turns.len(),
        "qaPairs": build.qa_pairs,
        "cwd": build.cwd,
        "contextBlock": build.context_block(),
    });
    Ok(render(&summary, format, |s| {
        format!(
            "loaded {} ({} turn(s), {} topic pair(s)); resume it natively with claude, \
             or prepend the context block for other assistants",
            s["path"].as_str().unwrap_or_default(),
            s["turns"],
            s["qaPairs"],
        )
    }))
}

fn cmd_unload(config: &DistillConfig) -> Result<String> {
    let marker = config.data_dir.join(ACTIVE_CONTEXT_FILE);
    if marker.exists() {
        std::fs::remove_file(&marker).map_err(|e| {
            Error::Command(CommandError::ExecutionFailed(format!(
                "failed to clear active context: {e}"
            )))
        })?;
        Ok("distilled context unloaded".to_string())
    } else {
        Ok("no distilled context loaded".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn with_temp_data_dir(args: &[&str], dir: &Path) -> Cli {
        let mut full = vec!["distill", "--data-dir"];
        let dir_str = dir.to_string_lossy().into_owned();
        full.push(Box::leak(dir_str.into_boxed_str()));
        full.extend_from_slice(args);
        cli(&full)
    }

    #[tokio::test]
    async fn test_scan_empty_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["scan", "--platform", "unified"], tmp.path());
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("no session files found"));
    }

    #[tokio::test]
    async fn test_status_reports_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["status"], tmp.path());
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("0 chunk(s)"));
    }

    #[tokio::test]
    async fn test_build_without_chunks_is_degraded_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["build", "--dry-run"], tmp.path());
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("no stored chunks"));
    }

    #[tokio::test]
    async fn test_unload_without_load() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["unload"], tmp.path());
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("no distilled context loaded"));
    }

    #[tokio::test]
    async fn test_watch_rejects_bad_state() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["watch", "maybe"], tmp.path());
        assert!(execute(&cli).await.is_err());
    }

    #[tokio::test]
    async fn test_query_on_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["query", "anything interesting"], tmp.path());
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("no matches"));
    }

    #[tokio::test]
    async fn test_assess_missing_chunk_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = with_temp_data_dir(&["assess", "nope"], tmp.path());
        let err = execute(&cli).await.unwrap_err();
        assert!(err.to_string().contains("chunk not found"));
    }

    #[test]
    fn test_parse_provider_list() {
        assert!(parse_provider_list(None).unwrap().is_none());
        assert_eq!(
            parse_provider_list(Some("claude,codex")).unwrap().unwrap(),
            vec![ProviderKind::Claude, ProviderKind::Codex]
        );
        assert!(parse_provider_list(Some("claude,notreal")).is_err());
    }
}
