//! Poll-based session directory watcher.
//!
//! Polls the configured directories on a fixed interval and reports paths
//! it has not seen before. The first poll only seeds the known set so that
//! pre-existing history is never replayed as "new".

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directories to poll (recursively).
    pub dirs: Vec<PathBuf>,
    /// Poll interval.
    pub interval: Duration,
}

impl WatcherConfig {
    /// Default poll interval of five seconds.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// Builds a config over the given directories with the default interval.
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

/// Callback invoked with each newly observed session file.
pub type NewFileCallback = Arc<dyn Fn(&Path) + Send + Sync>;
/// Callback invoked with scan error descriptions.
pub type ScanErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Background watcher over session directories.
pub struct SessionWatcher {
    config: WatcherConfig,
    known: Arc<Mutex<HashSet<PathBuf>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    /// Creates a stopped watcher.
    #[must_use]
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            known: Arc::new(Mutex::new(HashSet::new())),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Whether the poll loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the poll loop on the current tokio runtime.
    ///
    /// Idempotent: a second call while running is a no-op. A panicking
    /// callback is caught and reported through `on_error`; the loop
    /// continues either way.
    pub fn start(&mut self, on_new: NewFileCallback, on_error: ScanErrorCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let known = Arc::clone(&self.known);
        let running = Arc::clone(&self.running);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            let mut seeded = false;

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                poll_once(&config.dirs, &known, seeded, &on_new, &on_error);
                seeded = true;
            }
        }));
    }

    /// Stops the poll loop, optionally clearing the known set.
    pub fn stop(&mut self, clear_state: bool) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        if clear_state
            && let Ok(mut known) = self.known.lock()
        {
            known.clear();
        }
    }

    /// Number of paths currently tracked.
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.lock().map(|k| k.len()).unwrap_or(0)
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.stop(false);
    }
}

fn poll_once(
    dirs: &[PathBuf],
    known: &Arc<Mutex<HashSet<PathBuf>>>,
    report_new: bool,
    on_new: &NewFileCallback,
    on_error: &ScanErrorCallback,
) {
    let mut current = Vec::new();
    for dir in dirs {
        if let Err(message) = walk(dir, &mut current) {
            let callback = AssertUnwindSafe(|| on_error(&message));
            if std::panic::catch_unwind(callback).is_err() {
                tracing::warn!("watcher error callback panicked");
            }
        }
    }

    let Ok(mut known) = known.lock() else {
        return;
    };
    for path in current {
        if known.insert(path.clone()) && report_new {
            let callback = AssertUnwindSafe(|| on_new(&path));
            if std::panic::catch_unwind(callback).is_err() {
                tracing::warn!("watcher new-file callback panicked");
            }
        }
    }
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
    if !dir.exists() {
        // Absent roots are normal: platforms the user never ran.
        return Ok(());
    }
    let entries =
        std::fs::read_dir(dir).map_err(|e| format!("scan failed: {}: {e}", dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn collect_callbacks() -> (
        NewFileCallback,
        Arc<Mutex<Vec<PathBuf>>>,
        ScanErrorCallback,
        Arc<AtomicUsize>,
    ) {
        let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let on_new: NewFileCallback = Arc::new(move |path| {
            seen_cb.lock().unwrap().push(path.to_path_buf());
        });

        let errors = Arc::new(AtomicUsize::new(0));
        let errors_cb = Arc::clone(&errors);
        let on_error: ScanErrorCallback = Arc::new(move |_| {
            errors_cb.fetch_add(1, Ordering::SeqCst);
        });

        (on_new, seen, on_error, errors)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_seeds_without_reporting() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("pre-existing.jsonl"), "{}\n").unwrap();

        let (on_new, seen, on_error, _) = collect_callbacks();
        let mut watcher = SessionWatcher::new(WatcherConfig::new(vec![tmp.path().to_path_buf()]));
        watcher.start(on_new, on_error);

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        assert!(watcher.is_running());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(watcher.known_count(), 1);
        watcher.stop(false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_file_reported_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (on_new, seen, on_error, _) = collect_callbacks();
        let mut watcher = SessionWatcher::new(WatcherConfig::new(vec![tmp.path().to_path_buf()]));
        watcher.start(on_new, on_error);

        // Seed poll
        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        std::fs::write(tmp.path().join("fresh.jsonl"), "{}\n").unwrap();

        for _ in 0..3 {
            tokio::time::advance(WatcherConfig::DEFAULT_INTERVAL).await;
            tokio::task::yield_now().await;
        }

        let reported = seen.lock().unwrap().clone();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].ends_with("fresh.jsonl"));
        watcher.stop(true);
        assert_eq!(watcher.known_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let (on_new, _, on_error, _) = collect_callbacks();
        let mut watcher = SessionWatcher::new(WatcherConfig::new(vec![tmp.path().to_path_buf()]));
        watcher.start(Arc::clone(&on_new), Arc::clone(&on_error));
        watcher.start(on_new, on_error);
        assert!(watcher.is_running());
        watcher.stop(false);
        assert!(!watcher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_does_not_stop_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let panics: NewFileCallback = Arc::new(|_| panic!("listener bug"));
        let (_, _, on_error, _) = collect_callbacks();

        let mut watcher = SessionWatcher::new(WatcherConfig::new(vec![tmp.path().to_path_buf()]));
        watcher.start(panics, on_error);

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        std::fs::write(tmp.path().join("boom.jsonl"), "{}\n").unwrap();
        for _ in 0..2 {
            tokio::time::advance(WatcherConfig::DEFAULT_INTERVAL).await;
            tokio::task::yield_now().await;
        }

        // Loop survived the panic and keeps tracking state.
        assert!(watcher.is_running());
        assert_eq!(watcher.known_count(), 1);
        watcher.stop(false);
    }
}
