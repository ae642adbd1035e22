//! On-disk session discovery: the scanner and the poll-based watcher.

pub mod scanner;
pub mod watcher;

pub use scanner::{ScanFilter, ScanRoot, SessionScanner};
pub use watcher::{SessionWatcher, WatcherConfig};
