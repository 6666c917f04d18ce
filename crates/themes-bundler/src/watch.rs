//! Filesystem watching for incremental rebuilds
//!
//! A `FileWatcher` watches one directory tree and delivers `(path, kind)`
//! events over a channel. Theme units and the coordinator are pure
//! consumers: they spawn a task that receives events and decides which ones
//! concern them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_WATCH_LATENCY;
use crate::error::{BundlerError, Result};

/// Kind of change observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The path changed (created, written, renamed or removed).
    Changed,
    /// The path keeps changing across several watcher ticks.
    Continuous,
}

/// Events emitted by the filesystem watcher.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Configuration for the filesystem watcher.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Time the underlying watcher waits to batch raw notifications.
    pub latency: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            latency: DEFAULT_WATCH_LATENCY,
        }
    }
}

/// Recursive filesystem watcher for one directory tree.
pub struct FileWatcher {
    /// The debouncer wrapping the underlying watcher
    _debouncer: Debouncer<notify::RecommendedWatcher>,

    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    pub fn new(root: &Path, config: WatchConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root = root.to_path_buf();

        let mut debouncer = new_debouncer(
            config.latency,
            move |res: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    for event in events {
                        let kind = match event.kind {
                            DebouncedEventKind::AnyContinuous => ChangeKind::Continuous,
                            _ => ChangeKind::Changed,
                        };
                        debug!(path = %event.path.display(), ?kind, "File change detected");
                        if event_tx
                            .send(WatchEvent {
                                path: event.path,
                                kind,
                            })
                            .is_err()
                        {
                            debug!("Event receiver dropped, stopping watcher");
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Filesystem watch error");
                }
            },
        )
        .map_err(|e| BundlerError::Watch(format!("failed to create filesystem watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| {
                BundlerError::Watch(format!("failed to watch {}: {}", root.display(), e))
            })?;

        info!(
            path = %root.display(),
            latency_ms = config.latency.as_millis() as u64,
            "Started filesystem watcher"
        );

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Receive the next watch event.
    ///
    /// Returns `None` if the watcher has been stopped.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }
}

/// A live watch: the directory being watched and the task consuming it.
///
/// Registrations live for the rest of the process by default; dropping one
/// detaches the task instead of cancelling it.
#[derive(Debug)]
pub struct WatchRegistration {
    root: PathBuf,
    handle: JoinHandle<()>,
}

impl WatchRegistration {
    pub(crate) fn new(root: PathBuf, handle: JoinHandle<()>) -> Self {
        Self { root, handle }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop consuming events and release the underlying watcher.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        let watcher = FileWatcher::new(temp.path(), WatchConfig::default());
        assert!(watcher.is_ok());
    }

    #[tokio::test]
    async fn test_watcher_missing_root_is_error() {
        let temp = TempDir::new().unwrap();
        let result = FileWatcher::new(&temp.path().join("missing"), WatchConfig::default());
        assert!(matches!(result, Err(BundlerError::Watch(_))));
    }

    #[tokio::test]
    async fn test_watcher_detects_file_change() {
        let temp = TempDir::new().unwrap();
        // Canonicalize to handle macOS /var -> /private/var symlinks
        let temp_path = temp.path().canonicalize().unwrap();
        let css_path = temp_path.join("button.dark.css");

        std::fs::write(&css_path, ".a{}").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut watcher = FileWatcher::new(
            &temp_path,
            WatchConfig {
                latency: Duration::from_millis(100),
            },
        )
        .unwrap();

        std::fs::write(&css_path, ".a{color:red}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), watcher.recv()).await;
        match event {
            Ok(Some(event)) => assert_eq!(event.path, css_path),
            Ok(None) => panic!("Watcher stopped unexpectedly"),
            Err(_) => panic!("Timeout waiting for file change event"),
        }
    }
}
