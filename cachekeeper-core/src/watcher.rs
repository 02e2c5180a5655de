//! Hot reload of the configuration file.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::CacheManager;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches the directory holding the configuration file and asks the manager
/// to re-read it once writes to the file settle.
///
/// The watcher thread only holds a `Weak` reference; it stops by itself once
/// the manager is gone.
pub(crate) struct ConfigWatcher {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    processor: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl ConfigWatcher {
    pub(crate) fn start(path: &Path, manager: Weak<CacheManager>) -> CacheResult<Self> {
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| CacheError::Configuration(format!("{} does not name a file", path.display())))?;
        // editors replace files, so watch the parent rather than the file itself
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(err) => warn!(error = %err, "configuration watcher error"),
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        let running = Arc::new(AtomicBool::new(true));
        let processor = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("cachekeeper-config-watcher".to_string())
                .spawn(move || process_events(event_rx, file_name, manager, running))
                .map_err(|source| CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
        };

        info!(path = %path.display(), "watching cache configuration");
        Ok(Self {
            path: path.to_path_buf(),
            watcher: Some(watcher),
            processor: Some(processor),
            running,
        })
    }

    /// Stops watching and waits for the processor thread, unless called from
    /// that very thread.
    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.watcher = None;
        if let Some(processor) = self.processor.take() {
            if processor.thread().id() == thread::current().id() {
                // the loop sees the cleared flag and exits on its own
                return;
            }
            if processor.join().is_err() {
                error!(path = %self.path.display(), "configuration watcher thread panicked");
            }
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn touches(event: &Event, file_name: &OsStr) -> bool {
    !matches!(event.kind, EventKind::Access(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}

fn process_events(
    events: Receiver<Event>,
    file_name: OsString,
    manager: Weak<CacheManager>,
    running: Arc<AtomicBool>,
) {
    let mut pending: Option<Instant> = None;

    while running.load(Ordering::Acquire) {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if touches(&event, &file_name) {
                    pending = Some(Instant::now());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if pending.is_some_and(|seen| seen.elapsed() >= DEBOUNCE) {
            pending = None;
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.reload_configuration();
        }
    }
    debug!("configuration watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, ModifyKind};

    #[test]
    fn test_touches_matches_file_name_only() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/etc/app/caches.toml"));
        assert!(touches(&event, OsStr::new("caches.toml")));
        assert!(!touches(&event, OsStr::new("other.toml")));

        let read = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/etc/app/caches.toml"));
        assert!(!touches(&read, OsStr::new("caches.toml")));
    }

    #[test]
    fn test_watcher_stops_without_manager() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caches.toml");
        std::fs::write(&path, "").unwrap();

        let mut watcher = ConfigWatcher::start(&path, Weak::new()).unwrap();
        watcher.stop();
        assert!(watcher.processor.is_none());
    }
}
