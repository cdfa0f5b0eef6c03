//! notify-backed producer of [`WatchEvent`]s.

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::WatchError;
use super::event::WatchEvent;
use crate::documents::version;
use crate::search::is_indexable;

/// Recursive watch over the storage root.
///
/// Forwards relative change events for indexable files (and for
/// extension-less paths, which may be directories) into a channel. Dropping
/// the source stops the watch and closes the channel.
pub struct FsEventSource {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FsEventSource {
    /// Start watching `root` recursively.
    pub fn start(
        root: &Path,
        extensions: Vec<String>,
        tx: mpsc::Sender<WatchEvent>,
    ) -> Result<Self, WatchError> {
        // Backends report canonical paths on some platforms.
        let root = root
            .canonicalize()
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
        let event_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(target: "watcher", "file watch error: {e}");
                    return;
                }
            };
            for change in WatchEvent::from_notify(&event, &event_root) {
                if !should_forward(&change.path, &extensions) {
                    continue;
                }
                // The receiver is gone only during shutdown.
                if tx.blocking_send(change).is_err() {
                    return;
                }
            }
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.clone(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "watching", "{}", root.display());

        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    /// Canonical root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hidden paths never pass; others pass when indexable or extension-less.
fn should_forward(relative: &Path, extensions: &[String]) -> bool {
    let id = relative.to_string_lossy().replace('\\', "/");
    if id.split('/').any(|segment| segment.starts_with('.')) {
        return false;
    }
    is_indexable(&id, extensions) || version::parse(&id).extension.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_forward() {
        let exts = vec![".md".to_string(), ".json".to_string()];
        assert!(should_forward(Path::new("notes/a.md"), &exts));
        assert!(should_forward(Path::new("imported"), &exts));
        assert!(!should_forward(Path::new("notes/.tmp123"), &exts));
        assert!(!should_forward(Path::new("notes/a.png"), &exts));
    }
}
