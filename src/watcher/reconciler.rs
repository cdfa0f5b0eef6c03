//! Debounced reconciliation of the search index with disk state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::time::{Duration, MissedTickBehavior, interval};

use super::debouncer::Debouncer;
use super::event::{ChangeKind, WatchEvent};
use crate::search::SearchIndex;

/// Longest pause between checks for quiet paths.
const MAX_TICK: Duration = Duration::from_millis(100);

/// Shortest pause between checks for quiet paths.
const MIN_TICK: Duration = Duration::from_millis(5);

/// What one reconciliation did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// A file was (re)indexed.
    Indexed,
    /// A directory appeared; this many files below it were indexed.
    IndexedTree(usize),
    /// The path was gone; this many entries were dropped.
    Removed(usize),
    /// Nothing to do (not indexable, or an error was logged).
    Skipped,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub events: usize,
    pub indexed: usize,
    pub removed: usize,
    pub skipped: usize,
}

impl ReconcileStats {
    fn count(&mut self, outcome: Reconciliation) {
        match outcome {
            Reconciliation::Indexed => self.indexed += 1,
            Reconciliation::IndexedTree(n) => self.indexed += n,
            Reconciliation::Removed(n) => self.removed += n,
            Reconciliation::Skipped => self.skipped += 1,
        }
    }
}

/// Single consumer of [`WatchEvent`]s.
///
/// Events are debounced per path. Once a path has been quiet for the
/// debounce period the reconciler stats it: an existing file is re-indexed,
/// a missing path is removed from the index. A failed stat counts as a
/// deletion, which settles the race between an event and a later delete.
/// Errors are logged and never stop the loop.
pub struct Reconciler {
    index: Arc<RwLock<SearchIndex>>,
    root: PathBuf,
    debouncer: Debouncer,
    stats: ReconcileStats,
}

impl Reconciler {
    pub fn new(index: Arc<RwLock<SearchIndex>>, root: impl Into<PathBuf>, debounce_ms: u64) -> Self {
        Self {
            index,
            root: root.into(),
            debouncer: Debouncer::new(debounce_ms),
            stats: ReconcileStats::default(),
        }
    }

    /// Consume events until the channel closes, then flush what is pending.
    pub async fn run(mut self, mut rx: mpsc::Receiver<WatchEvent>) -> ReconcileStats {
        let tick = (self.debouncer.duration() / 2).clamp(MIN_TICK, MAX_TICK);
        // One timer for the whole loop: a busy path must not hold back the
        // quiet ones.
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        crate::log_event!("watcher", "started", "{}", self.root.display());

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.stats.events += 1;
                    crate::debug_event!(
                        "watcher",
                        match event.kind {
                            ChangeKind::Changed => "changed",
                            ChangeKind::Removed => "removed",
                        },
                        "{}",
                        event.path.display()
                    );
                    self.debouncer.record(event.path);
                }

                _ = ticker.tick() => {
                    for path in self.debouncer.take_ready() {
                        let outcome = self.reconcile(&path).await;
                        self.stats.count(outcome);
                    }
                }
            }
        }

        for path in self.debouncer.drain() {
            let outcome = self.reconcile(&path).await;
            self.stats.count(outcome);
        }
        crate::log_event!(
            "watcher",
            "stopped",
            "{} events, {} indexed, {} removed",
            self.stats.events,
            self.stats.indexed,
            self.stats.removed
        );
        self.stats
    }

    /// Bring the index in line with what is on disk at `path` right now.
    ///
    /// `path` is relative to the storage root; the index resolves it
    /// against its own root.
    pub async fn reconcile(&self, path: &Path) -> Reconciliation {
        let absolute = self.root.join(path);

        match tokio::fs::metadata(&absolute).await {
            Ok(meta) if meta.is_dir() => match self.index.write().await.index_tree(path) {
                Ok(stats) => {
                    crate::log_event!(
                        "watcher",
                        "indexed directory",
                        "{} ({} files)",
                        path.display(),
                        stats.files_indexed
                    );
                    Reconciliation::IndexedTree(stats.files_indexed)
                }
                Err(e) => {
                    tracing::warn!(target: "watcher", "failed to index {}: {e}", path.display());
                    Reconciliation::Skipped
                }
            },
            Ok(_) => match self.index.write().await.add_or_update(path) {
                Ok(true) => {
                    crate::log_event!("watcher", "reindexed", "{}", path.display());
                    Reconciliation::Indexed
                }
                Ok(false) => Reconciliation::Skipped,
                Err(e) => {
                    tracing::warn!(target: "watcher", "failed to index {}: {e}", path.display());
                    Reconciliation::Skipped
                }
            },
            Err(_) => match self.index.write().await.remove_tree(path) {
                Ok(0) => Reconciliation::Removed(0),
                Ok(n) => {
                    crate::log_event!("watcher", "removed", "{} ({n} entries)", path.display());
                    Reconciliation::Removed(n)
                }
                Err(e) => {
                    tracing::warn!(target: "watcher", "failed to remove {}: {e}", path.display());
                    Reconciliation::Skipped
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::search::QueryOptions;
    use std::fs;
    use tempfile::TempDir;

    fn index_for(root: &Path) -> Arc<RwLock<SearchIndex>> {
        let index = SearchIndex::build(root, &SearchConfig::default()).unwrap();
        Arc::new(RwLock::new(index))
    }

    #[tokio::test]
    async fn test_reconcile_indexes_existing_file() {
        let temp = TempDir::new().unwrap();
        let index = index_for(temp.path());
        let reconciler = Reconciler::new(index.clone(), temp.path(), 10);

        fs::create_dir_all(temp.path().join("notes")).unwrap();
        fs::write(temp.path().join("notes/new.md"), "fresh words").unwrap();

        let outcome = reconciler.reconcile(Path::new("notes/new.md")).await;
        assert_eq!(outcome, Reconciliation::Indexed);
        assert_eq!(
            index.read().await.query("fresh", &QueryOptions::default()).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_treated_as_deleted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("notes")).unwrap();
        fs::write(temp.path().join("notes/gone.md"), "soon gone").unwrap();
        let index = index_for(temp.path());
        let reconciler = Reconciler::new(index.clone(), temp.path(), 10);

        fs::remove_file(temp.path().join("notes/gone.md")).unwrap();
        let outcome = reconciler.reconcile(Path::new("notes/gone.md")).await;
        assert_eq!(outcome, Reconciliation::Removed(1));
        assert!(index.read().await.is_empty());

        // a second stat failure is not an error
        let outcome = reconciler.reconcile(Path::new("notes/gone.md")).await;
        assert_eq!(outcome, Reconciliation::Removed(0));
    }

    #[tokio::test]
    async fn test_unindexable_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let index = index_for(temp.path());
        let reconciler = Reconciler::new(index.clone(), temp.path(), 10);

        fs::write(temp.path().join("image.png"), [0u8, 1, 2]).unwrap();
        let outcome = reconciler.reconcile(Path::new("image.png")).await;
        assert_eq!(outcome, Reconciliation::Skipped);
        assert!(index.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_pending_on_close() {
        let temp = TempDir::new().unwrap();
        let index = index_for(temp.path());
        // long quiet period: only the final drain can process the events
        let reconciler = Reconciler::new(index.clone(), temp.path(), 60_000);

        fs::create_dir_all(temp.path().join("notes")).unwrap();
        fs::write(temp.path().join("notes/a.md"), "alpha").unwrap();

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(reconciler.run(rx));
        for _ in 0..3 {
            tx.send(WatchEvent::changed("notes/a.md")).await.unwrap();
        }
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats.events, 3);
        assert_eq!(stats.indexed, 1);
        assert!(index.read().await.get("notes/a.md").is_some());
    }
}
