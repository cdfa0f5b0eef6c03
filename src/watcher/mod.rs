//! File watcher that keeps the search index in sync with external edits.
//!
//! # Architecture
//!
//! ```text
//! FsEventSource (notify, recursive)
//!         |  WatchEvent { kind, relative path }
//!         v
//!     mpsc channel
//!         |
//!         v
//! Reconciler (debounce per path, stat, add_or_update / remove)
//!         |
//!         v
//!   Arc<RwLock<SearchIndex>>
//! ```
//!
//! Writes made through the store update the index directly; this loop only
//! catches changes made outside it. The reconciler can be driven with
//! synthetic events, without a real watcher.

mod debouncer;
mod error;
mod event;
mod reconciler;
mod source;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use event::{ChangeKind, WatchEvent};
pub use reconciler::{ReconcileStats, Reconciler, Reconciliation};
pub use source::FsEventSource;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::config::{SearchConfig, WatchConfig};
use crate::search::SearchIndex;

/// Capacity of the event channel between source and reconciler.
const EVENT_BUFFER: usize = 1024;

/// A running watcher. Dropping it stops the watch without waiting.
pub struct WatchHandle {
    source: FsEventSource,
    task: JoinHandle<ReconcileStats>,
}

impl WatchHandle {
    /// Root being watched.
    pub fn root(&self) -> &Path {
        self.source.root()
    }

    /// Stop watching and wait for pending paths to be reconciled.
    pub async fn shutdown(self) -> ReconcileStats {
        let Self { source, task } = self;
        drop(source);
        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(target: "watcher", "reconciler task failed: {e}");
                ReconcileStats::default()
            }
        }
    }
}

/// Watch `root` and reconcile `index` in a background task.
pub fn spawn(
    index: Arc<RwLock<SearchIndex>>,
    root: &Path,
    watch: &WatchConfig,
    search: &SearchConfig,
) -> Result<WatchHandle, WatchError> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let source = FsEventSource::start(root, search.extensions.clone(), tx)?;
    let reconciler = Reconciler::new(index, source.root(), watch.debounce_ms);
    let task = tokio::spawn(reconciler.run(rx));

    crate::log_event!(
        "watcher",
        "monitoring",
        "{} (debounce {}ms)",
        source.root().display(),
        watch.debounce_ms
    );
    Ok(WatchHandle { source, task })
}
