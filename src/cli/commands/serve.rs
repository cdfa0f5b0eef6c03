//! Serve command - HTTP API with optional file watching.

use crate::config::Settings;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub bind: Option<String>,
    pub no_watch: bool,
}

#[cfg(feature = "http-server")]
pub async fn run(settings: Settings, args: ServeArgs) -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use tokio::sync::RwLock;

    use crate::documents::{DocumentStore, init_data_dir};
    use crate::http::{self, AppState};
    use crate::search::SearchIndex;

    let root = settings.data_root();
    init_data_dir(&root, &settings.storage.folders)
        .with_context(|| format!("failed to prepare {}", root.display()))?;

    let index = SearchIndex::build(&root, &settings.search)
        .with_context(|| format!("failed to index {}", root.display()))?;
    crate::log_event!("serve", "index ready", "{} entries", index.len());
    let index = Arc::new(RwLock::new(index));

    let watcher = if settings.watch.enabled && !args.no_watch {
        match crate::watcher::spawn(index.clone(), &root, &settings.watch, &settings.search) {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Direct writes still keep the index current.
                tracing::warn!(target: "watcher", "file watching disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let bind = args.bind.unwrap_or_else(|| settings.server.bind.clone());
    let state = AppState::new(DocumentStore::new(&root), index, settings.search.clone());
    let result = http::serve(state, &bind).await;

    if let Some(watcher) = watcher {
        let stats = watcher.shutdown().await;
        crate::debug_event!("serve", "watcher stopped", "{stats:?}");
    }
    result
}

#[cfg(not(feature = "http-server"))]
pub async fn run(_settings: Settings, _args: ServeArgs) -> anyhow::Result<()> {
    anyhow::bail!("HTTP server support is not compiled in. Rebuild with --features http-server")
}
