//! File-backed personal knowledge store.
//!
//! Documents are plain files under one data root. Capsules are versioned by
//! filename (`<base>[.v<N>].json`), archived by living under `archive/`, and
//! searchable through an in-memory fuzzy index that a file watcher keeps in
//! sync with edits made outside the application.

pub mod cli;
pub mod config;
pub mod documents;
#[cfg(feature = "http-server")]
pub mod http;
pub mod logging;
pub mod search;
pub mod watcher;

pub use config::Settings;
pub use documents::{
    Capsule, CapsuleInput, DocumentStore, DocumentVersion, FileTree, StoreChange, StoreError,
    VersionTag,
};
pub use search::{QueryOptions, SearchHit, SearchIndex, VersionScope};
pub use watcher::{Reconciler, WatchEvent};
