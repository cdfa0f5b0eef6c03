//! Fuzzy full-text search over the storage tree.
//!
//! Every physical file (every version) is one entry. Matching and ranking
//! run on an in-memory tantivy index; archived entries and superseded
//! versions are dropped afterwards as requested.

pub mod entry;
pub mod index;
pub mod latest;
pub mod text;

pub use entry::{IndexEntry, is_indexable, relative_item_id};
pub use index::{
    BuildStats, IndexError, IndexResult, QueryOptions, SearchHit, SearchIndex, VersionScope,
};
pub use latest::LatestVersionTable;
pub use text::{TextIndex, TextMatch};
