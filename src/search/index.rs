//! Searchable collection of entries over the storage tree.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use super::entry::{IndexEntry, is_indexable, relative_item_id};
use super::latest::LatestVersionTable;
use super::text::TextIndex;
use crate::config::SearchConfig;
use crate::documents::StoreChange;
use crate::documents::version::LogicalKey;

/// Errors from index maintenance.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path {path} is outside the storage root")]
    OutsideRoot { path: PathBuf },

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Which versions of a logical document a query may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScope {
    /// Only the highest version of each logical document.
    #[default]
    Latest,
    /// Every version.
    All,
}

/// Query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub include_archived: bool,
    pub versions: VersionScope,
    pub limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            include_archived: false,
            versions: VersionScope::Latest,
            limit: 20,
        }
    }
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub item_id: String,
    /// Same as `item_id`; kept for clients that address results by path.
    pub path: String,
    pub module: String,
    pub title: String,
    pub version: u32,
    pub archived: bool,
    pub tags: Vec<String>,
    /// Relevance in `[0, 1]`, higher is better.
    pub score: f64,
}

impl SearchHit {
    fn new(entry: &IndexEntry, score: f64) -> Self {
        Self {
            item_id: entry.item_id.clone(),
            path: entry.item_id.clone(),
            module: entry.module.clone(),
            title: entry.title.clone(),
            version: entry.version,
            archived: entry.archived,
            tags: entry.tags.clone(),
            score,
        }
    }
}

/// Statistics from a full build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub files_indexed: usize,
    pub files_skipped: usize,
}

/// Fuzzy-searchable collection of entries, one per physical file.
///
/// Owns the entries, their tantivy documents and the latest-version table.
/// Mutated only through [`add_or_update`](Self::add_or_update),
/// [`remove`](Self::remove) and their batch forms, either from the write
/// path or from the watcher's reconciliation loop.
#[derive(Debug)]
pub struct SearchIndex {
    root: PathBuf,
    extensions: Vec<String>,
    text: TextIndex,
    items: IndexMap<String, IndexEntry>,
    latest: LatestVersionTable,
}

impl SearchIndex {
    /// Empty index over `root`.
    pub fn new(root: impl Into<PathBuf>, config: &SearchConfig) -> IndexResult<Self> {
        Ok(Self {
            root: crate::documents::absolute_root(root.into()),
            extensions: config.extensions.clone(),
            text: TextIndex::new(config.threshold)?,
            items: IndexMap::new(),
            latest: LatestVersionTable::new(),
        })
    }

    /// Create `root` if needed and index every file beneath it.
    pub fn build(root: impl Into<PathBuf>, config: &SearchConfig) -> IndexResult<Self> {
        let mut index = Self::new(root, config)?;
        fs::create_dir_all(&index.root).map_err(|source| IndexError::Io {
            path: index.root.clone(),
            source,
        })?;
        index.rebuild()?;
        Ok(index)
    }

    /// Drop all entries and walk the storage root again.
    ///
    /// Unreadable directories and files are skipped with a warning.
    pub fn rebuild(&mut self) -> IndexResult<BuildStats> {
        self.items.clear();
        self.latest.clear();
        self.text.stage_clear()?;
        let root = self.root.clone();
        let stats = self.index_tree(&root)?;

        crate::log_event!(
            "index",
            "built",
            "{} entries ({} documents), {} skipped, root {}",
            stats.files_indexed,
            self.text.num_docs(),
            stats.files_skipped,
            self.root.display()
        );
        Ok(stats)
    }

    /// Index every file below `dir` (absolute or relative to the root).
    ///
    /// Hidden files and directories are not descended into. A file that
    /// cannot be read is counted as skipped and the walk goes on.
    pub fn index_tree(&mut self, dir: &Path) -> IndexResult<BuildStats> {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        };
        let mut stats = BuildStats::default();

        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(target: "index", "skipping unreadable path: {e}");
                    stats.files_skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match self.stage_file(entry.path()) {
                Ok(true) => stats.files_indexed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(target: "index", "skipping {}: {e}", entry.path().display());
                    stats.files_skipped += 1;
                }
            }
        }
        self.text.commit()?;
        Ok(stats)
    }

    /// Drop every entry at or below `path`. Returns how many were removed.
    pub fn remove_tree(&mut self, path: &Path) -> IndexResult<usize> {
        let (_, prefix) = self.resolve(path)?;
        let nested = format!("{prefix}/");
        let doomed: Vec<String> = self
            .items
            .keys()
            .filter(|id| **id == prefix || id.starts_with(&nested))
            .cloned()
            .collect();
        for item_id in &doomed {
            self.unstage(item_id)?;
        }
        self.text.commit()?;
        Ok(doomed.len())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&IndexEntry> {
        self.items.get(item_id)
    }

    pub fn latest_version(&self, key: &LogicalKey) -> Option<u32> {
        self.latest.latest(key)
    }

    /// Re-read one file and upsert its entry.
    ///
    /// `path` may be absolute or relative to the storage root. Returns
    /// `Ok(false)` for files that are not indexable.
    pub fn add_or_update(&mut self, path: &Path) -> IndexResult<bool> {
        let indexed = self.stage_file(path)?;
        if indexed {
            self.text.commit()?;
        }
        Ok(indexed)
    }

    /// Drop the entry for `path`, recomputing its key's latest version.
    ///
    /// Returns `Ok(false)` if the path was not indexed.
    pub fn remove(&mut self, path: &Path) -> IndexResult<bool> {
        let (_, item_id) = self.resolve(path)?;
        let removed = self.unstage(&item_id)?;
        if removed {
            self.text.commit()?;
        }
        Ok(removed)
    }

    /// Apply the physical changes reported by a store write.
    ///
    /// All changes land in one commit. A change that fails is logged and
    /// the rest are still applied.
    pub fn apply(&mut self, changes: &[StoreChange]) {
        for change in changes {
            let result = match change {
                StoreChange::Written(path) => self.stage_file(path).map(|_| ()),
                StoreChange::Removed(path) => self
                    .resolve(path)
                    .and_then(|(_, item_id)| self.unstage(&item_id))
                    .map(|_| ()),
            };
            if let Err(e) = result {
                tracing::warn!(target: "index", "failed to apply {change:?}: {e}");
            }
        }
        if let Err(e) = self.text.commit() {
            tracing::warn!(target: "index", "failed to commit store changes: {e}");
        }
    }

    /// Rank entries against `q`, then filter and truncate.
    ///
    /// Filters apply to the full ranked match set before truncation to
    /// `limit`, so an older version ranked first never pushes the latest
    /// version out of the result. An empty query, or one that fails inside
    /// the text index, returns nothing.
    pub fn query(&self, q: &str, options: &QueryOptions) -> Vec<SearchHit> {
        if options.limit == 0 {
            return Vec::new();
        }
        let matches = match self.text.search(q) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(target: "index", "query '{q}' failed: {e}");
                return Vec::new();
            }
        };

        let mut ranked: Vec<(f64, &IndexEntry)> = matches
            .into_iter()
            .filter_map(|m| self.items.get(&m.item_id).map(|entry| (m.score, entry)))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.item_id.cmp(&b.1.item_id)));

        ranked
            .into_iter()
            .filter(|(_, entry)| options.include_archived || !entry.archived)
            .filter(|(_, entry)| {
                options.versions == VersionScope::All
                    || self
                        .latest
                        .is_latest(&entry.key, entry.version, entry.explicit_version)
            })
            .take(options.limit)
            .map(|(score, entry)| SearchHit::new(entry, score))
            .collect()
    }

    /// Read one file and stage its entry without committing.
    fn stage_file(&mut self, path: &Path) -> IndexResult<bool> {
        let (absolute, item_id) = self.resolve(path)?;
        if !is_indexable(&item_id, &self.extensions) {
            return Ok(false);
        }

        let bytes = fs::read(&absolute).map_err(|source| IndexError::Io {
            path: absolute.clone(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);
        let entry = IndexEntry::from_content(&item_id, &content);

        self.text.stage(&entry)?;
        self.latest
            .record(&entry.key, &entry.item_id, entry.version, entry.explicit_version);
        self.items.insert(item_id, entry);
        Ok(true)
    }

    /// Stage removal of one entry without committing.
    fn unstage(&mut self, item_id: &str) -> IndexResult<bool> {
        let Some(entry) = self.items.swap_remove(item_id) else {
            return Ok(false);
        };
        self.text.stage_delete(item_id)?;
        self.latest.forget(&entry.key, &entry.item_id);
        Ok(true)
    }

    fn resolve(&self, path: &Path) -> IndexResult<(PathBuf, String)> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let item_id = relative_item_id(&self.root, &absolute).ok_or_else(|| {
            IndexError::OutsideRoot {
                path: absolute.clone(),
            }
        })?;
        Ok((absolute, item_id))
    }
}
