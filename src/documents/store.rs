//! Versioned document storage on the filesystem.
//!
//! Every logical document is an append-only sequence of immutable version
//! files `<base>[.v<N>].json` inside one collection directory, either the
//! active one (`capsules/`) or its archived twin (`archive/capsules/`).
//! Logical identity comes from the `id` field inside each payload, so the
//! title may change without renaming the base.
//!
//! Version bumps are read-then-write: two concurrent updates of the same
//! document can both observe max = N and both write N + 1, the later rename
//! replacing the earlier file. Callers that update one document from several
//! tasks must serialize those updates (the HTTP layer holds the store behind
//! a single mutex).

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::types::{Capsule, CapsuleInput, DocumentVersion, LogicalDocument, StoreChange, WriteOutcome};
use super::version::{self, ParsedName};
use super::{ARCHIVE_DIR, CAPSULES_DIR};

/// Errors from document storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed payload in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Base name '{base}' is already used in {dir}")]
    Conflict { base: String, dir: PathBuf },

    #[error("Failed to persist file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound { what: what.into() }
    }
}

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Longest base name derived from a title, in characters.
const MAX_BASE_CHARS: usize = 100;

/// One physical version file found on disk.
#[derive(Debug, Clone)]
struct PhysicalFile {
    path: PathBuf,
    name: ParsedName,
}

/// Where a logical document currently lives.
#[derive(Debug)]
struct Located {
    dir: PathBuf,
    archived: bool,
    base: String,
    files: Vec<PhysicalFile>,
}

impl Located {
    fn max_version(&self) -> u32 {
        self.files.iter().map(|f| f.name.tag.version).max().unwrap_or(1)
    }
}

/// Filesystem-backed store of versioned JSON documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    collection: String,
    extension: String,
}

impl DocumentStore {
    /// Store for capsules under `root/capsules`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_collection(root, CAPSULES_DIR, ".json")
    }

    /// Store for an arbitrary collection folder and payload extension.
    pub fn with_collection(
        root: impl Into<PathBuf>,
        collection: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let extension = extension.into();
        let extension = if extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self {
            root: absolute_root(root.into()),
            collection: collection.into(),
            extension,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Directory holding active (non-archived) documents.
    pub fn active_dir(&self) -> PathBuf {
        self.root.join(&self.collection)
    }

    /// Directory holding archived documents.
    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR).join(&self.collection)
    }

    fn dir_for(&self, archived: bool) -> PathBuf {
        if archived {
            self.archive_dir()
        } else {
            self.active_dir()
        }
    }

    /// Latest version of every document in the active or archived directory.
    pub fn list_latest(&self, archived: bool) -> StoreResult<Vec<LogicalDocument>> {
        self.list_latest_in(&self.dir_for(archived))
    }

    /// Latest version of every document found in `dir`.
    ///
    /// Files are grouped by `(base, ext)` and the highest version wins. When
    /// both encodings of version 1 exist, the explicit `.v1` file is used.
    /// Files whose payload does not parse are skipped.
    pub fn list_latest_in(&self, dir: &Path) -> StoreResult<Vec<LogicalDocument>> {
        let archived = self.is_archive_dir(dir);
        let mut latest: HashMap<(String, String), PhysicalFile> = HashMap::new();

        for file in self.scan(dir)? {
            let key = (file.name.tag.base.clone(), file.name.tag.extension.clone());
            let replace = latest
                .get(&key)
                .is_none_or(|current| supersedes(&file.name, &current.name));
            if replace {
                latest.insert(key, file);
            }
        }

        let mut documents = Vec::with_capacity(latest.len());
        for file in latest.into_values() {
            match self.load(&file, archived) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(target: "store", "skipping {}: {e}", file.path.display());
                }
            }
        }
        Ok(documents)
    }

    /// Every stored version of the document with identifier `id`, ascending.
    pub fn read_all_versions(&self, id: &str) -> StoreResult<Vec<DocumentVersion>> {
        let mut by_version: HashMap<u32, (ParsedName, DocumentVersion)> = HashMap::new();

        for archived in [false, true] {
            for file in self.scan(&self.dir_for(archived))? {
                let Ok(doc) = self.load(&file, archived) else {
                    continue;
                };
                if doc.capsule.id != id {
                    continue;
                }
                let keep = match by_version.get(&doc.version) {
                    Some((existing, _)) => supersedes(&file.name, existing),
                    None => true,
                };
                if keep {
                    by_version.insert(doc.version, (file.name.clone(), doc));
                }
            }
        }

        if by_version.is_empty() {
            return Err(StoreError::not_found(format!("document {id}")));
        }

        let mut versions: Vec<DocumentVersion> =
            by_version.into_values().map(|(_, doc)| doc).collect();
        versions.sort_by_key(|doc| doc.version);
        Ok(versions)
    }

    /// Create a new document, or append a version to an existing one.
    ///
    /// A new document gets a fresh identifier (unless one was supplied) and a
    /// base derived from its title. Updating a document whose only version is
    /// the unsuffixed `base.json` first renames it to `base.v1.json`.
    pub fn create_or_update(&self, input: CapsuleInput) -> StoreResult<WriteOutcome> {
        let located = match input.id.as_deref() {
            Some(id) => self.locate(id)?,
            None => None,
        };

        match located {
            Some(located) => self.append_version(located, input),
            None => self.create(input),
        }
    }

    fn create(&self, input: CapsuleInput) -> StoreResult<WriteOutcome> {
        let id = input
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let base = self.allocate_base(&input.title)?;
        let dir = self.dir_for(input.archived);
        let now = Utc::now();

        let capsule = Capsule {
            id,
            title: input.title,
            tags: input.tags,
            payload: input.payload,
            created_at: Some(now),
            updated_at: Some(now),
        };

        let path = dir.join(version::format(&base, 1, &self.extension));
        write_atomic(&path, &serde_json::to_vec_pretty(&capsule)?)?;
        crate::debug_event!("store", "created", "{}", path.display());

        Ok(WriteOutcome {
            document: DocumentVersion {
                base,
                version: 1,
                path: self.relative(&path),
                archived: input.archived,
                capsule,
            },
            changes: vec![StoreChange::Written(path)],
        })
    }

    fn append_version(&self, located: Located, input: CapsuleInput) -> StoreResult<WriteOutcome> {
        let current_max = located.max_version();
        let created_at = self
            .latest_file(&located)
            .and_then(|file| self.load(file, located.archived).ok())
            .and_then(|doc| doc.capsule.created_at);

        let mut changes = self.migrate_implicit_v1(&located)?;

        let next = current_max + 1;
        let capsule = Capsule {
            id: input.id.unwrap_or_default(),
            title: input.title,
            tags: input.tags,
            payload: input.payload,
            created_at: created_at.or_else(|| Some(Utc::now())),
            updated_at: Some(Utc::now()),
        };

        let path = located
            .dir
            .join(version::format(&located.base, next, &self.extension));
        write_atomic(&path, &serde_json::to_vec_pretty(&capsule)?)?;
        crate::debug_event!("store", "versioned", "{} -> v{next}", located.base);
        changes.push(StoreChange::Written(path.clone()));

        Ok(WriteOutcome {
            document: DocumentVersion {
                base: located.base,
                version: next,
                path: self.relative(&path),
                archived: located.archived,
                capsule,
            },
            changes,
        })
    }

    /// Delete every version file of the document with identifier `id`.
    pub fn delete(&self, id: &str) -> StoreResult<Vec<StoreChange>> {
        let located = self
            .locate(id)?
            .ok_or_else(|| StoreError::not_found(format!("document {id}")))?;

        let mut changes = Vec::with_capacity(located.files.len());
        for file in &located.files {
            fs::remove_file(&file.path)?;
            changes.push(StoreChange::Removed(file.path.clone()));
        }
        crate::debug_event!("store", "deleted", "{} ({} files)", located.base, changes.len());
        Ok(changes)
    }

    /// Copy version `target` of `base` to a new trailing version.
    ///
    /// History is never overwritten: the restored payload is written as
    /// `max + 1`, byte-for-byte identical to the source version.
    pub fn restore(&self, base: &str, target: u32) -> StoreResult<WriteOutcome> {
        let located = self
            .locate_base(base)?
            .ok_or_else(|| StoreError::not_found(format!("document {base}")))?;

        // The explicit `.v1` file wins over the plain one when both exist.
        let candidates = if target == 1 {
            vec![
                version::format_explicit(base, 1, &self.extension),
                version::format(base, 1, &self.extension),
            ]
        } else {
            vec![version::format(base, target, &self.extension)]
        };
        let source = candidates
            .into_iter()
            .map(|name| located.dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| StoreError::not_found(format!("{base} version {target}")))?;

        let bytes = fs::read(&source)?;
        let capsule: Capsule = serde_json::from_slice(&bytes).map_err(|source_err| StoreError::Json {
            path: source.clone(),
            source: source_err,
        })?;

        let next = located.max_version() + 1;
        let mut changes = self.migrate_implicit_v1(&located)?;

        let path = located.dir.join(version::format(base, next, &self.extension));
        write_atomic(&path, &bytes)?;
        crate::debug_event!("store", "restored", "{base} v{target} -> v{next}");
        changes.push(StoreChange::Written(path.clone()));

        Ok(WriteOutcome {
            document: DocumentVersion {
                base: base.to_string(),
                version: next,
                path: self.relative(&path),
                archived: located.archived,
                capsule,
            },
            changes,
        })
    }

    /// Sorted, de-duplicated version numbers stored for `base`.
    pub fn versions(&self, base: &str) -> StoreResult<Vec<u32>> {
        let located = self
            .locate_base(base)?
            .ok_or_else(|| StoreError::not_found(format!("document {base}")))?;

        let mut versions: Vec<u32> = located.files.iter().map(|f| f.name.tag.version).collect();
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// Move every version of a document into or out of the archive.
    ///
    /// Files are renamed one by one. If a rename fails midway the error is
    /// returned and the versions already moved stay where they are.
    pub fn set_archived(&self, id: &str, archived: bool) -> StoreResult<Vec<StoreChange>> {
        let located = self
            .locate(id)?
            .ok_or_else(|| StoreError::not_found(format!("document {id}")))?;
        if located.archived == archived {
            return Ok(Vec::new());
        }

        let target_dir = self.dir_for(archived);
        let clash = self
            .scan(&target_dir)?
            .into_iter()
            .any(|f| f.name.tag.base == located.base);
        if clash {
            return Err(StoreError::Conflict {
                base: located.base,
                dir: target_dir,
            });
        }

        fs::create_dir_all(&target_dir)?;
        let mut changes = Vec::with_capacity(located.files.len() * 2);
        for file in &located.files {
            let Some(name) = file.path.file_name() else {
                continue;
            };
            let destination = target_dir.join(name);
            fs::rename(&file.path, &destination)?;
            changes.push(StoreChange::Removed(file.path.clone()));
            changes.push(StoreChange::Written(destination));
        }
        crate::log_event!(
            "store",
            if archived { "archived" } else { "unarchived" },
            "{} ({} versions)",
            located.base,
            located.files.len()
        );
        Ok(changes)
    }

    /// Find the document whose payload carries `id`.
    fn locate(&self, id: &str) -> StoreResult<Option<Located>> {
        for archived in [false, true] {
            let dir = self.dir_for(archived);
            let files = self.scan(&dir)?;
            let owner = files.iter().find(|file| {
                self.load(file, archived)
                    .map(|doc| doc.capsule.id == id)
                    .unwrap_or(false)
            });
            if let Some(owner) = owner {
                let base = owner.name.tag.base.clone();
                let files = files
                    .into_iter()
                    .filter(|f| f.name.tag.base == base)
                    .collect();
                return Ok(Some(Located {
                    dir,
                    archived,
                    base,
                    files,
                }));
            }
        }
        Ok(None)
    }

    /// Find the directory holding files for `base`, active first.
    fn locate_base(&self, base: &str) -> StoreResult<Option<Located>> {
        for archived in [false, true] {
            let dir = self.dir_for(archived);
            let files: Vec<PhysicalFile> = self
                .scan(&dir)?
                .into_iter()
                .filter(|f| f.name.tag.base == base)
                .collect();
            if !files.is_empty() {
                return Ok(Some(Located {
                    dir,
                    archived,
                    base: base.to_string(),
                    files,
                }));
            }
        }
        Ok(None)
    }

    fn latest_file<'a>(&self, located: &'a Located) -> Option<&'a PhysicalFile> {
        located
            .files
            .iter()
            .reduce(|best, f| if supersedes(&f.name, &best.name) { f } else { best })
    }

    /// Rename an unsuffixed v1 file to `base.v1.ext` before the first bump.
    ///
    /// Only applies while the document has no version above 1. Skipped when
    /// the explicit file already exists, which makes it idempotent.
    fn migrate_implicit_v1(&self, located: &Located) -> StoreResult<Vec<StoreChange>> {
        if located.max_version() != 1 {
            return Ok(Vec::new());
        }
        if located.files.iter().any(|f| f.name.is_explicit()) {
            return Ok(Vec::new());
        }
        let Some(plain) = located.files.iter().find(|f| !f.name.is_explicit()) else {
            return Ok(Vec::new());
        };

        let explicit = located
            .dir
            .join(version::format_explicit(&located.base, 1, &self.extension));
        fs::rename(&plain.path, &explicit)?;
        crate::debug_event!("store", "migrated", "{} -> {}", plain.path.display(), explicit.display());
        Ok(vec![
            StoreChange::Removed(plain.path.clone()),
            StoreChange::Written(explicit),
        ])
    }

    /// Pick an unused base name for `title` across active and archived dirs.
    fn allocate_base(&self, title: &str) -> StoreResult<String> {
        let wanted = normalize_base(title);
        let mut taken = Vec::new();
        for archived in [false, true] {
            taken.extend(
                self.scan(&self.dir_for(archived))?
                    .into_iter()
                    .map(|f| f.name.tag.base),
            );
        }

        if !taken.contains(&wanted) {
            return Ok(wanted);
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{wanted}-{n}");
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Version files with this store's extension in `dir`. Missing dir is empty.
    fn scan(&self, dir: &Path) -> StoreResult<Vec<PhysicalFile>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            let name = version::parse_name(&path);
            if name.tag.extension != self.extension {
                continue;
            }
            files.push(PhysicalFile { path, name });
        }
        Ok(files)
    }

    fn load(&self, file: &PhysicalFile, archived: bool) -> StoreResult<DocumentVersion> {
        let bytes = fs::read(&file.path)?;
        let capsule: Capsule = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: file.path.clone(),
            source,
        })?;
        Ok(DocumentVersion {
            base: file.name.tag.base.clone(),
            version: file.name.tag.version,
            path: self.relative(&file.path),
            archived,
            capsule,
        })
    }

    fn is_archive_dir(&self, dir: &Path) -> bool {
        dir.strip_prefix(&self.root)
            .map(|rel| super::is_archived_path(&rel.to_string_lossy().replace('\\', "/")))
            .unwrap_or(false)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// `root` made absolute against the current directory.
///
/// Store, file tree and search index all resolve their root this way, so the
/// paths reported in [`StoreChange`]s line up with the index's item ids.
pub fn absolute_root(root: PathBuf) -> PathBuf {
    std::path::absolute(&root).unwrap_or(root)
}

/// Whether `candidate` should replace `current` as the authoritative file.
///
/// Higher versions win; at equal versions the explicit `.v<N>` encoding wins.
fn supersedes(candidate: &ParsedName, current: &ParsedName) -> bool {
    match candidate.tag.version.cmp(&current.tag.version) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.is_explicit() && !current.is_explicit(),
    }
}

/// Derive a filesystem-safe base name from a display title.
///
/// Keeps letters, digits, spaces, `-` and `_`; everything else (including
/// `.`, so a title can never look like a version suffix) becomes `_`.
pub fn normalize_base(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASE_CHARS)
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Write through a temporary file in the target directory, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::InvalidPath(path.display().to_string()))?;
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn input(title: &str) -> CapsuleInput {
        CapsuleInput {
            title: title.to_string(),
            tags: vec!["t".to_string()],
            payload: json!({ "a": 1 }),
            ..Default::default()
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_create_writes_unsuffixed_v1() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());

        let outcome = store.create_or_update(input("Test")).unwrap();
        assert_eq!(outcome.document.base, "Test");
        assert_eq!(outcome.document.version, 1);
        assert!(!outcome.document.capsule.id.is_empty());
        assert_eq!(file_names(&store.active_dir()), vec!["Test.json"]);
        assert_eq!(
            outcome.changes,
            vec![StoreChange::Written(store.active_dir().join("Test.json"))]
        );
    }

    #[test]
    fn test_first_update_migrates_v1_to_explicit_suffix() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());

        let created = store.create_or_update(input("Test")).unwrap();
        let id = created.document.capsule.id.clone();

        let mut update = input("Test updated");
        update.id = Some(id.clone());
        let updated = store.create_or_update(update).unwrap();

        assert_eq!(updated.document.version, 2);
        assert_eq!(updated.document.base, "Test");
        assert_eq!(updated.document.capsule.id, id);
        assert_eq!(
            file_names(&store.active_dir()),
            vec!["Test.v1.json", "Test.v2.json"]
        );
        let dir = store.active_dir();
        assert_eq!(
            updated.changes,
            vec![
                StoreChange::Removed(dir.join("Test.json")),
                StoreChange::Written(dir.join("Test.v1.json")),
                StoreChange::Written(dir.join("Test.v2.json")),
            ]
        );
    }

    #[test]
    fn test_migration_skipped_when_explicit_v1_exists() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let created = store.create_or_update(input("Dual")).unwrap();
        let dir = store.active_dir();
        fs::copy(dir.join("Dual.json"), dir.join("Dual.v1.json")).unwrap();

        let mut update = input("Dual");
        update.id = Some(created.document.capsule.id);
        let updated = store.create_or_update(update).unwrap();

        assert_eq!(updated.document.version, 2);
        assert_eq!(updated.changes.len(), 1);
        assert_eq!(
            file_names(&dir),
            vec!["Dual.json", "Dual.v1.json", "Dual.v2.json"]
        );
    }

    #[test]
    fn test_list_latest_keeps_only_max_version() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let created = store.create_or_update(input("Alpha")).unwrap();
        let id = created.document.capsule.id;
        for title in ["Alpha 2", "Alpha 3"] {
            let mut update = input(title);
            update.id = Some(id.clone());
            store.create_or_update(update).unwrap();
        }
        store.create_or_update(input("Beta")).unwrap();

        let mut latest = store.list_latest(false).unwrap();
        latest.sort_by(|a, b| a.base.cmp(&b.base));
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].base, "Alpha");
        assert_eq!(latest[0].version, 3);
        assert_eq!(latest[0].capsule.title, "Alpha 3");
        assert_eq!(latest[1].version, 1);
    }

    #[test]
    fn test_list_latest_skips_malformed_payloads() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        store.create_or_update(input("Good")).unwrap();
        fs::write(store.active_dir().join("Broken.json"), "{ not json").unwrap();

        let latest = store.list_latest(false).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].base, "Good");
    }

    #[test]
    fn test_read_all_versions_sorted_by_version() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let created = store.create_or_update(input("Hist")).unwrap();
        let id = created.document.capsule.id;
        let mut update = input("Hist renamed");
        update.id = Some(id.clone());
        store.create_or_update(update).unwrap();

        let versions = store.read_all_versions(&id).unwrap();
        let numbers: Vec<u32> = versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(versions[1].capsule.title, "Hist renamed");

        assert!(matches!(
            store.read_all_versions("missing"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_then_restore_appends_new_version() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let created = store.create_or_update(input("Test")).unwrap();
        let id = created.document.capsule.id.clone();
        let original = fs::read(store.active_dir().join("Test.json")).unwrap();

        let mut update = input("Test updated");
        update.id = Some(id);
        store.create_or_update(update).unwrap();

        let restored = store.restore("Test", 1).unwrap();
        assert_eq!(restored.document.version, 3);
        assert_eq!(restored.document.capsule.title, "Test");
        assert_eq!(store.versions("Test").unwrap(), vec![1, 2, 3]);

        let copy = fs::read(store.active_dir().join("Test.v3.json")).unwrap();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_restore_missing_version_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        store.create_or_update(input("Only")).unwrap();

        assert!(matches!(
            store.restore("Only", 5),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.restore("Nope", 1),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_restore_prefers_explicit_v1() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        store.create_or_update(input("Dual")).unwrap();
        let dir = store.active_dir();

        let mut explicit: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.join("Dual.json")).unwrap()).unwrap();
        explicit["title"] = json!("explicit");
        fs::write(dir.join("Dual.v1.json"), explicit.to_string()).unwrap();

        let restored = store.restore("Dual", 1).unwrap();
        assert_eq!(restored.document.version, 2);
        assert_eq!(restored.document.capsule.title, "explicit");
        assert_eq!(
            fs::read(dir.join("Dual.v2.json")).unwrap(),
            fs::read(dir.join("Dual.v1.json")).unwrap()
        );

        // history agrees on which file is version 1
        let id = restored.document.capsule.id.clone();
        let history = store.read_all_versions(&id).unwrap();
        assert_eq!(history[0].capsule.title, "explicit");
    }

    #[test]
    fn test_delete_removes_every_version() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let created = store.create_or_update(input("Gone")).unwrap();
        let id = created.document.capsule.id;
        let mut update = input("Gone");
        update.id = Some(id.clone());
        store.create_or_update(update).unwrap();
        store.create_or_update(input("Kept")).unwrap();

        let changes = store.delete(&id).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(file_names(&store.active_dir()), vec!["Kept.json"]);
        assert!(matches!(store.delete(&id), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_archive_moves_all_versions() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let created = store.create_or_update(input("Box")).unwrap();
        let id = created.document.capsule.id;
        let mut update = input("Box");
        update.id = Some(id.clone());
        store.create_or_update(update).unwrap();

        let changes = store.set_archived(&id, true).unwrap();
        assert_eq!(changes.len(), 4);
        assert!(file_names(&store.active_dir()).is_empty());
        assert_eq!(
            file_names(&store.archive_dir()),
            vec!["Box.v1.json", "Box.v2.json"]
        );

        let archived = store.list_latest(true).unwrap();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].archived);
        assert_eq!(archived[0].version, 2);

        assert!(store.set_archived(&id, true).unwrap().is_empty());
        store.set_archived(&id, false).unwrap();
        assert!(file_names(&store.archive_dir()).is_empty());
    }

    #[test]
    fn test_create_archived_and_unique_bases() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let mut archived = input("Beta");
        archived.archived = true;
        let first = store.create_or_update(archived).unwrap();
        assert!(first.document.archived);
        assert_eq!(first.document.path, PathBuf::from("archive/capsules/Beta.json"));

        let second = store.create_or_update(input("Beta")).unwrap();
        assert_eq!(second.document.base, "Beta-2");
    }

    #[test]
    fn test_supplied_unknown_id_creates_document() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path());
        let mut with_id = input("Seeded");
        with_id.id = Some("fixed-id".to_string());
        let outcome = store.create_or_update(with_id).unwrap();
        assert_eq!(outcome.document.capsule.id, "fixed-id");
        assert_eq!(outcome.document.version, 1);
    }

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("Test"), "Test");
        assert_eq!(normalize_base("  Meeting notes  "), "Meeting notes");
        assert_eq!(normalize_base("Idea.v2"), "Idea_v2");
        assert_eq!(normalize_base("a/b\\c"), "a_b_c");
        assert_eq!(normalize_base("   "), "untitled");
    }
}
