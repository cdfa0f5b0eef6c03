//! Plain file access below the data root (notes, planner, tracker files).

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::store::{StoreError, StoreResult, absolute_root, write_atomic};
use super::types::StoreChange;
use super::version;

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    /// Path relative to the data root, `/`-separated.
    pub path: String,
    pub is_dir: bool,
    pub version: u32,
}

/// Read/write access to arbitrary files under one root.
///
/// Every relative path is checked before use: absolute paths, `..`
/// segments and hidden segments are rejected with
/// [`StoreError::InvalidPath`].
#[derive(Debug, Clone)]
pub struct FileTree {
    root: PathBuf,
}

impl FileTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: absolute_root(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path onto the root, rejecting anything that escapes it.
    pub fn resolve(&self, relative: &str) -> StoreResult<PathBuf> {
        let trimmed = relative.trim_matches('/');
        if trimmed.is_empty() {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }
        let path = Path::new(trimmed);
        for component in path.components() {
            match component {
                Component::Normal(part) if !part.to_string_lossy().starts_with('.') => {}
                _ => return Err(StoreError::InvalidPath(relative.to_string())),
            }
        }
        Ok(self.root.join(path))
    }

    /// Direct children of `folder`, directories first, then by name.
    ///
    /// A missing folder lists as empty.
    pub fn list(&self, folder: &str) -> StoreResult<Vec<FileInfo>> {
        let dir = self.resolve(folder)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = folder.trim_matches('/');
        let mut listing = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            listing.push(FileInfo {
                path: format!("{prefix}/{name}"),
                is_dir: entry.file_type()?.is_dir(),
                version: version::parse(&name).version,
                name,
            });
        }
        listing.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(listing)
    }

    pub fn read(&self, relative: &str) -> StoreResult<String> {
        let path = self.resolve(relative)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                what: relative.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace (or create) a file atomically.
    pub fn write(&self, relative: &str, content: &str) -> StoreResult<StoreChange> {
        let path = self.resolve(relative)?;
        write_atomic(&path, content.as_bytes())?;
        crate::debug_event!("files", "written", "{relative}");
        Ok(StoreChange::Written(path))
    }

    pub fn delete(&self, relative: &str) -> StoreResult<StoreChange> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(StoreError::NotFound {
                what: relative.to_string(),
            });
        }
        fs::remove_file(&path)?;
        crate::debug_event!("files", "deleted", "{relative}");
        Ok(StoreChange::Removed(path))
    }
}
