//! Versioned documents stored as individual files.
//!
//! This module provides:
//! - The `<base>[.v<N>]<ext>` filename codec
//! - A store that groups version files into logical documents
//! - The archive-by-location convention
//! - Checked plain-file access for the other modules
//! - Bootstrap of the data tree (module folders, tracker seed file)

pub mod files;
pub mod store;
pub mod types;
pub mod version;

pub use files::{FileInfo, FileTree};
pub use store::{
    DocumentStore, StoreError, StoreResult, absolute_root, normalize_base, write_atomic,
};
pub use types::{
    Capsule, CapsuleInput, DocumentVersion, LogicalDocument, StoreChange, WriteOutcome,
};
pub use version::{LogicalKey, ParsedName, VersionEncoding, VersionTag};

use std::fs;
use std::path::Path;

/// Top-level folder whose subtree is considered archived.
pub const ARCHIVE_DIR: &str = "archive";

/// Folder holding capsule documents.
pub const CAPSULES_DIR: &str = "capsules";

/// Seed file for the habit tracker.
const HABITS_FILE: &str = "tracker/habits.json";

/// True iff the first segment of the `/`-separated relative path is `archive`.
///
/// Archive state is never stored; it is always derived from the location.
pub fn is_archived_path(relative: &str) -> bool {
    let mut segments = relative.trim_start_matches('/').split('/');
    segments.next() == Some(ARCHIVE_DIR) && segments.next().is_some()
}

/// Module a relative path belongs to: its first segment.
pub fn module_of(relative: &str) -> &str {
    relative
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
}

/// Create the module folders and seed files under `root` if missing.
///
/// Returns the folders that were created.
pub fn init_data_dir(root: &Path, folders: &[String]) -> std::io::Result<Vec<String>> {
    let mut created = Vec::new();
    for folder in folders {
        let path = root.join(folder);
        if !path.is_dir() {
            fs::create_dir_all(&path)?;
            crate::log_event!("init", "created folder", "{}", path.display());
            created.push(folder.clone());
        }
    }

    let habits = root.join(HABITS_FILE);
    if !habits.exists() {
        if let Some(parent) = habits.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&habits, "{\n  \"habits\": []\n}\n")?;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_archived_path() {
        assert!(is_archived_path("archive/notes/a.md"));
        assert!(is_archived_path("archive/capsules/x.v2.json"));
        assert!(!is_archived_path("notes/a.md"));
        assert!(!is_archived_path("notes/archive/a.md"));
        assert!(!is_archived_path("archive.md"));
        assert!(!is_archived_path("archived/a.md"));
    }

    #[test]
    fn test_module_of() {
        assert_eq!(module_of("notes/test.md"), "notes");
        assert_eq!(module_of("archive/notes/x.md"), "archive");
        assert_eq!(module_of("loose.md"), "loose.md");
    }

    #[test]
    fn test_init_data_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let folders = vec!["notes".to_string(), "tracker/logs".to_string()];

        let created = init_data_dir(temp.path(), &folders).unwrap();
        assert_eq!(created.len(), 2);
        assert!(temp.path().join("tracker/logs").is_dir());
        let habits = fs::read_to_string(temp.path().join("tracker/habits.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&habits).unwrap();
        assert_eq!(value["habits"], serde_json::json!([]));

        fs::write(temp.path().join("tracker/habits.json"), "{\"habits\":[1]}").unwrap();
        let created = init_data_dir(temp.path(), &folders).unwrap();
        assert!(created.is_empty());
        let habits = fs::read_to_string(temp.path().join("tracker/habits.json")).unwrap();
        assert_eq!(habits, "{\"habits\":[1]}");
    }
}
