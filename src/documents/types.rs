//! Core types for versioned capsule documents.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored payload of one capsule version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capsule {
    /// Logical identifier, stable across versions and title changes.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to create a capsule or append a version to an existing one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsuleInput {
    /// Existing identifier to update; `None` creates a new document.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Only honoured on creation. Use `DocumentStore::set_archived` to move
    /// an existing document.
    #[serde(default)]
    pub archived: bool,
}

/// One physical version of a logical document, with its parsed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    /// Base filename shared by every version of the document.
    pub base: String,
    pub version: u32,
    /// Path relative to the storage root.
    pub path: PathBuf,
    pub archived: bool,
    #[serde(flatten)]
    pub capsule: Capsule,
}

/// The latest version of a logical document.
pub type LogicalDocument = DocumentVersion;

/// A physical change performed by the store.
///
/// Paths are absolute so they can be handed straight to the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Written(PathBuf),
    Removed(PathBuf),
}

impl StoreChange {
    pub fn path(&self) -> &PathBuf {
        match self {
            StoreChange::Written(path) | StoreChange::Removed(path) => path,
        }
    }
}

/// Result of a write: the stored version plus every file it touched.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub document: DocumentVersion,
    pub changes: Vec<StoreChange>,
}
