//! Index entries derived from physical files.

use std::path::Path;

use serde::Serialize;

use crate::documents::version::{self, LogicalKey};
use crate::documents::{is_archived_path, module_of};

/// Markup punctuation replaced by spaces in free-text payloads.
const MARKUP_CHARS: &[char] = &['#', '*', '`', '>', '_', '-', '[', ']', '(', ')', '!'];

/// Extension of structured (tag-bearing) payloads.
const STRUCTURED_EXTENSION: &str = ".json";

/// One indexed physical file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// Path relative to the storage root, `/`-separated.
    pub item_id: String,
    #[serde(skip)]
    pub key: LogicalKey,
    /// First path segment (`notes`, `capsules`, `archive`, ...).
    pub module: String,
    pub title: String,
    /// Normalized text used for matching.
    #[serde(skip)]
    pub body: String,
    pub tags: Vec<String>,
    pub archived: bool,
    pub version: u32,
    /// Whether the version came from an explicit `.v<N>` suffix.
    #[serde(skip)]
    pub explicit_version: bool,
}

impl IndexEntry {
    /// Build an entry from a relative item id and the file's raw content.
    ///
    /// Never fails: structured payloads that do not parse are indexed as raw
    /// text with no tags.
    pub fn from_content(item_id: &str, content: &str) -> Self {
        let parsed = version::parse_name(item_id);
        let directory = item_id
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let key = parsed.tag.logical_key(directory);

        let mut title = parsed.tag.base.clone();
        let mut tags = Vec::new();
        let body = if parsed.tag.extension == STRUCTURED_EXTENSION {
            match serde_json::from_str::<serde_json::Value>(content) {
                Ok(value) => {
                    tags = extract_tags(&value);
                    if let Some(t) = value.get("title").and_then(|t| t.as_str()) {
                        if !t.trim().is_empty() {
                            title = t.to_string();
                        }
                    }
                    value.to_string()
                }
                Err(e) => {
                    crate::debug_event!("index", "malformed payload", "{item_id}: {e}");
                    content.to_string()
                }
            }
        } else {
            strip_markup(content)
        };

        Self {
            item_id: item_id.to_string(),
            module: module_of(item_id).to_string(),
            archived: is_archived_path(item_id),
            version: parsed.tag.version,
            explicit_version: parsed.is_explicit(),
            key,
            title,
            body,
            tags,
        }
    }
}

/// Replace markup punctuation with spaces so it does not pollute matching.
pub fn strip_markup(text: &str) -> String {
    text.chars()
        .map(|c| if MARKUP_CHARS.contains(&c) { ' ' } else { c })
        .collect()
}

/// String tags from a structured payload's `tags` array, de-duplicated.
fn extract_tags(value: &serde_json::Value) -> Vec<String> {
    let Some(items) = value.get("tags").and_then(|t| t.as_array()) else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::with_capacity(items.len());
    for tag in items.iter().filter_map(|t| t.as_str()) {
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// `/`-separated path of `path` relative to `root`, if it lies inside it.
pub fn relative_item_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Whether a file should be indexed: matching extension, no hidden segment.
pub fn is_indexable(item_id: &str, extensions: &[String]) -> bool {
    if item_id.split('/').any(|segment| segment.starts_with('.')) {
        return false;
    }
    let extension = version::parse(item_id).extension;
    extensions.iter().any(|e| {
        let e = e.strip_prefix('.').unwrap_or(e);
        extension.strip_prefix('.') == Some(e)
    })
}
