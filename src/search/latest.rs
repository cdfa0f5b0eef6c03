//! Highest known version per logical document.

use std::collections::HashMap;

use crate::documents::version::LogicalKey;

/// Versions recorded for one logical key.
#[derive(Debug, Default, Clone)]
struct KeyVersions {
    max: u32,
    /// item id -> (version, explicit encoding)
    items: HashMap<String, (u32, bool)>,
}

impl KeyVersions {
    fn recompute(&mut self) {
        self.max = self.items.values().map(|(v, _)| *v).max().unwrap_or(0);
    }
}

/// Incrementally maintained `logical key -> max version` table.
///
/// Adds only ever raise the max. Removing the item holding the max rescans
/// the surviving items of that key (bounded by its version count); a key
/// with no items left is dropped.
#[derive(Debug, Default, Clone)]
pub struct LatestVersionTable {
    keys: HashMap<LogicalKey, KeyVersions>,
}

impl LatestVersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `item_id` holds `version` of `key`.
    pub fn record(&mut self, key: &LogicalKey, item_id: &str, version: u32, explicit: bool) {
        let entry = self.keys.entry(key.clone()).or_default();
        entry.items.insert(item_id.to_string(), (version, explicit));
        entry.max = entry.max.max(version);
    }

    /// Forget `item_id`; recompute the max if it held it.
    pub fn forget(&mut self, key: &LogicalKey, item_id: &str) {
        let Some(entry) = self.keys.get_mut(key) else {
            return;
        };
        let Some((version, _)) = entry.items.remove(item_id) else {
            return;
        };
        if entry.items.is_empty() {
            self.keys.remove(key);
        } else if version >= entry.max {
            entry.recompute();
        }
    }

    /// Highest version recorded for `key`.
    pub fn latest(&self, key: &LogicalKey) -> Option<u32> {
        self.keys.get(key).map(|k| k.max)
    }

    /// Whether an item with this version and encoding is the latest of `key`.
    ///
    /// When both encodings of the max version are present (`x.md` and
    /// `x.v1.md`), only the explicit one counts as latest.
    pub fn is_latest(&self, key: &LogicalKey, version: u32, explicit: bool) -> bool {
        let Some(entry) = self.keys.get(key) else {
            return false;
        };
        if version != entry.max {
            return false;
        }
        explicit
            || !entry
                .items
                .values()
                .any(|(v, is_explicit)| *v == version && *is_explicit)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
