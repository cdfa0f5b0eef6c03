//! Change events flowing from the filesystem source to the reconciler.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind};

use crate::search::entry::relative_item_id;

/// What the source observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created, modified, or renamed into place.
    Changed,
    /// Deleted or renamed away.
    Removed,
}

/// One change to a path below the storage root.
///
/// The kind is advisory: the reconciler stats the path after the quiet
/// period and trusts what it finds on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: ChangeKind,
    /// Path relative to the storage root.
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Changed,
            path: path.into(),
        }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Removed,
            path: path.into(),
        }
    }

    /// Translate a notify event into relative change events.
    ///
    /// Access events are ignored, as are paths outside `root`.
    pub fn from_notify(event: &Event, root: &Path) -> Vec<WatchEvent> {
        let kind = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => ChangeKind::Changed,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
        };
        event
            .paths
            .iter()
            .filter_map(|path| relative_item_id(root, path))
            .map(|relative| WatchEvent {
                kind,
                path: PathBuf::from(relative),
            })
            .collect()
    }
}
