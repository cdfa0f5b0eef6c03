//! Per-path debouncing of change events.
//!
//! An editor save often arrives as several events for one file. Each event
//! resets that path's quiet period; the path is handed out once it has been
//! quiet for the full duration. Paths never delay each other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Debounces change events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last change timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// How long a path must be quiet before processing.
    duration: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given quiet period in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Record a change, resetting the quiet period for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Take all paths that have been quiet for the debounce duration.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready.sort();
        ready
    }

    /// Take every pending path regardless of age.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self.pending.drain().map(|(path, _)| path).collect();
        all.sort();
        all
    }
}
