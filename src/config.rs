//! Configuration module for the knowledge store.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CAPSULE_` and use double
//! underscores to separate nested levels:
//! - `CAPSULE_SERVER__BIND=0.0.0.0:8080` sets `server.bind`
//! - `CAPSULE_SEARCH__THRESHOLD=0.3` sets `search.threshold`
//! - `CAPSULE_WATCH__ENABLED=false` sets `watch.enabled`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file.
pub const CONFIG_DIR: &str = ".capsuleos";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CAPSULE_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Storage root
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// File watcher settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Data tree layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Tolerated edits per query token as a fraction of its length (at most two)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Result limit when the caller gives none
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on any requested limit
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Indexed file extensions
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// Keep the index in sync with external edits
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period before a changed path is reconciled
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Module folders created under the data root
    #[serde(default = "default_folders")]
    pub folders: Vec<String>,
}

/// Logging configuration.
///
/// `default` is the level for every target; `modules` overrides it per
/// target (`index = "debug"`).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_threshold() -> f64 {
    0.35
}
fn default_limit() -> usize {
    20
}
fn default_max_limit() -> usize {
    100
}
fn default_extensions() -> Vec<String> {
    vec![".md".to_string(), ".json".to_string()]
}
fn default_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    250
}
fn default_folders() -> Vec<String> {
    ["notes", "capsules", "planner", "tracker", "tracker/logs"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            watch: WatchConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            extensions: default_extensions(),
        }
    }
}

impl SearchConfig {
    /// Requested limit, defaulted and clamped to `[1, max_limit]`.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            folders: default_folders(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// The settings file is looked up in the nearest ancestor holding a
    /// `.capsuleos` directory, falling back to the current directory.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, then the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay inside field names.
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// `data_dir` as an absolute path, resolved against the current directory.
    ///
    /// Store, file tree and index must all be built from this one path.
    pub fn data_root(&self) -> PathBuf {
        crate::documents::absolute_root(self.data_dir.clone())
    }

    /// Find the settings file by walking up from the current directory.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `dir`.
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert!(settings.data_root().is_absolute());
        assert!(settings.data_root().ends_with("data"));
        assert_eq!(settings.server.bind, "127.0.0.1:5000");
        assert_eq!(settings.search.threshold, 0.35);
        assert_eq!(settings.search.extensions, vec![".md", ".json"]);
        assert!(settings.watch.enabled);
        assert!(settings.storage.folders.contains(&"tracker/logs".to_string()));
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
data_dir = "/srv/capsules"

[server]
bind = "0.0.0.0:8080"

[search]
threshold = 0.2
extensions = [".md"]

[watch]
enabled = false

[logging.modules]
index = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/capsules"));
        assert_eq!(settings.server.bind, "0.0.0.0:8080");
        assert_eq!(settings.search.threshold, 0.2);
        assert_eq!(settings.search.extensions, vec![".md"]);
        assert!(!settings.watch.enabled);
        assert_eq!(settings.logging.modules["index"], "debug");
        // Untouched sections keep defaults
        assert_eq!(settings.search.default_limit, 20);
        assert_eq!(settings.watch.debounce_ms, 250);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/settings.toml");

        let mut settings = Settings::default();
        settings.search.max_limit = 50;
        settings.watch.debounce_ms = 10;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.search.max_limit, 50);
        assert_eq!(loaded.watch.debounce_ms, 10);
    }

    #[test]
    fn test_init_config_file_respects_force() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.ends_with(".capsuleos/settings.toml"));
        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_effective_limit() {
        let search = SearchConfig::default();
        assert_eq!(search.effective_limit(None), 20);
        assert_eq!(search.effective_limit(Some(0)), 1);
        assert_eq!(search.effective_limit(Some(5)), 5);
        assert_eq!(search.effective_limit(Some(10_000)), 100);
    }
}
