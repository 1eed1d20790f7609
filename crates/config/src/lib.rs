//! Configuration loading, validation, and management for Storyloom.
//!
//! Loads configuration from `~/.storyloom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storyloom_core::id::VALID_ID_LENGTHS;

/// The root configuration structure.
///
/// Maps directly to `~/.storyloom/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Id minting
    #[serde(default)]
    pub ids: IdConfig,

    /// Content blob bounds and normalization
    #[serde(default)]
    pub content: ContentConfig,

    /// Advisory lock behavior
    #[serde(default)]
    pub locks: LockConfig,

    /// Context assembly bounds
    #[serde(default)]
    pub context: ContextConfig,
}

/// Where the tree document, its backup, and the blobs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Defaults to `~/.storyloom/story`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Primary tree document file name inside the data directory.
    #[serde(default = "default_tree_file")]
    pub tree_file: String,

    /// Backup tree document file name inside the data directory.
    #[serde(default = "default_backup_file")]
    pub backup_file: String,

    /// Blob directory name inside the data directory.
    #[serde(default = "default_blobs_dir")]
    pub blobs_dir: String,
}

fn default_data_dir() -> PathBuf {
    config_dir().join("story")
}
fn default_tree_file() -> String {
    "tree.json".into()
}
fn default_backup_file() -> String {
    "tree.backup.json".into()
}
fn default_blobs_dir() -> String {
    "blobs".into()
}

impl StorageConfig {
    pub fn tree_path(&self) -> PathBuf {
        self.data_dir.join(&self.tree_file)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(&self.backup_file)
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.data_dir.join(&self.blobs_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tree_file: default_tree_file(),
            backup_file: default_backup_file(),
            blobs_dir: default_blobs_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Id length in hex characters: 8, 16, or 32.
    #[serde(default = "default_id_length")]
    pub length: usize,
}

fn default_id_length() -> usize {
    8
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            length: default_id_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Maximum characters per blob.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Maximum lines per blob.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Maximum characters per line.
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,

    /// Maximum run of consecutive blank lines after normalization.
    #[serde(default = "default_max_blank_run")]
    pub max_blank_run: usize,

    /// Protect fenced code blocks from normalization.
    #[serde(default = "default_true")]
    pub preserve_code_blocks: bool,

    /// Write a JSON metadata sidecar next to each blob.
    #[serde(default = "default_true")]
    pub write_sidecars: bool,
}

fn default_max_chars() -> usize {
    2300
}
fn default_max_lines() -> usize {
    100
}
fn default_max_line_chars() -> usize {
    200
}
fn default_max_blank_run() -> usize {
    2
}
fn default_true() -> bool {
    true
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            max_lines: default_max_lines(),
            max_line_chars: default_max_line_chars(),
            max_blank_run: default_max_blank_run(),
            preserve_code_blocks: default_true(),
            write_sidecars: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Bounded wait for lock acquisition, in milliseconds.
    #[serde(default = "default_lock_wait_ms")]
    pub wait_ms: u64,
}

fn default_lock_wait_ms() -> u64 {
    5000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_ms: default_lock_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How many ancestor hops to collect.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Per-entry content truncation, in characters.
    #[serde(default = "default_max_chars_per_entry")]
    pub max_chars_per_entry: usize,
}

fn default_max_depth() -> usize {
    3
}
fn default_max_chars_per_entry() -> usize {
    500
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_chars_per_entry: default_max_chars_per_entry(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.storyloom/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `STORYLOOM_DATA_DIR` — storage data directory
    /// - `STORYLOOM_ID_LENGTH` — id length in hex characters
    /// - `STORYLOOM_LOCK_WAIT_MS` — lock acquisition wait
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(dir) = std::env::var("STORYLOOM_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }

        if let Ok(length) = std::env::var("STORYLOOM_ID_LENGTH") {
            config.ids.length = length
                .parse()
                .map_err(|_| ConfigError::ValidationError("STORYLOOM_ID_LENGTH must be a number".into()))?;
        }

        if let Ok(wait) = std::env::var("STORYLOOM_LOCK_WAIT_MS") {
            config.locks.wait_ms = wait
                .parse()
                .map_err(|_| ConfigError::ValidationError("STORYLOOM_LOCK_WAIT_MS must be a number".into()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_ID_LENGTHS.contains(&self.ids.length) {
            return Err(ConfigError::ValidationError(format!(
                "ids.length must be one of {VALID_ID_LENGTHS:?}, got {}",
                self.ids.length
            )));
        }

        if self.content.max_chars == 0 || self.content.max_lines == 0 {
            return Err(ConfigError::ValidationError(
                "content bounds must be greater than zero".into(),
            ));
        }

        if self.content.max_line_chars > self.content.max_chars {
            return Err(ConfigError::ValidationError(
                "content.max_line_chars cannot exceed content.max_chars".into(),
            ));
        }

        if self.locks.wait_ms == 0 {
            return Err(ConfigError::ValidationError(
                "locks.wait_ms must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `storyloom init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            ids: IdConfig::default(),
            content: ContentConfig::default(),
            locks: LockConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    dirs_home().join(".storyloom")
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ids.length, 8);
        assert_eq!(config.content.max_chars, 2300);
        assert_eq!(config.content.max_lines, 100);
        assert_eq!(config.content.max_line_chars, 200);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.ids.length, config.ids.length);
        assert_eq!(parsed.locks.wait_ms, config.locks.wait_ms);
    }

    #[test]
    fn invalid_id_length_rejected() {
        let config = AppConfig {
            ids: IdConfig { length: 7 },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_lock_wait_rejected() {
        let config = AppConfig {
            locks: LockConfig { wait_ms: 0 },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().ids.length, 8);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "[content]\nmax_chars = 5000").unwrap();
        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.content.max_chars, 5000);
        assert_eq!(config.content.max_lines, 100); // default preserved
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "this is {{ not toml").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_chars"));
        assert!(toml_str.contains("wait_ms"));
    }
}
