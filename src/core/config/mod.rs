//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. An explicit path (e.g. `--config`)
//! 2. `$BINREG_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/binreg/config.toml`
//! 4. `~/.binreg/config.toml` (canonical write location)
//!
//! Missing files are not an error; defaults apply.
//!
//! # Example
//!
//! ```no_run
//! use binreg::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("index page: 2^{} nodes", config.index_page_log2());
//! println!("fsync on publish: {}", config.sync_on_write());
//! ```

pub mod schema;

pub use schema::{ReaderConfig, RegistryConfig, WriterConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use schema::{DEFAULT_BINARY_PAGE_LOG2, DEFAULT_INDEX_PAGE_LOG2};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: RegistryConfig,
    /// Path the configuration was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration, preferring `explicit` over the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: RegistryConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Candidate locations, in precedence order.
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("BINREG_CONFIG") {
            paths.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_home).join("binreg/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".binreg/config.toml"));
        }
        paths
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.binreg/config.toml`.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".binreg/config.toml"))
    }

    /// Path this configuration came from, if it was loaded from a file.
    pub fn source_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed, writes a temp file in the same
    /// directory, then renames it into place.
    pub fn write_to(path: &Path, config: &RegistryConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// log2 of index nodes per page.
    ///
    /// Defaults to 10 (1024 nodes).
    pub fn index_page_log2(&self) -> u32 {
        self.file
            .reader
            .as_ref()
            .and_then(|r| r.index_page_log2)
            .unwrap_or(DEFAULT_INDEX_PAGE_LOG2)
    }

    /// log2 of binary artifact bytes per page.
    ///
    /// Defaults to 16 (64 KiB).
    pub fn binary_page_log2(&self) -> u32 {
        self.file
            .reader
            .as_ref()
            .and_then(|r| r.binary_page_log2)
            .unwrap_or(DEFAULT_BINARY_PAGE_LOG2)
    }

    /// Whether the writer fsyncs artifacts before publishing.
    ///
    /// Defaults to `true`.
    pub fn sync_on_write(&self) -> bool {
        self.file
            .writer
            .as_ref()
            .and_then(|w| w.sync)
            .unwrap_or(true)
    }
}
