//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! [reader]
//! index_page_log2 = 10
//! binary_page_log2 = 16
//!
//! [writer]
//! sync = true
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing. Page sizes are powers of two given as
//! their base-2 logarithm and must lie in [`MIN_PAGE_LOG2`]..=[`MAX_PAGE_LOG2`].

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default records per index page: 1024 nodes (8 KiB).
pub const DEFAULT_INDEX_PAGE_LOG2: u32 = 10;

/// Default bytes per binary page: 64 KiB.
pub const DEFAULT_BINARY_PAGE_LOG2: u32 = 16;

pub const MIN_PAGE_LOG2: u32 = 4;
pub const MAX_PAGE_LOG2: u32 = 24;

/// Registry configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Reader tuning
    pub reader: Option<ReaderConfig>,

    /// Writer behavior
    pub writer: Option<WriterConfig>,
}

impl RegistryConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(reader) = &self.reader {
            reader.validate()?;
        }
        Ok(())
    }
}

/// Reader page sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// log2 of index nodes per page
    pub index_page_log2: Option<u32>,

    /// log2 of binary artifact bytes per page
    pub binary_page_log2: Option<u32>,
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("reader.index_page_log2", self.index_page_log2),
            ("reader.binary_page_log2", self.binary_page_log2),
        ] {
            if let Some(v) = value {
                if !(MIN_PAGE_LOG2..=MAX_PAGE_LOG2).contains(&v) {
                    return Err(ConfigError::InvalidValue(format!(
                        "{} = {} is out of range ({}..={})",
                        key, v, MIN_PAGE_LOG2, MAX_PAGE_LOG2
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Writer behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    /// fsync artifacts before publishing
    pub sync: Option<bool>,
}
