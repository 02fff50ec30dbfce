//! core::paths
//!
//! Centralized naming for registry artifacts.
//!
//! # Storage Layout
//!
//! A registry lives in one directory (or one archive prefix):
//! - `index.bin` - Radix index artifact
//! - `binaries.bin` - Compacted binary artifact
//! - `.binreg.lock` - Writer lock file
//! - `*.tmp-<uuid>` - Temporaries while the writer publishes
//!
//! The reader addresses artifacts by archive name, the writer by filesystem
//! path. Both go through [`RegistryPaths`] so the names never drift apart.
//!
//! # Example
//!
//! ```
//! use binreg::core::paths::RegistryPaths;
//! use std::path::PathBuf;
//!
//! let paths = RegistryPaths::new("/tmp/cache");
//! assert_eq!(paths.index_path(), PathBuf::from("/tmp/cache/index.bin"));
//! assert_eq!(RegistryPaths::index_name("vk/cache"), "vk/cache/index.bin");
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// File name of the radix index artifact.
pub const INDEX_FILE: &str = "index.bin";

/// File name of the compacted binary artifact.
pub const BINARIES_FILE: &str = "binaries.bin";

/// File name of the writer lock.
pub const LOCK_FILE: &str = ".binreg.lock";

/// Path routing for one registry directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPaths {
    root: PathBuf,
}

impl RegistryPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The registry directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn binaries_path(&self) -> PathBuf {
        self.root.join(BINARIES_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// A fresh temporary path next to `target`, on the same filesystem so the
    /// final rename is atomic.
    pub fn temp_path_for(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!("{}.tmp-{}", name, Uuid::new_v4()))
    }

    /// Archive name of the index artifact under `prefix`.
    pub fn index_name(prefix: &str) -> String {
        join_name(prefix, INDEX_FILE)
    }

    /// Archive name of the binary artifact under `prefix`.
    pub fn binaries_name(prefix: &str) -> String {
        join_name(prefix, BINARIES_FILE)
    }
}

fn join_name(prefix: &str, file: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", prefix, file)
    }
}
