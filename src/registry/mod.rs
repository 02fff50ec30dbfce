//! registry
//!
//! The compiled-program binary registry: a write-once, read-many store that
//! de-duplicates binaries by content and finds them by
//! [`ProgramIdentifier`] through an on-disk radix index.
//!
//! # Modules
//!
//! - [`writer`] - Collects binaries during a run and publishes the artifacts
//! - [`reader`] - Opens published artifacts lazily and resolves lookups
//! - [`lock`] - Exclusive lock on a registry directory while publishing
//!
//! # Errors
//!
//! A miss is [`RegistryError::ProgramNotFound`]: an expected result the
//! caller may answer by compiling. [`RegistryError::Corrupt`] means the
//! artifacts cannot be trusted at all and the whole registry should be
//! treated as absent.
//!
//! # Example
//!
//! ```no_run
//! use binreg::core::types::{ProgramBinary, ProgramIdentifier};
//! use binreg::registry::{BinaryRegistryReader, BinaryRegistryWriter};
//!
//! let id = ProgramIdentifier::new("dEQP-VK.api.smoke.triangle", "vert").unwrap();
//!
//! let mut writer = BinaryRegistryWriter::new("/tmp/programs");
//! writer.store_program(&id, &ProgramBinary::spirv(vec![0x03, 0x02, 0x23, 0x07])).unwrap();
//! writer.write_index().unwrap();
//!
//! let reader = BinaryRegistryReader::open_dir("/tmp/programs");
//! let binary = reader.load_program(&id).unwrap();
//! assert_eq!(binary.bytes(), &[0x03, 0x02, 0x23, 0x07]);
//! ```

pub mod lock;
pub mod reader;
pub mod writer;

pub use lock::{LockError, WriterLock};
pub use reader::{BinaryRegistryReader, RegistryStats, VerifyReport};
pub use writer::{BinaryRegistryWriter, WriteSummary};

use std::io;

use thiserror::Error;

use crate::core::types::ProgramIdentifier;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The identifier has no entry. Expected on a cache miss.
    #[error("program {id} not found: {reason}")]
    ProgramNotFound {
        id: ProgramIdentifier,
        reason: String,
    },

    /// The artifacts are malformed or do not belong together.
    #[error("registry unusable: {artifact}: {reason}")]
    Corrupt { artifact: String, reason: String },

    /// A record index past the end of a paged resource.
    #[error("record index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// The compacted table ran into the reserved slot value.
    #[error("too many distinct binaries ({0}) for one registry")]
    TooManyBinaries(usize),

    /// The flattened index does not fit 32-bit offsets.
    #[error("radix index too large ({0} nodes)")]
    IndexTooLarge(usize),

    /// Could not take the destination lock.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// I/O error opening or writing artifacts.
    #[error("registry i/o error: {0}")]
    Io(#[from] io::Error),
}

impl RegistryError {
    pub(crate) fn corrupt(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::Corrupt {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// True for an ordinary cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::ProgramNotFound { .. })
    }

    /// True when the registry as a whole must be considered unusable.
    pub fn is_corruption(&self) -> bool {
        matches!(self, RegistryError::Corrupt { .. })
    }
}
