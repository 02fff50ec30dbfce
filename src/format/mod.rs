//! format
//!
//! On-disk formats of the two registry artifacts.
//!
//! # Modules
//!
//! - [`index`] - Radix index artifact: header and 8-byte nodes
//! - [`binary`] - Compacted binary artifact: header and length-prefixed blobs
//! - [`trie`] - In-memory radix tree and its breadth-first flattening
//!
//! Both artifacts are little-endian and start with a magic and a version.

pub mod binary;
pub mod index;
pub mod trie;

pub use binary::{pair_tag, scan_entries, write_binaries, BinaryTable, EntryLocation};
pub use index::{encode_index, IndexHeader, IndexNode, NodeTarget};
pub use trie::RadixTree;

use std::io;

use thiserror::Error;

/// Errors decoding an artifact.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("artifact was written with the opposite byte order")]
    ByteOrder,

    #[error("{what} truncated: need {expected} bytes, have {actual}")]
    Truncated {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("inconsistent artifact: {0}")]
    Inconsistent(String),

    #[error("i/o error reading artifact: {0}")]
    Io(#[from] io::Error),
}

/// Check a header version, telling a byte-order mismatch apart from a
/// version mismatch.
pub(crate) fn check_version(found: u32, expected: u32) -> Result<(), FormatError> {
    if found == expected {
        Ok(())
    } else if found.swap_bytes() == expected {
        Err(FormatError::ByteOrder)
    } else {
        Err(FormatError::UnsupportedVersion { found, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_checks() {
        assert!(check_version(1, 1).is_ok());
        assert!(matches!(
            check_version(1u32.swap_bytes(), 1),
            Err(FormatError::ByteOrder)
        ));
        assert!(matches!(
            check_version(2, 1),
            Err(FormatError::UnsupportedVersion {
                found: 2,
                expected: 1
            })
        ));
    }
}
