//! format::binary
//!
//! The compacted binary artifact.
//!
//! ```text
//! magic:   "BRBN" (4B)
//! version: u32
//! count:   u32
//! tag:     u64   (pairs this artifact with its index)
//! For each slot, in slot order:
//!   format: u32
//!   len:    u32
//!   bytes:  [u8; len]
//! ```
//!
//! Entries are variable length, so a reader builds a slot → offset table
//! once by hopping from length prefix to length prefix ([`scan_entries`]).
//! That touches only the prefixes, not the payloads.
//!
//! The tag is derived from the entries themselves ([`pair_tag`]) and is
//! repeated in the index header, so an index can never be paired with a
//! binary artifact from another run without the reader noticing.

use std::io::{self, Write};

use sha2::{Digest, Sha256};

use crate::core::types::{ProgramBinary, ProgramFormat};
use crate::resource::Resource;

use super::index::{read_u32, read_u64};
use super::FormatError;

/// Magic bytes for a binary artifact.
pub const BINARY_MAGIC: [u8; 4] = *b"BRBN";

/// Current binary format version.
pub const BINARY_VERSION: u32 = 1;

/// Size of the fixed header in bytes.
pub const BINARY_HEADER_LEN: usize = 20;

/// Size of a per-entry prefix (format + length).
pub const ENTRY_PREFIX_LEN: usize = 8;

/// Where one slot's payload lives inside the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    pub format: ProgramFormat,
    /// Byte offset of the payload (after the prefix).
    pub offset: u64,
    pub len: u32,
}

/// A scanned binary artifact: its tag and where each slot lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTable {
    pub pair_tag: u64,
    pub entries: Vec<EntryLocation>,
}

/// Tag identifying one compacted table, from the first eight bytes of a
/// SHA-256 over every entry's format, length and payload.
pub fn pair_tag(binaries: &[ProgramBinary]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update((binaries.len() as u64).to_le_bytes());
    for binary in binaries {
        hasher.update(binary.format().tag().to_le_bytes());
        hasher.update((binary.len() as u64).to_le_bytes());
        hasher.update(binary.bytes());
    }
    let digest = hasher.finalize();
    read_u64(&digest, 0)
}

/// Write a complete binary artifact. Returns the number of bytes written.
pub fn write_binaries<W: Write>(
    out: &mut W,
    binaries: &[ProgramBinary],
    tag: u64,
) -> io::Result<u64> {
    let count = u32::try_from(binaries.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many binaries"))?;

    out.write_all(&BINARY_MAGIC)?;
    out.write_all(&BINARY_VERSION.to_le_bytes())?;
    out.write_all(&count.to_le_bytes())?;
    out.write_all(&tag.to_le_bytes())?;
    let mut written = BINARY_HEADER_LEN as u64;

    for binary in binaries {
        let len = u32::try_from(binary.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "binary larger than 4 GiB")
        })?;
        out.write_all(&binary.format().tag().to_le_bytes())?;
        out.write_all(&len.to_le_bytes())?;
        out.write_all(binary.bytes())?;
        written += (ENTRY_PREFIX_LEN + binary.len()) as u64;
    }

    Ok(written)
}

/// Read the header and locate every entry.
///
/// # Errors
///
/// Any inconsistency between the header, the prefixes, and the resource
/// length is a [`FormatError`].
pub fn scan_entries(resource: &mut dyn Resource) -> Result<BinaryTable, FormatError> {
    let size = resource.size();
    if size < BINARY_HEADER_LEN as u64 {
        return Err(FormatError::Truncated {
            what: "binary header",
            expected: BINARY_HEADER_LEN as u64,
            actual: size,
        });
    }

    let mut header = [0u8; BINARY_HEADER_LEN];
    resource.set_position(0)?;
    resource.read_exact(&mut header)?;

    if header[0..4] != BINARY_MAGIC {
        return Err(FormatError::BadMagic {
            expected: BINARY_MAGIC,
            found: [header[0], header[1], header[2], header[3]],
        });
    }
    super::check_version(read_u32(&header, 4), BINARY_VERSION)?;
    let count = read_u32(&header, 8);
    let pair_tag = read_u64(&header, 12);

    // Each entry needs at least its prefix; reject absurd counts before
    // allocating for them.
    let max_entries = (size - BINARY_HEADER_LEN as u64) / ENTRY_PREFIX_LEN as u64;
    if count as u64 > max_entries {
        return Err(FormatError::Inconsistent(format!(
            "header claims {} entries but artifact holds at most {}",
            count, max_entries
        )));
    }

    let mut entries = Vec::with_capacity(count as usize);
    let mut pos = BINARY_HEADER_LEN as u64;
    let mut prefix = [0u8; ENTRY_PREFIX_LEN];

    for slot in 0..count {
        if pos + ENTRY_PREFIX_LEN as u64 > size {
            return Err(FormatError::Truncated {
                what: "binary entry prefix",
                expected: pos + ENTRY_PREFIX_LEN as u64,
                actual: size,
            });
        }
        if resource.position() != pos {
            resource.set_position(pos)?;
        }
        resource.read_exact(&mut prefix)?;

        let format = ProgramFormat::from_tag(read_u32(&prefix, 0))
            .map_err(|e| FormatError::Inconsistent(format!("slot {}: {}", slot, e)))?;
        let len = read_u32(&prefix, 4);
        let offset = pos + ENTRY_PREFIX_LEN as u64;

        if offset + len as u64 > size {
            return Err(FormatError::Truncated {
                what: "binary entry payload",
                expected: offset + len as u64,
                actual: size,
            });
        }

        entries.push(EntryLocation {
            format,
            offset,
            len,
        });
        pos = offset + len as u64;
    }

    if pos != size {
        return Err(FormatError::Inconsistent(format!(
            "{} trailing bytes after last entry",
            size - pos
        )));
    }

    Ok(BinaryTable { pair_tag, entries })
}
