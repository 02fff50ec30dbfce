//! core::key
//!
//! Canonical byte encoding of [`ProgramIdentifier`]s for the radix index.
//!
//! # Layout
//!
//! ```text
//! test_case_path | 0x1F | program_name | 0x00 x (1..=4)
//! ```
//!
//! The key is zero-padded to a multiple of four bytes and always ends with
//! at least one zero byte. Words are read little-endian, so the final word
//! of every key has a zero high byte and no other word does (identifiers
//! cannot contain NUL). This makes every key self-terminating: no encoded
//! key is a prefix of another.
//!
//! Writer and reader both go through [`encode`]; there is no second copy of
//! this logic.

use super::types::{ProgramIdentifier, TypeError};

/// Byte separating the test case path from the program name.
pub const SEPARATOR: u8 = 0x1F;

/// Width of one radix word in bytes.
pub const WORD_BYTES: usize = 4;

/// Returns true if `word` is the final word of a key.
///
/// A word is terminal when its last byte (the high byte, little-endian) is
/// zero.
#[inline]
pub fn is_terminal(word: u32) -> bool {
    word & 0xFF00_0000 == 0
}

/// An identifier encoded as a sequence of radix words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedKey {
    words: Vec<u32>,
}

impl EncodedKey {
    /// The key as little-endian 32-bit words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// The key as raw bytes, padding included.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Rebuild a key from words recovered from the index.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Recover the identifier this key was encoded from.
    pub fn decode(&self) -> Result<ProgramIdentifier, KeyError> {
        decode(&self.to_bytes())
    }
}

/// Errors decoding a key read back from the index.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is not terminated by a zero byte")]
    Unterminated,

    #[error("key has no field separator")]
    MissingSeparator,

    #[error("key is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    InvalidIdentifier(#[from] TypeError),
}

/// Encode an identifier into radix words.
pub fn encode(id: &ProgramIdentifier) -> EncodedKey {
    let path = id.test_case_path().as_bytes();
    let name = id.program_name().as_bytes();

    let raw_len = path.len() + 1 + name.len();
    // Round up past raw_len so at least one zero byte always follows.
    let padded_len = (raw_len / WORD_BYTES + 1) * WORD_BYTES;

    let mut bytes = Vec::with_capacity(padded_len);
    bytes.extend_from_slice(path);
    bytes.push(SEPARATOR);
    bytes.extend_from_slice(name);
    bytes.resize(padded_len, 0);

    let words = bytes
        .chunks_exact(WORD_BYTES)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    EncodedKey { words }
}

/// Decode padded key bytes back into an identifier.
pub fn decode(bytes: &[u8]) -> Result<ProgramIdentifier, KeyError> {
    if bytes.last() != Some(&0) {
        return Err(KeyError::Unterminated);
    }

    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let raw = &bytes[..end];

    let sep = raw
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or(KeyError::MissingSeparator)?;

    let path = std::str::from_utf8(&raw[..sep]).map_err(|_| KeyError::InvalidUtf8)?;
    let name = std::str::from_utf8(&raw[sep + 1..]).map_err(|_| KeyError::InvalidUtf8)?;

    Ok(ProgramIdentifier::new(path, name)?)
}
