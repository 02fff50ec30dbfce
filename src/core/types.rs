//! core::types
//!
//! Strong types for registry domain concepts.
//!
//! # Types
//!
//! - [`ProgramIdentifier`] - Validated (test case path, program name) key
//! - [`ProgramFormat`] - Encoding of a compiled program binary
//! - [`ProgramBinary`] - Opaque compiled program content
//! - [`ContentDigest`] - SHA-256 digest of a binary, used for de-duplication
//! - [`SlotIndex`] - Position of a binary in the compacted binary table
//! - [`RunOffset`] - Position of a child run in the flattened radix index
//!
//! # Validation
//!
//! Identifiers enforce validity at construction time. Control characters are
//! reserved by the key encoding, so an identifier containing one cannot be
//! represented.
//!
//! # Examples
//!
//! ```
//! use binreg::core::types::ProgramIdentifier;
//!
//! let id = ProgramIdentifier::new("dEQP-VK.api.smoke.triangle", "vert").unwrap();
//! assert_eq!(id.to_string(), "dEQP-VK.api.smoke.triangle / 'vert'");
//!
//! assert!(ProgramIdentifier::new("bad\0path", "vert").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid test case path: {0:?}")]
    InvalidTestCasePath(String),

    #[error("invalid program name: {0:?}")]
    InvalidProgramName(String),

    #[error("unknown program format tag: {0}")]
    UnknownFormat(u32),
}

/// Returns true if `s` contains a byte reserved by the key encoding.
fn has_reserved_byte(s: &str) -> bool {
    s.bytes().any(|b| b < 0x20 || b == 0x7F)
}

/// A validated program identifier.
///
/// Names one compiled program: the test case that owns it and the program's
/// name within that test case. Neither field may contain ASCII control
/// characters.
///
/// Ordering is lexicographic on `(test_case_path, program_name)` and is only
/// used for diagnostics; the radix index orders keys by their encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProgramIdentifier {
    test_case_path: String,
    program_name: String,
}

impl ProgramIdentifier {
    /// Create a new identifier, validating both fields.
    pub fn new(
        test_case_path: impl Into<String>,
        program_name: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let test_case_path = test_case_path.into();
        let program_name = program_name.into();

        if has_reserved_byte(&test_case_path) {
            return Err(TypeError::InvalidTestCasePath(test_case_path));
        }
        if has_reserved_byte(&program_name) {
            return Err(TypeError::InvalidProgramName(program_name));
        }

        Ok(Self {
            test_case_path,
            program_name,
        })
    }

    /// The test case path (e.g. `dEQP-VK.api.smoke.triangle`).
    pub fn test_case_path(&self) -> &str {
        &self.test_case_path
    }

    /// The program name within the test case (e.g. `vert`).
    pub fn program_name(&self) -> &str {
        &self.program_name
    }
}

impl std::fmt::Display for ProgramIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / '{}'", self.test_case_path, self.program_name)
    }
}

/// Encoding of a compiled program binary.
///
/// The registry never interprets binary content; the format travels with the
/// bytes so the consumer knows what it got back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramFormat {
    /// SPIR-V module.
    Spirv,
    /// Anything else.
    Raw,
}

impl ProgramFormat {
    /// On-disk tag for this format.
    pub fn tag(self) -> u32 {
        match self {
            ProgramFormat::Spirv => 0,
            ProgramFormat::Raw => 1,
        }
    }

    /// Parse an on-disk tag.
    pub fn from_tag(tag: u32) -> Result<Self, TypeError> {
        match tag {
            0 => Ok(ProgramFormat::Spirv),
            1 => Ok(ProgramFormat::Raw),
            other => Err(TypeError::UnknownFormat(other)),
        }
    }
}

impl std::fmt::Display for ProgramFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramFormat::Spirv => write!(f, "spirv"),
            ProgramFormat::Raw => write!(f, "raw"),
        }
    }
}

/// Compiled program content.
///
/// A value type: two binaries are equal when their format and bytes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramBinary {
    format: ProgramFormat,
    bytes: Vec<u8>,
}

impl ProgramBinary {
    pub fn new(format: ProgramFormat, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    /// Shorthand for a SPIR-V binary.
    pub fn spirv(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(ProgramFormat::Spirv, bytes)
    }

    pub fn format(&self) -> ProgramFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Digest of the format tag and content.
    pub fn digest(&self) -> ContentDigest {
        ContentDigest::compute(self)
    }
}

/// SHA-256 digest of a [`ProgramBinary`].
///
/// Only used as a hash key for de-duplication. Equal digests are always
/// confirmed with a full content comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Compute the digest of a binary.
    pub fn compute(binary: &ProgramBinary) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(binary.format.tag().to_le_bytes());
        hasher.update(&binary.bytes);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", hex::encode(self.0))
    }
}

/// Index into the compacted binary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Reserved value marking run sentinels in the radix index.
    pub const RESERVED: u32 = u32::MAX;

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Offset of a contiguous run of sibling nodes in the flattened radix index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunOffset(u32);

impl RunOffset {
    /// The run holding the first word of every key.
    pub const ROOT: RunOffset = RunOffset(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RunOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod program_identifier {
        use super::*;

        #[test]
        fn valid_identifiers() {
            assert!(ProgramIdentifier::new("dEQP-VK.api.smoke.triangle", "vert").is_ok());
            assert!(ProgramIdentifier::new("", "").is_ok());
            assert!(ProgramIdentifier::new("a/b#c", "name with spaces").is_ok());
            assert!(ProgramIdentifier::new("ünïcödé", "frag").is_ok());
        }

        #[test]
        fn nul_rejected() {
            assert_eq!(
                ProgramIdentifier::new("a\0b", "vert"),
                Err(TypeError::InvalidTestCasePath("a\0b".to_string()))
            );
            assert_eq!(
                ProgramIdentifier::new("ab", "v\0"),
                Err(TypeError::InvalidProgramName("v\0".to_string()))
            );
        }

        #[test]
        fn separator_rejected() {
            assert!(ProgramIdentifier::new("a\u{1f}b", "vert").is_err());
            assert!(ProgramIdentifier::new("ab", "\u{1f}").is_err());
        }

        #[test]
        fn other_control_chars_rejected() {
            assert!(ProgramIdentifier::new("a\nb", "vert").is_err());
            assert!(ProgramIdentifier::new("ab", "x\u{7f}").is_err());
        }

        #[test]
        fn ordering_is_path_then_name() {
            let a = ProgramIdentifier::new("a", "z").unwrap();
            let b = ProgramIdentifier::new("b", "a").unwrap();
            let c = ProgramIdentifier::new("b", "b").unwrap();
            assert!(a < b);
            assert!(b < c);
        }

        #[test]
        fn display_formatting() {
            let id = ProgramIdentifier::new("testA", "vert").unwrap();
            assert_eq!(format!("{}", id), "testA / 'vert'");
        }
    }

    mod program_format {
        use super::*;

        #[test]
        fn tags_roundtrip() {
            for format in [ProgramFormat::Spirv, ProgramFormat::Raw] {
                assert_eq!(ProgramFormat::from_tag(format.tag()), Ok(format));
            }
        }

        #[test]
        fn unknown_tag_rejected() {
            assert_eq!(ProgramFormat::from_tag(7), Err(TypeError::UnknownFormat(7)));
        }
    }

    mod content_digest {
        use super::*;

        #[test]
        fn equal_content_equal_digest() {
            let a = ProgramBinary::spirv(b"XYZ".to_vec());
            let b = ProgramBinary::spirv(b"XYZ".to_vec());
            assert_eq!(a.digest(), b.digest());
        }

        #[test]
        fn format_participates_in_digest() {
            let a = ProgramBinary::new(ProgramFormat::Spirv, b"XYZ".to_vec());
            let b = ProgramBinary::new(ProgramFormat::Raw, b"XYZ".to_vec());
            assert_ne!(a.digest(), b.digest());
        }

        #[test]
        fn display_is_prefixed_hex() {
            let digest = ProgramBinary::spirv(Vec::new()).digest();
            let text = digest.to_string();
            assert!(text.starts_with("sha256:"));
            assert_eq!(text.len(), "sha256:".len() + 64);
        }
    }
}
