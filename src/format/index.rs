//! format::index
//!
//! The radix index artifact.
//!
//! ```text
//! magic:        "BRIX" (4B)
//! version:      u32
//! node_count:   u32
//! binary_count: u32   (must match the binary artifact)
//! pair_tag:     u64   (must match the binary artifact)
//! nodes:        [word: u32, index: u32] x node_count
//! ```
//!
//! All integers are little-endian. A version field that only matches after a
//! byte swap means the artifact was written with the other byte order.
//!
//! Sibling nodes form contiguous runs closed by [`IndexNode::SENTINEL`]. A
//! node whose word is terminal (see [`crate::core::key::is_terminal`]) holds a
//! slot index; any other node holds the offset of its children's run.

use crate::core::key::is_terminal;
use crate::core::types::{RunOffset, SlotIndex};
use crate::resource::Record;

use super::FormatError;

/// Magic bytes for an index artifact.
pub const INDEX_MAGIC: [u8; 4] = *b"BRIX";

/// Current index format version.
pub const INDEX_VERSION: u32 = 1;

/// Size of the fixed header in bytes.
pub const INDEX_HEADER_LEN: usize = 24;

/// One node of the flattened radix index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexNode {
    /// Four bytes of the search key.
    pub word: u32,
    /// Slot index if `word` is terminal, otherwise offset of the child run.
    pub index: u32,
}

impl IndexNode {
    /// Closes a run of siblings.
    pub const SENTINEL: IndexNode = IndexNode {
        word: 0,
        index: SlotIndex::RESERVED,
    };

    pub fn terminal(word: u32, slot: SlotIndex) -> Self {
        Self {
            word,
            index: slot.get(),
        }
    }

    pub fn branch(word: u32, children: RunOffset) -> Self {
        Self {
            word,
            index: children.get(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(self.word)
    }

    /// What the `index` field means for this node.
    pub fn target(&self) -> NodeTarget {
        if self.is_sentinel() {
            NodeTarget::EndOfRun
        } else if self.is_terminal() {
            NodeTarget::Slot(SlotIndex::new(self.index))
        } else {
            NodeTarget::Children(RunOffset::new(self.index))
        }
    }
}

/// Decoded meaning of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTarget {
    EndOfRun,
    Slot(SlotIndex),
    Children(RunOffset),
}

impl Record for IndexNode {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            word: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            index: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.word.to_le_bytes());
        out.extend_from_slice(&self.index.to_le_bytes());
    }
}

/// Fixed header of the index artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub node_count: u32,
    pub binary_count: u32,
    /// Content tag of the binary artifact this index was written with.
    pub pair_tag: u64,
}

impl IndexHeader {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&INDEX_MAGIC);
        out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        out.extend_from_slice(&self.node_count.to_le_bytes());
        out.extend_from_slice(&self.binary_count.to_le_bytes());
        out.extend_from_slice(&self.pair_tag.to_le_bytes());
    }

    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < INDEX_HEADER_LEN {
            return Err(FormatError::Truncated {
                what: "index header",
                expected: INDEX_HEADER_LEN as u64,
                actual: data.len() as u64,
            });
        }
        if data[0..4] != INDEX_MAGIC {
            return Err(FormatError::BadMagic {
                expected: INDEX_MAGIC,
                found: [data[0], data[1], data[2], data[3]],
            });
        }
        let version = read_u32(data, 4);
        super::check_version(version, INDEX_VERSION)?;

        Ok(Self {
            node_count: read_u32(data, 8),
            binary_count: read_u32(data, 12),
            pair_tag: read_u64(data, 16),
        })
    }

    /// Total artifact length this header promises.
    pub fn artifact_len(&self) -> u64 {
        INDEX_HEADER_LEN as u64 + self.node_count as u64 * IndexNode::SIZE as u64
    }
}

pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub(crate) fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Serialize a complete index artifact.
pub fn encode_index(nodes: &[IndexNode], binary_count: u32, pair_tag: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(INDEX_HEADER_LEN + nodes.len() * IndexNode::SIZE);
    IndexHeader {
        node_count: nodes.len() as u32,
        binary_count,
        pair_tag,
    }
    .encode(&mut out);
    for node in nodes {
        node.encode(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_targets() {
        let term = IndexNode::terminal(u32::from_le_bytes([b'a', b'b', 0, 0]), SlotIndex::new(3));
        assert_eq!(term.target(), NodeTarget::Slot(SlotIndex::new(3)));

        let zero_term = IndexNode::terminal(0, SlotIndex::new(0));
        assert_eq!(zero_term.target(), NodeTarget::Slot(SlotIndex::new(0)));

        let branch = IndexNode::branch(u32::from_le_bytes(*b"abcd"), RunOffset::new(9));
        assert_eq!(branch.target(), NodeTarget::Children(RunOffset::new(9)));

        assert_eq!(IndexNode::SENTINEL.target(), NodeTarget::EndOfRun);
    }

    #[test]
    fn node_layout_is_little_endian() {
        let mut out = Vec::new();
        IndexNode {
            word: 0x0403_0201,
            index: 0x0807_0605,
        }
        .encode(&mut out);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            IndexNode::decode(&out),
            IndexNode {
                word: 0x0403_0201,
                index: 0x0807_0605
            }
        );
    }

    #[test]
    fn header_layout() {
        let bytes = encode_index(&[IndexNode::SENTINEL], 0, 0xABCD);
        assert_eq!(&bytes[0..4], b"BRIX");
        assert_eq!(bytes.len(), INDEX_HEADER_LEN + 8);

        let header = IndexHeader::decode(&bytes).unwrap();
        assert_eq!(header.node_count, 1);
        assert_eq!(header.binary_count, 0);
        assert_eq!(header.pair_tag, 0xABCD);
        assert_eq!(header.artifact_len(), bytes.len() as u64);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = encode_index(&[IndexNode::SENTINEL], 0, 0xABCD);
        bytes[0] = b'X';
        assert!(matches!(
            IndexHeader::decode(&bytes),
            Err(FormatError::BadMagic { .. })
        ));
    }

    #[test]
    fn swapped_version_reports_byte_order() {
        let mut bytes = encode_index(&[IndexNode::SENTINEL], 0, 0xABCD);
        bytes[4..8].copy_from_slice(&INDEX_VERSION.to_be_bytes());
        assert!(matches!(
            IndexHeader::decode(&bytes),
            Err(FormatError::ByteOrder)
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = encode_index(&[IndexNode::SENTINEL], 0, 0xABCD);
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            IndexHeader::decode(&bytes),
            Err(FormatError::UnsupportedVersion {
                found: 7,
                expected: 1
            })
        ));
    }

    #[test]
    fn short_header_rejected() {
        assert!(matches!(
            IndexHeader::decode(b"BRIX"),
            Err(FormatError::Truncated { .. })
        ));
    }
}
