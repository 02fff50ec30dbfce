//! format::trie
//!
//! In-memory radix tree built by the writer and flattened into
//! [`IndexNode`]s.
//!
//! # Flattening order
//!
//! Breadth-first. The root run starts at offset 0. When a branch is visited
//! its children are written into its already-reserved run, and each child
//! branch gets the next free run at the end of the array. Within a run,
//! nodes are ordered by ascending word, except that an all-zero terminal
//! word (a key whose unpadded length was a multiple of four) comes last,
//! directly before the sentinel. Scans for any other word therefore stop
//! at it exactly as they would at the sentinel.
//!
//! The same set of keys always produces the same node array.

use std::collections::{BTreeMap, VecDeque};

use crate::core::key::EncodedKey;
use crate::core::types::{RunOffset, SlotIndex};

use super::index::IndexNode;

#[derive(Debug, Default)]
struct Branch {
    /// Interior words, keyed to the subtree they lead to.
    branches: BTreeMap<u32, Branch>,
    /// Final words, keyed to the slot they resolve to.
    terminals: BTreeMap<u32, SlotIndex>,
}

enum Child<'a> {
    Branch(&'a Branch),
    Terminal(SlotIndex),
}

impl Branch {
    fn width(&self) -> usize {
        self.branches.len() + self.terminals.len()
    }

    /// Children in on-disk order.
    fn ordered(&self) -> Vec<(u32, Child<'_>)> {
        let mut children: Vec<(u32, Child<'_>)> = self
            .branches
            .iter()
            .map(|(w, b)| (*w, Child::Branch(b)))
            .chain(self.terminals.iter().map(|(w, s)| (*w, Child::Terminal(*s))))
            .collect();
        children.sort_by_key(|(w, _)| (*w == 0, *w));
        children
    }
}

/// Radix tree over encoded keys, four bytes per level.
#[derive(Debug, Default)]
pub struct RadixTree {
    root: Branch,
    len: usize,
}

impl RadixTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Map `key` to `slot`. Returns the slot it replaced, if the key was
    /// already present.
    pub fn insert(&mut self, key: &EncodedKey, slot: SlotIndex) -> Option<SlotIndex> {
        let Some((last, interior)) = key.words().split_last() else {
            return None;
        };

        let mut branch = &mut self.root;
        for word in interior {
            branch = branch.branches.entry(*word).or_default();
        }

        let previous = branch.terminals.insert(*last, slot);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Flatten into the on-disk node array.
    pub fn flatten(&self) -> Vec<IndexNode> {
        let mut nodes = Vec::new();
        let mut queue = VecDeque::new();

        let root_start = reserve_run(&mut nodes, &self.root);
        queue.push_back((&self.root, root_start));

        while let Some((branch, start)) = queue.pop_front() {
            for (i, (word, child)) in branch.ordered().into_iter().enumerate() {
                nodes[start + i] = match child {
                    Child::Terminal(slot) => IndexNode::terminal(word, slot),
                    Child::Branch(sub) => {
                        let sub_start = reserve_run(&mut nodes, sub);
                        queue.push_back((sub, sub_start));
                        IndexNode::branch(word, RunOffset::new(sub_start as u32))
                    }
                };
            }
        }

        nodes
    }
}

/// Append a sentinel-filled run sized for `branch` and its closing
/// sentinel, returning its start.
fn reserve_run(nodes: &mut Vec<IndexNode>, branch: &Branch) -> usize {
    let start = nodes.len();
    nodes.resize(start + branch.width() + 1, IndexNode::SENTINEL);
    start
}
