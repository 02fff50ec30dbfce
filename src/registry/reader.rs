//! registry::reader
//!
//! Opens a published registry lazily and resolves identifiers to binaries.
//!
//! # Opening
//!
//! Nothing is read until the first call that needs the artifacts. Then both
//! headers are checked, the slot table of the binary artifact is built by
//! hopping over its length prefixes, and the index nodes are wrapped in a
//! paged accessor. Opening happens once per reader; concurrent first calls
//! block on the same initialization.
//!
//! # Corruption
//!
//! Any inconsistency found, while opening or during a lookup, poisons the
//! reader: every later call returns the same [`RegistryError::Corrupt`].
//! A missing artifact is an ordinary I/O error and is retried on the next
//! call.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::core::config::schema::{MAX_PAGE_LOG2, MIN_PAGE_LOG2};
use crate::core::config::Config;
use crate::core::key::{encode, EncodedKey};
use crate::core::paths::RegistryPaths;
use crate::core::types::{ProgramBinary, ProgramIdentifier, RunOffset, SlotIndex};
use crate::format::index::INDEX_HEADER_LEN;
use crate::format::{scan_entries, EntryLocation, FormatError, IndexHeader, IndexNode, NodeTarget};
use crate::resource::{Archive, DirArchive, LazyResource, Resource, ResourceError, Window};

use super::RegistryError;

/// Summary of an open registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Index nodes, sentinels included.
    pub nodes: usize,
    /// Entries in the compacted binary table.
    pub binaries: usize,
    /// Sum of all payload lengths.
    pub payload_bytes: u64,
    pub index_pages: usize,
    pub resident_index_pages: usize,
    pub binary_pages: usize,
    pub resident_binary_pages: usize,
}

/// Result of [`BinaryRegistryReader::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Identifiers reachable from the index.
    pub identifiers: usize,
    /// Entries in the compacted binary table.
    pub binaries: usize,
    /// Slots no identifier points at. Left behind by last-write-wins.
    pub unreferenced_slots: Vec<SlotIndex>,
    /// Slots shared by more than one identifier.
    pub shared_slots: usize,
    /// Payload bytes read while checking.
    pub bytes_checked: u64,
}

impl VerifyReport {
    /// True when every slot is referenced.
    pub fn is_compact(&self) -> bool {
        self.unreferenced_slots.is_empty()
    }
}

/// Read side of a registry.
///
/// `Send + Sync`: share one reader between threads behind an `Arc`.
pub struct BinaryRegistryReader {
    archive: Arc<dyn Archive>,
    prefix: String,
    index_page_log2: u32,
    binary_page_log2: u32,
    artifacts: OnceCell<Artifacts>,
    /// (artifact, reason) of the first corruption seen
    poisoned: OnceCell<(String, String)>,
}

struct Artifacts {
    nodes: IndexNodes,
    binaries_name: String,
    entries: Vec<EntryLocation>,
    payload: LazyResource<u8>,
}

/// Bounds-checked access to the flattened index.
struct IndexNodes {
    name: String,
    nodes: LazyResource<IndexNode>,
}

impl IndexNodes {
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, pos: usize) -> Result<IndexNode, RegistryError> {
        if pos >= self.nodes.len() {
            return Err(RegistryError::corrupt(
                &self.name,
                format!("run overruns node array at node {} of {}", pos, self.nodes.len()),
            ));
        }
        self.nodes.get(pos).map_err(|e| resource_error(&self.name, e))
    }

    /// Scan the run at `run` for `word`.
    ///
    /// Stops at the sentinel, or after an all-zero word since that one is
    /// always sorted last in its run.
    fn find(&self, run: RunOffset, word: u32) -> Result<Option<IndexNode>, RegistryError> {
        let mut pos = run.as_usize();
        loop {
            let node = self.node(pos)?;
            if node.is_sentinel() {
                return Ok(None);
            }
            if node.word == word {
                return Ok(Some(node));
            }
            if node.word == 0 {
                return Ok(None);
            }
            pos += 1;
        }
    }
}

impl BinaryRegistryReader {
    /// Reader over the artifacts named `<prefix>/index.bin` and
    /// `<prefix>/binaries.bin` in `archive`. Nothing is opened yet.
    pub fn new(archive: Arc<dyn Archive>, prefix: impl Into<String>) -> Self {
        Self {
            archive,
            prefix: prefix.into(),
            index_page_log2: crate::core::config::schema::DEFAULT_INDEX_PAGE_LOG2,
            binary_page_log2: crate::core::config::schema::DEFAULT_BINARY_PAGE_LOG2,
            artifacts: OnceCell::new(),
            poisoned: OnceCell::new(),
        }
    }

    /// Reader over a registry directory as written by
    /// [`super::BinaryRegistryWriter::write_index`].
    pub fn open_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(DirArchive::new(dir)), "")
    }

    /// Reader honoring the `[reader]` section of `config`.
    pub fn with_config(
        archive: Arc<dyn Archive>,
        prefix: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self::new(archive, prefix)
            .with_page_sizes(config.index_page_log2(), config.binary_page_log2())
    }

    /// Override page sizes, as log2 of records per page. Values outside the
    /// supported range are clamped.
    pub fn with_page_sizes(mut self, index_page_log2: u32, binary_page_log2: u32) -> Self {
        self.index_page_log2 = index_page_log2.clamp(MIN_PAGE_LOG2, MAX_PAGE_LOG2);
        self.binary_page_log2 = binary_page_log2.clamp(MIN_PAGE_LOG2, MAX_PAGE_LOG2);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True once a corruption has been seen.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.get().is_some()
    }

    /// Look up the binary stored under `id`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::ProgramNotFound`] if `id` was never stored
    /// - [`RegistryError::Corrupt`] if the artifacts are inconsistent
    /// - [`RegistryError::Io`] if an artifact cannot be opened or read
    pub fn load_program(&self, id: &ProgramIdentifier) -> Result<ProgramBinary, RegistryError> {
        let artifacts = self.artifacts()?;
        self.resolve(artifacts, id)
            .and_then(|slot| self.load_slot(artifacts, slot))
            .map_err(|e| self.poison(e))
    }

    /// Every stored identifier with its slot, sorted by identifier.
    pub fn entries(&self) -> Result<Vec<(ProgramIdentifier, SlotIndex)>, RegistryError> {
        let artifacts = self.artifacts()?;
        collect_entries(&artifacts.nodes).map_err(|e| self.poison(e))
    }

    /// Walk the whole registry: every identifier must resolve through the
    /// index to the slot enumeration found it under, and every slot must
    /// load.
    pub fn verify(&self) -> Result<VerifyReport, RegistryError> {
        let artifacts = self.artifacts()?;
        self.verify_artifacts(artifacts).map_err(|e| self.poison(e))
    }

    /// Sizes and page residency.
    pub fn stats(&self) -> Result<RegistryStats, RegistryError> {
        let artifacts = self.artifacts()?;
        Ok(RegistryStats {
            nodes: artifacts.nodes.len(),
            binaries: artifacts.entries.len(),
            payload_bytes: artifacts.entries.iter().map(|e| e.len as u64).sum(),
            index_pages: artifacts.nodes.nodes.page_count(),
            resident_index_pages: artifacts.nodes.nodes.resident_pages(),
            binary_pages: artifacts.payload.page_count(),
            resident_binary_pages: artifacts.payload.resident_pages(),
        })
    }

    // =========================================================================
    // Opening
    // =========================================================================

    fn artifacts(&self) -> Result<&Artifacts, RegistryError> {
        if let Some((artifact, reason)) = self.poisoned.get() {
            return Err(RegistryError::corrupt(artifact.clone(), reason.clone()));
        }
        self.artifacts
            .get_or_try_init(|| self.open_artifacts())
            .map_err(|e| self.poison(e))
    }

    /// Remember `err` if it is a corruption, then hand it back.
    fn poison(&self, err: RegistryError) -> RegistryError {
        if let RegistryError::Corrupt { artifact, reason } = &err {
            if self.poisoned.set((artifact.clone(), reason.clone())).is_ok() {
                tracing::warn!(%artifact, %reason, "program registry unusable");
            }
        }
        err
    }

    fn open_artifacts(&self) -> Result<Artifacts, RegistryError> {
        let index_name = RegistryPaths::index_name(&self.prefix);
        let binaries_name = RegistryPaths::binaries_name(&self.prefix);

        let (header, nodes) = self.open_index(&index_name)?;

        let mut binaries = self.archive.open(&binaries_name)?;
        let table = scan_entries(&mut *binaries).map_err(|e| format_error(&binaries_name, e))?;

        if table.entries.len() != header.binary_count as usize {
            return Err(RegistryError::corrupt(
                &index_name,
                format!(
                    "index expects {} binaries but {} holds {}",
                    header.binary_count,
                    binaries_name,
                    table.entries.len()
                ),
            ));
        }
        if table.pair_tag != header.pair_tag {
            return Err(RegistryError::corrupt(
                &index_name,
                format!(
                    "pair tag {:016x} does not match {} ({:016x})",
                    header.pair_tag, binaries_name, table.pair_tag
                ),
            ));
        }

        let payload = LazyResource::open(binaries, self.binary_page_log2)
            .map_err(|e| resource_error(&binaries_name, e))?;

        tracing::debug!(
            prefix = %self.prefix,
            nodes = nodes.len(),
            binaries = table.entries.len(),
            "opened program registry"
        );

        Ok(Artifacts {
            nodes: IndexNodes {
                name: index_name,
                nodes,
            },
            binaries_name,
            entries: table.entries,
            payload,
        })
    }

    fn open_index(
        &self,
        name: &str,
    ) -> Result<(IndexHeader, LazyResource<IndexNode>), RegistryError> {
        let mut resource = self.archive.open(name)?;
        let size = resource.size();
        if size < INDEX_HEADER_LEN as u64 {
            return Err(RegistryError::corrupt(
                name,
                format!("{} bytes is shorter than the index header", size),
            ));
        }

        let mut raw = [0u8; INDEX_HEADER_LEN];
        resource.set_position(0)?;
        resource.read_exact(&mut raw)?;
        let header = IndexHeader::decode(&raw).map_err(|e| format_error(name, e))?;

        if header.artifact_len() != size {
            return Err(RegistryError::corrupt(
                name,
                format!(
                    "header promises {} nodes ({} bytes) but artifact is {} bytes",
                    header.node_count,
                    header.artifact_len(),
                    size
                ),
            ));
        }
        if header.node_count == 0 {
            return Err(RegistryError::corrupt(name, "index has no root run"));
        }

        let window = Window::tail(resource, INDEX_HEADER_LEN as u64)?;
        let nodes = LazyResource::open(Box::new(window), self.index_page_log2)
            .map_err(|e| resource_error(name, e))?;
        Ok((header, nodes))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn resolve(
        &self,
        artifacts: &Artifacts,
        id: &ProgramIdentifier,
    ) -> Result<SlotIndex, RegistryError> {
        let key = encode(id);
        let words = key.words();
        let mut run = RunOffset::ROOT;

        for (depth, &word) in words.iter().enumerate() {
            let last = depth + 1 == words.len();
            let node = match artifacts.nodes.find(run, word)? {
                Some(node) => node,
                None => {
                    tracing::trace!(id = %id, depth, "registry miss");
                    return Err(RegistryError::ProgramNotFound {
                        id: id.clone(),
                        reason: format!("no index entry for key word {}", depth),
                    });
                }
            };

            match (node.target(), last) {
                (NodeTarget::Slot(slot), true) => return Ok(slot),
                (NodeTarget::Children(next), false) => run = next,
                (target, _) => {
                    return Err(RegistryError::corrupt(
                        &artifacts.nodes.name,
                        format!(
                            "node {:08x} at key word {} is {:?}, expected a {}",
                            node.word,
                            depth,
                            target,
                            if last { "terminal" } else { "branch" }
                        ),
                    ));
                }
            }
        }

        Err(RegistryError::ProgramNotFound {
            id: id.clone(),
            reason: "empty key".to_string(),
        })
    }

    fn load_slot(
        &self,
        artifacts: &Artifacts,
        slot: SlotIndex,
    ) -> Result<ProgramBinary, RegistryError> {
        let entry = artifacts.entries.get(slot.as_usize()).ok_or_else(|| {
            RegistryError::corrupt(
                &artifacts.nodes.name,
                format!(
                    "slot {} beyond binary table of {} entries",
                    slot,
                    artifacts.entries.len()
                ),
            )
        })?;

        let bytes = artifacts
            .payload
            .read_range(entry.offset as usize, entry.len as usize)
            .map_err(|e| resource_error(&artifacts.binaries_name, e))?;
        Ok(ProgramBinary::new(entry.format, bytes))
    }

    fn verify_artifacts(&self, artifacts: &Artifacts) -> Result<VerifyReport, RegistryError> {
        let entries = collect_entries(&artifacts.nodes)?;

        let mut references: BTreeMap<SlotIndex, usize> = BTreeMap::new();
        for (id, slot) in &entries {
            let resolved = self.resolve(artifacts, id)?;
            if resolved != *slot {
                return Err(RegistryError::corrupt(
                    &artifacts.nodes.name,
                    format!("{} enumerates to {} but resolves to {}", id, slot, resolved),
                ));
            }
            *references.entry(*slot).or_default() += 1;
        }

        // Resolution never touches the binary table.
        let table_len = artifacts.entries.len();
        if let Some(&slot) = references.keys().find(|slot| slot.as_usize() >= table_len) {
            return Err(RegistryError::corrupt(
                &artifacts.nodes.name,
                format!("slot {} beyond binary table of {} entries", slot, table_len),
            ));
        }

        let mut bytes_checked = 0u64;
        let mut unreferenced_slots = Vec::new();
        for raw in 0..table_len as u32 {
            let slot = SlotIndex::new(raw);
            bytes_checked += self.load_slot(artifacts, slot)?.len() as u64;
            if !references.contains_key(&slot) {
                unreferenced_slots.push(slot);
            }
        }

        Ok(VerifyReport {
            identifiers: entries.len(),
            binaries: table_len,
            unreferenced_slots,
            shared_slots: references.values().filter(|&&n| n > 1).count(),
            bytes_checked,
        })
    }
}

/// Depth-first walk over every run reachable from the root.
fn collect_entries(
    nodes: &IndexNodes,
) -> Result<Vec<(ProgramIdentifier, SlotIndex)>, RegistryError> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(RunOffset::ROOT, Vec::new())];

    while let Some((run, prefix)) = stack.pop() {
        if !visited.insert(run) {
            return Err(RegistryError::corrupt(
                &nodes.name,
                format!("run {} is reachable twice", run),
            ));
        }

        let mut pos = run.as_usize();
        loop {
            let node = nodes.node(pos)?;
            let target = node.target();
            if target == NodeTarget::EndOfRun {
                break;
            }

            let mut words: Vec<u32> = prefix.clone();
            words.push(node.word);
            match target {
                NodeTarget::Slot(slot) => {
                    let id = EncodedKey::from_words(words).decode().map_err(|e| {
                        RegistryError::corrupt(
                            &nodes.name,
                            format!("undecodable key ending at node {}: {}", pos, e),
                        )
                    })?;
                    out.push((id, slot));
                }
                NodeTarget::Children(next) => stack.push((next, words)),
                NodeTarget::EndOfRun => {}
            }
            pos += 1;
        }
    }

    out.sort();
    Ok(out)
}

fn format_error(artifact: &str, err: FormatError) -> RegistryError {
    match err {
        FormatError::Io(e) => RegistryError::Io(e),
        other => RegistryError::corrupt(artifact, other.to_string()),
    }
}

fn resource_error(artifact: &str, err: ResourceError) -> RegistryError {
    match err {
        ResourceError::IndexOutOfRange { index, len } => {
            RegistryError::IndexOutOfRange { index, len }
        }
        ResourceError::Format(reason) => RegistryError::corrupt(artifact, reason),
        ResourceError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            RegistryError::corrupt(artifact, e.to_string())
        }
        ResourceError::Io(e) => RegistryError::Io(e),
    }
}

impl std::fmt::Debug for BinaryRegistryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryRegistryReader")
            .field("prefix", &self.prefix)
            .field("index_page_log2", &self.index_page_log2)
            .field("binary_page_log2", &self.binary_page_log2)
            .field("opened", &self.artifacts.get().is_some())
            .field("poisoned", &self.poisoned.get())
            .finish()
    }
}
