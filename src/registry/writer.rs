//! registry::writer
//!
//! Collects program binaries during a run and publishes them as a registry.
//!
//! # Lifecycle
//!
//! 1. [`BinaryRegistryWriter::store_program`] for every compiled program.
//!    Identical binaries share one slot. No I/O happens here.
//! 2. [`BinaryRegistryWriter::write_index`] once at shutdown. Builds the
//!    radix index and writes both artifacts.
//!
//! # Publishing
//!
//! Both artifacts are written to temporaries next to their final names,
//! fsynced, then renamed into place (binaries first, index last). An error
//! before the renames removes the temporaries without touching what was
//! already published. Both headers carry the same pair tag, so a failure
//! between the two renames leaves a pair the reader rejects as corrupt
//! rather than one it misreads.
//!
//! # Re-storing an identifier
//!
//! Storing the same identifier twice is last-write-wins. The earlier binary
//! keeps its slot but nothing points at it any more.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::key::{encode, EncodedKey};
use crate::core::paths::RegistryPaths;
use crate::core::types::{ContentDigest, ProgramBinary, ProgramIdentifier, SlotIndex};
use crate::format::{encode_index, pair_tag, write_binaries, IndexNode, RadixTree};
use crate::resource::MemoryArchive;

use super::lock::WriterLock;
use super::RegistryError;

/// What [`BinaryRegistryWriter::write_index`] published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Distinct identifiers in the index.
    pub identifiers: usize,
    /// Distinct binaries in the compacted table.
    pub binaries: usize,
    /// Nodes in the flattened index, sentinels included.
    pub nodes: usize,
    pub index_bytes: u64,
    pub binary_bytes: u64,
}

/// Accumulates one run's programs and writes them out as a registry.
#[derive(Debug)]
pub struct BinaryRegistryWriter {
    paths: RegistryPaths,
    sync: bool,
    /// Content digest -> slots holding content with that digest
    dedup: HashMap<ContentDigest, Vec<SlotIndex>>,
    /// Compacted binary table, indexed by slot
    binaries: Vec<ProgramBinary>,
    /// Stored identifiers in call order
    pending: Vec<(ProgramIdentifier, EncodedKey, SlotIndex)>,
}

impl BinaryRegistryWriter {
    /// Writer publishing into directory `dst`.
    pub fn new(dst: impl Into<PathBuf>) -> Self {
        Self {
            paths: RegistryPaths::new(dst),
            sync: true,
            dedup: HashMap::new(),
            binaries: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Writer honoring the `[writer]` section of `config`.
    pub fn with_config(dst: impl Into<PathBuf>, config: &Config) -> Self {
        let mut writer = Self::new(dst);
        writer.sync = config.sync_on_write();
        writer
    }

    /// Destination directory.
    pub fn destination(&self) -> &Path {
        self.paths.root()
    }

    /// Number of `store_program` calls recorded.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of distinct binaries in the compacted table.
    pub fn binary_count(&self) -> usize {
        self.binaries.len()
    }

    /// Record `binary` under `id`, returning the slot it was stored in.
    ///
    /// # Errors
    ///
    /// [`RegistryError::TooManyBinaries`] if a new slot would collide with the
    /// reserved slot value. Never fails because of disk state.
    pub fn store_program(
        &mut self,
        id: &ProgramIdentifier,
        binary: &ProgramBinary,
    ) -> Result<SlotIndex, RegistryError> {
        let slot = self.intern(binary)?;
        self.pending.push((id.clone(), encode(id), slot));
        Ok(slot)
    }

    /// Find the slot holding `binary`, appending it if it is new.
    fn intern(&mut self, binary: &ProgramBinary) -> Result<SlotIndex, RegistryError> {
        let digest = binary.digest();

        if let Some(slots) = self.dedup.get(&digest) {
            if let Some(slot) = slots
                .iter()
                .copied()
                .find(|slot| self.binaries[slot.as_usize()] == *binary)
            {
                return Ok(slot);
            }
            tracing::warn!(%digest, "digest collision between distinct binaries");
        }

        let raw = u32::try_from(self.binaries.len())
            .ok()
            .filter(|&raw| raw != SlotIndex::RESERVED)
            .ok_or(RegistryError::TooManyBinaries(self.binaries.len()))?;
        let slot = SlotIndex::new(raw);

        self.binaries.push(binary.clone());
        self.dedup.entry(digest).or_default().push(slot);
        Ok(slot)
    }

    /// Build the radix tree over every stored identifier and flatten it.
    pub fn build_index(&self) -> Vec<IndexNode> {
        self.build_tree().flatten()
    }

    fn build_tree(&self) -> RadixTree {
        let mut tree = RadixTree::new();
        for (id, key, slot) in &self.pending {
            if let Some(previous) = tree.insert(key, *slot) {
                if previous != *slot {
                    tracing::debug!(
                        id = %id,
                        previous = %previous,
                        slot = %slot,
                        "identifier stored again; last write wins"
                    );
                }
            }
        }
        tree
    }

    /// Tree, flattened nodes and pair tag shared by both publish paths.
    fn prepare(&self) -> Result<Prepared, RegistryError> {
        let tree = self.build_tree();
        let nodes = tree.flatten();
        if u32::try_from(nodes.len()).is_err() {
            return Err(RegistryError::IndexTooLarge(nodes.len()));
        }
        let tag = pair_tag(&self.binaries);
        Ok(Prepared {
            identifiers: tree.len(),
            nodes: nodes.len(),
            index: encode_index(&nodes, self.binaries.len() as u32, tag),
            tag,
        })
    }

    /// Write both artifacts into the destination directory.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Lock`] if another writer is publishing there
    /// - [`RegistryError::Io`] if the destination cannot be written
    /// - [`RegistryError::IndexTooLarge`] if node offsets overflow 32 bits
    ///
    /// The binaries file is renamed into place before the index. A failure
    /// before the first rename leaves the previous registry untouched. A
    /// failure between the two renames leaves the new binaries next to the
    /// old index; their pair tags differ, so readers reject the pair as
    /// corrupt until the next successful publish.
    pub fn write_index(&self) -> Result<WriteSummary, RegistryError> {
        let _lock = WriterLock::acquire(&self.paths)?;
        let prepared = self.prepare()?;
        let tag = prepared.tag;

        let mut binaries_tmp = TempArtifact::new(&self.paths.binaries_path());
        let binary_bytes =
            binaries_tmp.write_with(self.sync, |out| write_binaries(out, &self.binaries, tag))?;

        let mut index_tmp = TempArtifact::new(&self.paths.index_path());
        let index_bytes = index_tmp.write_with(self.sync, |out| {
            out.write_all(&prepared.index)?;
            Ok(prepared.index.len() as u64)
        })?;

        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_fail() {
            return Err(RegistryError::Io(std::io::Error::other(
                "simulated failure before publish",
            )));
        }

        binaries_tmp.persist()?;

        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_fail_between_renames() {
            return Err(RegistryError::Io(std::io::Error::other(
                "simulated failure between renames",
            )));
        }

        index_tmp.persist()?;

        let summary = prepared.summary(self.binaries.len(), index_bytes, binary_bytes);
        tracing::info!(
            destination = %self.paths.root().display(),
            identifiers = summary.identifiers,
            binaries = summary.binaries,
            nodes = summary.nodes,
            "published program registry"
        );
        Ok(summary)
    }

    /// Publish into an in-memory archive under `prefix` instead of a
    /// directory. No lock is taken.
    pub fn write_to_archive(
        &self,
        archive: &mut MemoryArchive,
        prefix: &str,
    ) -> Result<WriteSummary, RegistryError> {
        let prepared = self.prepare()?;

        let mut binaries = Vec::new();
        let binary_bytes = write_binaries(&mut binaries, &self.binaries, prepared.tag)?;
        let index_bytes = prepared.index.len() as u64;

        let summary = prepared.summary(self.binaries.len(), index_bytes, binary_bytes);
        archive.insert(RegistryPaths::binaries_name(prefix), binaries);
        archive.insert(RegistryPaths::index_name(prefix), prepared.index);

        tracing::debug!(
            prefix,
            identifiers = summary.identifiers,
            binaries = summary.binaries,
            "published program registry to memory archive"
        );
        Ok(summary)
    }
}

struct Prepared {
    identifiers: usize,
    nodes: usize,
    index: Vec<u8>,
    tag: u64,
}

impl Prepared {
    fn summary(&self, binaries: usize, index_bytes: u64, binary_bytes: u64) -> WriteSummary {
        WriteSummary {
            identifiers: self.identifiers,
            binaries,
            nodes: self.nodes,
            index_bytes,
            binary_bytes,
        }
    }
}

/// A temporary sibling of an artifact, removed on drop unless persisted.
struct TempArtifact {
    temp: PathBuf,
    target: PathBuf,
    persisted: bool,
}

impl TempArtifact {
    fn new(target: &Path) -> Self {
        Self {
            temp: RegistryPaths::temp_path_for(target),
            target: target.to_path_buf(),
            persisted: false,
        }
    }

    fn write_with<F>(&mut self, sync: bool, body: F) -> std::io::Result<u64>
    where
        F: FnOnce(&mut BufWriter<File>) -> std::io::Result<u64>,
    {
        let mut out = BufWriter::new(File::create(&self.temp)?);
        let written = body(&mut out)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        if sync {
            file.sync_all()?;
        }
        Ok(written)
    }

    fn persist(&mut self) -> std::io::Result<()> {
        fs::rename(&self.temp, &self.target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Fault injection for publish failures.
///
/// Thread-local, so parallel tests do not see each other's settings.
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    thread_local! {
        static FAIL_BEFORE_PUBLISH: Cell<bool> = const { Cell::new(false) };
        static FAIL_BETWEEN_RENAMES: Cell<bool> = const { Cell::new(false) };
    }

    /// Make the next `write_index` on this thread fail after writing its
    /// temporaries and before renaming them.
    pub fn fail_before_publish(enabled: bool) {
        FAIL_BEFORE_PUBLISH.with(|c| c.set(enabled));
    }

    /// Consume the pending failure, if any.
    pub fn should_fail() -> bool {
        FAIL_BEFORE_PUBLISH.with(|c| c.replace(false))
    }

    /// Make the next `write_index` on this thread fail after the binaries
    /// rename and before the index rename.
    pub fn fail_between_renames(enabled: bool) {
        FAIL_BETWEEN_RENAMES.with(|c| c.set(enabled));
    }

    pub fn should_fail_between_renames() -> bool {
        FAIL_BETWEEN_RENAMES.with(|c| c.replace(false))
    }
}
