//! resource
//!
//! Byte-stream resources and the archives that open them.
//!
//! # Architecture
//!
//! The registry reader never opens files itself. It asks an [`Archive`] for
//! a [`Resource`] by name and reads through it. The caller decides whether
//! names map to loose files ([`DirArchive`]), in-memory blobs
//! ([`MemoryArchive`]), or something packaged.
//!
//! # Modules
//!
//! - [`lazy`] - Random access over a resource, one page at a time

pub mod lazy;

pub use lazy::{LazyResource, Record};

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Errors from resource access.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A record index past the end of the resource.
    #[error("record index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// The resource does not have the shape its reader expects.
    #[error("resource format error: {0}")]
    Format(String),

    /// I/O error reading the underlying stream.
    #[error("resource i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A seekable, readable byte stream with a known length.
pub trait Resource: Send {
    /// Total length in bytes.
    fn size(&self) -> u64;

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Move the cursor.
    fn set_position(&mut self, pos: u64) -> io::Result<()>;

    /// Fill `buf` from the cursor, advancing it.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

impl Resource for Box<dyn Resource> {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        (**self).set_position(pos)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact(buf)
    }
}

/// A resource backed by a file on disk.
#[derive(Debug)]
pub struct FileResource {
    file: File,
    size: u64,
    pos: u64,
}

impl FileResource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size, pos: 0 })
    }
}

impl Resource for FileResource {
    fn size(&self) -> u64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }
}

/// A resource over a shared in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryResource {
    data: Arc<[u8]>,
    pos: u64,
}

impl MemoryResource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl Resource for MemoryResource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {} past end ({})", pos, self.size()),
            ));
        }
        self.pos = pos;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of memory resource",
            ));
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end as u64;
        Ok(())
    }
}

/// A window `[offset, offset + len)` of another resource, seen as a whole
/// resource.
///
/// Lets a header be parsed separately from the record array behind it.
pub struct Window<R: Resource> {
    inner: R,
    offset: u64,
    len: u64,
}

impl<R: Resource> Window<R> {
    /// Window from `offset` to the end of `inner`. The cursor starts at the
    /// beginning of the window.
    pub fn tail(mut inner: R, offset: u64) -> io::Result<Self> {
        let size = inner.size();
        if offset > size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("window offset {} past end ({})", offset, size),
            ));
        }
        inner.set_position(offset)?;
        Ok(Self {
            inner,
            offset,
            len: size - offset,
        })
    }
}

impl<R: Resource> Resource for Window<R> {
    fn size(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.inner.position().saturating_sub(self.offset)
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        self.inner.set_position(self.offset + pos)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_exact(buf)
    }
}

/// Opens named resources.
pub trait Archive: Send + Sync {
    fn open(&self, name: &str) -> io::Result<Box<dyn Resource>>;
}

/// Loose files under a root directory. Names use `/` separators.
#[derive(Debug, Clone)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Archive for DirArchive {
    fn open(&self, name: &str) -> io::Result<Box<dyn Resource>> {
        let path = name
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part));
        Ok(Box::new(FileResource::open(&path)?))
    }
}

/// Named in-memory blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: HashMap<String, Arc<[u8]>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) {
        self.entries.insert(name.into(), data.into());
    }
}

impl Archive for MemoryArchive {
    fn open(&self, name: &str) -> io::Result<Box<dyn Resource>> {
        match self.entries.get(name) {
            Some(data) => Ok(Box::new(MemoryResource::new(Arc::clone(data)))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no resource named '{}'", name),
            )),
        }
    }
}
