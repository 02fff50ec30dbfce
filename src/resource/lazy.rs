//! resource::lazy
//!
//! Random access to fixed-size records of a [`Resource`], loading one page
//! at a time on first touch.
//!
//! # Paging
//!
//! A page holds `2^page_log2` records, so the page of a record is
//! `index >> page_log2`. The last page may be short. Pages become resident
//! on first access and stay resident for the life of the accessor; memory
//! grows up to the size of the resource.
//!
//! # Concurrency
//!
//! Each page is a once-cell. Threads that fault the same page concurrently
//! block until the first one has filled it, so a page is read from the
//! underlying resource at most once and never observed half-populated. The
//! resource cursor sits behind a mutex because every page read seeks it.

use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{Resource, ResourceError};

/// A fixed-size record decodable from its on-disk bytes.
pub trait Record: Copy + Send + Sync + 'static {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Append the encoded form to `out`.
    fn encode(&self, out: &mut Vec<u8>);
}

impl Record for u8 {
    const SIZE: usize = 1;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

/// Lazily paged view of a resource as `[T]`.
pub struct LazyResource<T: Record> {
    resource: Mutex<Box<dyn Resource>>,
    len: usize,
    page_log2: u32,
    pages: Vec<OnceCell<Box<[T]>>>,
    page_reads: AtomicUsize,
}

impl<T: Record> LazyResource<T> {
    /// Wrap `resource`. No record data is read here.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Format`] if the resource length is not a whole number
    /// of records, which means the artifact is truncated or from another
    /// format version, or if `page_log2` does not fit in a `usize` shift.
    pub fn open(resource: Box<dyn Resource>, page_log2: u32) -> Result<Self, ResourceError> {
        let size = resource.size();
        if size % T::SIZE as u64 != 0 {
            return Err(ResourceError::Format(format!(
                "resource size {} is not a multiple of record size {}",
                size,
                T::SIZE
            )));
        }

        let len = usize::try_from(size / T::SIZE as u64).map_err(|_| {
            ResourceError::Format(format!("resource size {} exceeds address space", size))
        })?;
        let page_records = 1usize.checked_shl(page_log2).ok_or_else(|| {
            ResourceError::Format(format!("page size 2^{} out of range", page_log2))
        })?;
        let num_pages = len.div_ceil(page_records);

        Ok(Self {
            resource: Mutex::new(resource),
            len,
            page_log2,
            pages: (0..num_pages).map(|_| OnceCell::new()).collect(),
            page_reads: AtomicUsize::new(0),
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Records per page.
    pub fn page_records(&self) -> usize {
        1 << self.page_log2
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of pages currently in memory.
    pub fn resident_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.get().is_some()).count()
    }

    /// Number of page reads issued against the resource so far.
    pub fn page_reads(&self) -> usize {
        self.page_reads.load(Ordering::Relaxed)
    }

    /// Fetch one record, faulting its page in if needed.
    pub fn get(&self, index: usize) -> Result<T, ResourceError> {
        if index >= self.len {
            return Err(ResourceError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let page = self.page(index >> self.page_log2)?;
        Ok(page[index & (self.page_records() - 1)])
    }

    /// Copy `count` records starting at `start`, faulting every page the
    /// range touches.
    pub fn read_range(&self, start: usize, count: usize) -> Result<Vec<T>, ResourceError> {
        let end = start
            .checked_add(count)
            .filter(|&end| end <= self.len)
            .ok_or(ResourceError::IndexOutOfRange {
                index: start.saturating_add(count).saturating_sub(1),
                len: self.len,
            })?;

        let mut out = Vec::with_capacity(count);
        let mut cursor = start;
        while cursor < end {
            let page_ndx = cursor >> self.page_log2;
            let page = self.page(page_ndx)?;
            let page_start = page_ndx << self.page_log2;
            let from = cursor - page_start;
            let to = (end - page_start).min(page.len());
            out.extend_from_slice(&page[from..to]);
            cursor = page_start + to;
        }
        Ok(out)
    }

    fn page(&self, page_ndx: usize) -> Result<&[T], ResourceError> {
        self.pages[page_ndx]
            .get_or_try_init(|| self.load_page(page_ndx))
            .map(|page| &**page)
    }

    fn load_page(&self, page_ndx: usize) -> Result<Box<[T]>, ResourceError> {
        let first = page_ndx << self.page_log2;
        let count = self.page_records().min(self.len - first);
        let offset = (first * T::SIZE) as u64;
        let mut buf = vec![0u8; count * T::SIZE];

        {
            let mut resource = self.resource.lock();
            if resource.position() != offset {
                resource.set_position(offset)?;
            }
            resource.read_exact(&mut buf)?;
        }
        self.page_reads.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(page = page_ndx, records = count, "page resident");
        Ok(buf.chunks_exact(T::SIZE).map(T::decode).collect())
    }
}

impl<T: Record> std::fmt::Debug for LazyResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyResource")
            .field("len", &self.len)
            .field("page_log2", &self.page_log2)
            .field("resident_pages", &self.resident_pages())
            .field("page_count", &self.pages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryResource;
    use std::io;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Pair(u16, u16);

    impl Record for Pair {
        const SIZE: usize = 4;

        fn decode(bytes: &[u8]) -> Self {
            Pair(
                u16::from_le_bytes([bytes[0], bytes[1]]),
                u16::from_le_bytes([bytes[2], bytes[3]]),
            )
        }

        fn encode(&self, out: &mut Vec<u8>) {
            out.extend_from_slice(&self.0.to_le_bytes());
            out.extend_from_slice(&self.1.to_le_bytes());
        }
    }

    /// Memory resource that logs every read and seek.
    struct Instrumented {
        inner: MemoryResource,
        reads: Arc<Mutex<Vec<(u64, usize)>>>,
        seeks: Arc<AtomicUsize>,
    }

    impl Resource for Instrumented {
        fn size(&self) -> u64 {
            self.inner.size()
        }

        fn position(&self) -> u64 {
            self.inner.position()
        }

        fn set_position(&mut self, pos: u64) -> io::Result<()> {
            self.seeks.fetch_add(1, Ordering::SeqCst);
            self.inner.set_position(pos)
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
            self.reads.lock().push((self.inner.position(), buf.len()));
            self.inner.read_exact(buf)
        }
    }

    fn pairs(n: u16) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..n {
            Pair(i, i.wrapping_mul(3)).encode(&mut out);
        }
        out
    }

    fn instrumented(
        data: Vec<u8>,
    ) -> (Box<dyn Resource>, Arc<Mutex<Vec<(u64, usize)>>>, Arc<AtomicUsize>) {
        let reads = Arc::new(Mutex::new(Vec::new()));
        let seeks = Arc::new(AtomicUsize::new(0));
        let res = Instrumented {
            inner: MemoryResource::new(data),
            reads: Arc::clone(&reads),
            seeks: Arc::clone(&seeks),
        };
        (Box::new(res), reads, seeks)
    }

    #[test]
    fn open_reads_nothing() {
        let (res, reads, _) = instrumented(pairs(100));
        let lazy = LazyResource::<Pair>::open(res, 4).unwrap();
        assert_eq!(lazy.len(), 100);
        assert_eq!(lazy.page_count(), 7);
        assert_eq!(lazy.resident_pages(), 0);
        assert!(reads.lock().is_empty());
    }

    #[test]
    fn truncated_resource_is_format_error() {
        let mut data = pairs(3);
        data.pop();
        let result = LazyResource::<Pair>::open(Box::new(MemoryResource::new(data)), 4);
        assert!(matches!(result, Err(ResourceError::Format(_))));
    }

    #[test]
    fn oversized_page_is_format_error() {
        let result =
            LazyResource::<Pair>::open(Box::new(MemoryResource::new(pairs(3))), usize::BITS);
        assert!(matches!(result, Err(ResourceError::Format(_))));

        let widest = LazyResource::<Pair>::open(
            Box::new(MemoryResource::new(pairs(3))),
            usize::BITS - 1,
        )
        .unwrap();
        assert_eq!(widest.page_count(), 1);
        assert_eq!(widest.get(2).unwrap(), Pair(2, 6));
    }

    #[test]
    fn get_returns_records() {
        let lazy =
            LazyResource::<Pair>::open(Box::new(MemoryResource::new(pairs(50))), 3).unwrap();
        assert_eq!(lazy.get(0).unwrap(), Pair(0, 0));
        assert_eq!(lazy.get(17).unwrap(), Pair(17, 51));
        assert_eq!(lazy.get(49).unwrap(), Pair(49, 147));
    }

    #[test]
    fn out_of_range_index() {
        let lazy =
            LazyResource::<Pair>::open(Box::new(MemoryResource::new(pairs(10))), 3).unwrap();
        assert!(matches!(
            lazy.get(10),
            Err(ResourceError::IndexOutOfRange { index: 10, len: 10 })
        ));
    }

    #[test]
    fn pages_load_once_on_first_touch() {
        let (res, reads, _) = instrumented(pairs(40));
        let lazy = LazyResource::<Pair>::open(res, 3).unwrap();

        lazy.get(1).unwrap();
        lazy.get(7).unwrap();
        lazy.get(0).unwrap();
        assert_eq!(lazy.resident_pages(), 1);
        assert_eq!(*reads.lock(), vec![(0, 32)]);

        lazy.get(9).unwrap();
        assert_eq!(lazy.resident_pages(), 2);
        assert_eq!(reads.lock().last(), Some(&(32, 32)));
        assert_eq!(lazy.page_reads(), 2);
    }

    #[test]
    fn last_page_is_short() {
        let (res, reads, _) = instrumented(pairs(10));
        let lazy = LazyResource::<Pair>::open(res, 3).unwrap();
        assert_eq!(lazy.get(9).unwrap(), Pair(9, 27));
        assert_eq!(*reads.lock(), vec![(32, 8)]);
    }

    #[test]
    fn seek_skipped_when_cursor_in_place() {
        let (res, _, seeks) = instrumented(pairs(32));
        let lazy = LazyResource::<Pair>::open(res, 3).unwrap();

        // Page 0 starts at the initial cursor; page 1 follows it directly.
        lazy.get(0).unwrap();
        lazy.get(8).unwrap();
        assert_eq!(seeks.load(Ordering::SeqCst), 0);

        lazy.get(31).unwrap();
        assert_eq!(seeks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_range_spans_pages() {
        let lazy = LazyResource::<u8>::open(
            Box::new(MemoryResource::new((0u8..=99).collect::<Vec<_>>())),
            4,
        )
        .unwrap();

        let range = lazy.read_range(10, 30).unwrap();
        assert_eq!(range, (10u8..40).collect::<Vec<_>>());
        assert_eq!(lazy.resident_pages(), 3);

        assert!(lazy.read_range(95, 5).is_ok());
        assert!(matches!(
            lazy.read_range(95, 6),
            Err(ResourceError::IndexOutOfRange { .. })
        ));
        assert!(lazy.read_range(100, 0).unwrap().is_empty());
    }

    #[test]
    fn concurrent_faults_read_each_page_once() {
        let (res, reads, _) = instrumented(pairs(64));
        let lazy = Arc::new(LazyResource::<Pair>::open(res, 4).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let lazy = Arc::clone(&lazy);
                std::thread::spawn(move || {
                    for i in 0..64u16 {
                        let ndx = ((i as usize) * 7 + t) % 64;
                        let expected = Pair(ndx as u16, (ndx as u16).wrapping_mul(3));
                        assert_eq!(lazy.get(ndx).unwrap(), expected);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(lazy.resident_pages(), 4);
        assert_eq!(reads.lock().len(), 4);
    }
}
