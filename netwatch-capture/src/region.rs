//! Memory regions backing a capture ring
//!
//! A region is the raw byte range the kernel and the capture loop share.
//! Every accessor is bounds-checked and returns `None` instead of touching
//! memory outside the region.

use parking_lot::RwLock;
use std::ops::Range;
use std::sync::Arc;

/// Byte-addressed access to a ring's backing memory
pub trait RingRegion: Send + Sync {
    /// Size of the region in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a native-endian status word with acquire ordering
    ///
    /// `offset` must be 4-byte aligned.
    fn load_status(&self, offset: usize) -> Option<u32>;

    /// Publish a native-endian status word with release ordering
    ///
    /// `offset` must be 4-byte aligned.
    fn store_status(&self, offset: usize, value: u32) -> Option<()>;

    /// Copy `out.len()` bytes starting at `offset` into `out`
    fn read_into(&self, offset: usize, out: &mut [u8]) -> Option<()>;

    /// Lend `len` bytes starting at `offset` to `visit`
    fn with_slice(&self, offset: usize, len: usize, visit: &mut dyn FnMut(&[u8])) -> Option<()>;
}

impl<R: RingRegion + ?Sized> RingRegion for Arc<R> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn load_status(&self, offset: usize) -> Option<u32> {
        (**self).load_status(offset)
    }

    fn store_status(&self, offset: usize, value: u32) -> Option<()> {
        (**self).store_status(offset, value)
    }

    fn read_into(&self, offset: usize, out: &mut [u8]) -> Option<()> {
        (**self).read_into(offset, out)
    }

    fn with_slice(&self, offset: usize, len: usize, visit: &mut dyn FnMut(&[u8])) -> Option<()> {
        (**self).with_slice(offset, len, visit)
    }
}

/// Range `offset..offset + len` if it lies inside a region of `total` bytes
pub(crate) fn checked_span(offset: usize, len: usize, total: usize) -> Option<Range<usize>> {
    let end = offset.checked_add(len)?;
    (end <= total).then_some(offset..end)
}

/// Status words must be naturally aligned
pub(crate) fn checked_status_span(offset: usize, total: usize) -> Option<Range<usize>> {
    if offset % 4 != 0 {
        return None;
    }
    checked_span(offset, 4, total)
}

/// Heap-backed region
///
/// Behaves like a mapped ring without a kernel on the other side. Used to
/// replay recorded ring blocks and to exercise the ring walker in tests.
///
/// Readers take recursive read locks, so a `with_slice` visitor may query
/// status words of the same region.
#[derive(Debug)]
pub struct HeapRegion {
    bytes: RwLock<Vec<u8>>,
}

impl HeapRegion {
    /// Create a zeroed region; every block starts kernel-owned
    pub fn new(len: usize) -> Self {
        Self {
            bytes: RwLock::new(vec![0u8; len]),
        }
    }

    /// Overwrite bytes starting at `offset`
    pub fn write(&self, offset: usize, data: &[u8]) -> Option<()> {
        let mut bytes = self.bytes.write();
        let span = checked_span(offset, data.len(), bytes.len())?;
        bytes[span].copy_from_slice(data);
        Some(())
    }
}

impl RingRegion for HeapRegion {
    fn len(&self) -> usize {
        self.bytes.read_recursive().len()
    }

    fn load_status(&self, offset: usize) -> Option<u32> {
        let bytes = self.bytes.read_recursive();
        let span = checked_status_span(offset, bytes.len())?;
        let word: [u8; 4] = bytes[span].try_into().ok()?;
        Some(u32::from_ne_bytes(word))
    }

    fn store_status(&self, offset: usize, value: u32) -> Option<()> {
        let mut bytes = self.bytes.write();
        let span = checked_status_span(offset, bytes.len())?;
        bytes[span].copy_from_slice(&value.to_ne_bytes());
        Some(())
    }

    fn read_into(&self, offset: usize, out: &mut [u8]) -> Option<()> {
        let bytes = self.bytes.read_recursive();
        let span = checked_span(offset, out.len(), bytes.len())?;
        out.copy_from_slice(&bytes[span]);
        Some(())
    }

    fn with_slice(&self, offset: usize, len: usize, visit: &mut dyn FnMut(&[u8])) -> Option<()> {
        let bytes = self.bytes.read_recursive();
        let span = checked_span(offset, len, bytes.len())?;
        visit(&bytes[span]);
        Some(())
    }
}
