//! Block-oriented walker over a `TPACKET_V3` receive ring
//!
//! The ring is `block_count` contiguous blocks of `block_size` bytes. The
//! kernel fills a block, flips its status to user-owned and moves on; the
//! walker consumes the block at its cursor, hands it back and advances.

use netwatch_core::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::time::SystemTime;
use tracing::debug;

use crate::layout::{
    block, record, BlockHeader, RecordHeader, MAX_SNAPLEN, TP_STATUS_KERNEL, TP_STATUS_USER,
};
use crate::region::RingRegion;

/// System memory page size
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
    }
    4096
}

/// Check ring geometry before any resource is allocated
pub fn validate_geometry(block_size: usize, block_count: usize) -> Result<()> {
    let page = page_size();
    if block_size == 0 || block_size % page != 0 {
        return Err(Error::invalid_ring_config(format!(
            "block size {} must be a positive multiple of the page size ({})",
            block_size, page
        )));
    }
    if block_count == 0 {
        return Err(Error::invalid_ring_config("block count must be greater than zero"));
    }
    if block_size.checked_mul(block_count).is_none() {
        return Err(Error::invalid_ring_config(format!(
            "{} blocks of {} bytes overflow the address space",
            block_count, block_size
        )));
    }
    Ok(())
}

/// Receive ring over a shared memory region
pub struct RingBuffer {
    /// `None` once closed
    region: RwLock<Option<Box<dyn RingRegion>>>,
    block_size: usize,
    block_count: usize,
    /// Index of the next block to consume
    cursor: Mutex<usize>,
}

impl RingBuffer {
    /// Wrap a region holding `block_count` blocks of `block_size` bytes
    pub fn new(region: Box<dyn RingRegion>, block_size: usize, block_count: usize) -> Result<Self> {
        validate_geometry(block_size, block_count)?;

        let required = block_size * block_count;
        if region.len() < required {
            return Err(Error::invalid_ring_config(format!(
                "region of {} bytes cannot hold {} blocks of {} bytes",
                region.len(),
                block_count,
                block_size
            )));
        }

        Ok(Self {
            region: RwLock::new(Some(region)),
            block_size,
            block_count,
            cursor: Mutex::new(0),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Index of the block the next call to [`process_packets`](Self::process_packets) inspects
    pub fn cursor(&self) -> usize {
        *self.cursor.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.region.read_recursive().is_none()
    }

    /// Consume the block at the cursor
    ///
    /// Returns `Ok(None)` when the block is still owned by the kernel. For a
    /// user-owned block, `handler` receives each record's payload and
    /// timestamp, then the block is returned to the kernel and the cursor
    /// advances, even when a malformed record cut the walk short. In that
    /// case the records handled before the bad one stand and the error is
    /// returned.
    pub fn process_packets<F>(&self, mut handler: F) -> Result<Option<usize>>
    where
        F: FnMut(&[u8], SystemTime),
    {
        let guard = self.region.read();
        let region = guard.as_deref().ok_or(Error::RingBufferClosed)?;

        let mut cursor = self.cursor.lock();
        let block_start = *cursor * self.block_size;
        let status_offset = block_start + block::STATUS;

        let status = region
            .load_status(status_offset)
            .ok_or_else(|| Error::ring_record("block header outside ring region"))?;
        if status & TP_STATUS_USER == 0 {
            return Ok(None);
        }

        let walked = self.walk_block(region, block_start, &mut handler);

        region
            .store_status(status_offset, TP_STATUS_KERNEL)
            .ok_or_else(|| Error::ring_record("block header outside ring region"))?;
        *cursor = (*cursor + 1) % self.block_count;

        walked.map(Some)
    }

    fn walk_block(
        &self,
        region: &dyn RingRegion,
        block_start: usize,
        handler: &mut dyn FnMut(&[u8], SystemTime),
    ) -> Result<usize> {
        let mut raw_block = [0u8; block::HEADER_SIZE];
        region
            .read_into(block_start, &mut raw_block)
            .ok_or_else(|| Error::ring_record("block header outside ring region"))?;
        let header = BlockHeader::decode(&raw_block);

        let mut offset = header.offset_to_first_pkt as usize;
        let mut handled = 0;

        for _ in 0..header.num_pkts {
            if offset < block::HEADER_SIZE || offset + record::HEADER_SIZE > self.block_size {
                return Err(Error::ring_record(format!(
                    "record at offset {} does not fit in a {} byte block",
                    offset, self.block_size
                )));
            }

            let mut raw_record = [0u8; record::HEADER_SIZE];
            region
                .read_into(block_start + offset, &mut raw_record)
                .ok_or_else(|| Error::ring_record("record header outside ring region"))?;
            let rec = RecordHeader::decode(&raw_record);

            if rec.snaplen == 0 || rec.snaplen > MAX_SNAPLEN {
                return Err(Error::ring_record(format!(
                    "snap length {} at offset {} out of range",
                    rec.snaplen, offset
                )));
            }

            let mac = rec.mac as usize;
            if mac < record::HEADER_SIZE {
                return Err(Error::ring_record(format!(
                    "link-layer offset {} overlaps the record header",
                    mac
                )));
            }

            let payload_start = offset + mac;
            let snaplen = rec.snaplen as usize;
            if payload_start + snaplen > self.block_size {
                return Err(Error::ring_record(format!(
                    "payload of {} bytes at offset {} runs past the block",
                    snaplen, payload_start
                )));
            }

            let timestamp = rec.timestamp();
            region
                .with_slice(block_start + payload_start, snaplen, &mut |payload| {
                    handler(payload, timestamp)
                })
                .ok_or_else(|| Error::ring_record("payload outside ring region"))?;
            handled += 1;

            if rec.next_offset == 0 {
                break;
            }
            if (rec.next_offset as usize) < record::HEADER_SIZE {
                return Err(Error::ring_record(format!(
                    "next record offset {} shorter than a record header",
                    rec.next_offset
                )));
            }
            offset += rec.next_offset as usize;
        }

        Ok(handled)
    }

    /// Fraction of blocks currently waiting for user space, in `[0, 1]`
    ///
    /// Safe to call from inside a `process_packets` handler. Returns 0 after
    /// the ring is closed.
    pub fn utilization(&self) -> f64 {
        let guard = self.region.read_recursive();
        let Some(region) = guard.as_deref() else {
            return 0.0;
        };

        let ready = (0..self.block_count)
            .filter(|index| {
                region
                    .load_status(index * self.block_size + block::STATUS)
                    .map_or(false, |status| status & TP_STATUS_USER != 0)
            })
            .count();

        ready as f64 / self.block_count as f64
    }

    /// Release the region; later calls are no-ops
    pub fn close(&self) {
        let region = self.region.write().take();
        if region.is_some() {
            drop(region);
            debug!(
                block_size = self.block_size,
                block_count = self.block_count,
                "ring buffer released"
            );
        }
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::HeapRegion;
    use crate::test_support::{BlockWriter, RecordSpec};
    use std::sync::Arc;

    fn ring(block_count: usize) -> (Arc<HeapRegion>, RingBuffer) {
        let block_size = page_size();
        let region = Arc::new(HeapRegion::new(block_size * block_count));
        let ring = RingBuffer::new(Box::new(Arc::clone(&region)), block_size, block_count).unwrap();
        (region, ring)
    }

    fn collect(ring: &RingBuffer) -> (Result<Option<usize>>, Vec<Vec<u8>>) {
        let mut seen = Vec::new();
        let result = ring.process_packets(|payload, _| seen.push(payload.to_vec()));
        (result, seen)
    }

    #[test]
    fn test_geometry_validation() {
        let page = page_size();
        assert!(validate_geometry(page, 1).is_ok());
        assert!(validate_geometry(page * 8, 64).is_ok());

        for (size, count) in [(0, 4), (page + 1, 4), (page / 2, 4), (page, 0)] {
            match validate_geometry(size, count) {
                Err(Error::InvalidRingConfig(_)) => {}
                other => panic!("expected InvalidRingConfig for {}x{}, got {:?}", size, count, other),
            }
        }
    }

    #[test]
    fn test_region_too_small() {
        let page = page_size();
        let region = HeapRegion::new(page * 2 - 1);
        let result = RingBuffer::new(Box::new(region), page, 2);
        assert!(matches!(result, Err(Error::InvalidRingConfig(_))));
    }

    #[test]
    fn test_kernel_owned_block_is_not_ready() {
        let (_region, ring) = ring(4);
        let (result, seen) = collect(&ring);
        assert!(matches!(result, Ok(None)));
        assert!(seen.is_empty());
        assert_eq!(ring.cursor(), 0);
    }

    #[test]
    fn test_walks_records_and_releases_block() {
        let (region, ring) = ring(4);
        BlockWriter::new(&region, ring.block_size())
            .write(0, &[RecordSpec::packet(b"first"), RecordSpec::packet(b"second")]);

        assert_eq!(ring.utilization(), 0.25);

        let (result, seen) = collect(&ring);
        assert_eq!(result.unwrap(), Some(2));
        assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(ring.cursor(), 1);
        assert_eq!(region.load_status(block::STATUS), Some(TP_STATUS_KERNEL));
        assert_eq!(ring.utilization(), 0.0);
    }

    #[test]
    fn test_handler_receives_kernel_timestamp() {
        let (region, ring) = ring(1);
        let spec = RecordSpec::packet(b"ts").at(1_700_000_123, 42);
        BlockWriter::new(&region, ring.block_size()).write(0, &[spec]);

        let mut stamps = Vec::new();
        ring.process_packets(|_, ts| stamps.push(ts)).unwrap();
        assert_eq!(
            stamps,
            vec![std::time::UNIX_EPOCH + std::time::Duration::new(1_700_000_123, 42)]
        );
    }

    #[test]
    fn test_cursor_wraps() {
        let (region, ring) = ring(2);
        let writer = BlockWriter::new(&region, ring.block_size());

        for round in 0..3 {
            let block = round % 2;
            writer.write(block, &[RecordSpec::packet(b"x")]);
            assert_eq!(collect(&ring).0.unwrap(), Some(1));
        }
        assert_eq!(ring.cursor(), 1);
    }

    #[test]
    fn test_walk_stops_at_declared_count() {
        let (region, ring) = ring(1);
        let writer = BlockWriter::new(&region, ring.block_size());
        writer.write(0, &[RecordSpec::packet(b"a"), RecordSpec::packet(b"b"), RecordSpec::packet(b"c")]);
        writer.set_num_pkts(0, 2);

        let (result, seen) = collect(&ring);
        assert_eq!(result.unwrap(), Some(2));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_malformed_record_releases_block() {
        let (region, ring) = ring(2);
        let writer = BlockWriter::new(&region, ring.block_size());
        writer.write(
            0,
            &[
                RecordSpec::packet(b"good"),
                RecordSpec::packet(b"bad").with_snaplen(0),
                RecordSpec::packet(b"never"),
            ],
        );

        let (result, seen) = collect(&ring);
        assert!(matches!(result, Err(Error::RingRecord(_))));
        assert_eq!(seen, vec![b"good".to_vec()]);
        assert_eq!(region.load_status(block::STATUS), Some(TP_STATUS_KERNEL));
        assert_eq!(ring.cursor(), 1);
        assert!(!ring.is_closed());
    }

    #[test]
    fn test_payload_past_block_end_is_rejected() {
        let (region, ring) = ring(1);
        let oversized = ring.block_size() as u32;
        BlockWriter::new(&region, ring.block_size())
            .write(0, &[RecordSpec::packet(b"x").with_snaplen(oversized)]);

        let (result, seen) = collect(&ring);
        assert!(matches!(result, Err(Error::RingRecord(_))));
        assert!(seen.is_empty());
        assert_eq!(ring.cursor(), 0);
    }

    #[test]
    fn test_short_next_offset_is_rejected() {
        let (region, ring) = ring(1);
        BlockWriter::new(&region, ring.block_size()).write(
            0,
            &[RecordSpec::packet(b"one").with_next_offset(8), RecordSpec::packet(b"two")],
        );

        let (result, seen) = collect(&ring);
        assert!(matches!(result, Err(Error::RingRecord(_))));
        assert_eq!(seen, vec![b"one".to_vec()]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (region, ring) = ring(2);
        BlockWriter::new(&region, ring.block_size()).write(0, &[RecordSpec::packet(b"x")]);

        ring.close();
        ring.close();
        assert!(ring.is_closed());
        assert_eq!(ring.utilization(), 0.0);

        let mut called = false;
        let result = ring.process_packets(|_, _| called = true);
        assert!(matches!(result, Err(Error::RingBufferClosed)));
        assert!(!called);
    }

    #[test]
    fn test_utilization_inside_handler() {
        let (region, ring) = ring(4);
        let writer = BlockWriter::new(&region, ring.block_size());
        writer.write(0, &[RecordSpec::packet(b"x")]);
        writer.write(1, &[RecordSpec::packet(b"y")]);

        let mut observed = Vec::new();
        ring.process_packets(|_, _| observed.push(ring.utilization())).unwrap();
        assert_eq!(observed, vec![0.5]);
    }
}
