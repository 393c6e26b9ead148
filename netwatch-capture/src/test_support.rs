//! Ring block builder and an in-memory capture platform for unit tests

use netwatch_core::{Error, Result};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::interface::{InterfaceCounters, InterfaceFlags, InterfaceInfo};
use crate::layout::{block, record, TP_STATUS_USER};
use crate::platform::{CapturePlatform, CaptureSource};
use crate::region::{HeapRegion, RingRegion};
use crate::ring::RingBuffer;

/// Link-layer offset used for every generated record
const MAC_OFFSET: usize = record::HEADER_SIZE + 16;

/// One packet record to place in a block
#[derive(Debug, Clone)]
pub(crate) struct RecordSpec {
    payload: Vec<u8>,
    sec: u32,
    nsec: u32,
    snaplen: Option<u32>,
    next_offset: Option<u32>,
}

impl RecordSpec {
    pub(crate) fn packet(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            sec: 0,
            nsec: 0,
            snaplen: None,
            next_offset: None,
        }
    }

    pub(crate) fn at(mut self, sec: u32, nsec: u32) -> Self {
        self.sec = sec;
        self.nsec = nsec;
        self
    }

    /// Lie about the captured length
    pub(crate) fn with_snaplen(mut self, snaplen: u32) -> Self {
        self.snaplen = Some(snaplen);
        self
    }

    /// Lie about the distance to the next record
    pub(crate) fn with_next_offset(mut self, next_offset: u32) -> Self {
        self.next_offset = Some(next_offset);
        self
    }
}

/// Writes kernel-style blocks into a heap region
pub(crate) struct BlockWriter<'a> {
    region: &'a HeapRegion,
    block_size: usize,
}

impl<'a> BlockWriter<'a> {
    pub(crate) fn new(region: &'a HeapRegion, block_size: usize) -> Self {
        Self { region, block_size }
    }

    fn put_u32(&self, at: usize, value: u32) {
        self.region.write(at, &value.to_ne_bytes()).unwrap();
    }

    fn put_u16(&self, at: usize, value: u16) {
        self.region.write(at, &value.to_ne_bytes()).unwrap();
    }

    /// Fill `index` with `records` and hand it to user space
    ///
    /// The status word is published last, the way the kernel retires a block.
    pub(crate) fn write(&self, index: usize, records: &[RecordSpec]) {
        let base = index * self.block_size;
        let mut offset = block::HEADER_SIZE;

        for (i, spec) in records.iter().enumerate() {
            let start = base + offset;
            let stride = (MAC_OFFSET + spec.payload.len() + 15) & !15;
            let next = match spec.next_offset {
                Some(next) => next,
                None if i + 1 == records.len() => 0,
                None => stride as u32,
            };

            self.put_u32(start + record::NEXT_OFFSET, next);
            self.put_u32(start + record::SEC, spec.sec);
            self.put_u32(start + record::NSEC, spec.nsec);
            self.put_u32(
                start + record::SNAPLEN,
                spec.snaplen.unwrap_or(spec.payload.len() as u32),
            );
            self.put_u32(start + record::LEN, spec.payload.len() as u32);
            self.put_u32(start + record::STATUS, TP_STATUS_USER);
            self.put_u16(start + record::MAC, MAC_OFFSET as u16);
            self.put_u16(start + record::NET, (MAC_OFFSET + 14) as u16);
            self.region.write(start + MAC_OFFSET, &spec.payload).unwrap();

            offset += stride;
        }

        self.put_u32(base + block::VERSION, 1);
        self.put_u32(base + block::OFFSET_TO_PRIV, 0);
        self.put_u32(base + block::NUM_PKTS, records.len() as u32);
        self.put_u32(base + block::OFFSET_TO_FIRST_PKT, block::HEADER_SIZE as u32);
        self.put_u32(base + block::BLK_LEN, offset as u32);
        self.region
            .store_status(base + block::STATUS, TP_STATUS_USER)
            .unwrap();
    }

    pub(crate) fn set_num_pkts(&self, index: usize, num_pkts: u32) {
        self.put_u32(index * self.block_size + block::NUM_PKTS, num_pkts);
    }
}

/// Up, running, broadcast-capable interface with a 1500 byte MTU
pub(crate) fn iface(name: &str, index: u32) -> InterfaceInfo {
    InterfaceInfo {
        name: name.to_string(),
        index,
        mtu: 1500,
        flags: InterfaceFlags {
            up: true,
            running: true,
            loopback: false,
            broadcast: true,
            point_to_point: false,
            multicast: true,
        },
        mac: None,
        ips: Vec::new(),
        counters: InterfaceCounters::default(),
    }
}

/// Platform whose capture sources are heap rings filled by the test
pub(crate) struct FakePlatform {
    interfaces: Vec<InterfaceInfo>,
    privileged: bool,
    fail_waits: Arc<AtomicBool>,
    opened: AtomicUsize,
    last: Mutex<Option<(Arc<HeapRegion>, Arc<AtomicBool>)>>,
}

impl FakePlatform {
    pub(crate) const MTU: u32 = 9000;
    pub(crate) const COUNTERS: InterfaceCounters = InterfaceCounters {
        rx_bytes: 1000,
        rx_packets: 10,
        rx_errors: 0,
        tx_bytes: 500,
        tx_packets: 5,
        tx_errors: 0,
    };

    pub(crate) fn new(interfaces: Vec<InterfaceInfo>) -> Self {
        Self {
            interfaces,
            privileged: true,
            fail_waits: Arc::new(AtomicBool::new(false)),
            opened: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub(crate) fn loopback() -> InterfaceInfo {
        let mut lo = iface("lo", 1);
        lo.mtu = 65536;
        lo.flags.loopback = true;
        lo.flags.broadcast = false;
        lo
    }

    pub(crate) fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    /// Make readiness waits on every source fail
    pub(crate) fn fail_waits(&self, fail: bool) {
        self.fail_waits.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Region of the most recently opened source
    pub(crate) fn last_region(&self) -> Option<Arc<HeapRegion>> {
        self.last.lock().as_ref().map(|(region, _)| Arc::clone(region))
    }

    pub(crate) fn source_closed(&self) -> bool {
        self.last
            .lock()
            .as_ref()
            .map_or(false, |(_, closed)| closed.load(Ordering::SeqCst))
    }
}

impl CapturePlatform for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    fn interfaces(&self) -> Vec<InterfaceInfo> {
        self.interfaces.clone()
    }

    fn interface_counters(&self, _name: &str) -> InterfaceCounters {
        Self::COUNTERS
    }

    fn interface_mtu(&self, _name: &str) -> Option<u32> {
        Some(Self::MTU)
    }

    fn check_capture_privileges(&self) -> Result<()> {
        if self.privileged {
            Ok(())
        } else {
            Err(Error::InsufficientPrivileges("fake platform".to_string()))
        }
    }

    fn open(
        &self,
        _interface: &InterfaceInfo,
        config: &EngineConfig,
    ) -> Result<Box<dyn CaptureSource>> {
        let region = Arc::new(HeapRegion::new(config.ring_size()));
        let ring = RingBuffer::new(
            Box::new(Arc::clone(&region)),
            config.block_size,
            config.block_count,
        )?;
        let closed = Arc::new(AtomicBool::new(false));

        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((region, Arc::clone(&closed)));

        Ok(Box::new(FakeSource {
            ring,
            closed,
            fail_waits: Arc::clone(&self.fail_waits),
        }))
    }
}

struct FakeSource {
    ring: RingBuffer,
    closed: Arc<AtomicBool>,
    fail_waits: Arc<AtomicBool>,
}

impl CaptureSource for FakeSource {
    fn wait_readable(&self, _timeout: Duration) -> io::Result<bool> {
        thread::sleep(Duration::from_millis(1));
        if self.fail_waits.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected wait failure"));
        }
        Ok(true)
    }

    fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    fn close(&self) {
        self.ring.close();
        self.closed.store(true, Ordering::SeqCst);
    }
}
