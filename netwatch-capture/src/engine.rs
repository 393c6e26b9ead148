//! Capture engine: session lifecycle and the background receive loop

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use netwatch_core::{Error, RawPacket, Result};
use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

use crate::interface::{InterfaceInfo, InterfaceManager};
use crate::metrics::MetricsCollector;
use crate::platform::{default_platform, CapturePlatform, CaptureSource};
use crate::ring::validate_geometry;
use crate::stats::{CaptureStatistics, StatsRecorder};

/// Default ring block size (32 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Default number of ring blocks
pub const DEFAULT_BLOCK_COUNT: usize = 1024;

/// Default output queue capacity in packets
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Upper bound on one readiness wait
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Pause after a failed readiness wait
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Settings consumed when a session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Ring block size in bytes; a multiple of the page size
    pub block_size: usize,
    pub block_count: usize,
    /// Packets buffered between the receive loop and consumers
    pub queue_capacity: usize,
    /// Enable promiscuous mode
    pub promiscuous: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            promiscuous: false,
        }
    }
}

impl EngineConfig {
    /// Structural checks done before any resource is opened
    pub fn validate(&self) -> Result<()> {
        validate_geometry(self.block_size, self.block_count)?;
        if self.queue_capacity == 0 {
            return Err(Error::invalid_ring_config(
                "queue capacity must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Total bytes mapped for the ring
    pub fn ring_size(&self) -> usize {
        self.block_size.saturating_mul(self.block_count)
    }
}

/// Lifecycle state of a [`PacketCaptureEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Starting,
    Running,
    Stopping,
}

struct PacketQueue {
    sender: Sender<RawPacket>,
    receiver: Receiver<RawPacket>,
    capacity: usize,
}

impl PacketQueue {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }
}

type SharedCollector = Arc<RwLock<Option<Arc<dyn MetricsCollector>>>>;

struct Session {
    interface: InterfaceInfo,
    source: Arc<dyn CaptureSource>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Captures packets from one interface into a bounded queue
///
/// At most one session is active at a time. `start` and `stop` may be
/// called repeatedly; each session gets a fresh socket, ring, statistics
/// and queue.
pub struct PacketCaptureEngine {
    interfaces: InterfaceManager,
    state: RwLock<EngineState>,
    stats: StatsRecorder,
    queue: RwLock<PacketQueue>,
    metrics: SharedCollector,
    /// Serializes `start` and `stop`
    session: Mutex<Option<Session>>,
}

impl PacketCaptureEngine {
    /// Engine for the running host
    pub fn new() -> Self {
        Self::with_platform(default_platform())
    }

    pub fn with_platform(platform: Arc<dyn CapturePlatform>) -> Self {
        Self {
            interfaces: InterfaceManager::with_platform(platform),
            state: RwLock::new(EngineState::Idle),
            stats: StatsRecorder::new(),
            queue: RwLock::new(PacketQueue::new(DEFAULT_QUEUE_CAPACITY)),
            metrics: Arc::new(RwLock::new(None)),
            session: Mutex::new(None),
        }
    }

    /// Interface queries against the engine's platform
    pub fn interfaces(&self) -> &InterfaceManager {
        &self.interfaces
    }

    /// Open `interface` (name or index) and launch the receive loop
    ///
    /// On failure every resource opened so far is released and the engine
    /// stays idle.
    pub fn start(&self, interface: &str, config: EngineConfig) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(Error::EngineRunning);
        }

        *self.state.write() = EngineState::Starting;
        match self.open_session(interface, &config) {
            Ok(opened) => {
                info!(
                    interface = %opened.interface.name,
                    index = opened.interface.index,
                    block_size = config.block_size,
                    block_count = config.block_count,
                    queue_capacity = config.queue_capacity,
                    promiscuous = config.promiscuous,
                    "packet capture started"
                );
                *session = Some(opened);
                *self.state.write() = EngineState::Running;
                Ok(())
            }
            Err(e) => {
                *self.state.write() = EngineState::Idle;
                warn!(interface, error = %e, "packet capture failed to start");
                Err(e)
            }
        }
    }

    fn open_session(&self, interface: &str, config: &EngineConfig) -> Result<Session> {
        config.validate()?;
        let iface = self.interfaces.resolve(interface)?;

        let source: Arc<dyn CaptureSource> =
            Arc::from(self.interfaces.platform().open(&iface, config)?);

        self.stats.reset();
        let sender = {
            let mut queue = self.queue.write();
            *queue = PacketQueue::new(config.queue_capacity);
            queue.sender.clone()
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let receive_loop = CaptureLoop {
            source: Arc::clone(&source),
            sender,
            stats: self.stats.clone(),
            metrics: Arc::clone(&self.metrics),
            cancel: Arc::clone(&cancel),
            interface_index: iface.index,
            started_at: SystemTime::now(),
        };

        let handle = thread::Builder::new()
            .name(format!("netwatch-rx-{}", iface.name))
            .spawn(move || receive_loop.run())
            .map_err(|e| {
                source.close();
                Error::Io(e)
            })?;

        Ok(Session {
            interface: iface,
            source,
            cancel,
            handle: Some(handle),
        })
    }

    /// End the session, discarding packets still queued
    ///
    /// Receivers obtained from [`packets`](Self::packets) during the session
    /// observe disconnection.
    pub fn stop(&self) -> Result<()> {
        let mut guard = self.session.lock();
        let mut session = guard.take().ok_or(Error::EngineNotStarted)?;

        *self.state.write() = EngineState::Stopping;

        session.cancel.store(true, Ordering::Release);
        if let Some(handle) = session.handle.take() {
            if handle.join().is_err() {
                error!(interface = %session.interface.name, "receive loop panicked");
            }
        }
        session.source.close();

        let discarded = {
            let mut queue = self.queue.write();
            let discarded = queue.receiver.try_iter().count();
            let capacity = queue.capacity;
            *queue = PacketQueue::new(capacity);
            discarded
        };

        *self.state.write() = EngineState::Idle;

        let stats = self.stats.snapshot();
        info!(
            interface = %session.interface.name,
            packets_received = stats.packets_received,
            packets_dropped = stats.packets_dropped,
            errors = stats.error_count,
            discarded,
            "packet capture stopped"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.state.read() == EngineState::Running
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    /// Current counters with live ring utilization while running
    pub fn statistics(&self) -> CaptureStatistics {
        let mut stats = self.stats.snapshot();
        stats.ring_utilization = self
            .session
            .lock()
            .as_ref()
            .map_or(0.0, |s| s.source.ring().utilization());
        stats
    }

    /// Receiver side of the current output queue
    pub fn packets(&self) -> Receiver<RawPacket> {
        self.queue.read().receiver.clone()
    }

    /// Interface of the active session
    pub fn interface(&self) -> Option<InterfaceInfo> {
        self.session.lock().as_ref().map(|s| s.interface.clone())
    }

    /// Install or clear the sink fed after every delivered packet
    pub fn set_metrics_collector(&self, collector: Option<Arc<dyn MetricsCollector>>) {
        *self.metrics.write() = collector;
    }
}

impl Default for PacketCaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PacketCaptureEngine {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            let _ = self.stop();
        }
    }
}

/// State owned by the receive loop thread
struct CaptureLoop {
    source: Arc<dyn CaptureSource>,
    sender: Sender<RawPacket>,
    stats: StatsRecorder,
    metrics: SharedCollector,
    cancel: Arc<AtomicBool>,
    interface_index: u32,
    started_at: SystemTime,
}

impl CaptureLoop {
    fn run(self) {
        debug!(if_index = self.interface_index, "receive loop started");

        while !self.cancel.load(Ordering::Acquire) {
            match self.source.wait_readable(POLL_TIMEOUT) {
                Ok(true) => self.drain_ring(),
                Ok(false) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.stats.record_error();
                    error!(error = %e, "waiting for capture socket failed");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        debug!(if_index = self.interface_index, "receive loop finished");
    }

    /// Consume ready blocks, at most one lap of the ring
    fn drain_ring(&self) {
        let ring = self.source.ring();
        for _ in 0..ring.block_count() {
            match ring.process_packets(|payload, timestamp| self.deliver(payload, timestamp)) {
                Ok(Some(_)) => {}
                Ok(None) | Err(Error::RingBufferClosed) => break,
                Err(e) => {
                    self.stats.record_error();
                    debug!(error = %e, "ring block walk aborted");
                }
            }
        }
    }

    fn deliver(&self, payload: &[u8], timestamp: SystemTime) {
        if payload.is_empty() {
            return;
        }

        let packet = RawPacket::from_slice(self.interface_index, timestamp, payload);
        let size = packet.len();

        match self.sender.try_send(packet) {
            Ok(()) => {
                let mut snapshot = self.stats.record_packet(size, timestamp);
                if let Some(collector) = self.metrics.read().as_ref() {
                    snapshot.ring_utilization = self.source.ring().utilization();
                    collector.update_capture_metrics(&snapshot, self.started_at);
                }
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.record_drop();
            }
        }
    }
}
