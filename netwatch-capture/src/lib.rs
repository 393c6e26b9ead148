//! Packet capture engine for Netwatch
//!
//! Captures raw frames through a kernel-shared `TPACKET_V3` receive ring on
//! Linux and hands them to consumers over a bounded queue.
//!
//! ## Features
//!
//! - **Interface Management**: enumerate, validate and score interfaces, and
//!   pick a sensible default capture target
//! - **Ring Buffer**: bounds-checked walker over the kernel's block/record
//!   layout
//! - **Capture Engine**: start/stop lifecycle with a background receive loop
//! - **Statistics**: received, dropped and error counters plus ring
//!   occupancy, forwarded to an optional metrics sink
//!
//! ## Example
//!
//! ```no_run
//! use netwatch_capture::{EngineConfig, InterfaceManager, PacketCaptureEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let target = InterfaceManager::new().select_default()?;
//!
//! let engine = PacketCaptureEngine::new();
//! engine.start(&target.name, EngineConfig::default())?;
//!
//! for packet in engine.packets().iter().take(10) {
//!     println!("Got packet: {} bytes", packet.len());
//! }
//!
//! engine.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod interface;
pub mod layout;
pub mod metrics;
pub mod platform;
pub mod region;
pub mod ring;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use engine::{EngineConfig, EngineState, PacketCaptureEngine};
pub use interface::{
    select_default_from, InterfaceCounters, InterfaceFlags, InterfaceInfo, InterfaceManager,
    InterfaceType,
};
pub use metrics::{
    CaptureMetrics, MetricsCollector, MetricsSnapshot, SystemMetrics, SystemMetricsCollector,
};
pub use platform::{default_platform, CapturePlatform, CaptureSource, UnsupportedPlatform};
pub use region::{HeapRegion, RingRegion};
pub use ring::RingBuffer;
pub use stats::{CaptureStatistics, StatsRecorder};

#[cfg(target_os = "linux")]
pub use platform::LinuxPlatform;
