//! Operating-system capability layer
//!
//! Everything the capture engine and interface manager need from the host
//! goes through [`CapturePlatform`]. Linux gets a raw `AF_PACKET`
//! implementation; other systems get [`UnsupportedPlatform`], which still
//! enumerates interfaces but refuses to capture.

use netwatch_core::Result;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::interface::{system_interfaces, InterfaceCounters, InterfaceInfo};
use crate::ring::RingBuffer;

#[cfg(target_os = "linux")]
mod linux;
mod unsupported;

#[cfg(target_os = "linux")]
pub use linux::LinuxPlatform;
pub use unsupported::UnsupportedPlatform;

/// Host services used for interface discovery and capture
pub trait CapturePlatform: Send + Sync {
    /// Short platform name for logs and errors
    fn name(&self) -> &str;

    /// Fresh snapshot of every interface on the host
    fn interfaces(&self) -> Vec<InterfaceInfo> {
        system_interfaces(self)
    }

    /// Traffic counters for `name`; zeros when unavailable
    fn interface_counters(&self, name: &str) -> InterfaceCounters;

    /// MTU for `name`, if the host exposes it
    fn interface_mtu(&self, name: &str) -> Option<u32>;

    /// Open and immediately close a diagnostic capture socket
    fn check_capture_privileges(&self) -> Result<()>;

    /// Build a capture socket and its receive ring on `interface`
    fn open(&self, interface: &InterfaceInfo, config: &EngineConfig)
        -> Result<Box<dyn CaptureSource>>;
}

/// An open capture socket with its mapped receive ring
pub trait CaptureSource: Send + Sync {
    /// Wait up to `timeout` for the socket to become readable
    ///
    /// `Ok(false)` means the wait timed out.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    fn ring(&self) -> &RingBuffer;

    /// Unmap the ring, then close the socket; later calls are no-ops
    fn close(&self);
}

/// The platform implementation for the running host
pub fn default_platform() -> Arc<dyn CapturePlatform> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(LinuxPlatform::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(UnsupportedPlatform::new())
    }
}
