//! Packet types

use bytes::Bytes;
use std::time::SystemTime;

/// A packet lifted out of the capture ring
///
/// The payload is an owned copy; the ring block it came from is handed back
/// to the kernel as soon as the block walk finishes.
#[derive(Debug, Clone)]
pub struct RawPacket {
    /// Kernel timestamp of the capture
    pub timestamp: SystemTime,
    /// Index of the interface the packet was captured on
    pub interface_index: u32,
    /// Captured bytes, starting at the link-layer header
    pub data: Bytes,
    /// Number of captured bytes
    pub length: usize,
}

impl RawPacket {
    /// Create a packet from a borrowed record payload
    pub fn from_slice(interface_index: u32, timestamp: SystemTime, payload: &[u8]) -> Self {
        Self {
            timestamp,
            interface_index,
            data: Bytes::copy_from_slice(payload),
            length: payload.len(),
        }
    }

    /// Get packet data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get packet length
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if packet is empty
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}
