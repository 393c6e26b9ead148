//! Packet header decoding for Netwatch
//!
//! This crate decodes captured frames into a layered header structure,
//! from layer 2 (Ethernet) to layer 4 (TCP/UDP):
//!
//! - **Ethernet II** frames with common EtherTypes
//! - **IPv4** headers, options skipped via the header length field
//! - **IPv6** fixed headers
//! - **TCP** headers, options skipped via the data offset
//! - **UDP** headers
//!
//! Decoding is pure and never panics. Truncated or unrecognised input yields
//! the layers that could be decoded plus the rest of the bytes as payload.
//!
//! # Example
//!
//! ```rust
//! use netwatch_packet::parse_packet;
//!
//! let frame = [
//!     0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dst
//!     0x02, 0x00, 0x00, 0x00, 0x00, 0x01, // src
//!     0x08, 0x00, // IPv4
//!     0x45, 0x00, // truncated IPv4 header
//! ];
//!
//! let packet = parse_packet(&frame);
//! assert!(packet.ethernet.is_some());
//! assert!(packet.network.is_none());
//! assert_eq!(packet.payload, &[0x45, 0x00]);
//! ```

pub mod ethernet;
pub mod ip;
pub mod parser;
pub mod tcp;
pub mod udp;

// Re-export commonly used types for convenience
pub use ethernet::{EtherType, EthernetHeader};
pub use ip::{IpFlags, IpProtocol, Ipv4Header, Ipv6Header};
pub use parser::{parse_packet, NetworkHeader, ParsedPacket, TransportHeader};
pub use tcp::{TcpFlags, TcpHeader};
pub use udp::UdpHeader;
