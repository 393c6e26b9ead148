//! IPv4 and IPv6 header decoding
//!
//! Both decoders read only the fixed header fields. IPv4 options are skipped
//! using the header length; IPv6 extension headers are not followed.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// IP Protocol numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// IGMP (2)
    IGMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    /// Custom protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::IGMP => 2,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            2 => IpProtocol::IGMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            58 => IpProtocol::ICMPv6,
            val => IpProtocol::Custom(val),
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProtocol::ICMP => write!(f, "ICMP"),
            IpProtocol::IGMP => write!(f, "IGMP"),
            IpProtocol::TCP => write!(f, "TCP"),
            IpProtocol::UDP => write!(f, "UDP"),
            IpProtocol::ICMPv6 => write!(f, "ICMPv6"),
            IpProtocol::Custom(val) => write!(f, "{}", val),
        }
    }
}

/// IP Flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment flag
    pub dont_fragment: bool,
    /// More Fragments flag
    pub more_fragments: bool,
}

impl IpFlags {
    /// Parse from 3-bit value
    pub fn from_u8(value: u8) -> Self {
        IpFlags {
            reserved: (value & 0b100) != 0,
            dont_fragment: (value & 0b010) != 0,
            more_fragments: (value & 0b001) != 0,
        }
    }
}

/// Decoded IPv4 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Version (4 for well-formed packets)
    pub version: u8,
    /// Internet Header Length in 32-bit words
    pub ihl: u8,
    /// Type of Service / DSCP+ECN byte
    pub tos: u8,
    /// Total length (header + data) in bytes
    pub total_length: u16,
    /// Identification
    pub identification: u16,
    /// Flags
    pub flags: IpFlags,
    /// Fragment offset (in 8-byte blocks)
    pub fragment_offset: u16,
    /// Time to Live
    pub ttl: u8,
    /// Protocol
    pub protocol: IpProtocol,
    /// Header checksum, as transmitted
    pub checksum: u16,
    /// Source IP address
    pub source: Ipv4Addr,
    /// Destination IP address
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// Minimum IPv4 header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Decode the header at the start of `data`
    ///
    /// Fails when fewer than 20 bytes are present, when the header length
    /// field is below the minimum, or when the declared header length runs
    /// past the buffer.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return None;
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        let header_len = (ihl as usize) * 4;
        if header_len < Self::MIN_HEADER_SIZE || data.len() < header_len {
            return None;
        }

        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);

        Some(Ipv4Header {
            version,
            ihl,
            tos: data[1],
            total_length: u16::from_be_bytes([data[2], data[3]]),
            identification: u16::from_be_bytes([data[4], data[5]]),
            flags: IpFlags::from_u8((flags_and_offset >> 13) as u8),
            fragment_offset: flags_and_offset & 0x1FFF,
            ttl: data[8],
            protocol: IpProtocol::from_u8(data[9]),
            checksum: u16::from_be_bytes([data[10], data[11]]),
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        })
    }

    /// Get the header size in bytes
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }
}

/// Decoded IPv6 fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    /// Version (6 for well-formed packets)
    pub version: u8,
    pub traffic_class: u8,
    /// 20-bit flow label
    pub flow_label: u32,
    /// Length of everything after the fixed header
    pub payload_length: u16,
    pub next_header: IpProtocol,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
}

impl Ipv6Header {
    /// Fixed IPv6 header size
    pub const HEADER_SIZE: usize = 40;

    /// Decode the fixed header at the start of `data`
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let source: [u8; 16] = data[8..24].try_into().ok()?;
        let destination: [u8; 16] = data[24..40].try_into().ok()?;

        Some(Ipv6Header {
            version: (word >> 28) as u8,
            traffic_class: ((word >> 20) & 0xFF) as u8,
            flow_label: word & 0x000F_FFFF,
            payload_length: u16::from_be_bytes([data[4], data[5]]),
            next_header: IpProtocol::from_u8(data[6]),
            hop_limit: data[7],
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_bytes() -> Vec<u8> {
        vec![
            0x45, 0x10, 0x00, 0x3c, // v4, ihl 5, tos 0x10, total 60
            0x1c, 0x46, 0x40, 0x00, // id 0x1c46, DF
            0x40, 0x06, 0xb1, 0xe6, // ttl 64, tcp, checksum
            192, 168, 1, 1, // src
            10, 0, 0, 2, // dst
        ]
    }

    #[test]
    fn test_ip_protocol_conversion() {
        assert_eq!(IpProtocol::TCP.to_u8(), 6);
        assert_eq!(IpProtocol::UDP.to_u8(), 17);
        assert_eq!(IpProtocol::from_u8(6), IpProtocol::TCP);
        assert_eq!(IpProtocol::from_u8(200), IpProtocol::Custom(200));
    }

    #[test]
    fn test_ip_flags() {
        let flags = IpFlags::from_u8(0b010);
        assert!(!flags.reserved);
        assert!(flags.dont_fragment);
        assert!(!flags.more_fragments);
        assert!(IpFlags::from_u8(0b101).more_fragments);
    }

    #[test]
    fn test_ipv4_header_fields() {
        let header = Ipv4Header::from_bytes(&ipv4_bytes()).unwrap();

        assert_eq!(header.version, 4);
        assert_eq!(header.ihl, 5);
        assert_eq!(header.header_len(), 20);
        assert_eq!(header.tos, 0x10);
        assert_eq!(header.total_length, 60);
        assert_eq!(header.identification, 0x1c46);
        assert!(header.flags.dont_fragment);
        assert_eq!(header.fragment_offset, 0);
        assert_eq!(header.ttl, 64);
        assert_eq!(header.protocol, IpProtocol::TCP);
        assert_eq!(header.checksum, 0xb1e6);
        assert_eq!(header.source, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(header.destination, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_ipv4_header_rejects_bad_ihl() {
        let mut data = ipv4_bytes();
        data[0] = 0x44; // ihl 4 => 16 bytes
        assert!(Ipv4Header::from_bytes(&data).is_none());

        data[0] = 0x46; // ihl 6 => 24 bytes, only 20 present
        assert!(Ipv4Header::from_bytes(&data).is_none());
    }

    #[test]
    fn test_ipv4_header_with_options() {
        let mut data = ipv4_bytes();
        data[0] = 0x46;
        data.extend_from_slice(&[0x01, 0x01, 0x01, 0x00]);
        let header = Ipv4Header::from_bytes(&data).unwrap();
        assert_eq!(header.header_len(), 24);
    }

    #[test]
    fn test_ipv6_header_fields() {
        let mut data = vec![0x60, 0xA1, 0x23, 0x45, 0x00, 0x14, 17, 64];
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        data.extend_from_slice(&"fe80::1".parse::<Ipv6Addr>().unwrap().octets());

        let header = Ipv6Header::from_bytes(&data).unwrap();
        assert_eq!(header.version, 6);
        assert_eq!(header.traffic_class, 0x0A);
        assert_eq!(header.flow_label, 0x12345);
        assert_eq!(header.payload_length, 20);
        assert_eq!(header.next_header, IpProtocol::UDP);
        assert_eq!(header.hop_limit, 64);
        assert_eq!(header.source, Ipv6Addr::LOCALHOST);
        assert_eq!(header.destination, "fe80::1".parse::<Ipv6Addr>().unwrap());
    }

    #[test]
    fn test_ipv6_header_too_short() {
        assert!(Ipv6Header::from_bytes(&[0x60; 39]).is_none());
    }
}
