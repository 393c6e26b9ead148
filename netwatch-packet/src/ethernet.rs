//! Ethernet II header decoding

use netwatch_core::MacAddr;
use std::fmt;

/// Common EtherType values used in Ethernet II frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// VLAN-tagged frame (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// LLDP (0x88CC)
    LLDP,
    /// Anything else, including 802.3 length fields
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to u16 value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => 0x0800,
            EtherType::ARP => 0x0806,
            EtherType::VLAN => 0x8100,
            EtherType::IPv6 => 0x86DD,
            EtherType::LLDP => 0x88CC,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from u16 value
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0800 => EtherType::IPv4,
            0x0806 => EtherType::ARP,
            0x8100 => EtherType::VLAN,
            0x86DD => EtherType::IPv6,
            0x88CC => EtherType::LLDP,
            val => EtherType::Custom(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::LLDP => write!(f, "LLDP"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Decoded Ethernet II header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// EtherType or length field
    pub ethertype: EtherType,
}

impl EthernetHeader {
    /// Ethernet header size (dst + src + type/length)
    pub const HEADER_SIZE: usize = 14;

    /// Decode the header at the start of `data`
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        Some(EthernetHeader {
            destination: MacAddr::from_slice(&data[0..6])?,
            source: MacAddr::from_slice(&data[6..12])?,
            ethertype: EtherType::from_u16(u16::from_be_bytes([data[12], data[13]])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethertype_conversion() {
        assert_eq!(EtherType::IPv4.to_u16(), 0x0800);
        assert_eq!(EtherType::from_u16(0x86DD), EtherType::IPv6);
        assert_eq!(EtherType::from_u16(0x1234), EtherType::Custom(0x1234));
        assert_eq!(EtherType::Custom(0x1234).to_string(), "0x1234");
    }

    #[test]
    fn test_ethernet_header_from_bytes() {
        let data = vec![
            0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x08, 0x00, // IPv4
            0x01, 0x02,
        ];

        let header = EthernetHeader::from_bytes(&data).unwrap();
        assert_eq!(header.destination.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(header.source.0, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(header.ethertype, EtherType::IPv4);
    }

    #[test]
    fn test_ethernet_header_too_short() {
        assert!(EthernetHeader::from_bytes(&[0u8; 13]).is_none());
        assert!(EthernetHeader::from_bytes(&[]).is_none());
    }
}
