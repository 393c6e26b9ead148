//! UDP header decoding

/// Decoded UDP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Length of header plus data, as transmitted
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    /// UDP header size (fixed at 8 bytes)
    pub const HEADER_SIZE: usize = 8;

    /// Decode the header at the start of `data`
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        Some(UdpHeader {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            destination_port: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            checksum: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    /// Whether the sender left the optional IPv4 checksum empty
    pub fn has_checksum(&self) -> bool {
        self.checksum != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_header_fields() {
        let data = [0x30, 0x39, 0x00, 0x35, 0x00, 0x0c, 0x00, 0x00, 0xde, 0xad];
        let header = UdpHeader::from_bytes(&data).unwrap();

        assert_eq!(header.source_port, 12345);
        assert_eq!(header.destination_port, 53);
        assert_eq!(header.length, 12);
        assert!(!header.has_checksum());
    }

    #[test]
    fn test_udp_header_too_short() {
        assert!(UdpHeader::from_bytes(&[0u8; 7]).is_none());
    }
}
