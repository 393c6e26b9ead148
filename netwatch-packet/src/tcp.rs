//! TCP header decoding

use std::fmt;

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - No more data from sender
    pub fin: bool,
    /// SYN - Synchronize sequence numbers
    pub syn: bool,
    /// RST - Reset the connection
    pub rst: bool,
    /// PSH - Push function
    pub psh: bool,
    /// ACK - Acknowledgment field is significant
    pub ack: bool,
    /// URG - Urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN-Echo
    pub ece: bool,
    /// CWR - Congestion Window Reduced
    pub cwr: bool,
}

impl TcpFlags {
    /// Parse from the flags byte
    pub fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: (value & 0x01) != 0,
            syn: (value & 0x02) != 0,
            rst: (value & 0x04) != 0,
            psh: (value & 0x08) != 0,
            ack: (value & 0x10) != 0,
            urg: (value & 0x20) != 0,
            ece: (value & 0x40) != 0,
            cwr: (value & 0x80) != 0,
        }
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.syn, "SYN"),
            (self.ack, "ACK"),
            (self.fin, "FIN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.urg, "URG"),
            (self.ece, "ECE"),
            (self.cwr, "CWR"),
        ];

        let set: Vec<&str> = names
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();

        if set.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", set.join(","))
        }
    }
}

/// Decoded TCP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    /// Header length in 32-bit words
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
}

impl TcpHeader {
    /// Minimum TCP header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Decode the header at the start of `data`
    ///
    /// The data offset must be at least 5 words and the declared header,
    /// options included, must fit in `data`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return None;
        }

        let data_offset = data[12] >> 4;
        let header_len = (data_offset as usize) * 4;
        if header_len < Self::MIN_HEADER_SIZE || data.len() < header_len {
            return None;
        }

        Some(TcpHeader {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            destination_port: u16::from_be_bytes([data[2], data[3]]),
            sequence: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            acknowledgment: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            data_offset,
            flags: TcpFlags::from_u8(data[13]),
            window: u16::from_be_bytes([data[14], data[15]]),
            checksum: u16::from_be_bytes([data[16], data[17]]),
            urgent_pointer: u16::from_be_bytes([data[18], data[19]]),
        })
    }

    /// Get the header size in bytes
    pub fn header_len(&self) -> usize {
        (self.data_offset as usize) * 4
    }
}
