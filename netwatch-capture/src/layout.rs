//! `TPACKET_V3` ring layout
//!
//! Field offsets for `struct tpacket_block_desc` and `struct tpacket3_hdr`
//! from `linux/if_packet.h`. Offsets are relative to the start of the block
//! or of the packet record. Every field is native-endian.
//!
//! A block begins with `version` and `offset_to_priv`, followed by the
//! `tpacket_hdr_v1` that carries the ownership status. The status word is
//! therefore at offset 8, not 0.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `tpacket_versions::TPACKET_V3`
pub const TPACKET_V3: i32 = 2;

/// Block belongs to the kernel
pub const TP_STATUS_KERNEL: u32 = 0;

/// Block has been retired to user space
pub const TP_STATUS_USER: u32 = 1;

/// Frame size requested from the kernel; only used to derive `tp_frame_nr`
pub const FRAME_SIZE: u32 = 2048;

/// Milliseconds before the kernel retires a partially filled block
pub const BLOCK_RETIRE_TIMEOUT_MS: u32 = 100;

/// Largest snap length accepted from a record header
pub const MAX_SNAPLEN: u32 = 65536;

/// `struct tpacket_block_desc`
pub mod block {
    pub const VERSION: usize = 0;
    pub const OFFSET_TO_PRIV: usize = 4;
    pub const STATUS: usize = 8;
    pub const NUM_PKTS: usize = 12;
    pub const OFFSET_TO_FIRST_PKT: usize = 16;
    pub const BLK_LEN: usize = 20;
    pub const SEQ_NUM: usize = 24;
    pub const TS_FIRST: usize = 32;
    pub const TS_LAST: usize = 40;
    pub const HEADER_SIZE: usize = 48;
}

/// `struct tpacket3_hdr`
pub mod record {
    pub const NEXT_OFFSET: usize = 0;
    pub const SEC: usize = 4;
    pub const NSEC: usize = 8;
    pub const SNAPLEN: usize = 12;
    pub const LEN: usize = 16;
    pub const STATUS: usize = 20;
    pub const MAC: usize = 24;
    pub const NET: usize = 26;
    pub const HEADER_SIZE: usize = 48;
}

fn ne_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([bytes[at], bytes[at + 1]])
}

fn ne_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn ne_u64(bytes: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[at..at + 8]);
    u64::from_ne_bytes(word)
}

/// Decoded block descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub status: u32,
    pub num_pkts: u32,
    pub offset_to_first_pkt: u32,
    pub blk_len: u32,
    pub seq_num: u64,
}

impl BlockHeader {
    pub fn decode(bytes: &[u8; block::HEADER_SIZE]) -> Self {
        Self {
            version: ne_u32(bytes, block::VERSION),
            status: ne_u32(bytes, block::STATUS),
            num_pkts: ne_u32(bytes, block::NUM_PKTS),
            offset_to_first_pkt: ne_u32(bytes, block::OFFSET_TO_FIRST_PKT),
            blk_len: ne_u32(bytes, block::BLK_LEN),
            seq_num: ne_u64(bytes, block::SEQ_NUM),
        }
    }

    pub fn is_user_owned(&self) -> bool {
        self.status & TP_STATUS_USER != 0
    }
}

/// Decoded packet record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Distance to the next record, 0 on the last one
    pub next_offset: u32,
    pub sec: u32,
    pub nsec: u32,
    /// Captured bytes
    pub snaplen: u32,
    /// Original length on the wire
    pub len: u32,
    pub status: u32,
    /// Link-layer header offset from the start of the record
    pub mac: u16,
    /// Network header offset from the start of the record
    pub net: u16,
}

impl RecordHeader {
    pub fn decode(bytes: &[u8; record::HEADER_SIZE]) -> Self {
        Self {
            next_offset: ne_u32(bytes, record::NEXT_OFFSET),
            sec: ne_u32(bytes, record::SEC),
            nsec: ne_u32(bytes, record::NSEC),
            snaplen: ne_u32(bytes, record::SNAPLEN),
            len: ne_u32(bytes, record::LEN),
            status: ne_u32(bytes, record::STATUS),
            mac: ne_u16(bytes, record::MAC),
            net: ne_u16(bytes, record::NET),
        }
    }

    /// Kernel capture time
    pub fn timestamp(&self) -> SystemTime {
        let since_epoch = Duration::new(u64::from(self.sec), self.nsec);
        UNIX_EPOCH
            .checked_add(since_epoch)
            .unwrap_or_else(SystemTime::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_header_decode() {
        let mut raw = [0u8; block::HEADER_SIZE];
        raw[block::VERSION..block::VERSION + 4].copy_from_slice(&1u32.to_ne_bytes());
        raw[block::STATUS..block::STATUS + 4].copy_from_slice(&TP_STATUS_USER.to_ne_bytes());
        raw[block::NUM_PKTS..block::NUM_PKTS + 4].copy_from_slice(&3u32.to_ne_bytes());
        raw[block::OFFSET_TO_FIRST_PKT..block::OFFSET_TO_FIRST_PKT + 4]
            .copy_from_slice(&48u32.to_ne_bytes());
        raw[block::SEQ_NUM..block::SEQ_NUM + 8].copy_from_slice(&0x1_0000_0002u64.to_ne_bytes());

        let header = BlockHeader::decode(&raw);
        assert_eq!(header.version, 1);
        assert!(header.is_user_owned());
        assert_eq!(header.num_pkts, 3);
        assert_eq!(header.offset_to_first_pkt, 48);
        assert_eq!(header.seq_num, 0x1_0000_0002);
    }

    #[test]
    fn test_record_header_decode() {
        let mut raw = [0u8; record::HEADER_SIZE];
        raw[record::NEXT_OFFSET..4].copy_from_slice(&128u32.to_ne_bytes());
        raw[record::SEC..8].copy_from_slice(&1_700_000_000u32.to_ne_bytes());
        raw[record::NSEC..12].copy_from_slice(&500u32.to_ne_bytes());
        raw[record::SNAPLEN..16].copy_from_slice(&60u32.to_ne_bytes());
        raw[record::LEN..20].copy_from_slice(&1514u32.to_ne_bytes());
        raw[record::MAC..26].copy_from_slice(&66u16.to_ne_bytes());
        raw[record::NET..28].copy_from_slice(&80u16.to_ne_bytes());

        let header = RecordHeader::decode(&raw);
        assert_eq!(header.next_offset, 128);
        assert_eq!(header.snaplen, 60);
        assert_eq!(header.len, 1514);
        assert_eq!(header.mac, 66);
        assert_eq!(header.net, 80);
        assert_eq!(
            header.timestamp(),
            UNIX_EPOCH + Duration::new(1_700_000_000, 500)
        );
    }
}
