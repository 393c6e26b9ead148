//! Layered decoding of captured frames
//!
//! [`parse_packet`] never fails. Each layer is decoded only if the previous
//! one succeeded and enough bytes remain; whatever could not be decoded is
//! returned as the payload.

use std::fmt;

use crate::ethernet::{EtherType, EthernetHeader};
use crate::ip::{IpProtocol, Ipv4Header, Ipv6Header};
use crate::tcp::TcpHeader;
use crate::udp::UdpHeader;

/// Network layer of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkHeader {
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
}

impl NetworkHeader {
    /// Protocol carried by this header
    pub fn protocol(&self) -> IpProtocol {
        match self {
            NetworkHeader::Ipv4(h) => h.protocol,
            NetworkHeader::Ipv6(h) => h.next_header,
        }
    }
}

/// Transport layer of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportHeader {
    Tcp(TcpHeader),
    Udp(UdpHeader),
}

impl TransportHeader {
    pub fn source_port(&self) -> u16 {
        match self {
            TransportHeader::Tcp(h) => h.source_port,
            TransportHeader::Udp(h) => h.source_port,
        }
    }

    pub fn destination_port(&self) -> u16 {
        match self {
            TransportHeader::Tcp(h) => h.destination_port,
            TransportHeader::Udp(h) => h.destination_port,
        }
    }
}

/// Result of decoding one frame
///
/// Borrows the payload from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPacket<'a> {
    pub ethernet: Option<EthernetHeader>,
    pub network: Option<NetworkHeader>,
    pub transport: Option<TransportHeader>,
    /// Bytes following the last decoded header
    pub payload: &'a [u8],
}

impl<'a> ParsedPacket<'a> {
    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        match &self.network {
            Some(NetworkHeader::Ipv4(h)) => Some(h),
            _ => None,
        }
    }

    pub fn ipv6(&self) -> Option<&Ipv6Header> {
        match &self.network {
            Some(NetworkHeader::Ipv6(h)) => Some(h),
            _ => None,
        }
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        match &self.transport {
            Some(TransportHeader::Tcp(h)) => Some(h),
            _ => None,
        }
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        match &self.transport {
            Some(TransportHeader::Udp(h)) => Some(h),
            _ => None,
        }
    }

    /// Number of decoded header layers (0 to 3)
    pub fn layer_count(&self) -> usize {
        usize::from(self.ethernet.is_some())
            + usize::from(self.network.is_some())
            + usize::from(self.transport.is_some())
    }
}

impl fmt::Display for ParsedPacket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Packet:")?;
        if let Some(eth) = &self.ethernet {
            writeln!(
                f,
                "  Ethernet: {} -> {} (Type: 0x{:04x})",
                eth.source,
                eth.destination,
                eth.ethertype.to_u16()
            )?;
        }
        match &self.network {
            Some(NetworkHeader::Ipv4(ip)) => writeln!(
                f,
                "  IPv4: {} -> {} (Proto: {})",
                ip.source,
                ip.destination,
                ip.protocol.to_u8()
            )?,
            Some(NetworkHeader::Ipv6(ip)) => writeln!(
                f,
                "  IPv6: {} -> {} (Next: {})",
                ip.source,
                ip.destination,
                ip.next_header.to_u8()
            )?,
            None => {}
        }
        match &self.transport {
            Some(TransportHeader::Tcp(tcp)) => writeln!(
                f,
                "  TCP: {} -> {} (Flags: {})",
                tcp.source_port, tcp.destination_port, tcp.flags
            )?,
            Some(TransportHeader::Udp(udp)) => writeln!(
                f,
                "  UDP: {} -> {} (Len: {})",
                udp.source_port, udp.destination_port, udp.length
            )?,
            None => {}
        }
        write!(f, "  Payload: {} bytes", self.payload.len())
    }
}

/// Decode a captured frame starting at its Ethernet header
pub fn parse_packet(data: &[u8]) -> ParsedPacket<'_> {
    let mut packet = ParsedPacket {
        ethernet: None,
        network: None,
        transport: None,
        payload: data,
    };

    let Some(ethernet) = EthernetHeader::from_bytes(data) else {
        return packet;
    };
    packet.ethernet = Some(ethernet);
    let mut offset = EthernetHeader::HEADER_SIZE;

    let network = match ethernet.ethertype {
        EtherType::IPv4 => Ipv4Header::from_bytes(&data[offset..]).map(|h| {
            offset += h.header_len();
            NetworkHeader::Ipv4(h)
        }),
        EtherType::IPv6 => Ipv6Header::from_bytes(&data[offset..]).map(|h| {
            offset += Ipv6Header::HEADER_SIZE;
            NetworkHeader::Ipv6(h)
        }),
        _ => None,
    };
    packet.network = network;

    if let Some(network) = network {
        packet.transport = match network.protocol() {
            IpProtocol::TCP => TcpHeader::from_bytes(&data[offset..]).map(|h| {
                offset += h.header_len();
                TransportHeader::Tcp(h)
            }),
            IpProtocol::UDP => UdpHeader::from_bytes(&data[offset..]).map(|h| {
                offset += UdpHeader::HEADER_SIZE;
                TransportHeader::Udp(h)
            }),
            _ => None,
        };
    }

    packet.payload = &data[offset..];
    packet
}
