//! Example: Decode a hand-written frame
//!
//! Run with: cargo run --example decode_frame

use netwatch_packet::parse_packet;

fn main() {
    // Ethernet + IPv4 + UDP DNS query header, followed by 4 payload bytes
    let frame: Vec<u8> = vec![
        0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
        0x08, 0x00, // IPv4
        0x45, 0x00, 0x00, 0x20, 0x12, 0x34, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, // IPv4
        192, 168, 1, 10, // src ip
        8, 8, 8, 8, // dst ip
        0xd4, 0x31, 0x00, 0x35, 0x00, 0x0c, 0x00, 0x00, // UDP 54321 -> 53
        0xde, 0xad, 0xbe, 0xef,
    ];

    let packet = parse_packet(&frame);
    println!("{}", packet);

    if let Some(ip) = packet.ipv4() {
        println!("TTL: {}, DF: {}", ip.ttl, ip.flags.dont_fragment);
    }

    // Cut the frame inside the IPv4 header: only Ethernet survives
    let truncated = parse_packet(&frame[..20]);
    println!("{}", truncated);
}
