//! Example: Basic packet capture
//!
//! Captures on the default interface and decodes each packet.
//! Note: Requires root or CAP_NET_RAW.
//!
//! Run with: sudo cargo run --example basic_capture

use netwatch_capture::{EngineConfig, PacketCaptureEngine};
use netwatch_packet::parse_packet;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let engine = PacketCaptureEngine::new();
    let iface = engine.interfaces().select_default()?;
    println!("Capturing on: {} ({})", iface.name, iface.interface_type());

    let config = EngineConfig {
        block_count: 64,
        ..EngineConfig::default()
    };
    engine.start(&iface.name, config)?;
    let packets = engine.packets();

    println!("Starting packet capture... (will capture 20 packets)");
    println!();

    // Capture for 10 seconds or 20 packets
    let start = Instant::now();
    let mut count = 0;
    while start.elapsed() < Duration::from_secs(10) && count < 20 {
        let Ok(packet) = packets.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        count += 1;

        let parsed = parse_packet(packet.data());
        println!("[{}] {} bytes, {} layers", count, packet.len(), parsed.layer_count());
        println!("{}", parsed);
    }

    engine.stop()?;

    println!("\n=== Final Statistics ===");
    println!("{}", engine.statistics().format());

    Ok(())
}
