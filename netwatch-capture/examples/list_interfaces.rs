//! Example: List network interfaces with their capture scores
//!
//! Run with: cargo run --example list_interfaces

use netwatch_capture::InterfaceManager;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manager = InterfaceManager::new();

    println!("=== Network Interfaces ({}) ===\n", manager.platform().name());

    for iface in manager.list_interfaces()? {
        println!("Interface: {} (index {})", iface.name, iface.index);
        println!("  Type: {}  Score: {}", iface.interface_type(), iface.score());

        if let Some(mac) = iface.mac {
            println!("  MAC Address: {}", mac);
        }

        println!("  IP Addresses:");
        for ip in &iface.ips {
            println!("    - {}", ip);
        }

        println!("  Status:");
        println!("    Up: {}  Running: {}", iface.is_up(), iface.is_running());
        println!("    Loopback: {}", iface.is_loopback());
        println!("    Capture Capable: {}", iface.supports_capture());
        println!("    MTU: {}", iface.mtu);
        println!(
            "  Counters: rx {} pkts / {} bytes, tx {} pkts / {} bytes",
            iface.counters.rx_packets,
            iface.counters.rx_bytes,
            iface.counters.tx_packets,
            iface.counters.tx_bytes
        );
        println!();
    }

    println!("=== Default Interface ===\n");

    match manager.select_default() {
        Ok(iface) => {
            println!("Default: {} ({})", iface.name, iface.interface_type());
            if let Some(ipv4) = iface.primary_ipv4() {
                println!("Primary IPv4: {}", ipv4);
            }
            match manager.validate(&iface.name) {
                Ok(_) => println!("Ready for capture"),
                Err(e) => println!("Not capturable here: {}", e),
            }
        }
        Err(e) => println!("No default interface found: {}", e),
    }

    Ok(())
}
