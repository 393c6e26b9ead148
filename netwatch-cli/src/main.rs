use crossbeam_channel::{Receiver, RecvTimeoutError};
use netwatch_capture::{
    InterfaceInfo, InterfaceManager, PacketCaptureEngine, SystemMetricsCollector,
};
use netwatch_cli::{logging, Cli, Commands, Config};
use netwatch_core::RawPacket;
use netwatch_packet::parse_packet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse_args();
    let config = Config::from(&cli);
    config.validate()?;
    logging::init(&config.log_level, config.log_format())?;

    match cli.command() {
        Commands::Interfaces => list_interfaces(),
        Commands::Validate { target } => {
            let config = match target {
                Some(interface) => Config { interface, ..config },
                None => config,
            };
            let iface = resolve_target(&InterfaceManager::new(), &config)?;
            println!("{} (index {}) is ready for capture", iface.name, iface.index);
            Ok(())
        }
        Commands::Capture { count } => run_capture(&config, count).await,
    }
}

/// Validate the configured interface, choosing the best one first when it is "any"
fn resolve_target(manager: &InterfaceManager, config: &Config) -> netwatch_core::Result<InterfaceInfo> {
    if config.wants_default_interface() {
        let selected = manager.select_default()?;
        manager.validate(&selected.name)
    } else {
        manager.validate(&config.interface)
    }
}

fn list_interfaces() -> Result<(), Error> {
    let manager = InterfaceManager::new();
    let interfaces = manager.list_interfaces()?;

    for iface in &interfaces {
        let state = if iface.is_up() { "up" } else { "down" };
        println!(
            "{:>3}  {:<16} {:<9} {:<5} mtu {:<6} score {:<4} rx {} pkts / {} bytes",
            iface.index,
            iface.name,
            iface.interface_type(),
            state,
            iface.mtu,
            iface.score(),
            iface.counters.rx_packets,
            iface.counters.rx_bytes
        );
        if let Some(mac) = iface.mac {
            println!("       mac {}", mac);
        }
        for ip in &iface.ips {
            println!("       inet {}", ip);
        }
    }

    match manager.select_default() {
        Ok(iface) => println!("\ndefault: {}", iface.name),
        Err(e) => println!("\nno default interface: {}", e),
    }
    Ok(())
}

async fn run_capture(config: &Config, count: Option<u64>) -> Result<(), Error> {
    let engine = PacketCaptureEngine::new();
    let target = resolve_target(engine.interfaces(), config)?;

    let collector = Arc::new(SystemMetricsCollector::new());
    engine.set_metrics_collector(Some(collector.clone()));
    engine.start(&target.name, config.engine_config())?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut consumer = {
        let packets = engine.packets();
        let shutdown = Arc::clone(&shutdown);
        let snap_length = config.snap_length as usize;
        let timeout = config.timeout;
        tokio::task::spawn_blocking(move || {
            consume(packets, snap_length, timeout, count, &shutdown)
        })
    };

    let mut ticker = tokio::time::interval(config.stats_interval);
    ticker.tick().await;

    let mut consumed = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping capture");
                break;
            }
            done = &mut consumer => {
                consumed = Some(done?);
                break;
            }
            _ = ticker.tick() => {
                collector.refresh_system_metrics();
                let stats = engine.statistics();
                let system = collector.system_metrics();
                info!(
                    packets_received = stats.packets_received,
                    packets_dropped = stats.packets_dropped,
                    bytes_received = stats.bytes_received,
                    errors = stats.error_count,
                    ring_utilization = stats.ring_utilization,
                    drop_rate = stats.drop_rate(),
                    memory_mb = system.memory_usage_mb,
                    threads = system.thread_count,
                    "capture statistics"
                );
                if stats.has_significant_drops(1.0) {
                    warn!(drop_rate = stats.drop_rate(), "output queue is dropping packets");
                }
            }
        }
    }

    engine.stop()?;
    shutdown.store(true, Ordering::Release);
    let consumed = match consumed {
        Some(n) => n,
        None => consumer.await?,
    };

    let stats = engine.statistics();
    let metrics = collector.capture_metrics();
    println!("\n=== Final Statistics ({}) ===", target.name);
    println!("{}", stats.format());
    println!("Processed: {} packets", consumed);
    println!("Uptime: {:.1}s", metrics.uptime_seconds);
    Ok(())
}

/// Pull packets off the queue until the limit, shutdown or disconnection
fn consume(
    packets: Receiver<RawPacket>,
    snap_length: usize,
    timeout: Duration,
    limit: Option<u64>,
    shutdown: &AtomicBool,
) -> u64 {
    let mut processed = 0u64;

    while !shutdown.load(Ordering::Acquire) {
        match packets.recv_timeout(timeout) {
            Ok(packet) => {
                let data = packet.data();
                let parsed = parse_packet(&data[..data.len().min(snap_length)]);
                trace!(
                    if_index = packet.interface_index,
                    len = packet.len(),
                    layers = parsed.layer_count(),
                    "{}",
                    parsed
                );

                processed += 1;
                if limit.map_or(false, |limit| processed >= limit) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    processed
}
