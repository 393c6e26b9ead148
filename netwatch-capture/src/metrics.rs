//! Metrics sink invoked from the capture hot path

use parking_lot::RwLock;
use std::fs;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::stats::CaptureStatistics;

/// Receives a statistics snapshot after every delivered packet
///
/// Called on the receive loop thread, so implementations must return
/// quickly and must not block on I/O.
pub trait MetricsCollector: Send + Sync {
    fn update_capture_metrics(&self, stats: &CaptureStatistics, capture_start: SystemTime);
}

/// Latest capture counters as seen by the sink
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetrics {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub bytes_received: u64,
    pub error_count: u64,
    pub ring_utilization: f64,
    pub last_packet_time: Option<SystemTime>,
    pub capture_start_time: Option<SystemTime>,
    pub uptime_seconds: f64,
}

/// Process resource usage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemMetrics {
    /// Resident set size
    pub memory_usage_mb: f64,
    pub thread_count: usize,
    pub last_update_time: Option<SystemTime>,
}

impl SystemMetrics {
    /// Read resident memory and thread count of this process from `/proc`
    ///
    /// Returns `None` where `/proc/self/status` is unavailable.
    pub fn sample_process() -> Option<(f64, usize)> {
        let status = fs::read_to_string("/proc/self/status").ok()?;

        let mut rss_kb = None;
        let mut threads = None;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                rss_kb = rest
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<u64>().ok());
            } else if let Some(rest) = line.strip_prefix("Threads:") {
                threads = rest.trim().parse::<usize>().ok();
            }
        }

        Some((rss_kb? as f64 / 1024.0, threads?))
    }
}

/// Capture and process metrics taken together
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub capture: CaptureMetrics,
    pub system: SystemMetrics,
    pub updated: SystemTime,
}

#[derive(Debug)]
struct CollectorState {
    capture: CaptureMetrics,
    system: SystemMetrics,
    enabled: bool,
}

/// In-memory metrics sink
///
/// Keeps only the most recent values. Updates are ignored while disabled.
#[derive(Debug)]
pub struct SystemMetricsCollector {
    state: RwLock<CollectorState>,
}

impl SystemMetricsCollector {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CollectorState {
                capture: CaptureMetrics::default(),
                system: SystemMetrics::default(),
                enabled: true,
            }),
        }
    }

    pub fn capture_metrics(&self) -> CaptureMetrics {
        self.state.read().capture.clone()
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        self.state.read().system.clone()
    }

    pub fn update_system_metrics(&self, memory_usage_mb: f64, thread_count: usize) {
        let mut state = self.state.write();
        if !state.enabled {
            return;
        }

        state.system = SystemMetrics {
            memory_usage_mb,
            thread_count,
            last_update_time: Some(SystemTime::now()),
        };

        debug!(memory_mb = memory_usage_mb, threads = thread_count, "updated system metrics");
    }

    /// Refresh process metrics from `/proc`; no-op where unavailable
    pub fn refresh_system_metrics(&self) {
        if let Some((memory_mb, threads)) = SystemMetrics::sample_process() {
            self.update_system_metrics(memory_mb, threads);
        }
    }

    pub fn all_metrics(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            capture: state.capture.clone(),
            system: state.system.clone(),
            updated: SystemTime::now(),
        }
    }

    pub fn enable(&self) {
        self.state.write().enabled = true;
        info!("metrics collection enabled");
    }

    pub fn disable(&self) {
        self.state.write().enabled = false;
        info!("metrics collection disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    /// Clear stored values; the enabled flag is kept
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.capture = CaptureMetrics::default();
        state.system = SystemMetrics::default();
        info!("metrics reset");
    }
}

impl Default for SystemMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for SystemMetricsCollector {
    fn update_capture_metrics(&self, stats: &CaptureStatistics, capture_start: SystemTime) {
        let mut state = self.state.write();
        if !state.enabled {
            return;
        }

        let uptime_seconds = SystemTime::now()
            .duration_since(capture_start)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        state.capture = CaptureMetrics {
            packets_received: stats.packets_received,
            packets_dropped: stats.packets_dropped,
            bytes_received: stats.bytes_received,
            error_count: stats.error_count,
            ring_utilization: stats.ring_utilization,
            last_packet_time: stats.last_packet_time,
            capture_start_time: Some(capture_start),
            uptime_seconds,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn stats(received: u64) -> CaptureStatistics {
        CaptureStatistics {
            packets_received: received,
            packets_dropped: 5,
            bytes_received: received * 64,
            error_count: 1,
            ring_utilization: 0.5,
            last_packet_time: Some(SystemTime::now()),
        }
    }

    #[test]
    fn test_update_capture_metrics() {
        let collector = SystemMetricsCollector::new();
        let start = SystemTime::now() - Duration::from_secs(2);

        collector.update_capture_metrics(&stats(100), start);

        let metrics = collector.capture_metrics();
        assert_eq!(metrics.packets_received, 100);
        assert_eq!(metrics.packets_dropped, 5);
        assert_eq!(metrics.bytes_received, 6400);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.ring_utilization, 0.5);
        assert_eq!(metrics.capture_start_time, Some(start));
        assert!(metrics.uptime_seconds >= 2.0);
    }

    #[test]
    fn test_disabled_collector_ignores_updates() {
        let collector = SystemMetricsCollector::new();
        assert!(collector.is_enabled());

        collector.disable();
        assert!(!collector.is_enabled());
        collector.update_capture_metrics(&stats(10), SystemTime::now());
        collector.update_system_metrics(12.0, 3);
        assert_eq!(collector.capture_metrics(), CaptureMetrics::default());
        assert_eq!(collector.system_metrics(), SystemMetrics::default());

        collector.enable();
        collector.update_capture_metrics(&stats(10), SystemTime::now());
        assert_eq!(collector.capture_metrics().packets_received, 10);
    }

    #[test]
    fn test_system_metrics_and_snapshot() {
        let collector = SystemMetricsCollector::new();
        collector.update_system_metrics(42.5, 7);

        let all = collector.all_metrics();
        assert_eq!(all.system.memory_usage_mb, 42.5);
        assert_eq!(all.system.thread_count, 7);
        assert!(all.system.last_update_time.is_some());
    }

    #[test]
    fn test_reset_keeps_enabled_flag() {
        let collector = SystemMetricsCollector::new();
        collector.update_capture_metrics(&stats(10), SystemTime::now());
        collector.update_system_metrics(1.0, 1);

        collector.reset();
        assert_eq!(collector.capture_metrics(), CaptureMetrics::default());
        assert_eq!(collector.system_metrics(), SystemMetrics::default());
        assert!(collector.is_enabled());
    }

    #[test]
    fn test_process_sample() {
        if let Some((memory_mb, threads)) = SystemMetrics::sample_process() {
            assert!(memory_mb > 0.0);
            assert!(threads >= 1);
        }
    }

    #[test]
    fn test_concurrent_updates() {
        let collector = Arc::new(SystemMetricsCollector::new());
        let start = SystemTime::now();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for i in 0..50 {
                        collector.update_capture_metrics(&stats(worker * 100 + i), start);
                        let _ = collector.capture_metrics();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = collector.capture_metrics();
        assert_eq!(metrics.bytes_received, metrics.packets_received * 64);
    }
}
