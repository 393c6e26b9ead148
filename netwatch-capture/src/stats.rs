//! Capture statistics

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters for one capture session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureStatistics {
    /// Packets delivered to the output queue
    pub packets_received: u64,
    /// Packets discarded because the output queue was full
    pub packets_dropped: u64,
    /// Payload bytes delivered to the output queue
    pub bytes_received: u64,
    /// Readiness wait failures plus malformed ring blocks
    pub error_count: u64,
    /// Fraction of ring blocks waiting for user space
    pub ring_utilization: f64,
    /// Kernel capture timestamp of the latest delivered packet
    pub last_packet_time: Option<SystemTime>,
}

impl CaptureStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop rate as a percentage of received packets
    pub fn drop_rate(&self) -> f64 {
        if self.packets_received == 0 {
            return 0.0;
        }
        (self.packets_dropped as f64 / self.packets_received as f64) * 100.0
    }

    pub fn has_significant_drops(&self, threshold_percent: f64) -> bool {
        self.drop_rate() > threshold_percent
    }

    /// Received plus dropped
    pub fn total_packets(&self) -> u64 {
        self.packets_received + self.packets_dropped
    }

    /// Human-readable multi-line summary
    pub fn format(&self) -> String {
        let last = self
            .last_packet_time
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
            .unwrap_or_else(|| "never".to_string());

        format!(
            "Received: {} packets ({} bytes)\n\
             Dropped: {} packets ({:.2}%)\n\
             Errors: {}\n\
             Ring utilization: {:.1}%\n\
             Last packet: {}",
            self.packets_received,
            self.bytes_received,
            self.packets_dropped,
            self.drop_rate(),
            self.error_count,
            self.ring_utilization * 100.0,
            last
        )
    }
}

/// Shared, lock-protected statistics for the receive loop and its readers
///
/// Only the receive loop writes; every read is a consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder {
    inner: Arc<RwLock<CaptureStatistics>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a delivered packet and return the updated counters
    pub fn record_packet(&self, size: usize, captured_at: SystemTime) -> CaptureStatistics {
        let mut stats = self.inner.write();
        stats.packets_received += 1;
        stats.bytes_received += size as u64;
        stats.last_packet_time = Some(captured_at);
        stats.clone()
    }

    pub fn record_drop(&self) {
        self.inner.write().packets_dropped += 1;
    }

    pub fn record_error(&self) {
        self.inner.write().error_count += 1;
    }

    /// Zero every counter
    pub fn reset(&self) {
        *self.inner.write() = CaptureStatistics::default();
    }

    pub fn snapshot(&self) -> CaptureStatistics {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn sample() -> CaptureStatistics {
        CaptureStatistics {
            packets_received: 100,
            packets_dropped: 10,
            bytes_received: 64000,
            error_count: 2,
            ring_utilization: 0.25,
            last_packet_time: None,
        }
    }

    #[test]
    fn test_statistics_new() {
        let stats = CaptureStatistics::new();
        assert_eq!(stats.packets_received, 0);
        assert_eq!(stats.packets_dropped, 0);
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.error_count, 0);
        assert!(stats.last_packet_time.is_none());
    }

    #[test]
    fn test_drop_rate() {
        let stats = sample();
        assert_eq!(stats.drop_rate(), 10.0);
        assert!(stats.has_significant_drops(5.0));
        assert!(!stats.has_significant_drops(15.0));
        assert_eq!(stats.total_packets(), 110);
    }

    #[test]
    fn test_drop_rate_zero_packets() {
        let stats = CaptureStatistics {
            packets_dropped: 3,
            ..Default::default()
        };
        assert_eq!(stats.drop_rate(), 0.0);
    }

    #[test]
    fn test_format() {
        let formatted = sample().format();
        assert!(formatted.contains("Received: 100 packets (64000 bytes)"));
        assert!(formatted.contains("10.00%"));
        assert!(formatted.contains("Errors: 2"));
        assert!(formatted.contains("25.0%"));
        assert!(formatted.contains("Last packet: never"));
    }

    #[test]
    fn test_recorder_counts() {
        let recorder = StatsRecorder::new();

        let captured_at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        recorder.record_packet(64, UNIX_EPOCH);
        let after = recorder.record_packet(128, captured_at);
        recorder.record_drop();
        recorder.record_error();

        assert_eq!(after.packets_received, 2);
        assert_eq!(after.bytes_received, 192);
        assert_eq!(after.last_packet_time, Some(captured_at));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.packets_dropped, 1);
        assert_eq!(snapshot.error_count, 1);
    }

    #[test]
    fn test_recorder_reset() {
        let recorder = StatsRecorder::new();
        recorder.record_packet(100, SystemTime::now());
        recorder.record_drop();

        recorder.reset();
        assert_eq!(recorder.snapshot(), CaptureStatistics::default());
    }

    #[test]
    fn test_recorder_thread_safety() {
        let recorder = StatsRecorder::new();
        let writer = recorder.clone();

        let handle = thread::spawn(move || {
            for _ in 0..100 {
                writer.record_packet(64, SystemTime::now());
            }
        });

        let mut last = 0;
        for _ in 0..100 {
            let seen = recorder.snapshot().packets_received;
            assert!(seen >= last);
            last = seen;
        }

        handle.join().unwrap();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.packets_received, 100);
        assert_eq!(snapshot.bytes_received, 6400);
    }
}
