//! Runtime configuration and range validation

use netwatch_capture::engine::{DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY};
use netwatch_capture::EngineConfig;
use netwatch_core::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::args::Cli;

/// Interface value that asks for automatic selection
pub const ANY_INTERFACE: &str = "any";

const MIN_SNAP_LENGTH: u32 = 64;
const MAX_SNAP_LENGTH: u32 = 65535;
const MIN_BUFFER_SIZE: u64 = 1024;
const MAX_BUFFER_SIZE: u64 = 1024 * 1024 * 1024;

const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

/// Log output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(Error::invalid_config(
                "log_format",
                format!("'{}' is not one of: json, text", other),
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Text => write!(f, "text"),
        }
    }
}

/// Settings for one `netwatch` run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub interface: String,
    pub snap_length: u32,
    pub promiscuous: bool,
    pub timeout: Duration,
    pub buffer_size: u64,
    pub ring_block_size: usize,
    /// `None` derives the count from `buffer_size`
    pub ring_block_count: Option<usize>,
    pub channel_buffer_size: usize,
    pub log_level: String,
    pub log_format: String,
    pub stats_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: ANY_INTERFACE.to_string(),
            snap_length: 1600,
            promiscuous: false,
            timeout: Duration::from_millis(100),
            buffer_size: 32 * 1024 * 1024,
            ring_block_size: DEFAULT_BLOCK_SIZE,
            ring_block_count: None,
            channel_buffer_size: DEFAULT_QUEUE_CAPACITY,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl From<&Cli> for Config {
    fn from(cli: &Cli) -> Self {
        Self {
            interface: cli.interface.clone(),
            snap_length: cli.snap_length,
            promiscuous: cli.promiscuous,
            timeout: Duration::from_millis(cli.timeout_ms),
            buffer_size: cli.buffer_size,
            ring_block_size: cli.ring_block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            ring_block_count: cli.ring_block_count,
            channel_buffer_size: cli.channel_buffer_size,
            log_level: cli.log_level.clone(),
            log_format: cli.log_format.clone(),
            stats_interval: Duration::from_secs(cli.stats_interval),
        }
    }
}

impl Config {
    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<()> {
        if self.interface.is_empty() {
            return Err(Error::invalid_config("interface", "cannot be empty"));
        }

        if !(MIN_SNAP_LENGTH..=MAX_SNAP_LENGTH).contains(&self.snap_length) {
            return Err(Error::invalid_config(
                "snap_length",
                format!(
                    "must be between {} and {}, got {}",
                    MIN_SNAP_LENGTH, MAX_SNAP_LENGTH, self.snap_length
                ),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::invalid_config("timeout", "must be positive"));
        }

        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(Error::invalid_config(
                "buffer_size",
                format!("must be at least 1KB, got {}", self.buffer_size),
            ));
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(Error::invalid_config(
                "buffer_size",
                format!("must not exceed 1GB, got {}", self.buffer_size),
            ));
        }

        if self.ring_block_size == 0 {
            return Err(Error::invalid_config("ring_block_size", "must be positive"));
        }
        if self.ring_block_count == Some(0) {
            return Err(Error::invalid_config("ring_block_count", "must be positive"));
        }
        if self.channel_buffer_size == 0 {
            return Err(Error::invalid_config("channel_buffer_size", "must be positive"));
        }
        if self.stats_interval.is_zero() {
            return Err(Error::invalid_config("stats_interval", "must be positive"));
        }

        let level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::invalid_config(
                "log_level",
                format!("'{}' is not one of: {}", self.log_level, LOG_LEVELS.join(", ")),
            ));
        }
        self.log_format.parse::<LogFormat>()?;

        Ok(())
    }

    /// Whether the interface should be chosen automatically
    pub fn wants_default_interface(&self) -> bool {
        self.interface.eq_ignore_ascii_case(ANY_INTERFACE)
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format.parse().unwrap_or(LogFormat::Json)
    }

    /// Ring and queue settings for the capture engine
    ///
    /// Without an explicit block count the ring is sized to `buffer_size`,
    /// with at least one block.
    pub fn engine_config(&self) -> EngineConfig {
        let block_count = self.ring_block_count.unwrap_or_else(|| {
            let derived = self.buffer_size / self.ring_block_size.max(1) as u64;
            usize::try_from(derived).unwrap_or(usize::MAX).max(1)
        });

        EngineConfig {
            block_size: self.ring_block_size,
            block_count,
            queue_capacity: self.channel_buffer_size,
            promiscuous: self.promiscuous,
        }
    }
}
