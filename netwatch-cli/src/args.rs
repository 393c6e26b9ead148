//! CLI argument parsing
//!
//! Every option can also be set through a `NETWATCH_*` environment variable;
//! flags on the command line win.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "netwatch")]
#[command(version, about = "Low-overhead packet capture and traffic statistics", long_about = None)]
pub struct Cli {
    /// Interface name or index to capture on ("any" picks the best interface)
    #[arg(short = 'I', long, env = "NETWATCH_INTERFACE", default_value = "any", global = true)]
    pub interface: String,

    /// Bytes of each packet handed to the decoder
    #[arg(long, env = "NETWATCH_SNAP_LENGTH", default_value_t = 1600)]
    pub snap_length: u32,

    /// Enable promiscuous mode
    #[arg(short = 'p', long, env = "NETWATCH_PROMISCUOUS")]
    pub promiscuous: bool,

    /// How long the packet consumer waits before re-checking for shutdown
    #[arg(long, env = "NETWATCH_TIMEOUT_MS", value_name = "MS", default_value_t = 100)]
    pub timeout_ms: u64,

    /// Total ring memory in bytes, used when the block count is not given
    #[arg(long, env = "NETWATCH_BUFFER_SIZE", value_name = "BYTES", default_value_t = 32 * 1024 * 1024)]
    pub buffer_size: u64,

    /// Ring block size in bytes (multiple of the page size)
    #[arg(long, env = "NETWATCH_RING_BLOCK_SIZE", value_name = "BYTES")]
    pub ring_block_size: Option<usize>,

    /// Number of ring blocks
    #[arg(long, env = "NETWATCH_RING_BLOCK_COUNT")]
    pub ring_block_count: Option<usize>,

    /// Packets buffered between capture and processing
    #[arg(long, env = "NETWATCH_CHANNEL_BUFFER_SIZE", default_value_t = 1000)]
    pub channel_buffer_size: usize,

    /// Log level (debug, info, warn, error)
    #[arg(long, env = "NETWATCH_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (json, text)
    #[arg(long, env = "NETWATCH_LOG_FORMAT", default_value = "json", global = true)]
    pub log_format: String,

    /// Seconds between statistics reports
    #[arg(long, env = "NETWATCH_STATS_INTERVAL", value_name = "SECONDS", default_value_t = 5)]
    pub stats_interval: u64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List network interfaces with their capture scores
    Interfaces,

    /// Check that an interface can be captured on
    Validate {
        /// Interface name or index; defaults to --interface
        #[arg(value_name = "INTERFACE")]
        target: Option<String>,
    },

    /// Capture until Ctrl-C (the default command)
    Capture {
        /// Stop after this many packets
        #[arg(short = 'c', long)]
        count: Option<u64>,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run; capture when none is given
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Capture { count: None })
    }
}
