//! Command-line front end for Netwatch
//!
//! Argument parsing, configuration validation and logging setup for the
//! `netwatch` binary.

pub mod args;
pub mod config;
pub mod logging;

pub use args::{Cli, Commands};
pub use config::{Config, LogFormat, ANY_INTERFACE};
