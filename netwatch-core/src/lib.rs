//! Netwatch Core Library
//!
//! This crate provides the error taxonomy and the shared value types used by
//! the Netwatch capture engine, packet parser and command-line front end.

pub mod error;
pub mod packet;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use packet::RawPacket;
pub use types::*;
