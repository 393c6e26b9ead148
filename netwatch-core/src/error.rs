//! Error types for Netwatch

use thiserror::Error;

/// Result type alias for Netwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Netwatch
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host reports no network interfaces at all
    #[error("No network interfaces found")]
    NoInterfacesFound,

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface name is empty or otherwise unusable
    #[error("Invalid interface: {0}")]
    InvalidInterface(String),

    /// Interface index is not a positive number
    #[error("Invalid interface index: {0}")]
    InvalidInterfaceIndex(i64),

    /// Interface is administratively down
    #[error("Interface '{0}' is down")]
    InterfaceDown(String),

    /// Insufficient privileges
    #[error("Insufficient privileges: {0}")]
    InsufficientPrivileges(String),

    /// Interface cannot be used as a capture target
    #[error("Interface '{0}' does not support packet capture")]
    NoCaptureSupport(String),

    /// A capture session is already active
    #[error("Capture engine is already running")]
    EngineRunning,

    /// No capture session is active
    #[error("Capture engine is not started")]
    EngineNotStarted,

    /// Raw socket could not be opened
    #[error("Failed to create capture socket: {0}")]
    SocketCreation(String),

    /// Kernel ring negotiation failed
    #[error("Failed to set up capture ring: {0}")]
    RingSetup(String),

    /// Socket could not be bound to the interface
    #[error("Failed to bind capture socket: {0}")]
    InterfaceBind(String),

    /// Ring geometry rejected before any resource is touched
    #[error("Invalid ring configuration: {0}")]
    InvalidRingConfig(String),

    /// Ring memory could not be mapped
    #[error("Failed to map capture ring: {0}")]
    RingMap(String),

    /// Ring buffer was used after close
    #[error("Ring buffer is closed")]
    RingBufferClosed,

    /// A packet record inside a ring block failed validation
    #[error("Malformed ring record: {0}")]
    RingRecord(String),

    /// Capture is not available on this platform
    #[error("Packet capture is not supported on {0}")]
    PlatformNotSupported(String),

    /// Configuration value out of range
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },
}

impl Error {
    /// Create a malformed ring record error
    pub fn ring_record<S: Into<String>>(msg: S) -> Self {
        Error::RingRecord(msg.into())
    }

    /// Create an invalid ring configuration error
    pub fn invalid_ring_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRingConfig(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Error::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Errors raised while building a capture session
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Error::SocketCreation(_)
                | Error::RingSetup(_)
                | Error::InterfaceBind(_)
                | Error::InvalidRingConfig(_)
                | Error::RingMap(_)
                | Error::PlatformNotSupported(_)
        )
    }

    /// Errors raised while resolving or checking a capture target
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::NoInterfacesFound
                | Error::InterfaceNotFound(_)
                | Error::InvalidInterface(_)
                | Error::InvalidInterfaceIndex(_)
                | Error::InterfaceDown(_)
                | Error::InsufficientPrivileges(_)
                | Error::NoCaptureSupport(_)
        )
    }
}
