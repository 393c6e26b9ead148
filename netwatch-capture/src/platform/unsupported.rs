//! Stand-in for hosts without `AF_PACKET`

use netwatch_core::{Error, Result};
use tracing::warn;

use super::{CapturePlatform, CaptureSource};
use crate::engine::EngineConfig;
use crate::interface::{InterfaceCounters, InterfaceInfo};

/// Enumerates interfaces but cannot capture
#[derive(Debug, Clone)]
pub struct UnsupportedPlatform {
    os: &'static str,
}

impl UnsupportedPlatform {
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS,
        }
    }
}

impl Default for UnsupportedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePlatform for UnsupportedPlatform {
    fn name(&self) -> &str {
        self.os
    }

    fn interface_counters(&self, _name: &str) -> InterfaceCounters {
        InterfaceCounters::default()
    }

    fn interface_mtu(&self, _name: &str) -> Option<u32> {
        None
    }

    fn check_capture_privileges(&self) -> Result<()> {
        Err(Error::PlatformNotSupported(self.os.to_string()))
    }

    fn open(
        &self,
        interface: &InterfaceInfo,
        _config: &EngineConfig,
    ) -> Result<Box<dyn CaptureSource>> {
        warn!(
            interface = %interface.name,
            os = self.os,
            "raw packet capture requires Linux AF_PACKET"
        );
        Err(Error::PlatformNotSupported(self.os.to_string()))
    }
}
