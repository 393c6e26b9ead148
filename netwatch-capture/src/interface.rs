//! Network interface enumeration, validation and default selection

use netwatch_core::{Error, MacAddr, Result};
use pnet_datalink::{self, NetworkInterface};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::platform::{default_platform, CapturePlatform};

/// Per-interface traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

/// Interface flag bits relevant to capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceFlags {
    pub up: bool,
    pub running: bool,
    pub loopback: bool,
    pub broadcast: bool,
    pub point_to_point: bool,
    pub multicast: bool,
}

/// Interface class inferred from flags and naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Ethernet,
    Wireless,
    Bridge,
    Tunnel,
    Virtual,
    Loopback,
    Unknown,
}

impl InterfaceType {
    /// Classify by name prefix; the loopback flag wins over any name
    pub fn classify(name: &str, loopback: bool) -> Self {
        const PREFIXES: &[(&[&str], InterfaceType)] = &[
            (&["veth", "docker", "lxc", "vir"], InterfaceType::Virtual),
            (&["eth", "en"], InterfaceType::Ethernet),
            (&["wlan", "wl", "wifi", "ath"], InterfaceType::Wireless),
            (&["bridge", "br"], InterfaceType::Bridge),
            (&["tun", "tap", "vpn"], InterfaceType::Tunnel),
        ];

        if loopback {
            return InterfaceType::Loopback;
        }

        PREFIXES
            .iter()
            .find(|(prefixes, _)| prefixes.iter().any(|p| name.starts_with(p)))
            .map(|(_, kind)| *kind)
            .unwrap_or(InterfaceType::Unknown)
    }

    /// Preference weight used by default selection
    pub fn score_bonus(&self) -> u32 {
        match self {
            InterfaceType::Ethernet => 100,
            InterfaceType::Wireless => 80,
            InterfaceType::Bridge => 60,
            InterfaceType::Tunnel => 40,
            InterfaceType::Virtual => 20,
            InterfaceType::Loopback | InterfaceType::Unknown => 10,
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterfaceType::Ethernet => "ethernet",
            InterfaceType::Wireless => "wireless",
            InterfaceType::Bridge => "bridge",
            InterfaceType::Tunnel => "tunnel",
            InterfaceType::Virtual => "virtual",
            InterfaceType::Loopback => "loopback",
            InterfaceType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot of one network interface
///
/// Built fresh on every query; nothing here is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Kernel interface index
    pub index: u32,
    /// 0 when the host does not report one
    pub mtu: u32,
    pub flags: InterfaceFlags,
    pub mac: Option<MacAddr>,
    pub ips: Vec<IpAddr>,
    pub counters: InterfaceCounters,
}

impl InterfaceInfo {
    pub fn is_up(&self) -> bool {
        self.flags.up
    }

    pub fn is_running(&self) -> bool {
        self.flags.running
    }

    pub fn is_loopback(&self) -> bool {
        self.flags.loopback
    }

    /// Loopback always qualifies; anything else needs a broadcast or
    /// point-to-point link
    pub fn supports_capture(&self) -> bool {
        self.flags.loopback || self.flags.broadcast || self.flags.point_to_point
    }

    pub fn interface_type(&self) -> InterfaceType {
        InterfaceType::classify(&self.name, self.flags.loopback)
    }

    /// Default-selection score; higher is better
    pub fn score(&self) -> u32 {
        let mut score = self.interface_type().score_bonus();
        if self.flags.running {
            score += 50;
        }
        if self.flags.broadcast {
            score += 30;
        }
        if self.mtu >= 1500 {
            score += 20;
        }
        if self.counters.rx_packets > 0 {
            score += 10;
        }
        score
    }

    /// Get the primary IPv4 address if available
    pub fn primary_ipv4(&self) -> Option<IpAddr> {
        self.ips.iter().find(|ip| ip.is_ipv4()).copied()
    }

    /// Get the primary IPv6 address if available
    pub fn primary_ipv6(&self) -> Option<IpAddr> {
        self.ips.iter().find(|ip| ip.is_ipv6()).copied()
    }
}

#[cfg(unix)]
fn running_flag(iface: &NetworkInterface) -> bool {
    (iface.flags as u64) & (libc::IFF_RUNNING as u64) != 0
}

#[cfg(not(unix))]
fn running_flag(iface: &NetworkInterface) -> bool {
    iface.is_up()
}

fn interface_info<P>(platform: &P, iface: &NetworkInterface) -> InterfaceInfo
where
    P: CapturePlatform + ?Sized,
{
    InterfaceInfo {
        name: iface.name.clone(),
        index: iface.index,
        mtu: platform.interface_mtu(&iface.name).unwrap_or(0),
        flags: InterfaceFlags {
            up: iface.is_up(),
            running: running_flag(iface),
            loopback: iface.is_loopback(),
            broadcast: iface.is_broadcast(),
            point_to_point: iface.is_point_to_point(),
            multicast: iface.is_multicast(),
        },
        mac: iface
            .mac
            .map(|m| MacAddr::new([m.0, m.1, m.2, m.3, m.4, m.5])),
        ips: iface.ips.iter().map(|network| network.ip()).collect(),
        counters: platform.interface_counters(&iface.name),
    }
}

/// Enumerate host interfaces, filling counters and MTU from `platform`
pub(crate) fn system_interfaces<P>(platform: &P) -> Vec<InterfaceInfo>
where
    P: CapturePlatform + ?Sized,
{
    pnet_datalink::interfaces()
        .iter()
        .map(|iface| interface_info(platform, iface))
        .collect()
}

/// Pick the best capture target from `interfaces`
///
/// Prefers up, running, non-loopback, capture-capable interfaces by score
/// (ties: more received packets, then lower index). Falls back to the first
/// up non-loopback interface, then to loopback when it is the only
/// interface that is up.
pub fn select_default_from(interfaces: &[InterfaceInfo]) -> Result<InterfaceInfo> {
    let best = interfaces
        .iter()
        .filter(|i| i.is_up() && i.is_running() && !i.is_loopback() && i.supports_capture())
        .max_by(|a, b| {
            a.score()
                .cmp(&b.score())
                .then(a.counters.rx_packets.cmp(&b.counters.rx_packets))
                .then(b.index.cmp(&a.index))
        });
    if let Some(best) = best {
        return Ok(best.clone());
    }

    let mut up = interfaces.iter().filter(|i| i.is_up());
    if let Some(first) = up.clone().find(|i| !i.is_loopback()) {
        return Ok(first.clone());
    }

    match (up.next(), up.next()) {
        (Some(only), None) if only.is_loopback() => Ok(only.clone()),
        _ => Err(Error::NoInterfacesFound),
    }
}

/// Interface queries against a capture platform
#[derive(Clone)]
pub struct InterfaceManager {
    platform: Arc<dyn CapturePlatform>,
}

impl InterfaceManager {
    /// Manager for the running host
    pub fn new() -> Self {
        Self::with_platform(default_platform())
    }

    pub fn with_platform(platform: Arc<dyn CapturePlatform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Arc<dyn CapturePlatform> {
        &self.platform
    }

    /// All interfaces sorted by ascending index
    pub fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let mut interfaces = self.platform.interfaces();
        if interfaces.is_empty() {
            return Err(Error::NoInterfacesFound);
        }
        interfaces.sort_by_key(|i| i.index);
        Ok(interfaces)
    }

    pub fn interface_by_name(&self, name: &str) -> Result<InterfaceInfo> {
        if name.is_empty() {
            return Err(Error::InvalidInterface(
                "interface name cannot be empty".to_string(),
            ));
        }

        self.platform
            .interfaces()
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
    }

    pub fn interface_by_index(&self, index: i64) -> Result<InterfaceInfo> {
        if index <= 0 {
            return Err(Error::InvalidInterfaceIndex(index));
        }

        self.platform
            .interfaces()
            .into_iter()
            .find(|i| i64::from(i.index) == index)
            .ok_or_else(|| Error::InterfaceNotFound(format!("index {}", index)))
    }

    /// Look up by index when `name_or_index` is an integer, by name otherwise
    pub fn resolve(&self, name_or_index: &str) -> Result<InterfaceInfo> {
        match name_or_index.parse::<i64>() {
            Ok(index) => self.interface_by_index(index),
            Err(_) => self.interface_by_name(name_or_index),
        }
    }

    /// Resolve an interface and check that it can be captured on
    pub fn validate(&self, name_or_index: &str) -> Result<InterfaceInfo> {
        if name_or_index.is_empty() {
            return Err(Error::InvalidInterface(
                "interface name cannot be empty".to_string(),
            ));
        }

        let iface = self.resolve(name_or_index)?;

        if !iface.is_up() {
            return Err(Error::InterfaceDown(iface.name));
        }

        self.platform.check_capture_privileges()?;

        if !iface.supports_capture() {
            return Err(Error::NoCaptureSupport(iface.name));
        }

        debug!(interface = %iface.name, index = iface.index, "interface validated");
        Ok(iface)
    }

    /// Choose the best default capture interface
    pub fn select_default(&self) -> Result<InterfaceInfo> {
        let interfaces = self.list_interfaces()?;
        let selected = select_default_from(&interfaces)?;

        info!(
            interface = %selected.name,
            kind = %selected.interface_type(),
            score = selected.score(),
            "selected default interface"
        );
        Ok(selected)
    }
}

impl Default for InterfaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterfaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceManager")
            .field("platform", &self.platform.name())
            .finish()
    }
}
