//! Linux capture: `AF_PACKET` raw sockets with a `TPACKET_V3` receive ring

use netwatch_core::{Error, Result};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CapturePlatform, CaptureSource};
use crate::engine::EngineConfig;
use crate::interface::{InterfaceCounters, InterfaceInfo};
use crate::layout::{BLOCK_RETIRE_TIMEOUT_MS, FRAME_SIZE, TPACKET_V3};
use crate::region::{checked_span, checked_status_span, RingRegion};
use crate::ring::RingBuffer;

const ETH_P_ALL: u16 = 0x0003;
const SOL_PACKET: libc::c_int = 263;
const PACKET_ADD_MEMBERSHIP: libc::c_int = 1;
const PACKET_RX_RING: libc::c_int = 5;
const PACKET_VERSION: libc::c_int = 10;
const PACKET_MR_PROMISC: u16 = 1;

const SYSFS_NET: &str = "/sys/class/net";

/// `struct tpacket_req3`
#[repr(C)]
struct TpacketReq3 {
    tp_block_size: u32,
    tp_block_nr: u32,
    tp_frame_size: u32,
    tp_frame_nr: u32,
    tp_retire_blk_tov: u32,
    tp_sizeof_priv: u32,
    tp_feature_req_word: u32,
}

/// `struct packet_mreq`
#[repr(C)]
struct PacketMreq {
    mr_ifindex: libc::c_int,
    mr_type: u16,
    mr_alen: u16,
    mr_address: [u8; 8],
}

fn open_packet_socket() -> io::Result<OwnedFd> {
    // SAFETY: plain syscall, the result is checked before use.
    let fd = unsafe {
        libc::socket(
            libc::AF_PACKET,
            libc::SOCK_RAW,
            (ETH_P_ALL as u32).to_be() as libc::c_int,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly created descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn set_option<T>(fd: &OwnedFd, level: libc::c_int, name: libc::c_int, value: &T) -> io::Result<()> {
    // SAFETY: value points to a live T for the duration of the call.
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            level,
            name,
            value as *const T as *const libc::c_void,
            std::mem::size_of::<T>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn is_permission_error(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES))
}

/// Read a single integer attribute from sysfs
fn read_sysfs_u64(name: &str, attribute: &str) -> Option<u64> {
    if name.is_empty() || name.contains('/') || name.starts_with('.') {
        return None;
    }
    let path = format!("{}/{}/{}", SYSFS_NET, name, attribute);
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Capture platform backed by `AF_PACKET`
#[derive(Debug, Clone, Default)]
pub struct LinuxPlatform;

impl LinuxPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl CapturePlatform for LinuxPlatform {
    fn name(&self) -> &str {
        "linux"
    }

    fn interface_counters(&self, name: &str) -> InterfaceCounters {
        let stat = |field: &str| read_sysfs_u64(name, &format!("statistics/{}", field)).unwrap_or(0);
        InterfaceCounters {
            rx_bytes: stat("rx_bytes"),
            rx_packets: stat("rx_packets"),
            rx_errors: stat("rx_errors"),
            tx_bytes: stat("tx_bytes"),
            tx_packets: stat("tx_packets"),
            tx_errors: stat("tx_errors"),
        }
    }

    fn interface_mtu(&self, name: &str) -> Option<u32> {
        read_sysfs_u64(name, "mtu").and_then(|mtu| u32::try_from(mtu).ok())
    }

    fn check_capture_privileges(&self) -> Result<()> {
        match open_packet_socket() {
            Ok(fd) => {
                drop(fd);
                Ok(())
            }
            Err(err) if is_permission_error(&err) => Err(Error::InsufficientPrivileges(
                "raw packet capture requires root or CAP_NET_RAW".to_string(),
            )),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn open(
        &self,
        interface: &InterfaceInfo,
        config: &EngineConfig,
    ) -> Result<Box<dyn CaptureSource>> {
        let source = AfPacketSource::open(interface, config)?;
        Ok(Box::new(source))
    }
}

/// Raw socket plus its mapped `TPACKET_V3` ring
///
/// Field order matters: the ring is unmapped before the socket closes.
struct AfPacketSource {
    ring: RingBuffer,
    fd: Mutex<Option<OwnedFd>>,
}

impl AfPacketSource {
    fn open(interface: &InterfaceInfo, config: &EngineConfig) -> Result<Self> {
        let block_size = u32::try_from(config.block_size)
            .map_err(|_| Error::invalid_ring_config("block size exceeds 4 GiB"))?;
        let block_count = u32::try_from(config.block_count)
            .map_err(|_| Error::invalid_ring_config("block count exceeds u32"))?;
        let ring_len = config
            .block_size
            .checked_mul(config.block_count)
            .ok_or_else(|| Error::invalid_ring_config("ring size overflows"))?;
        let frame_nr = u32::try_from(ring_len / FRAME_SIZE as usize)
            .map_err(|_| Error::invalid_ring_config("too many frames for the kernel"))?;

        let fd = open_packet_socket()
            .map_err(|err| Error::SocketCreation(format!("socket(AF_PACKET): {}", err)))?;

        set_option(&fd, SOL_PACKET, PACKET_VERSION, &TPACKET_V3)
            .map_err(|err| Error::RingSetup(format!("PACKET_VERSION(TPACKET_V3): {}", err)))?;

        let req = TpacketReq3 {
            tp_block_size: block_size,
            tp_block_nr: block_count,
            tp_frame_size: FRAME_SIZE,
            tp_frame_nr: frame_nr,
            tp_retire_blk_tov: BLOCK_RETIRE_TIMEOUT_MS,
            tp_sizeof_priv: 0,
            tp_feature_req_word: 0,
        };
        set_option(&fd, SOL_PACKET, PACKET_RX_RING, &req)
            .map_err(|err| Error::RingSetup(format!("PACKET_RX_RING: {}", err)))?;

        bind_to_interface(&fd, interface)?;

        if config.promiscuous {
            let mreq = PacketMreq {
                mr_ifindex: interface.index as libc::c_int,
                mr_type: PACKET_MR_PROMISC,
                mr_alen: 0,
                mr_address: [0u8; 8],
            };
            if let Err(err) = set_option(&fd, SOL_PACKET, PACKET_ADD_MEMBERSHIP, &mreq) {
                warn!(
                    interface = %interface.name,
                    error = %err,
                    "promiscuous mode unavailable, continuing without it"
                );
            }
        }

        let region = MmapRegion::map(fd.as_raw_fd(), ring_len)?;
        let ring = RingBuffer::new(Box::new(region), config.block_size, config.block_count)?;

        info!(
            interface = %interface.name,
            if_index = interface.index,
            block_size = config.block_size,
            block_count = config.block_count,
            "AF_PACKET ring mapped"
        );

        Ok(Self {
            ring,
            fd: Mutex::new(Some(fd)),
        })
    }
}

fn bind_to_interface(fd: &OwnedFd, interface: &InterfaceInfo) -> Result<()> {
    // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
    let mut sll: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    sll.sll_family = libc::AF_PACKET as u16;
    sll.sll_protocol = ETH_P_ALL.to_be();
    sll.sll_ifindex = interface.index as libc::c_int;

    // SAFETY: sll lives across the call and its size is passed alongside.
    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(Error::InterfaceBind(format!(
            "{} (index {}): {}",
            interface.name,
            interface.index,
            io::Error::last_os_error()
        )));
    }
    Ok(())
}

impl CaptureSource for AfPacketSource {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let fd = match self.fd.lock().as_ref() {
            Some(fd) => fd.as_raw_fd(),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "capture socket closed",
                ))
            }
        };

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN | libc::POLLERR,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: pfd is a single valid pollfd for the duration of the call.
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ready > 0)
    }

    fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    fn close(&self) {
        self.ring.close();
        if self.fd.lock().take().is_some() {
            debug!("capture socket closed");
        }
    }
}

/// Ring memory shared with the kernel through `mmap`
struct MmapRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is owned by this value; all access goes through
// bounds-checked volatile or copying reads, and the kernel only writes
// blocks it owns.
unsafe impl Send for MmapRegion {}
unsafe impl Sync for MmapRegion {}

impl MmapRegion {
    fn map(fd: RawFd, len: usize) -> Result<Self> {
        // SAFETY: requesting a fresh shared mapping of the socket's ring;
        // the kernel validates fd and len.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::RingMap(format!(
                "mmap of {} bytes: {}",
                len,
                io::Error::last_os_error()
            )));
        }

        let ptr = NonNull::new(addr as *mut u8)
            .ok_or_else(|| Error::RingMap("mmap returned a null mapping".to_string()))?;
        Ok(Self { ptr, len })
    }
}

impl RingRegion for MmapRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn load_status(&self, offset: usize) -> Option<u32> {
        checked_status_span(offset, self.len)?;
        // SAFETY: in bounds and 4-byte aligned (page-aligned base).
        let value = unsafe { (self.ptr.as_ptr().add(offset) as *const u32).read_volatile() };
        fence(Ordering::Acquire);
        Some(value)
    }

    fn store_status(&self, offset: usize, value: u32) -> Option<()> {
        checked_status_span(offset, self.len)?;
        fence(Ordering::Release);
        // SAFETY: in bounds and 4-byte aligned (page-aligned base).
        unsafe { (self.ptr.as_ptr().add(offset) as *mut u32).write_volatile(value) };
        Some(())
    }

    fn read_into(&self, offset: usize, out: &mut [u8]) -> Option<()> {
        checked_span(offset, out.len(), self.len)?;
        // SAFETY: source range checked above; out is a distinct buffer.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), out.as_mut_ptr(), out.len())
        };
        Some(())
    }

    fn with_slice(&self, offset: usize, len: usize, visit: &mut dyn FnMut(&[u8])) -> Option<()> {
        checked_span(offset, len, self.len)?;
        // SAFETY: range checked above; the block is user-owned while it is
        // walked, so the kernel does not write to it.
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len) };
        visit(bytes);
        Some(())
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe a mapping created in `map` and unmapped
        // only here.
        let ret = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
        if ret < 0 {
            warn!(error = %io::Error::last_os_error(), "munmap of capture ring failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpacket_req3_layout() {
        assert_eq!(std::mem::size_of::<TpacketReq3>(), 28);
        assert_eq!(std::mem::size_of::<PacketMreq>(), 16);
    }

    #[test]
    fn test_sysfs_rejects_path_tricks() {
        assert_eq!(read_sysfs_u64("", "mtu"), None);
        assert_eq!(read_sysfs_u64("../lo", "mtu"), None);
        assert_eq!(read_sysfs_u64("..", "mtu"), None);
    }

    #[test]
    fn test_loopback_mtu_from_sysfs() {
        // Containers without sysfs are tolerated
        if let Some(mtu) = LinuxPlatform::new().interface_mtu("lo") {
            assert!(mtu > 0);
        }
    }

    #[test]
    fn test_missing_interface_counters_are_zero() {
        let counters = LinuxPlatform::new().interface_counters("nonexistent_iface_xyz");
        assert_eq!(counters, InterfaceCounters::default());
    }

    #[test]
    fn test_privilege_probe() {
        match LinuxPlatform::new().check_capture_privileges() {
            Ok(()) => {}
            Err(Error::InsufficientPrivileges(_)) => {
                println!("raw sockets not permitted for this user");
            }
            Err(e) => println!("probe failed: {}", e),
        }
    }
}
