// ============================================
// File: crates/wirelay-transport/src/tun/linux.rs
// ============================================
//! # Linux TUN Device Implementation
//!
//! ## Creation Reason
//! Provides the Linux TUN device implementation using the
//! `/dev/net/tun` interface.
//!
//! ## Main Functionality
//! - Device creation via a nix-generated TUNSETIFF ioctl wrapper over
//!   `libc::ifreq`
//! - Non-blocking mode via nix `fcntl`, async I/O via
//!   `AsyncFd::async_io` with plain `std::io` reads and writes on the
//!   shared descriptor
//! - Address/MTU/link configuration delegated to the host `ip` tool
//!
//! ## Linux TUN Interface
//! 1. Open `/dev/net/tun`
//! 2. `TUNSETIFF` with IFF_TUN | IFF_NO_PI (no packet-info header);
//!    the kernel writes the assigned name back into the request
//! 3. Configure the interface address and bring it up via `ip`
//! 4. Read/write raw IP packets on the file descriptor
//!
//! ## Buffering Contract
//! A TUN read truncates silently when the buffer is smaller than the
//! queued packet. The packet loops therefore always pass
//! `PACKET_BUF_SIZE`-sized buffers, which no IP packet can exceed,
//! and this implementation adds no buffering of its own: one `read`
//! call, one whole packet.
//!
//! ## Required Capabilities
//! - `CAP_NET_ADMIN` (or root) for device creation and configuration
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always set IFF_NO_PI; the datapath expects bare IP packets
//! - An empty requested name lets the kernel pick `tunN`; always use
//!   the name echoed back in the ifreq afterwards
//! - `configure` failures are surfaced to the caller, which reports
//!   the equivalent manual commands and keeps the datapath running
//!
//! ## Last Modified
//! v0.1.0 - Initial Linux TUN implementation

#![cfg(target_os = "linux")]

use std::ffi::CStr;
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::process::Command;

use async_trait::async_trait;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice};

// ============================================
// Constants
// ============================================

/// Path to the TUN clone device.
const TUN_DEVICE_PATH: &str = "/dev/net/tun";

mod ioctl {
    use nix::libc;

    // TUNSETIFF is _IOW('T', 202, int), but the kernel also writes the
    // assigned name back through the pointer, so the wrapper takes the
    // request mutably under the write request code.
    nix::ioctl_readwrite_bad!(
        tun_set_iff,
        nix::request_code_write!(b'T', 202, std::mem::size_of::<libc::c_int>()),
        libc::ifreq
    );
}

// ============================================
// ifreq Helpers
// ============================================

/// Builds the TUNSETIFF request for a device name; an all-zero name
/// asks the kernel to assign one.
fn tun_request(name: &str) -> libc::ifreq {
    let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };

    // Keep the trailing NUL the kernel expects; `validate` caps the
    // name earlier, the slice bound is for callers that skipped it
    for (dst, src) in ifr.ifr_name[..libc::IFNAMSIZ - 1]
        .iter_mut()
        .zip(name.bytes())
    {
        *dst = src as libc::c_char;
    }

    ifr.ifr_ifru.ifru_flags = (libc::IFF_TUN | libc::IFF_NO_PI) as libc::c_short;
    ifr
}

/// Reads the NUL-terminated device name out of a request the kernel
/// has filled in.
fn assigned_name(ifr: &libc::ifreq) -> String {
    let mut raw = ifr.ifr_name;
    raw[libc::IFNAMSIZ - 1] = 0;
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Switches the descriptor to non-blocking mode for `AsyncFd`.
fn set_nonblocking(fd: libc::c_int) -> nix::Result<()> {
    let bits = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_retain(bits) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

// ============================================
// LinuxTun
// ============================================

/// Linux TUN device.
///
/// # Example
/// ```ignore
/// use wirelay_transport::{LinuxTun, TunConfig, TunDevice};
///
/// let tun = LinuxTun::create(TunConfig::default().with_name("wl0")).await?;
/// tun.configure("192.168.124.1/24")?;
///
/// let mut buf = [0u8; wirelay_transport::PACKET_BUF_SIZE];
/// let len = tun.read(&mut buf).await?;
/// ```
pub struct LinuxTun {
    /// Async file descriptor wrapper.
    async_fd: AsyncFd<File>,
    /// Device configuration with the kernel-assigned name.
    config: TunConfig,
}

impl LinuxTun {
    /// Creates a new TUN device.
    ///
    /// An empty `config.name` lets the kernel choose the device name;
    /// the name actually assigned is available via [`TunDevice::name`].
    ///
    /// # Errors
    /// - `InvalidConfig`: If the configuration fails validation
    /// - `PermissionDenied`: If lacking CAP_NET_ADMIN
    /// - `TunCreateFailed`: If device creation fails
    pub async fn create(config: TunConfig) -> Result<Self> {
        config.validate()?;

        let file = File::options()
            .read(true)
            .write(true)
            .open(TUN_DEVICE_PATH)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    TransportError::PermissionDenied {
                        operation: format!("open {TUN_DEVICE_PATH}"),
                    }
                } else {
                    TransportError::tun_create_failed(&config.name, e.to_string())
                }
            })?;

        let mut ifr = tun_request(&config.name);
        unsafe { ioctl::tun_set_iff(file.as_raw_fd(), &mut ifr) }.map_err(|e| {
            TransportError::tun_create_failed(&config.name, format!("TUNSETIFF failed: {e}"))
        })?;

        // The kernel echoes back the name it actually assigned
        let actual_name = assigned_name(&ifr);
        debug!("TUN device created: {}", actual_name);

        set_nonblocking(file.as_raw_fd()).map_err(|e| {
            TransportError::tun_create_failed(&actual_name, format!("O_NONBLOCK failed: {e}"))
        })?;

        let async_fd = AsyncFd::new(file).map_err(|e| {
            TransportError::tun_create_failed(
                &actual_name,
                format!("AsyncFd registration failed: {e}"),
            )
        })?;

        let mut config = config;
        config.name = actual_name;

        Ok(Self { async_fd, config })
    }

    /// Configures the interface through the host `ip` tool.
    ///
    /// Runs two commands: `ip addr add <cidr> dev <name>` and
    /// `ip link set dev <name> up mtu <mtu>`. The device itself never
    /// touches addresses or link state; this delegation keeps the
    /// datapath independent of netlink.
    ///
    /// # Errors
    /// Returns `TunConfigFailed` if either invocation fails. The
    /// caller may keep running and instruct the operator to configure
    /// the interface manually.
    pub fn configure(&self, cidr: &str) -> Result<()> {
        debug!("Configuring address {} on {}", cidr, self.config.name);

        let output = Command::new("ip")
            .args(["addr", "add", cidr, "dev", &self.config.name])
            .output()
            .map_err(|e| {
                TransportError::tun_config_failed(
                    &self.config.name,
                    format!("Failed to run ip command: {e}"),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Re-running against a configured interface is not an error
            if !stderr.contains("File exists") {
                return Err(TransportError::tun_config_failed(
                    &self.config.name,
                    format!("ip addr add failed: {}", stderr.trim()),
                ));
            }
        }

        debug!("Setting MTU {} and bringing up {}", self.config.mtu, self.config.name);

        let output = Command::new("ip")
            .args([
                "link",
                "set",
                "dev",
                &self.config.name,
                "up",
                "mtu",
                &self.config.mtu.to_string(),
            ])
            .output()
            .map_err(|e| {
                TransportError::tun_config_failed(
                    &self.config.name,
                    format!("Failed to run ip command: {e}"),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::tun_config_failed(
                &self.config.name,
                format!("ip link set failed: {}", stderr.trim()),
            ));
        }

        info!(
            "TUN device {} configured: {} mtu {}",
            self.config.name, cidr, self.config.mtu
        );

        Ok(())
    }
}

#[async_trait]
impl TunDevice for LinuxTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        // One read returns one whole packet; see the buffering
        // contract in the module docs
        self.async_fd
            .async_io(Interest::READABLE, |file| (&*file).read(buf))
            .await
            .map_err(|e| TransportError::TunReadFailed {
                reason: e.to_string(),
            })
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        self.async_fd
            .async_io(Interest::WRITABLE, |file| (&*file).write(buf))
            .await
            .map_err(|e| TransportError::TunWriteFailed {
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn mtu(&self) -> u16 {
        self.config.mtu
    }
}

impl Drop for LinuxTun {
    fn drop(&mut self) {
        // Closing the descriptor releases the non-persistent device
        debug!("Dropping TUN device: {}", self.config.name);
    }
}

impl std::fmt::Debug for LinuxTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxTun")
            .field("name", &self.config.name)
            .field("mtu", &self.config.mtu)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::traits::PACKET_BUF_SIZE;

    // Creating a real TUN device requires CAP_NET_ADMIN, so normal
    // test runs only cover the request plumbing. The datapath is
    // exercised against the mock device instead.

    #[test]
    fn test_tun_request_roundtrip() {
        let ifr = tun_request("test0");

        assert_eq!(assigned_name(&ifr), "test0");

        let flags = unsafe { ifr.ifr_ifru.ifru_flags };
        assert_eq!(flags, (libc::IFF_TUN | libc::IFF_NO_PI) as libc::c_short);
    }

    #[test]
    fn test_tun_request_empty_name() {
        // All-zero name requests a kernel-assigned device
        let ifr = tun_request("");
        assert!(assigned_name(&ifr).is_empty());
    }

    #[test]
    fn test_tun_request_name_capped() {
        // Oversized names never spill past the NUL terminator
        let ifr = tun_request(&"a".repeat(32));
        assert_eq!(assigned_name(&ifr).len(), libc::IFNAMSIZ - 1);
    }

    #[test]
    fn test_scratch_buffer_covers_any_packet() {
        // The loops' buffer contract: no IP packet can outgrow it
        assert!(PACKET_BUF_SIZE >= usize::from(u16::MAX));
    }
}
