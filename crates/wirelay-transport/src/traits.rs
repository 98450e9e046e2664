// ============================================
// File: crates/wirelay-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines abstract interfaces for the two datapath endpoints so the
//! engine can be exercised in tests against in-memory implementations.
//!
//! ## Main Functionality
//! - `Transport`: UDP-like datagram transport interface
//! - `TunDevice`: TUN device read/write interface
//! - `TunConfig`: Device creation parameters
//!
//! ## Design Philosophy
//! - Async-first design with `async_trait`
//! - Implementations must be `Send + Sync`; both packet loops and the
//!   keepalive ticker hold references concurrently
//! - Buffer management is the caller's responsibility
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Result;

// ============================================
// Constants
// ============================================

/// Default inner MTU for the tunnel interface.
///
/// 1300 leaves headroom on a 1500-byte outer path for UDP/IP overhead
/// plus the 24-byte nonce and 16-byte authentication tag, so sealed
/// datagrams typically avoid outer IP fragmentation.
pub const DEFAULT_TUN_MTU: u16 = 1300;

/// Size of the scratch buffers the packet loops hand to `read`.
///
/// This is the buffering contract between the datapath and the
/// devices: no IP packet (and no UDP datagram) can exceed 64 KiB, so
/// a read into a buffer of this size is never truncated, whatever MTU
/// the interface ends up with. Implementations may rely on it and
/// treat a packet that does not fit as a caller bug.
pub const PACKET_BUF_SIZE: usize = 1 << 16;

/// Maximum TUN device name length on Linux (IFNAMSIZ minus NUL).
const MAX_DEVICE_NAME_LEN: usize = 15;

// ============================================
// Transport Trait
// ============================================

/// Abstract interface for datagram-based transport.
///
/// # Thread Safety
/// Implementations must support concurrent `send` and `recv` from
/// independent tasks; this is the standard contract for datagram
/// sockets on all target platforms.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receives one datagram into `buf`.
    ///
    /// # Returns
    /// Tuple of (bytes received, sender address).
    ///
    /// # Errors
    /// Returns error if the receive fails.
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Sends one datagram to `dest`.
    ///
    /// # Returns
    /// Number of bytes sent.
    ///
    /// # Errors
    /// Returns error if the send fails.
    async fn send(&self, buf: &[u8], dest: &SocketAddr) -> Result<usize>;

    /// Returns the local address this transport is bound to.
    ///
    /// # Errors
    /// Returns error if the address cannot be determined.
    fn local_addr(&self) -> Result<SocketAddr>;
}

// ============================================
// TunDevice Trait
// ============================================

/// Abstract interface for TUN device operations.
///
/// Data read from and written to the device is whole raw IP packets
/// (no link-layer header): each `read` returns exactly one packet and
/// each `write` injects exactly one packet.
#[async_trait]
pub trait TunDevice: Send + Sync {
    /// Reads one IP packet from the device.
    ///
    /// Callers pass [`PACKET_BUF_SIZE`]-sized buffers, which no IP
    /// packet can outgrow; implementations are free to treat a packet
    /// that does not fit as a caller bug rather than truncate it.
    ///
    /// # Returns
    /// Number of bytes read.
    ///
    /// # Errors
    /// Returns error if the read fails.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes one IP packet to the device.
    ///
    /// # Returns
    /// Number of bytes written.
    ///
    /// # Errors
    /// Returns error if the write fails.
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Returns the kernel-assigned device name.
    fn name(&self) -> &str;

    /// Returns the configured inner MTU.
    fn mtu(&self) -> u16;
}

// ============================================
// TunConfig
// ============================================

/// Configuration for TUN device creation.
///
/// # Example
/// ```
/// use wirelay_transport::TunConfig;
///
/// let config = TunConfig::default().with_name("wl0").with_mtu(1300);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct TunConfig {
    /// Requested device name; empty lets the kernel choose (`tunN`).
    pub name: String,
    /// Inner MTU to report and to apply during configuration.
    pub mtu: u16,
}

impl TunConfig {
    /// Sets the requested device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the inner MTU.
    #[must_use]
    pub const fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the name is too long for the kernel
    /// or the MTU is outside sane bounds.
    pub fn validate(&self) -> Result<()> {
        use crate::error::TransportError;

        if self.name.len() > MAX_DEVICE_NAME_LEN {
            return Err(TransportError::invalid_config(
                "name",
                "device name cannot exceed 15 characters",
            ));
        }

        if self.mtu < 576 {
            return Err(TransportError::invalid_config(
                "mtu",
                "MTU must be at least 576 bytes",
            ));
        }

        if self.mtu > 9000 {
            return Err(TransportError::invalid_config(
                "mtu",
                "MTU cannot exceed 9000 bytes",
            ));
        }

        Ok(())
    }
}

impl Default for TunConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            mtu: DEFAULT_TUN_MTU,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tun_config_defaults() {
        let config = TunConfig::default();

        assert!(config.name.is_empty());
        assert_eq!(config.mtu, 1300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tun_config_builder() {
        let config = TunConfig::default().with_name("wl0").with_mtu(1420);

        assert_eq!(config.name, "wl0");
        assert_eq!(config.mtu, 1420);
    }

    #[test]
    fn test_tun_config_validation() {
        // Empty name is valid: the kernel assigns one
        assert!(TunConfig::default().validate().is_ok());

        // Name too long
        let config = TunConfig::default().with_name("a".repeat(20));
        assert!(config.validate().is_err());

        // MTU too small
        let config = TunConfig::default().with_mtu(100);
        assert!(config.validate().is_err());

        // MTU too large
        let config = TunConfig::default().with_mtu(10_000);
        assert!(config.validate().is_err());
    }
}
