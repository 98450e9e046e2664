// ============================================
// File: crates/wirelay-daemon/src/config.rs
// ============================================
//! # Daemon Configuration
//!
//! ## Creation Reason
//! Provides configuration for the wirelay daemon, combining an
//! optional TOML file with command-line flag overrides.
//!
//! ## Configuration Sections
//! - `tunnel`: Inner CIDR, requested device name, inner MTU
//! - `network`: Local UDP bind address, optional remote peer
//! - `crypto`: Base64 pre-shared key (absent = encryption disabled)
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [tunnel]
//! cidr = "192.168.124.1/24"
//! ifname = "wl0"
//! mtu = 1300
//!
//! [network]
//! local = ":51820"
//! peer = "198.51.100.7:51820"
//!
//! [crypto]
//! psk = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A `local` value with no host part (`":51820"`) binds the
//!   wildcard address, matching the flag syntax
//! - PSK length is validated where the envelope is built, not here;
//!   this module only checks structure
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use wirelay_transport::DEFAULT_TUN_MTU;

use crate::error::{DaemonError, Result};

// ============================================
// Config
// ============================================

/// Main daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tunnel interface configuration.
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Cryptography configuration.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed, or
    /// `ConfigInvalid` if validation fails.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DaemonError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| DaemonError::config_load(&path_str, e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns `ConfigLoad` on parse failure, `ConfigInvalid` on
    /// validation failure.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DaemonError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.tunnel.validate()?;
        self.network.validate()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tunnel: TunnelConfig::default(),
            network: NetworkConfig::default(),
            crypto: CryptoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============================================
// TunnelConfig
// ============================================

/// Tunnel interface configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Inner IPv4 address and prefix to attach to the TUN device.
    #[serde(default = "default_cidr")]
    pub cidr: String,

    /// Requested TUN device name; empty lets the kernel choose.
    #[serde(default)]
    pub ifname: String,

    /// Inner MTU.
    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

fn default_cidr() -> String {
    "192.168.124.1/24".to_string()
}

fn default_mtu() -> u16 {
    DEFAULT_TUN_MTU
}

impl TunnelConfig {
    fn validate(&self) -> Result<()> {
        self.parse_cidr()?;

        if self.ifname.len() > 15 {
            return Err(DaemonError::config_invalid(
                "tunnel.ifname",
                "cannot exceed 15 characters",
            ));
        }

        if self.mtu < 576 {
            return Err(DaemonError::config_invalid(
                "tunnel.mtu",
                "must be at least 576",
            ));
        }

        if self.mtu > 9000 {
            return Err(DaemonError::config_invalid(
                "tunnel.mtu",
                "cannot exceed 9000",
            ));
        }

        Ok(())
    }

    /// Parses the CIDR and returns (address, prefix_len).
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the CIDR is malformed.
    pub fn parse_cidr(&self) -> Result<(Ipv4Addr, u8)> {
        let Some((addr, prefix)) = self.cidr.split_once('/') else {
            return Err(DaemonError::config_invalid(
                "tunnel.cidr",
                "must be in CIDR notation (e.g., 192.168.124.1/24)",
            ));
        };

        let addr: Ipv4Addr = addr.parse().map_err(|_| {
            DaemonError::config_invalid("tunnel.cidr", "invalid IPv4 address")
        })?;

        let prefix: u8 = prefix.parse().map_err(|_| {
            DaemonError::config_invalid("tunnel.cidr", "invalid prefix length")
        })?;

        if prefix > 32 {
            return Err(DaemonError::config_invalid(
                "tunnel.cidr",
                "prefix length cannot exceed 32",
            ));
        }

        Ok((addr, prefix))
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            cidr: default_cidr(),
            ifname: String::new(),
            mtu: default_mtu(),
        }
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Local UDP bind address (`host:port`; `:port` binds the
    /// wildcard address).
    #[serde(default = "default_local")]
    pub local: String,

    /// Remote peer UDP address (`host:port`). Absent means the peer
    /// is learned from the first inbound datagram.
    #[serde(default)]
    pub peer: Option<String>,
}

fn default_local() -> String {
    ":51820".to_string()
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        self.local_socket_addr()?;

        if let Some(peer) = &self.peer {
            if peer.is_empty() {
                return Err(DaemonError::config_invalid(
                    "network.peer",
                    "cannot be empty; omit the field to learn the peer",
                ));
            }
        }

        Ok(())
    }

    /// Returns the local bind address, expanding a bare `:port` to the
    /// IPv4 wildcard.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the address does not parse.
    pub fn local_socket_addr(&self) -> Result<SocketAddr> {
        let normalized = if self.local.starts_with(':') {
            format!("0.0.0.0{}", self.local)
        } else {
            self.local.clone()
        };

        normalized.parse().map_err(|_| {
            DaemonError::config_invalid(
                "network.local",
                format!("'{}' is not a valid host:port address", self.local),
            )
        })
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local: default_local(),
            peer: None,
        }
    }
}

// ============================================
// CryptoConfig
// ============================================

/// Cryptography configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Base64 of the 32-byte pre-shared key. Absent disables
    /// encryption; the datapath then runs in the clear.
    #[serde(default)]
    pub psk: Option<String>,
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
