// ============================================
// File: crates/wirelay-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for the network I/O layer: UDP socket
//! operations and TUN device lifecycle and packet I/O.
//!
//! ## Error Policy
//! - Bind and device-creation failures are fatal at startup
//! - Interface configuration failures are reported with an actionable
//!   hint but do not stop the datapath
//! - Per-packet send/receive/read/write failures are transient; the
//!   loops log and continue
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Failed to bind the UDP socket.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to.
        addr: SocketAddr,
        /// Why binding failed.
        reason: String,
    },

    /// UDP send failed.
    #[error("Failed to send to {dest}: {reason}")]
    SendFailed {
        /// Destination address.
        dest: SocketAddr,
        /// Why the send failed.
        reason: String,
    },

    /// UDP receive failed.
    #[error("Failed to receive: {reason}")]
    ReceiveFailed {
        /// Why the receive failed.
        reason: String,
    },

    /// Address string could not be parsed.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string.
        addr: String,
    },

    // ========================================
    // TUN Device Errors
    // ========================================

    /// Failed to create the TUN device.
    #[error("Failed to create TUN device '{name}': {reason}")]
    TunCreateFailed {
        /// Requested device name (may be empty for kernel-assigned).
        name: String,
        /// Why creation failed.
        reason: String,
    },

    /// Failed to configure the TUN device via the host `ip` tool.
    #[error("Failed to configure TUN device '{name}': {reason}")]
    TunConfigFailed {
        /// Device name.
        name: String,
        /// Why configuration failed.
        reason: String,
    },

    /// TUN device read failed.
    #[error("TUN read failed: {reason}")]
    TunReadFailed {
        /// Why the read failed.
        reason: String,
    },

    /// TUN device write failed.
    #[error("TUN write failed: {reason}")]
    TunWriteFailed {
        /// Why the write failed.
        reason: String,
    },

    // ========================================
    // Configuration / System Errors
    // ========================================

    /// Invalid device configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// Permission denied for a privileged operation.
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// What operation was denied.
        operation: String,
    },

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `TunCreateFailed` error.
    pub fn tun_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `TunConfigFailed` error.
    pub fn tun_config_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunConfigFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failing operation may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SendFailed { .. } | Self::ReceiveFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if this error concerns the TUN device.
    #[must_use]
    pub const fn is_tun_error(&self) -> bool {
        matches!(
            self,
            Self::TunCreateFailed { .. }
                | Self::TunConfigFailed { .. }
                | Self::TunReadFailed { .. }
                | Self::TunWriteFailed { .. }
        )
    }

    /// Returns `true` if this error requires elevated privileges to fix.
    #[must_use]
    pub const fn requires_privileges(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::TunCreateFailed { .. }
        )
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
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
    fn test_error_display() {
        let err = TransportError::bind_failed(
            "127.0.0.1:51820".parse().unwrap(),
            "address in use",
        );
        assert!(err.to_string().contains("127.0.0.1:51820"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_error_classification() {
        let send_err = TransportError::SendFailed {
            dest: "127.0.0.1:51820".parse().unwrap(),
            reason: "network unreachable".into(),
        };
        assert!(send_err.is_retryable());
        assert!(!send_err.is_tun_error());

        let tun_err = TransportError::tun_create_failed("wl0", "permission denied");
        assert!(tun_err.is_tun_error());
        assert!(tun_err.requires_privileges());
        assert!(!tun_err.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::WouldBlock, "would block");
        let err: TransportError = io_err.into();
        assert!(err.is_retryable());
    }
}
