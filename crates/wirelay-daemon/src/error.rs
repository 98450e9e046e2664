// ============================================
// File: crates/wirelay-daemon/src/error.rs
// ============================================
//! # Daemon Error Types

use thiserror::Error;

use wirelay_core::CoreError;
use wirelay_transport::TransportError;

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Daemon error types.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("Cannot resolve address '{addr}': {reason}")]
    AddressResolution {
        addr: String,
        reason: String,
    },

    #[error("Daemon failed to start: {reason}")]
    StartupFailed {
        reason: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn address_resolution(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressResolution {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Fatal errors end the process with a non-zero exit code before
    /// the datapath starts.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ConfigLoad { .. }
            | Self::ConfigInvalid { .. }
            | Self::AddressResolution { .. }
            | Self::StartupFailed { .. } => true,
            Self::Core(e) => e.is_config_error(),
            Self::Transport(e) => !e.is_retryable(),
            Self::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaemonError::config_load("/etc/wirelay.toml", "file not found");
        assert!(err.to_string().contains("/etc/wirelay.toml"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DaemonError::config_invalid("psk", "bad length").is_fatal());
        assert!(DaemonError::startup_failed("UDP bind failed").is_fatal());

        let rejected = DaemonError::Core(CoreError::Rejected);
        assert!(!rejected.is_fatal());
    }
}
