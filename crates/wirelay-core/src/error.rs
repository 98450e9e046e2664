// ============================================
// File: crates/wirelay-core/src/error.rs
// ============================================
//! # Core Error Types

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types.
///
/// # Categories
/// - **Key errors**: PSK decoding and length validation
/// - **Seal errors**: Encryption failures (should not happen with valid inputs)
/// - **Rejection**: Datagrams that fail authentication or are too short
#[derive(Error, Debug)]
pub enum CoreError {
    /// The decoded pre-shared key has the wrong length.
    #[error("Pre-shared key must decode to {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key length in bytes.
        expected: usize,
        /// Length actually decoded.
        actual: usize,
    },

    /// The pre-shared key is not valid base64.
    #[error("Failed to decode pre-shared key: {reason}")]
    KeyDecode {
        /// Decoder error text.
        reason: String,
    },

    /// Sealing a datagram failed.
    #[error("Seal failed: {context}")]
    Seal {
        /// What was being sealed.
        context: String,
    },

    /// An inbound datagram was rejected.
    ///
    /// Covers both authentication failure and datagrams shorter than the
    /// nonce prefix. Deliberately carries no detail: rejected datagrams
    /// are dropped silently, not logged per-packet.
    #[error("Datagram rejected")]
    Rejected,
}

impl CoreError {
    /// Creates a `KeyDecode` error.
    pub fn key_decode(reason: impl Into<String>) -> Self {
        Self::KeyDecode {
            reason: reason.into(),
        }
    }

    /// Creates a `Seal` error.
    pub fn seal(context: impl Into<String>) -> Self {
        Self::Seal {
            context: context.into(),
        }
    }

    /// Returns `true` if this error is an inbound-datagram rejection.
    ///
    /// Rejections are expected under attack or corruption and must be
    /// dropped without per-packet logging.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Returns `true` if this error is fatal at startup.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyLength { .. } | Self::KeyDecode { .. }
        )
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
        let err = CoreError::InvalidKeyLength {
            expected: 32,
            actual: 16,
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::Rejected.is_rejection());
        assert!(!CoreError::Rejected.is_config_error());

        let key_err = CoreError::key_decode("bad padding");
        assert!(key_err.is_config_error());
        assert!(!key_err.is_rejection());
    }
}
