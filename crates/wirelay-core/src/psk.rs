// ============================================
// File: crates/wirelay-core/src/psk.rs
// ============================================
//! # Pre-Shared Key Handling
//!
//! ## Creation Reason
//! The operator supplies the tunnel key base64-encoded on the command
//! line; this module owns decoding, length validation, and secure
//! disposal of the raw key material.
//!
//! ## Main Functionality
//! - `PresharedKey`: 32-byte symmetric key wrapper
//! - Base64 decoding with strict length check
//! - Zeroization on drop
//!
//! ## ⚠️ Important Note for Next Developer
//! - A key of any length other than 32 bytes is a fatal configuration
//!   error, never a truncation or padding
//! - Debug output is redacted; the key must not reach the logs
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use zeroize::Zeroize;

use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Size of the pre-shared key in bytes.
pub const PSK_SIZE: usize = 32;

// ============================================
// PresharedKey
// ============================================

/// A 32-byte pre-shared symmetric key.
///
/// Both tunnel endpoints must hold the same key, exchanged out-of-band.
/// The raw bytes are zeroized when the value is dropped.
///
/// # Example
/// ```
/// use wirelay_core::PresharedKey;
///
/// let encoded = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
/// let key = PresharedKey::from_base64(encoded).unwrap();
/// assert_eq!(key.as_bytes(), &[0u8; 32]);
/// ```
pub struct PresharedKey {
    bytes: [u8; PSK_SIZE],
}

impl PresharedKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PSK_SIZE]) -> Self {
        Self { bytes }
    }

    /// Decodes a key from its base64 representation.
    ///
    /// # Errors
    /// - `KeyDecode`: If the input is not valid standard base64
    /// - `InvalidKeyLength`: If the decoded key is not exactly 32 bytes
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| CoreError::key_decode(e.to_string()))?;

        if raw.len() != PSK_SIZE {
            return Err(CoreError::InvalidKeyLength {
                expected: PSK_SIZE,
                actual: raw.len(),
            });
        }

        let mut bytes = [0u8; PSK_SIZE];
        bytes.copy_from_slice(&raw);
        Ok(Self { bytes })
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PSK_SIZE] {
        &self.bytes
    }
}

impl Drop for PresharedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        write!(f, "PresharedKey(..)")
    }
}

// ============================================
// Tests
// ============================================
