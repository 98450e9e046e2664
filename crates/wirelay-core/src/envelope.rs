// ============================================
// File: crates/wirelay-core/src/envelope.rs
// ============================================
//! # Datagram Envelope
//!
//! ## Creation Reason
//! Provides authenticated encryption for tunnel datagrams using
//! XSalsa20-Poly1305 (NaCl secretbox) under a pre-shared key.
//!
//! ## Main Functionality
//! - `Envelope`: Seals outbound and opens inbound datagrams
//! - Fresh 24-byte random nonce per seal, prefixed to the ciphertext
//! - Identity passthrough when encryption is disabled
//!
//! ## Datagram Format (encryption enabled)
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Nonce (24 bytes)               │ ← fresh per datagram │
//! ├──────────────────────────────────────────────────────┤
//! │ Secretbox output (variable)    │ ← XSalsa20 + Poly1305│
//! │ └─ includes 16-byte auth tag   │                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Nonce Strategy
//! The 192-bit nonce is drawn from the OS CSPRNG for every seal. The
//! nonce space is large enough that collision under one key is
//! negligible, so the two peers need no shared counter and no
//! handshake. There is consequently no replay protection; an attacker
//! can re-deliver a captured datagram.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never reuse a (key, nonce) pair - catastrophic security failure
//! - `open` failures must stay silent at the call site; per-packet
//!   logging of forged datagrams is a log-amplification vector
//! - Keepalive probes go through `seal` like data so they are
//!   indistinguishable on the wire
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope implementation

use crypto_secretbox::{
    aead::{Aead, KeyInit},
    Key, Nonce, XSalsa20Poly1305,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{CoreError, Result};
use crate::psk::PresharedKey;

// ============================================
// Constants
// ============================================

/// Size of the nonce prefix in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Total overhead added by `seal` when encryption is enabled.
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

// ============================================
// Envelope
// ============================================

/// Seals and opens tunnel datagrams under an optional pre-shared key.
///
/// With a key, `seal` produces `nonce ‖ secretbox(plaintext)` and
/// `open` is its authenticated inverse. Without a key both operations
/// are the identity, and the datapath runs in the clear.
///
/// The envelope is read-only after construction and can be shared
/// freely between the packet loops.
///
/// # Example
/// ```
/// use wirelay_core::{Envelope, PresharedKey};
///
/// let envelope = Envelope::with_key(&PresharedKey::from_bytes([7u8; 32]));
/// let sealed = envelope.seal(b"packet").unwrap();
/// assert_eq!(envelope.open(&sealed).unwrap(), b"packet");
/// ```
pub struct Envelope {
    /// Cipher instance; `None` disables encryption.
    cipher: Option<XSalsa20Poly1305>,
}

impl Envelope {
    /// Creates a passthrough envelope (encryption disabled).
    #[must_use]
    pub const fn disabled() -> Self {
        Self { cipher: None }
    }

    /// Creates an envelope sealing under the given pre-shared key.
    #[must_use]
    pub fn with_key(key: &PresharedKey) -> Self {
        let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_bytes()));
        Self {
            cipher: Some(cipher),
        }
    }

    /// Returns `true` if datagrams are encrypted and authenticated.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Returns the per-datagram overhead in bytes.
    #[must_use]
    pub const fn overhead(&self) -> usize {
        if self.cipher.is_some() {
            SEAL_OVERHEAD
        } else {
            0
        }
    }

    /// Seals one plaintext packet into a wire datagram.
    ///
    /// Disabled mode returns a copy of the plaintext. Enabled mode
    /// draws a fresh random nonce and returns
    /// `nonce ‖ secretbox(plaintext)`, which is `SEAL_OVERHEAD` bytes
    /// longer than the input.
    ///
    /// # Errors
    /// - `Seal`: If the cipher rejects the input (plaintext too large
    ///   for the primitive; cannot happen for tunnel-sized packets)
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_vec());
        };

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CoreError::seal("secretbox encryption failed"))?;

        let mut datagram = Vec::with_capacity(NONCE_SIZE + sealed.len());
        datagram.extend_from_slice(&nonce);
        datagram.extend_from_slice(&sealed);
        Ok(datagram)
    }

    /// Opens one wire datagram back into a plaintext packet.
    ///
    /// Disabled mode returns a copy of the datagram. Enabled mode
    /// splits off the 24-byte nonce prefix and verifies/decrypts the
    /// remainder.
    ///
    /// # Errors
    /// - `Rejected`: If the datagram is shorter than the nonce prefix
    ///   or fails authentication. Callers drop rejected datagrams
    ///   silently.
    pub fn open(&self, datagram: &[u8]) -> Result<Vec<u8>> {
        let Some(cipher) = &self.cipher else {
            return Ok(datagram.to_vec());
        };

        if datagram.len() < NONCE_SIZE {
            return Err(CoreError::Rejected);
        }

        let (nonce, sealed) = datagram.split_at(NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CoreError::Rejected)
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
