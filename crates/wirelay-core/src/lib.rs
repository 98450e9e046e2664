// ============================================
// File: crates/wirelay-core/src/lib.rs
// ============================================
//! # Wirelay Core - Cryptographic Envelope Layer
//!
//! ## Creation Reason
//! Provides the datagram sealing/opening primitives for the wirelay
//! point-to-point overlay, isolated from any network I/O so they can
//! be tested and reasoned about independently.
//!
//! ## Main Functionality
//! - [`envelope`]: Seal/open of UDP datagrams (XSalsa20-Poly1305)
//! - [`psk`]: Pre-shared key decoding and zeroization
//! - [`error`]: Core error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              wirelay-daemon                         │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   wirelay-core         wirelay-transport           │
//! │   You are here ◄──                                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬───────────────────────────────┐
//! │ nonce (24 B) │ secretbox ciphertext + tag    │   encryption enabled
//! └──────────────┴───────────────────────────────┘
//! ┌──────────────────────────────────────────────┐
//! │ raw inner IP packet                          │   encryption disabled
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL implementations use RustCrypto (audited)
//! - NEVER roll your own crypto
//! - Nonces are drawn fresh from the OS CSPRNG per datagram; there is
//!   no counter shared between peers
//! - The pre-shared key is zeroized on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod envelope;
pub mod error;
pub mod psk;

// Re-export primary types at crate root
pub use envelope::{Envelope, NONCE_SIZE, SEAL_OVERHEAD, TAG_SIZE};
pub use error::{CoreError, Result};
pub use psk::{PresharedKey, PSK_SIZE};
