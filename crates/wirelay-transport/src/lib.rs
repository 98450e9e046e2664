// ============================================
// File: crates/wirelay-transport/src/lib.rs
// ============================================
//! # Wirelay Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Provides the two endpoints of the wirelay datapath: the TUN device
//! that exchanges raw IP packets with the kernel, and the UDP socket
//! that exchanges sealed datagrams with the remote peer.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Transport` and `TunDevice` trait definitions
//! - [`udp`]: UDP socket implementation
//! - [`tun`]: TUN device management (Linux, plus a mock for tests)
//! - [`error`]: Transport-specific error types
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            ┌──────────────────────┐                      │
//! │            │    TUN Device        │                      │
//! │            │   (raw IP packets)   │                      │
//! │            └──────────┬───────────┘                      │
//! │                       │                                  │
//! │            ┌──────────┴───────────┐                      │
//! │            │   Datapath Engine    │                      │
//! │            │    (seal / open)     │                      │
//! │            └──────────┬───────────┘                      │
//! │                       │                                  │
//! │            ┌──────────┴───────────┐                      │
//! │            │    UDP Socket        │                      │
//! │            │ (sealed datagrams)   │                      │
//! │            └──────────┬───────────┘                      │
//! │                       ▼                                  │
//! │                  Remote peer                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN operations require root or CAP_NET_ADMIN
//! - Both endpoints are shared by two concurrent packet loops; every
//!   operation takes `&self`
//! - Platform-specific code must stay isolated under `tun/`
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod traits;
pub mod tun;
pub mod udp;

// Re-export primary types
pub use error::{Result, TransportError};
pub use traits::{Transport, TunConfig, TunDevice, DEFAULT_TUN_MTU, PACKET_BUF_SIZE};
pub use udp::UdpEndpoint;

#[cfg(target_os = "linux")]
pub use tun::linux::LinuxTun;

#[cfg(any(test, feature = "mock"))]
pub use tun::mock::MockTun;
