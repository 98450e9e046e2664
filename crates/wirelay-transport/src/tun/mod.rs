// ============================================
// File: crates/wirelay-transport/src/tun/mod.rs
// ============================================
//! # TUN Device Module
//!
//! ## Creation Reason
//! Provides the virtual L3 interface that anchors the tunnel on the
//! host: the kernel routes IP packets into it, and the datapath
//! injects decrypted packets back through it.
//!
//! ## Platform Implementations
//! - `linux`: Uses `/dev/net/tun` with IFF_TUN | IFF_NO_PI
//! - `mock`: In-memory implementation for testing
//!
//! ## What is a TUN Device?
//! A TUN device is a virtual network interface operating at Layer 3.
//! Userspace reads whole IP packets from it and writes whole IP
//! packets into it through an ordinary file-like handle; there is no
//! link-layer header.
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN operations require root or CAP_NET_ADMIN
//! - Reads and writes are packet-atomic at this boundary
//! - Device names are limited to 15 characters on Linux
//!
//! ## Last Modified
//! v0.1.0 - Initial TUN module structure

// Platform-specific implementations
#[cfg(target_os = "linux")]
pub mod linux;

// Mock implementation for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export based on platform
#[cfg(target_os = "linux")]
pub use linux::LinuxTun;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTun;
