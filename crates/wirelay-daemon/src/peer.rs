// ============================================
// File: crates/wirelay-daemon/src/peer.rs
// ============================================
//! # Peer-Address Cell
//!
//! ## Creation Reason
//! Holds the single mutable piece of datapath state: the remote UDP
//! endpoint. The cell is read every iteration by the outbound and
//! keepalive loops and written at most once by the inbound loop.
//!
//! ## State Machine
//! ```text
//! Unset ──(startup --peer flag)──────────► Set(addr)
//! Unset ──(first inbound datagram)───────► Set(addr)
//! Set   ──(anything)─────────────────────► Set(addr)   (no roaming)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `learn` is compare-and-set from Unset only; two datagrams racing
//!   for the first bind resolve to exactly one winner and the loser's
//!   datagram is still processed with the bound value
//! - Once set the cell is never cleared; peer roaming is out of scope
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::net::SocketAddr;

use parking_lot::RwLock;

// ============================================
// PeerCell
// ============================================

/// Mutable cell holding at most one remote UDP endpoint.
///
/// # Example
/// ```
/// use wirelay_daemon::PeerCell;
///
/// let cell = PeerCell::unset();
/// let addr = "198.51.100.7:51820".parse().unwrap();
///
/// assert!(cell.learn(addr));
/// assert!(!cell.learn("203.0.113.9:9999".parse().unwrap()));
/// assert_eq!(cell.snapshot(), Some(addr));
/// ```
#[derive(Debug)]
pub struct PeerCell {
    addr: RwLock<Option<SocketAddr>>,
}

impl PeerCell {
    /// Creates an unset cell; the peer will be learned from the first
    /// inbound datagram.
    #[must_use]
    pub fn unset() -> Self {
        Self {
            addr: RwLock::new(None),
        }
    }

    /// Creates a cell pre-bound to a configured peer.
    #[must_use]
    pub fn preset(addr: SocketAddr) -> Self {
        Self {
            addr: RwLock::new(Some(addr)),
        }
    }

    /// Binds the peer if it is still unset.
    ///
    /// Returns `true` only for the single call that performs the
    /// unset → set transition; all later calls are ignored.
    pub fn learn(&self, addr: SocketAddr) -> bool {
        let mut slot = self.addr.write();
        if slot.is_none() {
            *slot = Some(addr);
            true
        } else {
            false
        }
    }

    /// Returns the current peer address, if bound.
    #[must_use]
    pub fn snapshot(&self) -> Option<SocketAddr> {
        *self.addr.read()
    }

    /// Returns `true` if the peer has been bound.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.addr.read().is_some()
    }
}

// ============================================
// Tests
// ============================================
