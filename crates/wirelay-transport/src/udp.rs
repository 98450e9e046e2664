// ============================================
// File: crates/wirelay-transport/src/udp.rs
// ============================================
//! # UDP Endpoint
//!
//! ## Creation Reason
//! Wraps a bound, connectionless UDP socket behind the [`Transport`]
//! trait. The socket stays connectionless so the inbound loop can
//! learn the peer from the source address of the first datagram.
//!
//! ## Design Choices
//! - Built through `socket2` for SO_REUSEADDR and non-blocking mode,
//!   then handed to Tokio
//! - One socket is shared by the outbound loop, the inbound loop and
//!   the keepalive ticker; UDP sockets support concurrent send/recv
//!
//! ## ⚠️ Important Note for Next Developer
//! - Maximum UDP payload is ~65507 bytes
//! - Consider firewall rules when binding to public addresses
//!
//! ## Last Modified
//! v0.1.0 - Initial UDP endpoint implementation

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

// ============================================
// UdpEndpoint
// ============================================

/// UDP endpoint of the tunnel.
///
/// # Example
/// ```ignore
/// use wirelay_transport::{Transport, UdpEndpoint};
///
/// let endpoint = UdpEndpoint::bind("0.0.0.0:51820").await?;
///
/// let mut buf = [0u8; 65536];
/// let (len, from) = endpoint.recv(&mut buf).await?;
/// endpoint.send(&buf[..len], &from).await?;
/// ```
pub struct UdpEndpoint {
    /// Underlying UDP socket, shared across tasks.
    socket: Arc<UdpSocket>,
    /// Local address we are bound to.
    local_addr: SocketAddr,
}

impl UdpEndpoint {
    /// Binds an endpoint to the given address string.
    ///
    /// # Errors
    /// - `InvalidAddress`: If the string does not parse
    /// - `BindFailed`: If binding fails
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr = addr_str.parse().map_err(|_| {
            TransportError::InvalidAddress {
                addr: addr_str.to_string(),
            }
        })?;

        Self::bind_addr(socket_addr).await
    }

    /// Binds an endpoint to the given socket address.
    ///
    /// # Socket Options
    /// - `SO_REUSEADDR`: Enabled for quick rebinding after restart
    /// - Non-blocking: Required for async operations
    ///
    /// # Errors
    /// Returns `BindFailed` if any step of socket setup fails.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::io("creating UDP socket", e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("setting SO_REUSEADDR", e))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("setting non-blocking", e))?;

        socket
            .bind(&addr.into())
            .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket)
            .map_err(|e| TransportError::io("registering socket with runtime", e))?;

        let local_addr = tokio_socket
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        info!("UDP endpoint bound to {}", local_addr);

        Ok(Self {
            socket: Arc::new(tokio_socket),
            local_addr,
        })
    }
}

#[async_trait]
impl Transport for UdpEndpoint {
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (len, from) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|e| TransportError::ReceiveFailed {
                reason: e.to_string(),
            })?;

        trace!("Received {} bytes from {}", len, from);

        Ok((len, from))
    }

    async fn send(&self, buf: &[u8], dest: &SocketAddr) -> Result<usize> {
        let len = self
            .socket
            .send_to(buf, dest)
            .await
            .map_err(|e| TransportError::SendFailed {
                dest: *dest,
                reason: e.to_string(),
            })?;

        trace!("Sent {} bytes to {}", len, dest);

        Ok(len)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

impl std::fmt::Debug for UdpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpEndpoint")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_and_local_addr() {
        let endpoint = UdpEndpoint::bind("127.0.0.1:0").await.unwrap();
        let addr = endpoint.local_addr().unwrap();

        assert_eq!(addr.ip(), std::net::Ipv4Addr::LOCALHOST);
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_send_recv_loopback() {
        let a = UdpEndpoint::bind("127.0.0.1:0").await.unwrap();
        let b = UdpEndpoint::bind("127.0.0.1:0").await.unwrap();

        let b_addr = b.local_addr().unwrap();
        let a_addr = a.local_addr().unwrap();

        let datagram = b"one datagram";
        a.send(datagram, &b_addr).await.unwrap();

        let mut buf = [0u8; 1024];
        let (len, from) = b.recv(&mut buf).await.unwrap();

        assert_eq!(&buf[..len], datagram);
        assert_eq!(from, a_addr);
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let result = UdpEndpoint::bind("not-an-address").await;
        assert!(matches!(result, Err(TransportError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_send_recv() {
        let a = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let b = UdpEndpoint::bind("127.0.0.1:0").await.unwrap();

        let b_addr = b.local_addr().unwrap();

        // Send from a spawned task while the main task receives
        let sender = Arc::clone(&a);
        let send_task = tokio::spawn(async move {
            for i in 0u8..10 {
                sender.send(&[i], &b_addr).await.unwrap();
            }
        });

        let mut buf = [0u8; 16];
        let mut seen = 0;
        while seen < 10 {
            let (len, _) = b.recv(&mut buf).await.unwrap();
            assert_eq!(len, 1);
            seen += 1;
        }

        send_task.await.unwrap();
    }
}
