// ============================================
// File: crates/wirelay-transport/src/tun/mock.rs
// ============================================
//! # Mock TUN Device Implementation
//!
//! ## Creation Reason
//! Provides an in-memory TUN device so the datapath can be tested
//! without device creation or root privileges.
//!
//! ## Design Choices
//! - Injected packets flow through an unbounded mpsc channel, so
//!   `read` inherits the cancel-safety of `recv` and works under the
//!   engine's `tokio::select!` without a hand-rolled wakeup scheme
//! - Written packets land in a journal paired with a `watch` counter;
//!   tests await [`MockTun::wait_written`] instead of sleep-polling
//! - A packet that does not fit the caller's buffer is a broken test
//!   harness, so `read` fails loudly where a kernel TUN would
//!   silently truncate (see `PACKET_BUF_SIZE` for the real contract)
//!
//! ## Usage in Tests
//! ```
//! use wirelay_transport::{MockTun, TunConfig, TunDevice};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tun = MockTun::new(TunConfig::default().with_name("mock0"));
//!
//! tun.inject_packet(b"test packet".to_vec());
//!
//! let mut buf = [0u8; 1500];
//! let len = tun.read(&mut buf).await.unwrap();
//! assert_eq!(&buf[..len], b"test packet");
//! # }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice};

// ============================================
// MockTun
// ============================================

/// Mock TUN device for testing.
///
/// `read` blocks until a packet has been injected; `write` records
/// the packet in a journal that tests drain via
/// [`MockTun::take_written_packets`] or await via
/// [`MockTun::wait_written`].
pub struct MockTun {
    /// Device configuration.
    config: TunConfig,
    /// Injection side of the read channel.
    inject_tx: mpsc::UnboundedSender<Vec<u8>>,
    /// Receive side of the read channel; locked by the reading loop.
    packets: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    /// Packets written to the device, in order.
    journal: Mutex<Vec<Vec<u8>>>,
    /// Journal length, observable without draining it.
    journal_len: watch::Sender<usize>,
}

impl MockTun {
    /// Creates a new mock TUN device.
    #[must_use]
    pub fn new(config: TunConfig) -> Self {
        let (inject_tx, packets) = mpsc::unbounded_channel();
        let (journal_len, _) = watch::channel(0);

        Self {
            config,
            inject_tx,
            packets: AsyncMutex::new(packets),
            journal: Mutex::new(Vec::new()),
            journal_len,
        }
    }

    /// Injects a packet to be returned by a subsequent `read` call.
    ///
    /// # Panics
    /// Panics if the device's receive side has been torn down.
    pub fn inject_packet(&self, packet: Vec<u8>) {
        self.inject_tx
            .send(packet)
            .expect("mock TUN receive side closed");
    }

    /// Takes all packets written so far, in write order, resetting
    /// the journal.
    #[must_use]
    pub fn take_written_packets(&self) -> Vec<Vec<u8>> {
        let mut journal = self.journal.lock();
        let packets = std::mem::take(&mut *journal);
        self.journal_len.send_replace(0);
        packets
    }

    /// Returns the number of packets written and not yet taken.
    #[must_use]
    pub fn written_count(&self) -> usize {
        *self.journal_len.borrow()
    }

    /// Waits until at least `count` packets sit in the journal.
    ///
    /// # Panics
    /// Panics if the device is torn down while awaited.
    pub async fn wait_written(&self, count: usize) {
        let mut observed = self.journal_len.subscribe();
        while *observed.borrow_and_update() < count {
            observed
                .changed()
                .await
                .expect("mock TUN dropped while awaited");
        }
    }
}

#[async_trait]
impl TunDevice for MockTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let packet = self
            .packets
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| TransportError::TunReadFailed {
                reason: "packet source closed".into(),
            })?;

        // Truncation would mask a harness bug; fail instead
        if packet.len() > buf.len() {
            return Err(TransportError::TunReadFailed {
                reason: format!(
                    "{}-byte packet exceeds {}-byte read buffer",
                    packet.len(),
                    buf.len()
                ),
            });
        }

        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut journal = self.journal.lock();
        journal.push(buf.to_vec());
        self.journal_len.send_replace(journal.len());
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn mtu(&self) -> u16 {
        self.config.mtu
    }
}

impl std::fmt::Debug for MockTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTun")
            .field("name", &self.config.name)
            .field("written_packets", &self.written_count())
            .finish()
    }
}

impl Default for MockTun {
    fn default() -> Self {
        Self::new(TunConfig::default())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inject_read() {
        let tun = MockTun::new(TunConfig::default().with_name("mock0"));

        tun.inject_packet(b"test packet".to_vec());

        let mut buf = [0u8; 100];
        let len = tun.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..len], b"test packet");
    }

    #[tokio::test]
    async fn test_write_capture() {
        let tun = MockTun::default();

        tun.write(b"packet 1").await.unwrap();
        tun.write(b"packet 2").await.unwrap();
        assert_eq!(tun.written_count(), 2);

        let captured = tun.take_written_packets();

        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0], b"packet 1");
        assert_eq!(captured[1], b"packet 2");
        assert_eq!(tun.written_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_written_observes_writes() {
        use std::sync::Arc;
        use std::time::Duration;

        let tun = Arc::new(MockTun::default());

        let writer = Arc::clone(&tun);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.write(b"first").await.unwrap();
            writer.write(b"second").await.unwrap();
        });

        tun.wait_written(2).await;
        assert_eq!(tun.take_written_packets().len(), 2);
    }

    #[tokio::test]
    async fn test_reads_preserve_order() {
        let tun = MockTun::default();

        for i in 0u8..3 {
            tun.inject_packet(vec![i; 4]);
        }

        let mut buf = [0u8; 16];
        for i in 0u8..3 {
            let len = tun.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], &[i; 4]);
        }
    }

    #[tokio::test]
    async fn test_read_blocks_until_injection() {
        use std::sync::Arc;

        let tun = Arc::new(MockTun::default());

        let reader = Arc::clone(&tun);
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            reader.read(&mut buf).await.unwrap()
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        tun.inject_packet(vec![0xab; 8]);

        assert_eq!(handle.await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_oversized_packet_is_an_error() {
        let tun = MockTun::default();

        tun.inject_packet(vec![0x42; 1000]);

        // The kernel would truncate; the mock refuses
        let mut buf = [0u8; 10];
        let result = tun.read(&mut buf).await;

        assert!(matches!(result, Err(TransportError::TunReadFailed { .. })));
    }
}
