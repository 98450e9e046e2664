// ============================================
// File: crates/wirelay-daemon/src/engine.rs
// ============================================
//! # Datapath Engine
//!
//! ## Creation Reason
//! The heart of the tunnel: wires the TUN device, the UDP endpoint,
//! the envelope and the peer cell into the running datapath.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │                                                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────┐   │
//! │  │ Outbound Task│   │ Inbound Task │   │ Keepalive Task│   │
//! │  │              │   │              │   │               │   │
//! │  │ TUN read     │   │ UDP recv     │   │ tick 15s      │   │
//! │  │ seal         │   │ learn peer   │   │ seal 1 byte   │   │
//! │  │ UDP send     │   │ open         │   │ UDP send      │   │
//! │  │              │   │ TUN write    │   │               │   │
//! │  └──────┬───────┘   └──────┬───────┘   └───────┬───────┘   │
//! │         │                  │                   │           │
//! │         └────────┬─────────┴─────────┬─────────┘           │
//! │                  ▼                   ▼                     │
//! │          shared UDP socket    shared peer cell             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each task owns a `PACKET_BUF_SIZE` scratch buffer (the buffering
//! contract the devices rely on); there is no queue between TUN and
//! UDP, so a blocked TUN read never holds up UDP receive and a
//! blocked UDP send never holds up TUN.
//!
//! ## Failure Semantics
//! - Seal/send/write failures: logged, loop continues
//! - Rejected inbound datagrams: dropped silently, counted
//! - Fatal TUN read failure: outbound loop exits and the engine
//!   signals shutdown
//!
//! ## ⚠️ Important Note for Next Developer
//! - Do not log per-packet on authentication failure; a flood of
//!   forged datagrams must not become a flood of log lines
//! - The peer cell is written at most once; see `peer.rs`
//! - Use tokio::select! against the shutdown channel in every loop
//!
//! ## Last Modified
//! v0.1.0 - Initial engine implementation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wirelay_core::Envelope;
use wirelay_transport::{Transport, TunDevice, PACKET_BUF_SIZE};

use crate::peer::PeerCell;

// ============================================
// Constants
// ============================================

/// Cadence of the NAT keepalive probe.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// How long shutdown waits for each task to finish.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// Engine
// ============================================

/// The bidirectional datapath.
///
/// # Lifecycle
/// 1. Create with [`Engine::new`]
/// 2. Spawn the loops with [`Engine::start`]
/// 3. Stop with [`Engine::shutdown`] and [`Engine::join`]
///
/// The engine also signals shutdown itself when a loop hits a fatal
/// error, so callers should wait on [`Engine::subscribe_shutdown`]
/// alongside their signal handlers.
pub struct Engine {
    /// TUN side of the datapath.
    tun: Arc<dyn TunDevice>,
    /// UDP side of the datapath.
    udp: Arc<dyn Transport>,
    /// Datagram envelope, read-only after startup.
    envelope: Arc<Envelope>,
    /// Remote peer cell.
    peer: Arc<PeerCell>,
    /// Keepalive cadence (overridable for tests).
    keepalive_interval: Duration,
    /// Count of silently dropped inbound datagrams.
    rejected: Arc<AtomicU64>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Engine {
    /// Creates a new engine over the given endpoints.
    #[must_use]
    pub fn new(
        tun: Arc<dyn TunDevice>,
        udp: Arc<dyn Transport>,
        envelope: Envelope,
        peer: Arc<PeerCell>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            tun,
            udp,
            envelope: Arc::new(envelope),
            peer,
            keepalive_interval: KEEPALIVE_INTERVAL,
            rejected: Arc::new(AtomicU64::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Overrides the keepalive cadence.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Spawns the outbound, inbound and keepalive tasks.
    ///
    /// Returns the named task handles so the caller can join them at
    /// shutdown.
    #[must_use]
    pub fn start(&self) -> Vec<(&'static str, JoinHandle<()>)> {
        vec![
            ("outbound", self.spawn_outbound_task()),
            ("inbound", self.spawn_inbound_task()),
            ("keepalive", self.spawn_keepalive_task()),
        ]
    }

    /// Returns a receiver that fires when the engine shuts down,
    /// whether requested or caused by a fatal loop error.
    #[must_use]
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signals all loops to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Returns the number of inbound datagrams dropped by `open`.
    #[must_use]
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Waits for the spawned tasks to finish, with a per-task timeout.
    pub async fn join(tasks: Vec<(&'static str, JoinHandle<()>)>) {
        for (name, task) in tasks {
            match tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => warn!("Task '{}' failed: {}", name, e),
                Err(_) => warn!("Task '{}' timed out during shutdown", name),
            }
        }
    }

    // ========================================
    // Outbound: TUN -> seal -> UDP
    // ========================================

    fn spawn_outbound_task(&self) -> JoinHandle<()> {
        let tun = Arc::clone(&self.tun);
        let udp = Arc::clone(&self.udp);
        let envelope = Arc::clone(&self.envelope);
        let peer = Arc::clone(&self.peer);
        let shutdown = Arc::clone(&self.shutdown);
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut buf = vec![0u8; PACKET_BUF_SIZE];

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Outbound task received shutdown signal");
                        break;
                    }
                    result = tun.read(&mut buf) => {
                        match result {
                            Ok(len) => {
                                if shutdown.load(Ordering::SeqCst) {
                                    break;
                                }

                                let sealed = match envelope.seal(&buf[..len]) {
                                    Ok(sealed) => sealed,
                                    Err(e) => {
                                        warn!("Seal failed: {}", e);
                                        continue;
                                    }
                                };

                                // Nowhere to send until the peer is known
                                let Some(peer_addr) = peer.snapshot() else {
                                    continue;
                                };

                                if let Err(e) = udp.send(&sealed, &peer_addr).await {
                                    warn!("UDP send error: {}", e);
                                }
                            }
                            Err(e) => {
                                if !shutdown.load(Ordering::SeqCst) {
                                    error!("TUN read failed, stopping datapath: {}", e);
                                    shutdown.store(true, Ordering::SeqCst);
                                    let _ = shutdown_tx.send(());
                                }
                                break;
                            }
                        }
                    }
                }
            }

            debug!("Outbound task exiting");
        })
    }

    // ========================================
    // Inbound: UDP -> learn peer -> open -> TUN
    // ========================================

    fn spawn_inbound_task(&self) -> JoinHandle<()> {
        let tun = Arc::clone(&self.tun);
        let udp = Arc::clone(&self.udp);
        let envelope = Arc::clone(&self.envelope);
        let peer = Arc::clone(&self.peer);
        let rejected = Arc::clone(&self.rejected);
        let shutdown = Arc::clone(&self.shutdown);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut buf = vec![0u8; PACKET_BUF_SIZE];

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Inbound task received shutdown signal");
                        break;
                    }
                    result = udp.recv(&mut buf) => {
                        match result {
                            Ok((len, from)) => {
                                if shutdown.load(Ordering::SeqCst) {
                                    break;
                                }

                                // First sender becomes the peer; later
                                // senders never rebind it
                                if peer.learn(from) {
                                    info!("Peer learned: {}", from);
                                }

                                let plaintext = match envelope.open(&buf[..len]) {
                                    Ok(plaintext) => plaintext,
                                    Err(_) => {
                                        // Silent drop; counted, never logged
                                        // per-packet
                                        rejected.fetch_add(1, Ordering::Relaxed);
                                        continue;
                                    }
                                };

                                if let Err(e) = tun.write(&plaintext).await {
                                    warn!("TUN write error: {}", e);
                                }
                            }
                            Err(e) => {
                                if shutdown.load(Ordering::SeqCst) {
                                    break;
                                }
                                warn!("UDP receive error: {}", e);
                            }
                        }
                    }
                }
            }

            debug!("Inbound task exiting");
        })
    }

    // ========================================
    // Keepalive: refresh NAT mappings
    // ========================================

    fn spawn_keepalive_task(&self) -> JoinHandle<()> {
        let udp = Arc::clone(&self.udp);
        let envelope = Arc::clone(&self.envelope);
        let peer = Arc::clone(&self.peer);
        let shutdown = Arc::clone(&self.shutdown);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.keepalive_interval;

        tokio::spawn(async move {
            // First probe after one full period, not immediately
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Keepalive task received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if shutdown.load(Ordering::SeqCst) {
                            break;
                        }

                        let Some(peer_addr) = peer.snapshot() else {
                            continue;
                        };

                        // One random byte, sealed like data so the
                        // probe is indistinguishable on the wire
                        let probe = [rand::random::<u8>()];
                        match envelope.seal(&probe) {
                            Ok(datagram) => {
                                if let Err(e) = udp.send(&datagram, &peer_addr).await {
                                    debug!("Keepalive send error: {}", e);
                                }
                            }
                            Err(e) => warn!("Keepalive seal failed: {}", e),
                        }
                    }
                }
            }

            debug!("Keepalive task exiting");
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tun", &self.tun.name())
            .field("encrypted", &self.envelope.is_enabled())
            .field("peer", &self.peer.snapshot())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use wirelay_core::{PresharedKey, SEAL_OVERHEAD};
    use wirelay_transport::{MockTun, TunConfig, UdpEndpoint};

    const TEST_KEEPALIVE: Duration = Duration::from_millis(50);

    fn test_envelope() -> Envelope {
        Envelope::with_key(&PresharedKey::from_bytes([0x42; 32]))
    }

    async fn recv_with_timeout(
        socket: &tokio::net::UdpSocket,
        buf: &mut [u8],
    ) -> (usize, SocketAddr) {
        tokio::time::timeout(Duration::from_secs(5), socket.recv_from(buf))
            .await
            .expect("timed out waiting for datagram")
            .expect("recv failed")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_outbound_seals_and_sends_to_peer() {
        let probe = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let probe_addr = probe.local_addr().unwrap();

        let tun = Arc::new(MockTun::new(TunConfig::default().with_name("mock0")));
        let udp = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let peer = Arc::new(PeerCell::preset(probe_addr));

        let engine = Engine::new(
            Arc::clone(&tun) as Arc<dyn TunDevice>,
            Arc::clone(&udp) as Arc<dyn Transport>,
            test_envelope(),
            peer,
        );
        let tasks = engine.start();

        let packet = vec![0x45u8; 28];
        tun.inject_packet(packet.clone());

        let mut buf = [0u8; 2048];
        let (len, _) = recv_with_timeout(&probe, &mut buf).await;
        assert_eq!(len, packet.len() + SEAL_OVERHEAD);

        // The wire datagram opens back to the inner packet
        let opened = test_envelope().open(&buf[..len]).unwrap();
        assert_eq!(opened, packet);

        engine.shutdown();
        Engine::join(tasks).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_inbound_rejects_garbage_silently() {
        let tun = Arc::new(MockTun::new(TunConfig::default().with_name("mock0")));
        let udp = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let udp_addr = udp.local_addr().unwrap();
        let peer = Arc::new(PeerCell::unset());

        let engine = Engine::new(
            Arc::clone(&tun) as Arc<dyn TunDevice>,
            Arc::clone(&udp) as Arc<dyn Transport>,
            test_envelope(),
            Arc::clone(&peer),
        );
        let tasks = engine.start();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0u8; 10], udp_addr).await.unwrap();

        // Wait for the drop to be counted
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while engine.rejected_count() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "drop never counted");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(engine.rejected_count(), 1);
        assert_eq!(tun.written_count(), 0);

        // Even a rejected datagram binds the peer
        assert_eq!(peer.snapshot(), Some(sender.local_addr().unwrap()));

        engine.shutdown();
        Engine::join(tasks).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_keepalive_probes_authenticated() {
        let probe = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let probe_addr = probe.local_addr().unwrap();

        let tun = Arc::new(MockTun::new(TunConfig::default().with_name("mock0")));
        let udp = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let peer = Arc::new(PeerCell::preset(probe_addr));

        let engine = Engine::new(
            Arc::clone(&tun) as Arc<dyn TunDevice>,
            Arc::clone(&udp) as Arc<dyn Transport>,
            test_envelope(),
            peer,
        )
        .with_keepalive_interval(TEST_KEEPALIVE);
        let tasks = engine.start();

        let mut buf = [0u8; 256];
        let (len, _) = recv_with_timeout(&probe, &mut buf).await;

        // One sealed byte: nonce + payload + tag
        assert_eq!(len, 1 + SEAL_OVERHEAD);
        let opened = test_envelope().open(&buf[..len]).unwrap();
        assert_eq!(opened.len(), 1);

        engine.shutdown();
        Engine::join(tasks).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_keepalive_silent_without_peer() {
        let tun = Arc::new(MockTun::new(TunConfig::default().with_name("mock0")));
        let udp = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let peer = Arc::new(PeerCell::unset());

        let engine = Engine::new(
            Arc::clone(&tun) as Arc<dyn TunDevice>,
            Arc::clone(&udp) as Arc<dyn Transport>,
            Envelope::disabled(),
            peer,
        )
        .with_keepalive_interval(TEST_KEEPALIVE);
        let tasks = engine.start();

        // Several keepalive periods pass with no peer bound; there is
        // no destination, so nothing must be sent anywhere.
        tokio::time::sleep(TEST_KEEPALIVE * 4).await;

        engine.shutdown();
        Engine::join(tasks).await;
    }
}
