// ============================================
// File: crates/wirelay-daemon/tests/loopback.rs
// ============================================
//! End-to-end datapath tests: two engines peered over real loopback
//! UDP sockets, with mock TUN devices standing in for the kernel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use wirelay_core::{Envelope, PresharedKey, NONCE_SIZE, SEAL_OVERHEAD};
use wirelay_daemon::{Engine, PeerCell};
use wirelay_transport::{MockTun, Transport, TunConfig, TunDevice, UdpEndpoint};

// ============================================
// Harness
// ============================================

/// One tunnel endpoint under test.
struct Node {
    tun: Arc<MockTun>,
    peer: Arc<PeerCell>,
    local: SocketAddr,
    engine: Engine,
    tasks: Vec<(&'static str, tokio::task::JoinHandle<()>)>,
}

impl Node {
    /// Binds a UDP endpoint on loopback and starts an engine over it.
    async fn start(name: &str, envelope: Envelope, peer: Option<SocketAddr>) -> Self {
        let tun = Arc::new(MockTun::new(TunConfig::default().with_name(name)));
        let udp = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let local = udp.local_addr().unwrap();

        let peer = Arc::new(match peer {
            Some(addr) => PeerCell::preset(addr),
            None => PeerCell::unset(),
        });

        let engine = Engine::new(
            Arc::clone(&tun) as Arc<dyn TunDevice>,
            udp as Arc<dyn Transport>,
            envelope,
            Arc::clone(&peer),
        );
        let tasks = engine.start();

        Self {
            tun,
            peer,
            local,
            engine,
            tasks,
        }
    }

    /// Waits until the mock TUN has captured `count` written packets.
    async fn wait_written(&self, count: usize) -> Vec<Vec<u8>> {
        tokio::time::timeout(Duration::from_secs(5), self.tun.wait_written(count))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {count} TUN write(s)"));
        self.tun.take_written_packets()
    }

    async fn stop(self) {
        self.engine.shutdown();
        Engine::join(self.tasks).await;
    }
}

/// Deterministic pre-bind: a socket bound first so its address can be
/// handed to a node before the node exists.
async fn probe_socket() -> (tokio::net::UdpSocket, SocketAddr) {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

fn zero_key_envelope() -> Envelope {
    Envelope::with_key(&PresharedKey::from_bytes([0u8; 32]))
}

/// Minimal IPv4 + UDP inner packet (20-byte header, 8-byte UDP, no
/// payload), as a tunnel user would emit.
fn sample_ip_packet() -> Vec<u8> {
    let mut packet = vec![
        0x45, 0x00, 0x00, 0x1c, // version/IHL, TOS, total length 28
        0x00, 0x01, 0x00, 0x00, // identification, flags/fragment
        0x40, 0x11, 0x00, 0x00, // TTL 64, protocol UDP, checksum
        192, 168, 124, 1, // source
        192, 168, 124, 2, // destination
    ];
    // UDP header: src port, dst port, length 8, checksum
    packet.extend_from_slice(&[0x30, 0x39, 0x30, 0x3a, 0x00, 0x08, 0x00, 0x00]);
    assert_eq!(packet.len(), 28);
    packet
}

// ============================================
// Scenarios
// ============================================

#[tokio::test(flavor = "multi_thread")]
async fn unencrypted_loopback_delivers_packets() {
    // Two cleartext instances peered at each other; B's cell is bound
    // once A's port is known
    let b = Node::start("tunB", Envelope::disabled(), None).await;
    let a = Node::start("tunA", Envelope::disabled(), Some(b.local)).await;
    b.peer.learn(a.local);

    let packet = sample_ip_packet();
    a.tun.inject_packet(packet.clone());

    let delivered = b.wait_written(1).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0], packet);

    // And the reverse direction
    b.tun.inject_packet(packet.clone());
    let delivered = a.wait_written(1).await;
    assert_eq!(delivered[0], packet);

    a.stop().await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn encrypted_loopback_roundtrip() {
    let b_placeholder = Node::start("tunB", zero_key_envelope(), None).await;
    let a = Node::start("tunA", zero_key_envelope(), Some(b_placeholder.local)).await;
    b_placeholder.peer.learn(a.local);
    let b = b_placeholder;

    let packet = sample_ip_packet();
    a.tun.inject_packet(packet.clone());

    let delivered = b.wait_written(1).await;
    assert_eq!(delivered[0], packet);

    a.stop().await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn encrypted_wire_datagram_is_sealed() {
    // Observe the wire directly: the peer is a bare socket, not an
    // engine, standing in for an on-path observer
    let (wire, wire_addr) = probe_socket().await;
    let a = Node::start("tunA", zero_key_envelope(), Some(wire_addr)).await;

    let packet = sample_ip_packet();
    a.tun.inject_packet(packet.clone());

    let mut buf = [0u8; 2048];
    let (len, _) = tokio::time::timeout(Duration::from_secs(5), wire.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();

    // 28 inner bytes + 24-byte nonce + 16-byte tag = 68 on the wire
    assert_eq!(len, packet.len() + SEAL_OVERHEAD);
    assert_eq!(len, 68);

    // The observer cannot see the plaintext...
    assert_ne!(&buf[NONCE_SIZE..len - 16], &packet[..]);
    // ...but the key holder recovers it
    assert_eq!(zero_key_envelope().open(&buf[..len]).unwrap(), packet);

    a.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn peer_learning_enables_outbound() {
    // A starts with no peer; B is told where A is
    let a = Node::start("tunA", zero_key_envelope(), None).await;
    let b = Node::start("tunB", zero_key_envelope(), Some(a.local)).await;

    assert!(a.peer.snapshot().is_none());

    // B speaks first; A learns B's source address from that datagram
    let hello = sample_ip_packet();
    b.tun.inject_packet(hello.clone());
    assert_eq!(a.wait_written(1).await[0], hello);
    assert_eq!(a.peer.snapshot(), Some(b.local));

    // From now on A's outbound reaches B
    let reply = sample_ip_packet();
    a.tun.inject_packet(reply.clone());
    assert_eq!(b.wait_written(1).await[0], reply);

    a.stop().await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn tampered_datagram_is_dropped() {
    let b = Node::start("tunB", zero_key_envelope(), None).await;
    let (attacker, _) = probe_socket().await;

    // A valid sealed datagram with one ciphertext bit flipped
    let mut datagram = zero_key_envelope().seal(&sample_ip_packet()).unwrap();
    datagram[NONCE_SIZE + 4] ^= 0x01;
    attacker.send_to(&datagram, b.local).await.unwrap();

    // The drop is counted but nothing reaches the TUN side
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while b.engine.rejected_count() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "drop never counted");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(b.tun.written_count(), 0);

    // An untampered datagram still goes through afterwards
    let good = zero_key_envelope().seal(&sample_ip_packet()).unwrap();
    attacker.send_to(&good, b.local).await.unwrap();
    assert_eq!(b.wait_written(1).await.len(), 1);

    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn short_datagram_is_dropped() {
    let b = Node::start("tunB", zero_key_envelope(), None).await;
    let (sender, _) = probe_socket().await;

    sender.send_to(&[0u8; 10], b.local).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while b.engine.rejected_count() == 0 {
        assert!(tokio::time::Instant::now() < deadline, "drop never counted");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(b.tun.written_count(), 0);

    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn keepalive_reaches_and_authenticates() {
    let b = Node::start("tunB", zero_key_envelope(), None).await;

    // A keepalive-fast node pointed at B; B will learn A from the
    // probe itself
    let tun = Arc::new(MockTun::new(TunConfig::default().with_name("tunA")));
    let udp = Arc::new(UdpEndpoint::bind("127.0.0.1:0").await.unwrap());
    let peer = Arc::new(PeerCell::preset(b.local));
    let engine = Engine::new(
        Arc::clone(&tun) as Arc<dyn TunDevice>,
        udp as Arc<dyn Transport>,
        zero_key_envelope(),
        peer,
    )
    .with_keepalive_interval(Duration::from_millis(50));
    let tasks = engine.start();

    // The sealed single-byte probe authenticates at B and lands on
    // B's TUN side as a one-byte packet
    let delivered = b.wait_written(1).await;
    assert_eq!(delivered[0].len(), 1);
    assert!(b.peer.snapshot().is_some());

    engine.shutdown();
    Engine::join(tasks).await;
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ordered_stream_survives_roundtrip() {
    // A randomized burst of packet-sized blocks arrives once each and
    // in order over loopback
    let b = Node::start("tunB", zero_key_envelope(), None).await;
    let a = Node::start("tunA", zero_key_envelope(), Some(b.local)).await;
    b.peer.learn(a.local);

    let packets: Vec<Vec<u8>> = (0u8..32)
        .map(|i| {
            let len = 28 + usize::from(i) * 37 % 1200;
            let mut packet = vec![i; len];
            packet[0] = 0x45;
            packet
        })
        .collect();

    for packet in &packets {
        a.tun.inject_packet(packet.clone());
    }

    let delivered = b.wait_written(packets.len()).await;
    assert_eq!(delivered, packets);

    a.stop().await;
    b.stop().await;
}
