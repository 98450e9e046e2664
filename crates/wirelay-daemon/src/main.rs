// ============================================
// File: crates/wirelay-daemon/src/main.rs
// ============================================
//! # Wirelay Daemon Entry Point
//!
//! ## Creation Reason
//! Main entry point for the `wirelayd` binary: CLI parsing, logging
//! setup, endpoint construction and datapath lifecycle.
//!
//! ## Usage
//! ```bash
//! # Learn the peer from the first inbound datagram
//! sudo wirelayd --cidr 192.168.124.1/24 --local :51820 \
//!     --psk "$(head -c32 /dev/urandom | base64)"
//!
//! # Connect out to a known peer
//! sudo wirelayd --cidr 192.168.124.2/24 --peer 198.51.100.7:51820 \
//!     --psk "<same key>"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Requires root or CAP_NET_ADMIN for the TUN device
//! - Running without --psk sends the tunnel traffic in the clear;
//!   the daemon warns but does not refuse
//! - Exit code is 0 only on signal-driven shutdown
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wirelay_core::{Envelope, PresharedKey};
use wirelay_daemon::{Config, DaemonError, Engine, PeerCell};
use wirelay_transport::{Transport, TunDevice, UdpEndpoint};

// ============================================
// CLI Definition
// ============================================

/// Point-to-point L3 overlay: tunnels IP packets from a local TUN
/// device to a single remote peer over UDP, sealed with a pre-shared
/// key.
#[derive(Parser, Debug)]
#[command(name = "wirelayd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Inner IPv4 address + prefix for the TUN device
    /// [default: 192.168.124.1/24]
    #[arg(long)]
    cidr: Option<String>,

    /// Local UDP bind address, host:port or :port [default: :51820]
    #[arg(long)]
    local: Option<String>,

    /// Remote peer UDP address, host:port; omit to learn the peer
    /// from the first inbound datagram
    #[arg(long)]
    peer: Option<String>,

    /// Base64 of a 32-byte pre-shared key; omit to disable encryption
    #[arg(long)]
    psk: Option<String>,

    /// Requested TUN device name; omit to let the kernel choose
    #[arg(long)]
    ifname: Option<String>,

    /// Path to a TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Folds explicit flags over the loaded configuration.
    fn apply_to(self, config: &mut Config) {
        if let Some(cidr) = self.cidr {
            config.tunnel.cidr = cidr;
        }
        if let Some(ifname) = self.ifname {
            config.tunnel.ifname = ifname;
        }
        if let Some(local) = self.local {
            config.network.local = local;
        }
        if let Some(peer) = self.peer {
            config.network.peer = if peer.is_empty() { None } else { Some(peer) };
        }
        if let Some(psk) = self.psk {
            config.crypto.psk = if psk.is_empty() { None } else { Some(psk) };
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Early logging so config-load failures are visible; re-tuned
    // once the configured level is known
    init_logging("info");

    let mut config = match &cli.config {
        Some(path) => match Config::load(path).await {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    cli.apply_to(&mut config);

    init_logging(&config.logging.level);

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

// ============================================
// Daemon Lifecycle
// ============================================

/// Runs the daemon until shutdown.
async fn run(config: Config) -> wirelay_daemon::Result<()> {
    info!("Starting wirelayd v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    // Envelope: the key decides between sealed and cleartext operation
    let envelope = match &config.crypto.psk {
        Some(encoded) => {
            let key = PresharedKey::from_base64(encoded)?;
            info!("Encryption: secretbox enabled");
            Envelope::with_key(&key)
        }
        None => {
            warn!("Encryption disabled (no PSK); tunnel traffic will be sent in the clear");
            Envelope::disabled()
        }
    };

    // TUN device, then its address/MTU via the host ip tool
    let tun = open_tun(&config).await?;

    // UDP endpoint
    let local_addr = config.network.local_socket_addr()?;
    let udp = UdpEndpoint::bind_addr(local_addr)
        .await
        .map_err(|e| DaemonError::startup_failed(format!("UDP bind failed: {e}")))?;

    // Peer: configured up front, or learned from the first datagram
    let peer = match &config.network.peer {
        Some(peer_str) => {
            let addr = resolve_peer(peer_str).await?;
            info!("Peer: {}", addr);
            Arc::new(PeerCell::preset(addr))
        }
        None => {
            info!("Peer unset; will learn it from the first inbound datagram");
            Arc::new(PeerCell::unset())
        }
    };

    // Wire up and start the datapath
    let engine = Engine::new(tun, Arc::new(udp) as Arc<dyn Transport>, envelope, peer);
    let mut engine_down = engine.subscribe_shutdown();
    let tasks = engine.start();

    info!("Datapath running");

    wait_for_shutdown(&mut engine_down).await;

    engine.shutdown();
    Engine::join(tasks).await;

    let rejected = engine.rejected_count();
    if rejected > 0 {
        info!("Dropped {} unauthenticated datagram(s)", rejected);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Opens and configures the TUN device.
///
/// Configuration failure is not fatal: the datapath still starts and
/// the operator is told the exact commands to run by hand.
#[cfg(target_os = "linux")]
async fn open_tun(config: &Config) -> wirelay_daemon::Result<Arc<dyn TunDevice>> {
    use wirelay_transport::{LinuxTun, TunConfig};

    let tun_config = TunConfig::default()
        .with_name(&config.tunnel.ifname)
        .with_mtu(config.tunnel.mtu);

    let tun = LinuxTun::create(tun_config)
        .await
        .map_err(|e| DaemonError::startup_failed(format!("TUN creation failed: {e}")))?;

    info!("TUN device: {}", tun.name());

    if let Err(e) = tun.configure(&config.tunnel.cidr) {
        warn!("{}", e);
        warn!(
            "Configure the interface manually: ip addr add {} dev {} && ip link set dev {} up mtu {}",
            config.tunnel.cidr,
            tun.name(),
            tun.name(),
            config.tunnel.mtu
        );
    }

    Ok(Arc::new(tun) as Arc<dyn TunDevice>)
}

#[cfg(not(target_os = "linux"))]
async fn open_tun(_config: &Config) -> wirelay_daemon::Result<Arc<dyn TunDevice>> {
    Err(DaemonError::startup_failed(
        "TUN support is only implemented for Linux",
    ))
}

/// Resolves the peer address, accepting hostnames.
async fn resolve_peer(peer: &str) -> wirelay_daemon::Result<std::net::SocketAddr> {
    let mut addrs = tokio::net::lookup_host(peer)
        .await
        .map_err(|e| DaemonError::address_resolution(peer, e.to_string()))?;

    addrs
        .next()
        .ok_or_else(|| DaemonError::address_resolution(peer, "no addresses returned"))
}

/// Waits for SIGINT, SIGTERM, or an engine-internal fatal error.
async fn wait_for_shutdown(engine_down: &mut tokio::sync::broadcast::Receiver<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = engine_down.recv().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received interrupt"),
            _ = term.recv() => info!("Received terminate"),
            _ = engine_down.recv() => info!("Datapath stopped"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received interrupt"),
            _ = engine_down.recv() => info!("Datapath stopped"),
        }
    }
}
