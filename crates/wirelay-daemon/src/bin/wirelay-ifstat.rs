// ============================================
// File: crates/wirelay-daemon/src/bin/wirelay-ifstat.rs
// ============================================
//! # Interface Diagnostic
//!
//! ## Creation Reason
//! Read-only companion tool for operators debugging the overlay:
//! walks the kernel's network sysfs tree and prints every interface
//! with its classified type, state and driver, so a misconfigured or
//! missing TUN device is easy to spot.
//!
//! ## Main Functionality
//! - Enumerates `/sys/class/net`
//! - Classifies each interface (tun/tap, bridge, bond, vlan, veth,
//!   wireguard, ...) from sysfs features, driver name and name
//!   heuristics, in that order of confidence
//! - Reports operstate, carrier, MTU, flags, MAC, addresses,
//!   speed/duplex, driver, master device and sysfs path
//!
//! ## ⚠️ Important Note for Next Developer
//! - This tool reads sysfs only; it never participates in the
//!   datapath and needs no privileges
//! - Virtual interfaces often lack speed/duplex; absent values are
//!   printed as "-"
//!
//! ## Last Modified
//! v0.1.0 - Initial diagnostic implementation

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

// ============================================
// Constants
// ============================================

const SYS_CLASS_NET: &str = "/sys/class/net";

/// TUN device flag bits from `tun_flags`.
const IFF_TUN: u32 = 0x0001;
const IFF_TAP: u32 = 0x0002;

// ============================================
// IfaceReport
// ============================================

/// Everything we report about one interface.
#[derive(Debug, Default)]
struct IfaceReport {
    name: String,
    kind: String,
    mtu: String,
    flags: String,
    mac: String,
    addrs: Vec<String>,
    oper_state: String,
    carrier: String,
    speed: String,
    duplex: String,
    driver: String,
    sysfs_path: String,
    master: String,
    is_virtual: bool,
}

// ============================================
// Main
// ============================================

fn main() {
    let entries = match fs::read_dir(SYS_CLASS_NET) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("read sysfs: {e}");
            std::process::exit(1);
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    for name in names {
        match inspect_iface(&name) {
            Ok(report) => print_report(&report),
            Err(e) => eprintln!("{name}: {e}"),
        }
    }
}

fn print_report(it: &IfaceReport) {
    println!("=== {} ===", it.name);
    println!("Type:       {}", it.kind);
    println!(
        "State:      {}  Carrier:{}  MTU:{}  Flags:{}",
        dash(&it.oper_state),
        dash(&it.carrier),
        dash(&it.mtu),
        dash(&it.flags)
    );
    println!("MAC:        {}", dash(&it.mac));
    if it.addrs.is_empty() {
        println!("IPs:        (none)");
    } else {
        println!("IPs:        {}", it.addrs.join(", "));
    }
    if !it.speed.is_empty() || !it.duplex.is_empty() {
        println!("Speed/Duplex: {} / {}", dash(&it.speed), dash(&it.duplex));
    }
    println!("Driver:     {}", dash(&it.driver));
    if !it.master.is_empty() {
        println!("Master:     {}", it.master);
    }
    println!("Sysfs:      {}", it.sysfs_path);
    println!();
}

// ============================================
// Inspection
// ============================================

fn inspect_iface(name: &str) -> std::io::Result<IfaceReport> {
    let syslink = PathBuf::from(SYS_CLASS_NET).join(name);
    let real = fs::canonicalize(&syslink).unwrap_or_else(|_| syslink.clone());

    let mut report = IfaceReport {
        name: name.to_string(),
        sysfs_path: real.display().to_string(),
        is_virtual: real.to_string_lossy().contains("/virtual/"),
        ..IfaceReport::default()
    };

    report.mtu = read_trimmed(syslink.join("mtu"));
    report.flags = read_trimmed(syslink.join("flags"));
    report.mac = read_trimmed(syslink.join("address"));
    report.oper_state = read_trimmed(syslink.join("operstate"));
    report.carrier = read_trimmed(syslink.join("carrier"));
    // Many virtual interfaces have neither of these
    report.speed = read_trimmed(syslink.join("speed"));
    report.duplex = read_trimmed(syslink.join("duplex"));

    report.driver = detect_driver(&syslink);
    report.master = detect_master(&syslink);
    report.addrs = detect_addrs(name);

    report.kind = classify(name, &syslink, &report);

    Ok(report)
}

/// Classifies the interface, strongest evidence first.
fn classify(name: &str, syslink: &Path, report: &IfaceReport) -> String {
    // 1) Unambiguous sysfs feature directories
    if syslink.join("bridge").exists() {
        return "bridge".into();
    }
    if syslink.join("bonding").exists() {
        return "bond".into();
    }
    if syslink.join("team").exists() {
        return "team".into();
    }
    if syslink.join("vxlan").exists() {
        return "vxlan".into();
    }
    // VLAN sub-interfaces register under /proc/net/vlan
    if Path::new("/proc/net/vlan").join(name).exists() {
        return "vlan".into();
    }
    // tun/tap expose tun_flags; test the bits
    let tun_flags = read_trimmed(syslink.join("tun_flags"));
    if !tun_flags.is_empty() {
        return match parse_flags(&tun_flags) {
            Some(v) if v & IFF_TAP != 0 => "tap (TAP virtual L2)".into(),
            Some(v) if v & IFF_TUN != 0 => "tun (TUN virtual L3)".into(),
            _ => "tun/tap".into(),
        };
    }

    // 2) Driver name
    match report.driver.as_str() {
        "veth" => return "veth (virtual ethernet pair)".into(),
        "wireguard" => return "wireguard (VPN)".into(),
        "macvlan" => return "macvlan".into(),
        "ipvlan" => return "ipvlan".into(),
        "dummy" => return "dummy".into(),
        // Some kernels report "tun" as the driver for both variants
        "tun" => return "tun/tap".into(),
        "bridge" => return "bridge".into(),
        "team" => return "team".into(),
        _ => {}
    }

    // 3) Name heuristics
    if name == "lo" {
        return "loopback".into();
    }
    let by_prefix = [
        ("br", "bridge"),
        ("veth", "veth (virtual ethernet pair)"),
        ("gre", "gre/gretap"),
        ("vxlan", "vxlan"),
        ("wg", "wireguard"),
        ("bond", "bond"),
        ("team", "team"),
        ("macvlan", "macvlan"),
        ("ipvlan", "ipvlan"),
        ("tap", "tap"),
        ("tun", "tun"),
    ];
    for (prefix, kind) in by_prefix {
        if name.starts_with(prefix) {
            return kind.into();
        }
    }
    if name.starts_with("docker") || name.starts_with("cni") {
        return "bridge (container)".into();
    }
    if name.starts_with("flannel.") {
        return "vxlan (flannel overlay)".into();
    }

    // 4) Physical vs virtual fallback
    let base = if report.is_virtual { "virtual" } else { "physical" };
    if report.driver.is_empty() {
        base.into()
    } else {
        format!("{} ({})", base, report.driver)
    }
}

fn detect_driver(syslink: &Path) -> String {
    let driver_link = syslink.join("device").join("driver");
    if let Ok(target) = fs::canonicalize(&driver_link) {
        if let Some(base) = target.file_name() {
            return base.to_string_lossy().into_owned();
        }
    }
    // Some virtual devices lack device/driver; fall back to modalias
    read_trimmed(syslink.join("device").join("modalias"))
}

fn detect_master(syslink: &Path) -> String {
    let master_link = syslink.join("master");
    if let Ok(target) = fs::canonicalize(&master_link) {
        if let Some(base) = target.file_name() {
            return base.to_string_lossy().into_owned();
        }
    }
    String::new()
}

/// Reads assigned addresses via the host `ip` tool.
fn detect_addrs(name: &str) -> Vec<String> {
    let Ok(output) = Command::new("ip")
        .args(["-o", "addr", "show", "dev", name])
        .output()
    else {
        return Vec::new();
    };

    if !output.status.success() {
        return Vec::new();
    }

    // Column 4 of each line is the address/prefix
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split_whitespace().nth(3).map(str::to_string))
        .collect()
}

// ============================================
// Helpers
// ============================================

fn read_trimmed(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Parses sysfs flag values, which print as hex with a 0x prefix.
fn parse_flags(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

// ============================================
// Tests
// ============================================
