//! Packet record types
//!
//! A [`PacketRecord`] is one dissected packet as held by the packet store and
//! carried over the wire. Optional layer groups are present only when the
//! matching layer was parsed; absent groups are omitted from JSON entirely.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::{Error, Result};

/// One parsed packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Sequence number within one store, starting at 1
    pub number: u64,
    /// Capture time label
    pub timestamp: String,
    /// Total byte length
    pub length: u32,
    /// Highest-layer classification label (e.g. "TCP", "DNS", "ARP")
    pub protocol: String,
    /// Protocol stack, outermost first (e.g. ["eth", "ip", "udp", "dns"])
    pub layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arp: Option<ArpInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationInfo>,
    /// Full frame, hex-encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_hex: Option<String>,
    /// Interface the packet was captured on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_id: Option<String>,
}

/// Data link layer fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetInfo {
    pub src_mac: String,
    pub dst_mac: String,
    pub header_len: u16,
}

/// IPv4/IPv6 fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub src_ip: String,
    pub dst_ip: String,
    /// TTL (IPv4) or hop limit (IPv6)
    pub ttl: u8,
    pub header_len: u16,
    pub total_len: u16,
}

/// TCP/UDP fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportInfo {
    pub src_port: u16,
    pub dst_port: u16,
    /// TCP flag names (empty for UDP)
    #[serde(default)]
    pub flags: Vec<String>,
    pub header_len: u16,
    pub payload_len: u32,
}

/// Address resolution fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpInfo {
    /// "Request", "Reply" or the raw opcode
    pub operation: String,
    pub sender_mac: String,
    pub sender_ip: String,
    pub target_mac: String,
    pub target_ip: String,
}

/// Application layer hints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_query: Option<String>,
}

impl ApplicationInfo {
    /// Check if no hint was extracted
    pub fn is_empty(&self) -> bool {
        self.http_host.is_none() && self.http_method.is_none() && self.dns_query.is_none()
    }
}

impl PacketRecord {
    /// Create a record with only the required fields set.
    ///
    /// The number is left at 0; the packet store assigns the real one.
    pub fn new(timestamp: impl Into<String>, length: u32, protocol: impl Into<String>) -> Self {
        Self {
            number: 0,
            timestamp: timestamp.into(),
            length,
            protocol: protocol.into(),
            layers: Vec::new(),
            ethernet: None,
            network: None,
            transport: None,
            arp: None,
            application: None,
            raw_hex: None,
            interface_id: None,
        }
    }

    /// All IP addresses carried by this record, network first, then ARP
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        let network = self
            .network
            .iter()
            .flat_map(|n| [n.src_ip.as_str(), n.dst_ip.as_str()]);
        let arp = self
            .arp
            .iter()
            .flat_map(|a| [a.sender_ip.as_str(), a.target_ip.as_str()]);
        network.chain(arp)
    }

    /// Source and destination shown in list views
    pub fn endpoints(&self) -> (String, String) {
        if let Some(net) = &self.network {
            match &self.transport {
                Some(t) => (
                    format!("{}:{}", net.src_ip, t.src_port),
                    format!("{}:{}", net.dst_ip, t.dst_port),
                ),
                None => (net.src_ip.clone(), net.dst_ip.clone()),
            }
        } else if let Some(arp) = &self.arp {
            (arp.sender_ip.clone(), arp.target_ip.clone())
        } else if let Some(eth) = &self.ethernet {
            (eth.src_mac.clone(), eth.dst_mac.clone())
        } else {
            ("-".to_string(), "-".to_string())
        }
    }

    /// One-line summary for list output
    pub fn summary_line(&self) -> String {
        let (src, dst) = self.endpoints();
        format!(
            "{:>6}  {}  {:<8} {} -> {}  {} bytes",
            self.number, self.timestamp, self.protocol, src, dst, self.length
        )
    }

    /// Layer-by-layer description of the record
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "[Packet #{}] Time: {} | Length: {} bytes",
            self.number, self.timestamp, self.length
        );
        let _ = writeln!(out, "  Layers: {}", self.layers.join(" / "));
        let _ = writeln!(out, "  Protocol: {}", self.protocol);

        if let Some(iface) = &self.interface_id {
            let _ = writeln!(out, "  Interface: {}", iface);
        }
        if let Some(eth) = &self.ethernet {
            let _ = writeln!(
                out,
                "  Ethernet: {} -> {} (header {} bytes)",
                eth.src_mac, eth.dst_mac, eth.header_len
            );
        }
        if let Some(arp) = &self.arp {
            let _ = writeln!(out, "  ARP {}:", arp.operation);
            let _ = writeln!(out, "    Sender: {} ({})", arp.sender_ip, arp.sender_mac);
            let _ = writeln!(out, "    Target: {} ({})", arp.target_ip, arp.target_mac);
        }
        if let Some(net) = &self.network {
            let _ = writeln!(
                out,
                "  Network: {} -> {} TTL {} (header {} bytes, total {})",
                net.src_ip, net.dst_ip, net.ttl, net.header_len, net.total_len
            );
        }
        if let Some(t) = &self.transport {
            let _ = write!(
                out,
                "  Transport: port {} -> {} (header {} bytes, payload {})",
                t.src_port, t.dst_port, t.header_len, t.payload_len
            );
            if !t.flags.is_empty() {
                let _ = write!(out, " [{}]", t.flags.join(","));
            }
            out.push('\n');
        }
        if let Some(app) = &self.application {
            if let Some(method) = &app.http_method {
                let _ = writeln!(out, "  HTTP method: {}", method);
            }
            if let Some(host) = &app.http_host {
                let _ = writeln!(out, "  HTTP host: {}", host);
            }
            if let Some(query) = &app.dns_query {
                let _ = writeln!(out, "  DNS query: {}", query);
            }
        }
        if let Some(hex) = &self.raw_hex {
            let _ = writeln!(out, "  Raw: {}", hex_dump_preview(hex, 32));
        }
        out
    }

    /// Check the structural invariants of a record
    pub fn validate(&self) -> Result<()> {
        if self.network.is_some() && self.arp.is_some() {
            return Err(Error::malformed(
                "record carries both network and arp groups",
            ));
        }
        if self.transport.is_some() && self.network.is_none() {
            return Err(Error::malformed(
                "record carries a transport group without a network group",
            ));
        }
        if let Some(hex) = &self.raw_hex {
            if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::malformed("raw_hex is not an even-length hex string"));
            }
            if hex.len() / 2 != self.length as usize {
                return Err(Error::malformed(format!(
                    "length {} does not match {} bytes of raw_hex",
                    self.length,
                    hex.len() / 2
                )));
            }
        }
        Ok(())
    }
}

/// Hex-encode a byte slice (lowercase, no separators)
pub fn encode_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn hex_dump_preview(hex: &str, max_bytes: usize) -> String {
    let bytes: Vec<&str> = hex
        .as_bytes()
        .chunks(2)
        .take(max_bytes)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect();
    let mut preview = bytes.join(" ");
    if hex.len() / 2 > max_bytes {
        preview.push_str(" ...");
    }
    preview
}
