//! Client-side packet view filtering
//!
//! Filtering never touches the packet store. A [`FilterState`] is a plain
//! value owned by whoever renders the view; [`filter`] maps a snapshot and a
//! state to the ordered subset of records that should be shown.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, PacketRecord};

/// Protocol classification bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolCategory {
    Tcp,
    Udp,
    Http,
    Dns,
    Icmp,
    Arp,
    TlsSsl,
    Stp,
    Vrrp,
    Pim,
    Other,
}

impl ProtocolCategory {
    /// All categories in classification priority order
    pub const ALL: [ProtocolCategory; 11] = [
        ProtocolCategory::Tcp,
        ProtocolCategory::Udp,
        ProtocolCategory::Http,
        ProtocolCategory::Dns,
        ProtocolCategory::Icmp,
        ProtocolCategory::Arp,
        ProtocolCategory::TlsSsl,
        ProtocolCategory::Stp,
        ProtocolCategory::Vrrp,
        ProtocolCategory::Pim,
        ProtocolCategory::Other,
    ];

    /// Lowercase substrings that select this category
    fn needles(self) -> &'static [&'static str] {
        match self {
            ProtocolCategory::Tcp => &["tcp"],
            ProtocolCategory::Udp => &["udp"],
            ProtocolCategory::Http => &["http"],
            ProtocolCategory::Dns => &["dns"],
            ProtocolCategory::Icmp => &["icmp"],
            ProtocolCategory::Arp => &["arp"],
            ProtocolCategory::TlsSsl => &["tls", "ssl"],
            ProtocolCategory::Stp => &["stp"],
            ProtocolCategory::Vrrp => &["vrrp"],
            ProtocolCategory::Pim => &["pim"],
            ProtocolCategory::Other => &[],
        }
    }

    /// Classify a protocol label.
    ///
    /// Categories are tried in [`ProtocolCategory::ALL`] order and the first
    /// whose needle occurs in the lowercased label wins. Note that this means
    /// a label such as "HTTP/TCP" lands in `Tcp`.
    pub fn classify(protocol: &str) -> Self {
        let label = protocol.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|cat| cat.needles().iter().any(|n| label.contains(n)))
            .unwrap_or(ProtocolCategory::Other)
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            ProtocolCategory::Tcp => "TCP",
            ProtocolCategory::Udp => "UDP",
            ProtocolCategory::Http => "HTTP",
            ProtocolCategory::Dns => "DNS",
            ProtocolCategory::Icmp => "ICMP",
            ProtocolCategory::Arp => "ARP",
            ProtocolCategory::TlsSsl => "TLS/SSL",
            ProtocolCategory::Stp => "STP",
            ProtocolCategory::Vrrp => "VRRP",
            ProtocolCategory::Pim => "PIM",
            ProtocolCategory::Other => "Other",
        }
    }
}

impl fmt::Display for ProtocolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProtocolCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(ProtocolCategory::Tcp),
            "udp" => Ok(ProtocolCategory::Udp),
            "http" => Ok(ProtocolCategory::Http),
            "dns" => Ok(ProtocolCategory::Dns),
            "icmp" => Ok(ProtocolCategory::Icmp),
            "arp" => Ok(ProtocolCategory::Arp),
            "tls" | "ssl" | "tls/ssl" | "tls_ssl" => Ok(ProtocolCategory::TlsSsl),
            "stp" => Ok(ProtocolCategory::Stp),
            "vrrp" => Ok(ProtocolCategory::Vrrp),
            "pim" => Ok(ProtocolCategory::Pim),
            "other" => Ok(ProtocolCategory::Other),
            other => Err(Error::InvalidFilter(format!(
                "unknown protocol category '{}'",
                other
            ))),
        }
    }
}

/// View predicate: enabled categories plus an optional IP allow-list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    categories: BTreeSet<ProtocolCategory>,
    ips: Vec<String>,
}

impl Default for FilterState {
    /// Every category enabled, no IP filter
    fn default() -> Self {
        Self {
            categories: ProtocolCategory::ALL.into_iter().collect(),
            ips: Vec::new(),
        }
    }
}

impl FilterState {
    /// Filter with only the given categories enabled
    pub fn only<I: IntoIterator<Item = ProtocolCategory>>(categories: I) -> Self {
        Self {
            categories: categories.into_iter().collect(),
            ips: Vec::new(),
        }
    }

    pub fn is_enabled(&self, category: ProtocolCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn set_enabled(&mut self, category: ProtocolCategory, enabled: bool) {
        if enabled {
            self.categories.insert(category);
        } else {
            self.categories.remove(&category);
        }
    }

    pub fn enable_all(&mut self) {
        self.categories.extend(ProtocolCategory::ALL);
    }

    pub fn disable_all(&mut self) {
        self.categories.clear();
    }

    /// Enabled categories in priority order
    pub fn categories(&self) -> impl Iterator<Item = ProtocolCategory> + '_ {
        self.categories.iter().copied()
    }

    /// Add an address to the IP filter. Duplicates and blanks are ignored.
    pub fn add_ip(&mut self, ip: impl Into<String>) -> bool {
        let ip = ip.into().trim().to_string();
        if ip.is_empty() || self.ips.contains(&ip) {
            return false;
        }
        self.ips.push(ip);
        true
    }

    pub fn remove_ip(&mut self, ip: &str) -> bool {
        let before = self.ips.len();
        self.ips.retain(|i| i != ip);
        self.ips.len() != before
    }

    pub fn clear_ips(&mut self) {
        self.ips.clear();
    }

    /// IP filter entries in insertion order
    pub fn ips(&self) -> &[String] {
        &self.ips
    }

    /// Whether a single record passes this filter
    pub fn matches(&self, record: &PacketRecord) -> bool {
        if !self.is_enabled(ProtocolCategory::classify(&record.protocol)) {
            return false;
        }
        self.ips.is_empty() || record.addresses().any(|a| self.ips.iter().any(|ip| ip == a))
    }
}

/// Apply a filter to a snapshot, preserving snapshot order
pub fn filter<'a>(snapshot: &'a [PacketRecord], state: &FilterState) -> Vec<&'a PacketRecord> {
    snapshot.iter().filter(|r| state.matches(r)).collect()
}

/// Number of records in each category, in priority order
pub fn count_by_category(snapshot: &[PacketRecord]) -> Vec<(ProtocolCategory, usize)> {
    let mut counts = [0usize; ProtocolCategory::ALL.len()];
    for record in snapshot {
        let cat = ProtocolCategory::classify(&record.protocol);
        if let Some(pos) = ProtocolCategory::ALL.iter().position(|c| *c == cat) {
            counts[pos] += 1;
        }
    }
    ProtocolCategory::ALL.into_iter().zip(counts).collect()
}
