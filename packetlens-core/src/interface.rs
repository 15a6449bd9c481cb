//! Network interface description

use serde::{Deserialize, Serialize};
use std::fmt;

/// A capture-capable network interface as reported by the capture engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "en0")
    pub name: String,
    /// Human readable description, when the OS provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MAC address, formatted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Assigned addresses with prefix (e.g., "192.168.1.10/24")
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Is interface up?
    pub is_up: bool,
    pub is_loopback: bool,
}

impl InterfaceInfo {
    /// Create an interface entry that is up, has no addresses and is not loopback
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            mac: None,
            addresses: Vec::new(),
            is_up: true,
            is_loopback: false,
        }
    }

    /// Up, not loopback, and at least one address assigned
    pub fn is_connected(&self) -> bool {
        self.is_up && !self.is_loopback && !self.addresses.is_empty()
    }
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(mac) = &self.mac {
            write!(f, " ({})", mac)?;
        }
        if !self.addresses.is_empty() {
            write!(f, " [{}]", self.addresses.join(", "))?;
        }
        if !self.is_up {
            write!(f, " down")?;
        }
        Ok(())
    }
}
