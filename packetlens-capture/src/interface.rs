//! Network interface enumeration

use packetlens_core::{Error, InterfaceInfo, Result};
use pnet_datalink::{self, NetworkInterface};

/// Convert a pnet interface into the wire description
pub fn describe(iface: &NetworkInterface) -> InterfaceInfo {
    let mac = iface.mac.map(|mac| {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac.0, mac.1, mac.2, mac.3, mac.4, mac.5
        )
    });

    InterfaceInfo {
        name: iface.name.clone(),
        description: (!iface.description.is_empty()).then(|| iface.description.clone()),
        mac,
        addresses: iface.ips.iter().map(|network| network.to_string()).collect(),
        is_up: iface.is_up(),
        is_loopback: iface.is_loopback(),
    }
}

/// List all available network interfaces
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    let interfaces = pnet_datalink::interfaces();

    if interfaces.is_empty() {
        return Err(Error::engine(
            "No network interfaces found. Are you running with sufficient privileges?",
        ));
    }

    Ok(interfaces.iter().map(describe).collect())
}

/// Interfaces that look connected: up, not loopback, with an address.
///
/// Falls back to every interface when none qualify so the caller always has
/// something to pick from.
pub fn connected_interfaces(all: Vec<InterfaceInfo>) -> Vec<InterfaceInfo> {
    let connected: Vec<InterfaceInfo> = all.iter().filter(|i| i.is_connected()).cloned().collect();
    if connected.is_empty() {
        all
    } else {
        connected
    }
}

/// List connected interfaces (see [`connected_interfaces`])
pub fn list_connected_interfaces() -> Result<Vec<InterfaceInfo>> {
    Ok(connected_interfaces(list_interfaces()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, up: bool, loopback: bool, addr: Option<&str>) -> InterfaceInfo {
        let mut info = InterfaceInfo::new(name);
        info.is_up = up;
        info.is_loopback = loopback;
        info.addresses = addr.into_iter().map(String::from).collect();
        info
    }

    #[test]
    fn test_connected_filters_unusable() {
        let all = vec![
            iface("lo", true, true, Some("127.0.0.1/8")),
            iface("eth0", true, false, Some("10.0.0.2/24")),
            iface("eth1", false, false, Some("10.0.1.2/24")),
            iface("wlan0", true, false, None),
        ];
        let names: Vec<String> = connected_interfaces(all).into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["eth0"]);
    }

    #[test]
    fn test_connected_falls_back_to_all() {
        let all = vec![iface("lo", true, true, Some("127.0.0.1/8")), iface("dummy0", false, false, None)];
        assert_eq!(connected_interfaces(all.clone()), all);
    }

    #[test]
    fn test_list_interfaces_has_names() {
        // Enumeration needs no privileges but may be empty in sandboxes
        if let Ok(interfaces) = list_interfaces() {
            assert!(interfaces.iter().all(|i| !i.name.is_empty()));
        }
    }
}
