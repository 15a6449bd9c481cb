//! BPF (Berkeley Packet Filter) capture filter builders
//!
//! These build kernel-side capture filters, one per protocol category, so a
//! capture can be narrowed before packets ever reach the store.

use packetlens_core::ProtocolCategory;

/// STP BPDUs (LLC frames to the bridge group address)
pub fn stp_filter() -> String {
    "ether dst 01:80:c2:00:00:00".to_string()
}

/// VRRP advertisements (IP protocol 112)
pub fn vrrp_filter() -> String {
    "ip proto 112".to_string()
}

/// PIM (IP protocol 103)
pub fn pim_filter() -> String {
    "ip proto 103 or ip6 proto 103".to_string()
}

/// HTTP on the usual clear-text ports
pub fn http_filter() -> String {
    "tcp port 80 or tcp port 8080".to_string()
}

/// DNS over UDP and TCP
pub fn dns_filter() -> String {
    "port 53".to_string()
}

/// TLS on the usual ports
pub fn tls_filter() -> String {
    "tcp port 443 or tcp port 8443".to_string()
}

/// ICMP and ICMPv6
pub fn icmp_filter() -> String {
    "icmp or icmp6".to_string()
}

/// Filter for specific source or destination IP
pub fn host_filter(ip: &str) -> String {
    format!("host {}", ip)
}

/// Filter for traffic to or from any of the given addresses
///
/// Returns an empty string (no filter) when `ips` is empty.
pub fn hosts_filter(ips: &[String]) -> String {
    let parts: Vec<String> = ips
        .iter()
        .map(|ip| ip.trim())
        .filter(|ip| !ip.is_empty())
        .map(host_filter)
        .collect();
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    combine_filters_or(&refs)
}

/// Capture filter for a start request. The user's expression, the category
/// preset and the host list must all match; empty parts are left out.
pub fn capture_filter(
    user: Option<&str>,
    categories: &[ProtocolCategory],
    ips: &[String],
) -> String {
    let preset = categories_filter(categories);
    let hosts = hosts_filter(ips);
    combine_filters(&[user.unwrap_or(""), &preset, &hosts])
}

/// Capture filter for one protocol category
pub fn category_filter(category: ProtocolCategory) -> String {
    match category {
        ProtocolCategory::Tcp => "tcp".to_string(),
        ProtocolCategory::Udp => "udp".to_string(),
        ProtocolCategory::Http => http_filter(),
        ProtocolCategory::Dns => dns_filter(),
        ProtocolCategory::Icmp => icmp_filter(),
        ProtocolCategory::Arp => "arp".to_string(),
        ProtocolCategory::TlsSsl => tls_filter(),
        ProtocolCategory::Stp => stp_filter(),
        ProtocolCategory::Vrrp => vrrp_filter(),
        ProtocolCategory::Pim => pim_filter(),
        ProtocolCategory::Other => {
            let known: Vec<String> = ProtocolCategory::ALL
                .into_iter()
                .filter(|c| *c != ProtocolCategory::Other)
                .map(category_filter)
                .collect();
            let refs: Vec<&str> = known.iter().map(String::as_str).collect();
            not_filter(&combine_filters_or(&refs))
        }
    }
}

/// Capture filter accepting any of the given categories
///
/// Returns an empty string (no filter) when `categories` is empty.
pub fn categories_filter(categories: &[ProtocolCategory]) -> String {
    let parts: Vec<String> = categories.iter().copied().map(category_filter).collect();
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    combine_filters_or(&refs)
}

/// Combine multiple filters with AND logic
pub fn combine_filters(filters: &[&str]) -> String {
    join_filters(filters, " and ")
}

/// Combine multiple filters with OR logic
pub fn combine_filters_or(filters: &[&str]) -> String {
    join_filters(filters, " or ")
}

fn join_filters(filters: &[&str], op: &str) -> String {
    filters
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| format!("({})", f))
        .collect::<Vec<_>>()
        .join(op)
}

/// Negate a filter
pub fn not_filter(filter: &str) -> String {
    format!("not ({})", filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_filters() {
        assert_eq!(category_filter(ProtocolCategory::Tcp), "tcp");
        assert_eq!(category_filter(ProtocolCategory::Arp), "arp");
        assert!(category_filter(ProtocolCategory::Stp).contains("01:80:c2:00:00:00"));
        assert!(category_filter(ProtocolCategory::Vrrp).contains("112"));
        assert!(category_filter(ProtocolCategory::Pim).contains("103"));
    }

    #[test]
    fn test_other_excludes_known_categories() {
        let other = category_filter(ProtocolCategory::Other);
        assert!(other.starts_with("not ("));
        assert!(other.contains("(tcp)"));
        assert!(other.contains("(arp)"));
    }

    #[test]
    fn test_categories_filter() {
        let filter = categories_filter(&[ProtocolCategory::Tcp, ProtocolCategory::Dns]);
        assert_eq!(filter, "(tcp) or (port 53)");
        assert_eq!(categories_filter(&[]), "");
    }

    #[test]
    fn test_host_filter() {
        assert_eq!(host_filter("172.16.0.1"), "host 172.16.0.1");
    }

    #[test]
    fn test_hosts_filter() {
        let ips = vec!["10.0.0.1".to_string(), " ".to_string(), "10.0.0.2".to_string()];
        assert_eq!(hosts_filter(&ips), "(host 10.0.0.1) or (host 10.0.0.2)");
        assert_eq!(hosts_filter(&[]), "");
    }

    #[test]
    fn test_capture_filter_joins_parts() {
        let filter = capture_filter(
            Some("not port 22"),
            &[ProtocolCategory::Arp],
            &["192.168.1.1".to_string()],
        );
        assert_eq!(filter, "(not port 22) and ((arp)) and ((host 192.168.1.1))");

        assert_eq!(capture_filter(None, &[], &[]), "");
        assert_eq!(
            capture_filter(None, &[], &["10.1.1.1".to_string()]),
            "((host 10.1.1.1))"
        );
    }

    #[test]
    fn test_combine_filters() {
        let combined = combine_filters(&["tcp", "port 80"]);
        assert_eq!(combined, "(tcp) and (port 80)");

        let empty: Vec<&str> = vec![];
        assert_eq!(combine_filters(&empty), "");
        assert_eq!(combine_filters(&["", "udp"]), "(udp)");
    }

    #[test]
    fn test_combine_filters_or() {
        let combined = combine_filters_or(&["tcp port 80", "tcp port 443"]);
        assert_eq!(combined, "(tcp port 80) or (tcp port 443)");
    }

    #[test]
    fn test_not_filter() {
        assert_eq!(not_filter("tcp"), "not (tcp)");
    }

    #[test]
    fn test_complex_filter_combination() {
        let web = categories_filter(&[ProtocolCategory::Http, ProtocolCategory::TlsSsl]);
        let final_filter = combine_filters(&[&web, &host_filter("192.168.1.1")]);

        assert!(final_filter.contains("80"));
        assert!(final_filter.contains("443"));
        assert!(final_filter.contains("192.168.1.1"));
        assert!(final_filter.contains(") and ("));
    }
}
