//! Raw frame dissection
//!
//! Turns one captured Ethernet frame into a [`PacketRecord`]. Parsing is
//! best-effort: a truncated or unknown layer ends the walk and whatever was
//! decoded so far is kept. Every frame yields a record.

use chrono::{DateTime, Local, Utc};
use packetlens_core::packet::encode_hex;
use packetlens_core::{
    ApplicationInfo, ArpInfo, EthernetInfo, MacAddr, NetworkInfo, PacketRecord, TransportInfo,
};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Timestamp label format used for captured packets
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;

const STP_GROUP_ADDR: [u8; 6] = [0x01, 0x80, 0xc2, 0x00, 0x00, 0x00];

const IPPROTO_ICMP: u8 = 1;
const IPPROTO_IGMP: u8 = 2;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;
const IPPROTO_ICMPV6: u8 = 58;
const IPPROTO_PIM: u8 = 103;
const IPPROTO_VRRP: u8 = 112;

/// Format a capture timestamp (seconds + microseconds since the epoch) as a
/// local wall-clock label
pub fn format_timestamp(secs: i64, micros: u32) -> String {
    match DateTime::<Utc>::from_timestamp(secs, micros.min(999_999) * 1000) {
        Some(utc) => utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        None => now_timestamp(),
    }
}

/// Current local time as a timestamp label
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Dissect a raw Ethernet frame
pub fn dissect(data: &[u8], timestamp: String, interface: Option<&str>) -> PacketRecord {
    let mut rec = PacketRecord::new(timestamp, data.len() as u32, "Unknown");
    rec.raw_hex = Some(encode_hex(data));
    rec.interface_id = interface.map(str::to_string);
    parse_ethernet(data, &mut rec);
    rec
}

fn be16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn set_top(rec: &mut PacketRecord, layer: &str, protocol: &str) {
    rec.layers.push(layer.to_string());
    rec.protocol = protocol.to_string();
}

fn parse_ethernet(data: &[u8], rec: &mut PacketRecord) {
    if data.len() < 14 {
        rec.layers.push("raw".into());
        return;
    }
    let dst = MacAddr::from_slice(&data[0..6]).unwrap_or(MacAddr::zero());
    let src = MacAddr::from_slice(&data[6..12]).unwrap_or(MacAddr::zero());
    set_top(rec, "eth", "ETH");

    let mut ethertype = be16(data, 12);
    let mut offset = 14;
    if ethertype == ETHERTYPE_VLAN && data.len() >= 18 {
        rec.layers.push("vlan".into());
        ethertype = be16(data, 16);
        offset = 18;
    }

    rec.ethernet = Some(EthernetInfo {
        src_mac: src.to_string(),
        dst_mac: dst.to_string(),
        header_len: offset as u16,
    });

    let payload = &data[offset..];
    match ethertype {
        ETHERTYPE_IPV4 => parse_ipv4(payload, rec),
        ETHERTYPE_IPV6 => parse_ipv6(payload, rec),
        ETHERTYPE_ARP => parse_arp(payload, rec),
        // 802.3 length field, LLC follows
        len if len <= 1500 => parse_llc(dst, payload, rec),
        _ => {}
    }
}

fn parse_llc(dst: MacAddr, data: &[u8], rec: &mut PacketRecord) {
    set_top(rec, "llc", "LLC");
    let bpdu_sap = data.len() >= 2 && data[0] == 0x42 && data[1] == 0x42;
    if dst.0 == STP_GROUP_ADDR || bpdu_sap {
        set_top(rec, "stp", "STP");
    }
}

fn parse_arp(data: &[u8], rec: &mut PacketRecord) {
    set_top(rec, "arp", "ARP");
    // Ethernet/IPv4 ARP only
    if data.len() < 28 || be16(data, 0) != 1 || be16(data, 2) != ETHERTYPE_IPV4 {
        return;
    }
    let operation = match be16(data, 6) {
        1 => "Request".to_string(),
        2 => "Reply".to_string(),
        op => op.to_string(),
    };
    let mac = |at: usize| {
        MacAddr::from_slice(&data[at..at + 6])
            .unwrap_or(MacAddr::zero())
            .to_string()
    };
    let ip = |at: usize| Ipv4Addr::new(data[at], data[at + 1], data[at + 2], data[at + 3]).to_string();

    rec.arp = Some(ArpInfo {
        operation,
        sender_mac: mac(8),
        sender_ip: ip(14),
        target_mac: mac(18),
        target_ip: ip(24),
    });
}

fn parse_ipv4(data: &[u8], rec: &mut PacketRecord) {
    set_top(rec, "ip", "IPv4");
    if data.len() < 20 {
        return;
    }
    let ihl = ((data[0] & 0x0f) as usize) * 4;
    if ihl < 20 || ihl > data.len() {
        return;
    }
    let total_len = be16(data, 2);
    let src = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
    let dst = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

    rec.network = Some(NetworkInfo {
        src_ip: src.to_string(),
        dst_ip: dst.to_string(),
        ttl: data[8],
        header_len: ihl as u16,
        total_len,
    });

    // Trailing Ethernet padding is not part of the datagram
    let end = (total_len as usize).clamp(ihl, data.len());
    parse_ip_payload(data[9], &data[ihl..end], rec);
}

fn parse_ipv6(data: &[u8], rec: &mut PacketRecord) {
    set_top(rec, "ipv6", "IPv6");
    if data.len() < 40 {
        return;
    }
    let payload_len = be16(data, 4);
    let mut src = [0u8; 16];
    let mut dst = [0u8; 16];
    src.copy_from_slice(&data[8..24]);
    dst.copy_from_slice(&data[24..40]);

    rec.network = Some(NetworkInfo {
        src_ip: Ipv6Addr::from(src).to_string(),
        dst_ip: Ipv6Addr::from(dst).to_string(),
        ttl: data[7],
        header_len: 40,
        total_len: payload_len.saturating_add(40),
    });

    let end = (40 + payload_len as usize).min(data.len());
    parse_ip_payload(data[6], &data[40..end], rec);
}

fn parse_ip_payload(proto: u8, data: &[u8], rec: &mut PacketRecord) {
    match proto {
        IPPROTO_TCP => parse_tcp(data, rec),
        IPPROTO_UDP => parse_udp(data, rec),
        IPPROTO_ICMP => set_top(rec, "icmp", "ICMP"),
        IPPROTO_ICMPV6 => set_top(rec, "icmpv6", "ICMPv6"),
        IPPROTO_IGMP => set_top(rec, "igmp", "IGMP"),
        IPPROTO_PIM => set_top(rec, "pim", "PIM"),
        IPPROTO_VRRP => set_top(rec, "vrrp", "VRRP"),
        _ => {}
    }
}

fn tcp_flags(flags: u8) -> Vec<String> {
    const NAMES: [(u8, &str); 8] = [
        (0x01, "FIN"),
        (0x02, "SYN"),
        (0x04, "RST"),
        (0x08, "PSH"),
        (0x10, "ACK"),
        (0x20, "URG"),
        (0x40, "ECE"),
        (0x80, "CWR"),
    ];
    NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect()
}

fn parse_tcp(data: &[u8], rec: &mut PacketRecord) {
    set_top(rec, "tcp", "TCP");
    if data.len() < 20 {
        return;
    }
    let src_port = be16(data, 0);
    let dst_port = be16(data, 2);
    let header_len = (((data[12] >> 4) as usize) * 4).clamp(20, data.len());
    let payload = &data[header_len..];

    rec.transport = Some(TransportInfo {
        src_port,
        dst_port,
        flags: tcp_flags(data[13]),
        header_len: header_len as u16,
        payload_len: payload.len() as u32,
    });

    if payload.is_empty() {
        return;
    }
    if (src_port == 53 || dst_port == 53) && payload.len() > 2 {
        // DNS over TCP carries a two byte length prefix
        if parse_dns(&payload[2..], rec) {
            return;
        }
    }
    if is_tls_record(payload) {
        set_top(rec, "tls", "TLS");
        return;
    }
    parse_http(payload, rec);
}

fn parse_udp(data: &[u8], rec: &mut PacketRecord) {
    set_top(rec, "udp", "UDP");
    if data.len() < 8 {
        return;
    }
    let src_port = be16(data, 0);
    let dst_port = be16(data, 2);
    let payload = &data[8..];

    rec.transport = Some(TransportInfo {
        src_port,
        dst_port,
        flags: Vec::new(),
        header_len: 8,
        payload_len: payload.len() as u32,
    });

    let dns_port = |p: u16| p == 53 || p == 5353;
    if dns_port(src_port) || dns_port(dst_port) {
        parse_dns(payload, rec);
    }
}

fn application(rec: &mut PacketRecord) -> &mut ApplicationInfo {
    rec.application.get_or_insert_with(ApplicationInfo::default)
}

/// Returns true if the payload looked like a DNS message
fn parse_dns(data: &[u8], rec: &mut PacketRecord) -> bool {
    if data.len() < 12 {
        return false;
    }
    let qd_count = be16(data, 4);
    set_top(rec, "dns", "DNS");
    if qd_count > 0 {
        if let Some(name) = parse_dns_name(data, 12) {
            application(rec).dns_query = Some(name);
        }
    }
    true
}

fn parse_dns_name(data: &[u8], offset: usize) -> Option<String> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = offset;
    for _ in 0..128 {
        let len = *data.get(pos)? as usize;
        // End of name, or a compression pointer (never in the first question)
        if len == 0 || len >= 0xc0 {
            break;
        }
        pos += 1;
        let label = data.get(pos..pos + len)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += len;
    }
    if labels.is_empty() {
        None
    } else {
        Some(labels.join("."))
    }
}

fn is_tls_record(data: &[u8]) -> bool {
    // change_cipher_spec, alert, handshake, application_data
    data.len() >= 5 && (0x14..=0x17).contains(&data[0]) && data[1] == 3 && data[2] <= 4
}

fn parse_http(data: &[u8], rec: &mut PacketRecord) {
    const METHODS: [&str; 9] = [
        "GET", "POST", "PUT", "DELETE", "HEAD", "PATCH", "OPTIONS", "CONNECT", "TRACE",
    ];
    let head = String::from_utf8_lossy(&data[..data.len().min(1024)]);
    let mut lines = head.lines();
    let first = match lines.next() {
        Some(line) => line,
        None => return,
    };

    let method = first.split(' ').next().unwrap_or("");
    let is_request = METHODS.contains(&method) && first.contains(" HTTP/");
    if !is_request && !first.starts_with("HTTP/") {
        return;
    }

    set_top(rec, "http", "HTTP");
    let host = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("host")
            .then(|| value.trim().to_string())
    });
    let app = application(rec);
    if is_request {
        app.http_method = Some(method.to_string());
    }
    app.http_host = host;
}
