//! Capture engine seam
//!
//! The session manager drives capture through [`CaptureEngine`] and
//! [`PacketSource`]. [`PcapEngine`] is the live implementation on top of
//! pcap; [`ReplayEngine`] serves a fixed list of records and needs no
//! privileges.

use packetlens_core::{CaptureRequest, Error, InterfaceInfo, PacketRecord, Result};
use pcap::{Active, Capture, Device};
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dissect::{dissect, format_timestamp, now_timestamp};
use crate::interface;

/// Default snapshot length (maximum bytes per packet)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout, which bounds how long a stop request waits on a
/// quiet interface
const DEFAULT_TIMEOUT_MS: i32 = 100;

/// One step of a packet source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A dissected packet
    Packet(PacketRecord),
    /// Nothing arrived within the read timeout
    Idle,
    /// The stream has ended
    Closed,
}

/// Producer of packets for one capture session
pub trait PacketSource: Send {
    /// Block until the next packet, a read timeout, or end of stream
    fn next_event(&mut self) -> Result<SourceEvent>;

    /// Next packet the source already holds, read after a stop request.
    ///
    /// `Idle` or `Closed` means nothing is left to drain.
    fn next_buffered(&mut self) -> Result<SourceEvent> {
        self.next_event()
    }

    /// Whether reaching the end of the stream is a normal way to finish
    fn is_finite(&self) -> bool {
        false
    }
}

/// Capture engine collaborator
pub trait CaptureEngine: Send + Sync {
    /// All interfaces the engine can capture on
    fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>>;

    /// Interfaces that look connected (falls back to all)
    fn list_connected_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        Ok(interface::connected_interfaces(self.list_interfaces()?))
    }

    /// Open a packet source for a capture request.
    ///
    /// May block for a bounded time (device open, filter compile).
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn PacketSource>>;
}

/// Configuration for live packet capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds
    pub timeout_ms: i32,
    /// Enable promiscuous mode (falls back to non-promiscuous)
    pub promiscuous: bool,
    /// Buffer size (0 = default)
    pub buffer_size: i32,
    /// Enable immediate mode (deliver packets immediately)
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
        }
    }
}

/// Live capture through pcap
#[derive(Debug, Clone, Default)]
pub struct PcapEngine {
    config: CaptureConfig,
}

impl PcapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn open_device(&self, name: &str, promiscuous: bool) -> std::result::Result<Capture<Active>, pcap::Error> {
        let mut capture = Capture::from_device(Device::from(name))?
            .promisc(promiscuous)
            .snaplen(self.config.snaplen)
            .timeout(self.config.timeout_ms)
            .immediate_mode(self.config.immediate_mode);

        if self.config.buffer_size > 0 {
            capture = capture.buffer_size(self.config.buffer_size);
        }

        capture.open()
    }
}

fn open_error(interface: &str, e: pcap::Error) -> Error {
    let msg = e.to_string();
    if msg.contains("ermission denied") || msg.contains("Operation not permitted") {
        Error::engine(format!(
            "Permission denied opening '{}': capture needs elevated privileges",
            interface
        ))
    } else {
        Error::engine(format!("Failed to open capture on '{}': {}", interface, msg))
    }
}

impl CaptureEngine for PcapEngine {
    fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        interface::list_interfaces()
    }

    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn PacketSource>> {
        let name = request.interface.as_str();
        debug!(interface = %name, "Opening pcap capture");

        let capture = match self.open_device(name, self.config.promiscuous) {
            Ok(c) => c,
            // Some interfaces (loopback on macOS) refuse promiscuous mode
            Err(e) if self.config.promiscuous => {
                warn!(interface = %name, error = %e, "Promiscuous open failed, retrying without");
                self.open_device(name, false)
                    .map_err(|e| open_error(name, e))?
            }
            Err(e) => return Err(open_error(name, e)),
        };

        let mut capture = capture;
        if let Some(filter) = request.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            capture
                .filter(filter, true)
                .map_err(|e| Error::InvalidFilter(format!("{}: {}", filter, e)))?;
            debug!(filter = %filter, "Applied capture filter");
        }

        info!(interface = %name, "Capture initialized");
        Ok(Box::new(PcapSource {
            capture,
            interface: request.interface.clone(),
        }))
    }
}

struct PcapSource {
    capture: Capture<Active>,
    interface: String,
}

impl PacketSource for PcapSource {
    fn next_event(&mut self) -> Result<SourceEvent> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let ts = &packet.header.ts;
                let timestamp = format_timestamp(ts.tv_sec as i64, ts.tv_usec as u32);
                Ok(SourceEvent::Packet(dissect(
                    packet.data,
                    timestamp,
                    Some(&self.interface),
                )))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::Closed),
            Err(e) => Err(Error::engine(format!("Packet capture error: {}", e))),
        }
    }
}

/// Name of the interface [`ReplayEngine`] advertises by default
pub const REPLAY_INTERFACE: &str = "replay0";

/// Replays a fixed list of records on a fake interface
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    interface: String,
    records: Vec<PacketRecord>,
    interval: Duration,
    repeat: bool,
}

impl ReplayEngine {
    /// Replay `records` on [`REPLAY_INTERFACE`] without delay
    pub fn new(records: Vec<PacketRecord>) -> Self {
        Self {
            interface: REPLAY_INTERFACE.to_string(),
            records,
            interval: Duration::ZERO,
            repeat: false,
        }
    }

    /// Use a different interface name
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = name.into();
        self
    }

    /// Pause between records
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start over when the list runs out instead of closing
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl CaptureEngine for ReplayEngine {
    fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        let mut info = InterfaceInfo::new(self.interface.clone());
        info.description = Some("Replay of recorded packets".to_string());
        info.addresses.push("127.0.0.1/8".to_string());
        Ok(vec![info])
    }

    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn PacketSource>> {
        if request.interface != self.interface {
            return Err(Error::InvalidInterface(request.interface.clone()));
        }
        Ok(Box::new(ReplaySource {
            template: self.records.clone(),
            pending: self.records.iter().cloned().collect(),
            interface: self.interface.clone(),
            interval: self.interval,
            repeat: self.repeat && !self.records.is_empty(),
        }))
    }
}

struct ReplaySource {
    template: Vec<PacketRecord>,
    pending: VecDeque<PacketRecord>,
    interface: String,
    interval: Duration,
    repeat: bool,
}

impl PacketSource for ReplaySource {
    fn next_event(&mut self) -> Result<SourceEvent> {
        if self.pending.is_empty() && self.repeat {
            self.pending.extend(self.template.iter().cloned());
        }
        let Some(mut record) = self.pending.pop_front() else {
            return Ok(SourceEvent::Closed);
        };
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        record.timestamp = now_timestamp();
        record.interface_id = Some(self.interface.clone());
        Ok(SourceEvent::Packet(record))
    }

    // Records are produced on demand, so nothing is ever pending delivery
    fn next_buffered(&mut self) -> Result<SourceEvent> {
        Ok(SourceEvent::Idle)
    }

    fn is_finite(&self) -> bool {
        !self.repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<PacketRecord> {
        (0..n)
            .map(|i| PacketRecord::new("t", 60 + i as u32, "UDP"))
            .collect()
    }

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.snaplen, DEFAULT_SNAPLEN);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.promiscuous);
        assert!(config.immediate_mode);
    }

    #[test]
    fn test_replay_yields_records_then_closes() {
        let engine = ReplayEngine::new(sample(2));
        let mut source = engine.open(&CaptureRequest::new(REPLAY_INTERFACE)).unwrap();
        assert!(source.is_finite());

        for expected_len in [60, 61] {
            match source.next_event().unwrap() {
                SourceEvent::Packet(rec) => {
                    assert_eq!(rec.length, expected_len);
                    assert_eq!(rec.interface_id.as_deref(), Some(REPLAY_INTERFACE));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(source.next_event().unwrap(), SourceEvent::Closed);
    }

    #[test]
    fn test_replay_rejects_unknown_interface() {
        let engine = ReplayEngine::new(sample(1));
        let err = engine.open(&CaptureRequest::new("eth9")).err().unwrap();
        assert!(matches!(err, Error::InvalidInterface(name) if name == "eth9"));
    }

    #[test]
    fn test_replay_repeating_never_closes() {
        let engine = ReplayEngine::new(sample(1)).repeating();
        let mut source = engine.open(&CaptureRequest::new(REPLAY_INTERFACE)).unwrap();
        assert!(!source.is_finite());
        for _ in 0..5 {
            assert!(matches!(source.next_event().unwrap(), SourceEvent::Packet(_)));
        }
    }

    #[test]
    fn test_replay_has_nothing_buffered() {
        let engine = ReplayEngine::new(sample(3)).repeating();
        let mut source = engine.open(&CaptureRequest::new(REPLAY_INTERFACE)).unwrap();
        assert!(matches!(source.next_event().unwrap(), SourceEvent::Packet(_)));
        assert_eq!(source.next_buffered().unwrap(), SourceEvent::Idle);
    }

    #[test]
    fn test_replay_connected_interfaces() {
        let engine = ReplayEngine::new(Vec::new()).with_interface("demo1");
        let names: Vec<String> = engine
            .list_connected_interfaces()
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["demo1"]);
    }

    #[test]
    fn test_pcap_open_unknown_device_fails() {
        let engine = PcapEngine::new();
        let result = engine.open(&CaptureRequest::new("nonexistent_interface_xyz"));
        assert!(result.is_err());
    }
}
