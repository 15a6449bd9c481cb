//! Common types used throughout packetlens

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00; 6])
    }

    /// Read a MAC address from the first six bytes of a slice
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Capture session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No capture has run yet
    #[default]
    Idle,
    /// A capture is running
    Capturing,
    /// The last capture has ended
    Stopped,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Capturing => write!(f, "Capturing"),
            CaptureState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Why a capture session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Stopped on request
    Manual,
    /// The session timeout elapsed
    Timeout,
    /// The packet count cap was reached
    CountReached,
    /// The capture engine failed
    Error,
    /// A finite source ran out of packets
    EndOfInput,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Manual => "manual",
            StopReason::Timeout => "timeout",
            StopReason::CountReached => "count-reached",
            StopReason::Error => "error",
            StopReason::EndOfInput => "end-of-input",
        };
        f.write_str(s)
    }
}

/// Parameters of a capture start request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureRequest {
    /// Interface to capture on
    pub interface: String,
    /// BPF capture filter expression
    pub filter: Option<String>,
    /// Stop after this many packets
    pub count_cap: Option<u64>,
    /// Stop after this much time
    pub timeout: Option<Duration>,
    /// Empty the packet store before capturing
    pub clear: bool,
}

impl CaptureRequest {
    /// Create a request for an interface with no cap, no timeout and a fresh store
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            filter: None,
            count_cap: None,
            timeout: None,
            clear: true,
        }
    }

    /// Set the capture filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the packet count cap (0 means no cap)
    pub fn with_count_cap(mut self, count: u64) -> Self {
        self.count_cap = (count > 0).then_some(count);
        self
    }

    /// Set the timeout (zero means no timeout)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Keep existing packets and continue their numbering
    pub fn keep_existing(mut self) -> Self {
        self.clear = false;
        self
    }
}

/// Counters for one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Packets appended by this session
    pub packets_captured: u64,
    /// Bytes appended by this session
    pub bytes_captured: u64,
    /// Time since the session started (or its total duration once stopped)
    pub elapsed_ms: u64,
}

impl SessionStats {
    /// Average packets per second over the session
    pub fn packets_per_second(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.packets_captured as f64 * 1000.0 / self.elapsed_ms as f64
    }
}

/// Snapshot of the session state as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub capturing: bool,
    /// Current packet store size
    pub packet_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Engine failure text when the session stopped with an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub stats: SessionStats,
}

impl CaptureStatus {
    /// Status of a manager that has never captured
    pub fn idle(packet_count: u64) -> Self {
        Self {
            state: CaptureState::Idle,
            capturing: false,
            packet_count,
            session_id: None,
            interface: None,
            filter: None,
            stop_reason: None,
            error: None,
            stats: SessionStats::default(),
        }
    }
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOutcome {
    /// Whether a capture was running when stop was requested
    pub was_capturing: bool,
    /// Store size after the stop completed
    pub packet_count: u64,
}
