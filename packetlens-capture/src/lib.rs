//! Packet capture library for packetlens
//!
//! This crate owns the server side of a capture: the engine that produces
//! packets, the store they land in and the session that ties them together.
//!
//! ## Features
//!
//! - **Capture engines**: live capture through pcap, or a replay engine that
//!   needs no privileges
//! - **Dissection**: Ethernet, ARP, IPv4/IPv6, TCP/UDP/ICMP, STP, VRRP, PIM,
//!   plus HTTP/DNS/TLS hints
//! - **Session lifecycle**: one capture at a time, with count caps, timeouts
//!   and bounded stop
//! - **Packet store**: append-only, safe to read while capture is running
//! - **Capture files**: JSON import/export with atomic writes
//!
//! ## Example
//!
//! ```no_run
//! use packetlens_capture::{CaptureSessionManager, PcapEngine};
//! use packetlens_core::CaptureRequest;
//! use std::sync::Arc;
//!
//! # async fn run() -> packetlens_core::Result<()> {
//! let manager = CaptureSessionManager::new(Arc::new(PcapEngine::new()));
//! manager.start(CaptureRequest::new("eth0").with_count_cap(100)).await?;
//!
//! // Later, stop the capture and read what was captured
//! manager.stop().await;
//! for packet in manager.store().snapshot() {
//!     println!("{}", packet.summary_line());
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod dissect;
pub mod engine;
pub mod filters;
pub mod interface;
pub mod session;
pub mod stats;
pub mod store;

// Re-export main types
pub use engine::{
    CaptureConfig, CaptureEngine, PacketSource, PcapEngine, ReplayEngine, SourceEvent,
    REPLAY_INTERFACE,
};
pub use interface::{list_connected_interfaces, list_interfaces};
pub use session::{CaptureSessionManager, SessionConfig};
pub use stats::StatsAccumulator;
pub use store::{PacketStore, StoreWriter};
