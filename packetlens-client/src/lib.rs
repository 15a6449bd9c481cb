//! Client side of packetlens
//!
//! - [`ServiceClient`]: request/response client for a remote capture service
//! - [`StreamPoller`]: periodic status and snapshot fetches while a capture runs
//! - [`CaptureView`]: snapshot, filter and selection state for a front end

pub mod client;
pub mod poller;
pub mod view;

pub use client::{PacketPage, ServiceClient, DEFAULT_SERVER_ADDR};
pub use poller::{PollEvent, PollHandle, PollSummary, PollerConfig, SessionApi, StreamPoller};
pub use view::CaptureView;
