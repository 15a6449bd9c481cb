//! Request/response service for packetlens capture sessions
//!
//! [`CaptureService`] maps each wire [`Request`](packetlens_core::Request) onto
//! a shared [`CaptureSessionManager`](packetlens_capture::CaptureSessionManager).
//! [`CaptureServer`] exposes that service over TCP as newline-delimited JSON.
//!
//! # Security Warning
//!
//! The server has no authentication and can start captures and write files
//! on the host it runs on. Bind it to loopback unless the network is trusted.

pub mod server;
pub mod service;

pub use server::{CaptureServer, ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_PORT};
pub use service::CaptureService;
