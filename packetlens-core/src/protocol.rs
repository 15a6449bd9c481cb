//! Wire messages for the capture service
//!
//! Requests and responses are JSON objects, one per line. Requests are tagged
//! by `op`, responses by `kind`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{CaptureStatus, Error, ErrorCode, InterfaceInfo, PacketRecord, Result};

/// Default number of packets returned by a paged read
pub const DEFAULT_PAGE_LIMIT: usize = 100;

fn default_page_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

fn default_true() -> bool {
    true
}

/// Request sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ListInterfaces,
    ListConnectedInterfaces,
    StartCapture {
        interface: String,
        /// 0 = no cap
        #[serde(default)]
        packet_count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
        /// Seconds, 0 = no timeout
        #[serde(default)]
        timeout: u64,
        #[serde(default = "default_true")]
        clear: bool,
    },
    StopCapture,
    CaptureStatus,
    GetPackets {
        #[serde(default)]
        offset: i64,
        #[serde(default = "default_page_limit")]
        limit: usize,
    },
    GetAllPackets,
    ClearPackets,
    ExportPackets {
        path: PathBuf,
        /// Packets to write; the current store when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        packets: Option<Vec<PacketRecord>>,
    },
    ImportPackets {
        path: PathBuf,
    },
}

impl Request {
    /// Operation name as it appears on the wire
    pub fn op(&self) -> &'static str {
        match self {
            Request::ListInterfaces => "list_interfaces",
            Request::ListConnectedInterfaces => "list_connected_interfaces",
            Request::StartCapture { .. } => "start_capture",
            Request::StopCapture => "stop_capture",
            Request::CaptureStatus => "capture_status",
            Request::GetPackets { .. } => "get_packets",
            Request::GetAllPackets => "get_all_packets",
            Request::ClearPackets => "clear_packets",
            Request::ExportPackets { .. } => "export_packets",
            Request::ImportPackets { .. } => "import_packets",
        }
    }
}

/// Response sent by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Interfaces {
        interfaces: Vec<InterfaceInfo>,
    },
    Started {
        status: CaptureStatus,
    },
    Stopped {
        was_capturing: bool,
        packet_count: u64,
    },
    Status {
        status: CaptureStatus,
    },
    Packets {
        packets: Vec<PacketRecord>,
        total: u64,
        offset: i64,
        limit: usize,
    },
    Cleared,
    Exported {
        path: PathBuf,
        packet_count: u64,
    },
    Imported {
        packets: Vec<PacketRecord>,
        packet_count: u64,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl Response {
    /// Build an error response from a local error
    pub fn error(err: &Error) -> Self {
        Response::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Turn an error response back into an `Err`
    pub fn into_result(self) -> Result<Self> {
        match self {
            Response::Error { code, message } => Err(Error::from_remote(code, message)),
            other => Ok(other),
        }
    }

    /// Response kind as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Interfaces { .. } => "interfaces",
            Response::Started { .. } => "started",
            Response::Stopped { .. } => "stopped",
            Response::Status { .. } => "status",
            Response::Packets { .. } => "packets",
            Response::Cleared => "cleared",
            Response::Exported { .. } => "exported",
            Response::Imported { .. } => "imported",
            Response::Error { .. } => "error",
        }
    }
}

/// Encode a message as one JSON line (trailing newline included)
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String> {
    let mut line = serde_json::to_string(msg)
        .map_err(|e| Error::transport(format!("failed to encode message: {}", e)))?;
    line.push('\n');
    Ok(line)
}

/// Decode one JSON line
pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T> {
    serde_json::from_str(line.trim_end())
        .map_err(|e| Error::transport(format!("failed to decode message: {}", e)))
}
