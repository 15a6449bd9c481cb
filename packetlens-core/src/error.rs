//! Error types for packetlens

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for packetlens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for packetlens
#[derive(Error, Debug)]
pub enum Error {
    /// A capture session is already running
    #[error("A capture is already in progress")]
    AlreadyCapturing,

    /// Operation not allowed while a capture is running
    #[error("Operation not allowed while a capture is active")]
    CaptureActive,

    /// Interface is not among the enumerable interfaces
    #[error("Interface '{0}' is not available for capture")]
    InvalidInterface(String),

    /// Capture filter expression rejected by the engine
    #[error("Invalid capture filter: {0}")]
    InvalidFilter(String),

    /// Import document could not be understood
    #[error("Malformed capture file: {0}")]
    MalformedFile(String),

    /// Page offset outside the addressable range
    #[error("Offset {0} is out of range")]
    OutOfRange(i64),

    /// File or socket I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Capture engine failure
    #[error("Capture engine error: {0}")]
    Engine(String),

    /// Request/response transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by a remote service that has no local variant
    #[error("{message}")]
    Remote { code: ErrorCode, message: String },
}

/// Stable, wire-level error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AlreadyCapturing,
    CaptureActive,
    InvalidInterface,
    InvalidFilter,
    MalformedFile,
    OutOfRange,
    IoError,
    EngineError,
    BadRequest,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::AlreadyCapturing => "already_capturing",
            ErrorCode::CaptureActive => "capture_active",
            ErrorCode::InvalidInterface => "invalid_interface",
            ErrorCode::InvalidFilter => "invalid_filter",
            ErrorCode::MalformedFile => "malformed_file",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::IoError => "io_error",
            ErrorCode::EngineError => "engine_error",
            ErrorCode::BadRequest => "bad_request",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create an engine error with a custom message
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        Error::Engine(msg.into())
    }

    /// Create a malformed-file error with a custom message
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedFile(msg.into())
    }

    /// Create a transport error with a custom message
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::Transport(msg.into())
    }

    /// Wire code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::AlreadyCapturing => ErrorCode::AlreadyCapturing,
            Error::CaptureActive => ErrorCode::CaptureActive,
            Error::InvalidInterface(_) => ErrorCode::InvalidInterface,
            Error::InvalidFilter(_) => ErrorCode::InvalidFilter,
            Error::MalformedFile(_) => ErrorCode::MalformedFile,
            Error::OutOfRange(_) => ErrorCode::OutOfRange,
            Error::Io(_) => ErrorCode::IoError,
            Error::Engine(_) => ErrorCode::EngineError,
            Error::Transport(_) => ErrorCode::IoError,
            Error::Remote { code, .. } => *code,
        }
    }

    /// Rebuild an error from a remote `(code, message)` pair.
    ///
    /// Session conflicts come back as their own variants so callers can match
    /// on them; everything else keeps the server's message verbatim.
    pub fn from_remote(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::AlreadyCapturing => Error::AlreadyCapturing,
            ErrorCode::CaptureActive => Error::CaptureActive,
            _ => Error::Remote { code, message },
        }
    }

    /// Whether the user can fix this by changing session state (stop, retry)
    pub fn is_session_conflict(&self) -> bool {
        matches!(self.code(), ErrorCode::AlreadyCapturing | ErrorCode::CaptureActive)
    }
}
