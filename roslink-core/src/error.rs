//! Error types for roslink
//!
//! One crate-wide [`Error`] with focused sub-enums. The variants map onto the
//! failure classes the transport distinguishes: a send on a connection that is
//! not open, transport failures, cooperative cancellation, and failures raised
//! by user message handlers.

#![allow(missing_docs)]

use crate::state::{ConnectionState, SocketState};
use std::fmt;
use thiserror::Error;

/// Result type alias for roslink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Comprehensive error type for roslink operations
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),

    /// Failure raised by a message handler
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Send attempted while the connection is not open
    #[error("Connection is not open. Connection state: {state}")]
    NotOpen { state: ConnectionState },

    /// Socket operation attempted in a state that does not allow it
    #[error("Socket is not usable in state {state}")]
    InvalidSocketState { state: SocketState },

    /// Operation unblocked by cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection closed
    #[error("Connection closed: {code} - {reason}")]
    Closed {
        /// Close code
        code: CloseCode,
        /// Close reason
        reason: String,
    },
}

impl Error {
    /// Whether this error only reports cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this error came from the transport (socket, framing, handshake).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Protocol(_)
                | Error::Frame(_)
                | Error::Closed { .. }
                | Error::InvalidSocketState { .. }
        )
    }
}

/// WebSocket protocol specific errors
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// The URI could not be parsed or lacks a host
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Only plain `ws://` is supported
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    /// Missing required headers
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Invalid header value
    #[error("Invalid header value for {header}: {value}")]
    InvalidHeaderValue { header: String, value: String },

    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Invalid format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Upgrade head exceeded the size limit
    #[error("Handshake head too large: {size} bytes (max: {max})")]
    HeadTooLarge { size: usize, max: usize },

    /// Unexpected HTTP status
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// Invalid accept key
    #[error("Invalid WebSocket accept key - expected: {expected}, received: {received}")]
    InvalidAcceptKey { expected: String, received: String },

    /// A new data frame started while a fragmented message was in progress
    #[error("Expected continuation frame in fragmented message")]
    ExpectedContinuation,

    /// A continuation frame arrived without a message in progress
    #[error("Unexpected continuation frame")]
    UnexpectedContinuation,
}

/// Frame parsing and processing errors
#[derive(Error, Debug, Clone)]
pub enum FrameError {
    /// Insufficient data to parse frame
    #[error("Insufficient data: need {needed} bytes, have {have}")]
    InsufficientData { needed: usize, have: usize },

    /// Frame too large
    #[error("Frame too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// Invalid opcode
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// Reserved bits set
    #[error("Reserved bits set in frame")]
    ReservedBitsSet,

    /// Control frames cannot be fragmented
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload above 125 bytes
    #[error("Control frame payload too large: {0} bytes")]
    ControlFrameTooLarge(usize),
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Timeout errors
#[derive(Error, Debug, Clone)]
pub enum TimeoutError {
    /// Handshake timeout
    #[error("Handshake timeout: {timeout:?}")]
    Handshake { timeout: std::time::Duration },

    /// Close acknowledgment timeout
    #[error("Close timeout: {timeout:?}")]
    Close { timeout: std::time::Duration },
}

/// Failure raised by externally supplied message-handling code
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler returned an error
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// The handler panicked
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Wrap any error or message as a handler failure.
    pub fn new(source: impl Into<BoxError>) -> Self {
        HandlerError::Failed(source.into())
    }
}

/// WebSocket close codes as defined in RFC 6455
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unsupported data
    Unsupported,
    /// No status received
    NoStatus,
    /// Abnormal closure
    Abnormal,
    /// Invalid frame payload data
    InvalidPayload,
    /// Policy violation
    PolicyViolation,
    /// Message too big
    TooBig,
    /// Mandatory extension
    MandatoryExtension,
    /// Internal server error
    Internal,
    /// Application-specific close code
    Application(u16),
}

impl CloseCode {
    /// Create a CloseCode from a u16
    pub fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::Internal,
            code if (3000..=4999).contains(&code) => CloseCode::Application(code),
            _ => CloseCode::ProtocolError,
        }
    }

    /// Get the numeric value of the close code
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::Internal => 1011,
            CloseCode::Application(code) => *code,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCode::Application(code) => write!(f, "Application ({})", code),
            other => write!(f, "{:?} ({})", other, other.code()),
        }
    }
}
