//! # roslink core
//!
//! Protocol foundation for the roslink rosbridge client:
//!
//! - Error handling and types
//! - Connection and socket state machines
//! - WebSocket frame parsing and generation
//! - The opening handshake
//! - Transport and socket abstractions the client is written against

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Core modules
pub mod error;
pub mod frame;
pub mod handshake;
pub mod protocol;
pub mod socket;
pub mod state;
pub mod transport;

// Prelude module with common imports
pub mod prelude;

// Re-export key types for convenience
pub use error::{CloseCode, Error, HandlerError, Result};
pub use frame::{Frame, FrameParser};
pub use handshake::{Endpoint, HandshakeConfig, HandshakeRequest, HandshakeResponse};
pub use protocol::Opcode;
pub use socket::{Connector, MessageType, ReceiveResult, WebSocket};
pub use state::{ConnectionState, SocketState};
pub use transport::{TransportReader, TransportWriter};

#[cfg(feature = "tokio-runtime")]
pub use transport::{IoReader, IoWriter};
