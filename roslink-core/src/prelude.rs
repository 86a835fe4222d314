//! Prelude module for roslink core
//!
//! Re-exports the types most code built on this crate needs.

pub use crate::error::{CloseCode, Error, HandlerError, Result};
pub use crate::frame::{Frame, FrameParser};
pub use crate::protocol::Opcode;
pub use crate::socket::{Connector, MessageType, ReceiveResult, WebSocket};
pub use crate::state::{ConnectionState, SocketState};
pub use crate::transport::{TransportReader, TransportWriter};

// Re-export commonly used external dependencies
pub use bytes::{Bytes, BytesMut};
pub use tokio_util::sync::CancellationToken;

// Feature-gated re-exports
#[cfg(feature = "tokio-runtime")]
pub use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
