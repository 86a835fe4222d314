//! WebSocket seam used by the framing engine
//!
//! [`WebSocket`] is the minimal surface the chunking protocol needs from a
//! connected socket: bounded receives, fragment sends, close and abort.
//! [`Connector`] produces connected sockets from a URI.

use crate::error::{CloseCode, Result};
use crate::state::SocketState;
use tokio_util::sync::CancellationToken;

/// Kind of message a received chunk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// UTF-8 text
    Text,
    /// Binary data
    Binary,
    /// The peer started the close handshake
    Close,
}

/// Outcome of one bounded receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveResult {
    /// Bytes written into the caller's buffer
    pub count: usize,
    /// Whether this chunk ends the current message
    pub end_of_message: bool,
    /// Type of the message being received
    pub message_type: MessageType,
    /// Status carried by a close frame
    pub close_status: Option<CloseCode>,
    /// Reason carried by a close frame
    pub close_description: Option<String>,
}

impl ReceiveResult {
    /// A data chunk
    pub fn data(count: usize, message_type: MessageType, end_of_message: bool) -> Self {
        Self {
            count,
            end_of_message,
            message_type,
            close_status: None,
            close_description: None,
        }
    }

    /// The peer's close frame
    pub fn close(status: Option<CloseCode>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            count: 0,
            end_of_message: true,
            message_type: MessageType::Close,
            close_status: status,
            close_description: (!description.is_empty()).then_some(description),
        }
    }

    /// Whether the peer asked to close
    pub fn is_close(&self) -> bool {
        self.message_type == MessageType::Close
    }
}

/// A connected WebSocket as seen by the chunking protocol.
///
/// `receive` is called by a single reader at a time while `send` may be
/// called from any task; callers serialize multi-fragment sends themselves.
#[async_trait::async_trait]
pub trait WebSocket: Send + Sync + 'static {
    /// Current socket state
    fn state(&self) -> SocketState;

    /// Send one fragment of a text message.
    ///
    /// The first fragment after a completed message opens a new one; the
    /// message ends with the fragment sent with `end_of_message` set.
    async fn send(&self, chunk: &[u8], end_of_message: bool, cancel: &CancellationToken)
        -> Result<()>;

    /// Receive up to `buf.len()` bytes of the current message.
    async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult>;

    /// Send a close frame, completing the close handshake if the peer
    /// started it.
    async fn close(&self, code: CloseCode, reason: &str, cancel: &CancellationToken)
        -> Result<()>;

    /// Tear the socket down immediately. Idempotent.
    fn abort(&self);
}

/// Produces connected sockets
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Socket type produced
    type Socket: WebSocket;

    /// Connect to `uri` and complete the opening handshake
    async fn connect(&self, uri: &str, cancel: &CancellationToken) -> Result<Self::Socket>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_result_constructors() {
        let chunk = ReceiveResult::data(1024, MessageType::Text, false);
        assert!(!chunk.is_close());
        assert!(!chunk.end_of_message);

        let close = ReceiveResult::close(Some(CloseCode::Normal), "");
        assert!(close.is_close());
        assert!(close.end_of_message);
        assert_eq!(close.close_description, None);

        let close = ReceiveResult::close(None, "bye");
        assert_eq!(close.close_description.as_deref(), Some("bye"));
    }
}
