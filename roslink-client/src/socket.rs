//! WebSocket client socket
//!
//! [`ClientWebSocket`] speaks RFC 6455 over a split transport. Reads and
//! writes go through separate locks so one receive can run alongside sends,
//! keep-alive pings and pong replies. Inbound frames are handed out in pieces
//! no larger than the caller's buffer.

use crate::config::ClientConfig;
use bytes::{Buf, Bytes, BytesMut};
use roslink_core::error::{ProtocolError, TimeoutError};
use roslink_core::handshake::{
    create_client_handshake, parse_server_handshake, request_to_string,
    validate_server_handshake, Endpoint,
};
use roslink_core::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, MAX_CLOSE_REASON_SIZE};
use roslink_core::protocol::utils::is_valid_close_code;
use roslink_core::{
    CloseCode, Connector, Error, Frame, FrameParser, MessageType, Opcode, ReceiveResult, Result,
    SocketState, TransportReader, TransportWriter, WebSocket,
};
use roslink_transport_tcp::TcpStream;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const READ_BUFFER_SIZE: usize = 4096;

type SharedWriter = Arc<Mutex<Box<dyn TransportWriter>>>;

/// Per-socket settings
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Interval between keep-alive pings; zero disables them
    pub keep_alive_interval: Duration,
    /// Maximum accepted inbound frame size
    pub max_frame_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::ZERO,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl From<&ClientConfig> for SocketOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            keep_alive_interval: config.keep_alive_interval,
            max_frame_size: config.max_frame_size,
        }
    }
}

/// Data frame currently being handed out
struct PendingFrame {
    payload: Bytes,
    fin: bool,
    message_type: MessageType,
}

struct ReadState {
    reader: Box<dyn TransportReader>,
    parser: FrameParser,
    current: Option<PendingFrame>,
    /// Type of the fragmented message in progress
    message_type: Option<MessageType>,
}

/// A client-side WebSocket connection.
pub struct ClientWebSocket {
    read: Mutex<ReadState>,
    writer: SharedWriter,
    state: Arc<AtomicU8>,
    /// Set between the first and the final fragment of an outbound message
    sending_message: AtomicBool,
    shutdown: CancellationToken,
}

impl fmt::Debug for ClientWebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientWebSocket")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ClientWebSocket {
    /// Connect to `uri` over TCP and perform the opening handshake.
    ///
    /// The handshake is bounded by `config.handshake_timeout` and abandoned
    /// when `cancel` fires.
    pub async fn connect(uri: &str, config: &ClientConfig, cancel: &CancellationToken) -> Result<Self> {
        let endpoint = Endpoint::parse(uri)?;
        debug!(host = %endpoint.host, port = endpoint.port, "opening websocket");

        let handshake = async {
            let stream = TcpStream::connect(&endpoint.host, endpoint.port).await?;
            let (mut reader, mut writer) = stream.into_split();

            let request = create_client_handshake(&endpoint, &config.handshake_config());
            let key = request
                .key()
                .ok_or_else(|| ProtocolError::MissingHeader("sec-websocket-key".to_string()))?
                .to_string();
            writer.write_all(request_to_string(&request).as_bytes()).await?;
            writer.flush().await?;

            let mut head = BytesMut::with_capacity(READ_BUFFER_SIZE);
            let mut chunk = [0u8; READ_BUFFER_SIZE];
            loop {
                let n = reader.read(&mut chunk).await?;
                if n == 0 {
                    return Err(Error::Connection(
                        "connection closed during handshake".to_string(),
                    ));
                }
                head.extend_from_slice(&chunk[..n]);

                if let Some((response, used)) = parse_server_handshake(&head)? {
                    validate_server_handshake(&response, &key)?;
                    let leftover = head.split_off(used);
                    return Ok::<_, Error>((reader, writer, leftover));
                }
            }
        };

        let timeout = config.handshake_timeout;
        let (reader, writer, leftover) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, handshake) => {
                result.map_err(|_| TimeoutError::Handshake { timeout })??
            }
        };

        debug!(uri, "websocket handshake complete");
        Ok(Self::from_parts(reader, writer, &leftover, SocketOptions::from(config)))
    }

    /// Wrap an already upgraded stream.
    ///
    /// `leftover` holds bytes read past the handshake response. Must be
    /// called within a tokio runtime when keep-alive is enabled.
    pub fn from_parts<R, W>(reader: R, writer: W, leftover: &[u8], options: SocketOptions) -> Self
    where
        R: TransportReader + 'static,
        W: TransportWriter + 'static,
    {
        let mut parser = FrameParser::new(options.max_frame_size);
        parser.feed(leftover);

        let socket = Self {
            read: Mutex::new(ReadState {
                reader: Box::new(reader),
                parser,
                current: None,
                message_type: None,
            }),
            writer: Arc::new(Mutex::new(Box::new(writer))),
            state: Arc::new(AtomicU8::new(SocketState::Open as u8)),
            sending_message: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        };

        if !options.keep_alive_interval.is_zero() {
            socket.spawn_keep_alive(options.keep_alive_interval);
        }
        socket
    }

    fn spawn_keep_alive(&self, interval: Duration) {
        let writer = self.writer.clone();
        let state = self.state.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if SocketState::from_u8(state.load(Ordering::SeqCst)) != SocketState::Open {
                    break;
                }
                if let Err(e) = write_frame(&writer, Frame::ping(Bytes::new())).await {
                    debug!(error = %e, "keep-alive ping failed");
                    break;
                }
                trace!("keep-alive ping sent");
            }
        });
    }

    fn set_state(&self, from: SocketState, to: SocketState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn write_guarded(&self, frame: Frame, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.shutdown.cancelled() => Err(Error::InvalidSocketState { state: self.state() }),
            result = write_frame(&self.writer, frame) => result,
        }
    }

    /// Take the next frame out of `read`, reading from the transport as
    /// needed. Control frames are answered or surfaced here.
    async fn next_data_frame(&self, read: &mut ReadState, cancel: &CancellationToken) -> Result<Option<ReceiveResult>> {
        loop {
            if let Some(frame) = read.parser.next_frame()? {
                match frame.opcode {
                    Opcode::Text | Opcode::Binary => {
                        if read.message_type.is_some() {
                            return Err(ProtocolError::ExpectedContinuation.into());
                        }
                        let message_type = if frame.opcode == Opcode::Text {
                            MessageType::Text
                        } else {
                            MessageType::Binary
                        };
                        if !frame.fin {
                            read.message_type = Some(message_type);
                        }
                        read.current = Some(PendingFrame {
                            payload: frame.payload,
                            fin: frame.fin,
                            message_type,
                        });
                        return Ok(None);
                    }
                    Opcode::Continuation => {
                        let message_type = read
                            .message_type
                            .ok_or(ProtocolError::UnexpectedContinuation)?;
                        if frame.fin {
                            read.message_type = None;
                        }
                        read.current = Some(PendingFrame {
                            payload: frame.payload,
                            fin: frame.fin,
                            message_type,
                        });
                        return Ok(None);
                    }
                    Opcode::Ping => {
                        trace!("ping received, sending pong");
                        self.write_guarded(Frame::pong(frame.payload), cancel).await?;
                    }
                    Opcode::Pong => trace!("pong received"),
                    Opcode::Close => {
                        let (status, description) = frame.close_payload();
                        if !self.set_state(SocketState::CloseSent, SocketState::Closed) {
                            self.set_state(SocketState::Open, SocketState::CloseReceived);
                        }
                        debug!(?status, %description, "close frame received");
                        return Ok(Some(ReceiveResult::close(status, description)));
                    }
                }
                continue;
            }

            let mut chunk = [0u8; READ_BUFFER_SIZE];
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = self.shutdown.cancelled() => {
                    return Err(Error::InvalidSocketState { state: self.state() })
                }
                n = read.reader.read(&mut chunk) => n?,
            };
            if n == 0 {
                self.state.store(SocketState::Aborted as u8, Ordering::SeqCst);
                return Err(Error::Closed {
                    code: CloseCode::Abnormal,
                    reason: "connection closed without a close frame".to_string(),
                });
            }
            read.parser.feed(&chunk[..n]);
        }
    }
}

impl Drop for ClientWebSocket {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn write_frame(writer: &Mutex<Box<dyn TransportWriter>>, frame: Frame) -> Result<()> {
    let bytes = frame.mask(true).to_bytes();
    let mut writer = writer.lock().await;
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[async_trait::async_trait]
impl WebSocket for ClientWebSocket {
    fn state(&self) -> SocketState {
        SocketState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn send(&self, chunk: &[u8], end_of_message: bool, cancel: &CancellationToken) -> Result<()> {
        let state = self.state();
        if !state.can_send() {
            return Err(Error::InvalidSocketState { state });
        }

        let opcode = if self.sending_message.swap(!end_of_message, Ordering::SeqCst) {
            Opcode::Continuation
        } else {
            Opcode::Text
        };
        let frame = Frame::new(opcode, Bytes::copy_from_slice(chunk)).fin(end_of_message);
        self.write_guarded(frame, cancel).await
    }

    async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult> {
        let state = self.state();
        if !state.can_receive() {
            return Err(Error::InvalidSocketState { state });
        }

        let mut read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.read.lock() => guard,
        };

        loop {
            if let Some(pending) = read.current.as_mut() {
                let count = buf.len().min(pending.payload.len());
                buf[..count].copy_from_slice(&pending.payload[..count]);
                pending.payload.advance(count);

                let drained = pending.payload.is_empty();
                let result = ReceiveResult::data(count, pending.message_type, drained && pending.fin);
                if drained {
                    read.current = None;
                }
                return Ok(result);
            }

            if let Some(close) = self.next_data_frame(&mut read, cancel).await? {
                return Ok(close);
            }
        }
    }

    async fn close(&self, code: CloseCode, reason: &str, cancel: &CancellationToken) -> Result<()> {
        if !is_valid_close_code(code.code()) {
            return Err(ProtocolError::InvalidFormat(format!("close code {} may not be sent", code.code())).into());
        }
        if reason.len() > MAX_CLOSE_REASON_SIZE {
            return Err(ProtocolError::InvalidFormat(format!(
                "close reason is {} bytes (max: {})",
                reason.len(),
                MAX_CLOSE_REASON_SIZE
            ))
            .into());
        }

        let state = self.state();
        let next = match state {
            SocketState::Open => SocketState::CloseSent,
            SocketState::CloseReceived => SocketState::Closed,
            SocketState::CloseSent | SocketState::Closed => return Ok(()),
            other => return Err(Error::InvalidSocketState { state: other }),
        };

        self.write_guarded(Frame::close(Some(code.code()), Some(reason)), cancel)
            .await?;
        self.set_state(state, next);
        debug!(%code, state = %self.state(), "close frame sent");
        Ok(())
    }

    fn abort(&self) {
        let state = self.state();
        if !state.is_terminal() && !self.set_state(state, SocketState::Aborted) {
            warn!(state = %self.state(), "socket state changed during abort");
        }
        self.shutdown.cancel();
    }
}

/// Produces [`ClientWebSocket`]s over TCP
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: ClientConfig,
}

impl TcpConnector {
    /// Connector using `config` for keep-alive, timeouts and headers
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    type Socket = ClientWebSocket;

    async fn connect(&self, uri: &str, cancel: &CancellationToken) -> Result<ClientWebSocket> {
        ClientWebSocket::connect(uri, &self.config, cancel).await
    }
}
