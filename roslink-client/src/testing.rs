//! Scripted sockets and handlers for unit tests

use crate::handler::{from_fn, MessageHandler};
use roslink_core::{
    CloseCode, Connector, Error, HandlerError, MessageType, ReceiveResult, Result, SocketState,
    WebSocket,
};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(crate) enum Incoming {
    Chunk(Vec<u8>, MessageType, bool),
    Close(CloseCode),
    Fail,
}

/// Feeds a [`MockSocket`] from the test body.
#[derive(Debug, Clone)]
pub(crate) struct MockPeer {
    tx: mpsc::UnboundedSender<Incoming>,
}

impl MockPeer {
    pub(crate) fn chunk(&self, data: &[u8], end_of_message: bool) {
        let _ = self
            .tx
            .send(Incoming::Chunk(data.to_vec(), MessageType::Text, end_of_message));
    }

    pub(crate) fn binary(&self, data: &[u8], end_of_message: bool) {
        let _ = self
            .tx
            .send(Incoming::Chunk(data.to_vec(), MessageType::Binary, end_of_message));
    }

    pub(crate) fn close(&self, code: CloseCode) {
        let _ = self.tx.send(Incoming::Close(code));
    }

    pub(crate) fn fail(&self) {
        let _ = self.tx.send(Incoming::Fail);
    }
}

/// In-memory [`WebSocket`] recording everything written to it.
#[derive(Debug)]
pub(crate) struct MockSocket {
    state: AtomicU8,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    sent: Mutex<Vec<(Vec<u8>, bool)>>,
    closes: Mutex<Vec<CloseCode>>,
    aborts: AtomicUsize,
    send_delay: Duration,
}

impl MockSocket {
    pub(crate) fn pair() -> (Self, MockPeer) {
        Self::with_send_delay(Duration::ZERO)
    }

    pub(crate) fn with_send_delay(send_delay: Duration) -> (Self, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = Self {
            state: AtomicU8::new(SocketState::Open as u8),
            incoming: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            aborts: AtomicUsize::new(0),
            send_delay,
        };
        (socket, MockPeer { tx })
    }

    pub(crate) fn sent(&self) -> Vec<(Vec<u8>, bool)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_sizes(&self) -> Vec<usize> {
        self.sent().iter().map(|(chunk, _)| chunk.len()).collect()
    }

    pub(crate) fn closes(&self) -> Vec<CloseCode> {
        self.closes.lock().unwrap().clone()
    }

    pub(crate) fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SocketState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl WebSocket for MockSocket {
    fn state(&self) -> SocketState {
        SocketState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn send(&self, chunk: &[u8], end_of_message: bool, cancel: &CancellationToken) -> Result<()> {
        let state = self.state();
        if !state.can_send() {
            return Err(Error::InvalidSocketState { state });
        }
        if !self.send_delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.send_delay) => {}
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((chunk.to_vec(), end_of_message));
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult> {
        let mut incoming = self.incoming.lock().await;
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            next = incoming.recv() => next,
        };

        match next {
            Some(Incoming::Chunk(data, message_type, end_of_message)) => {
                buf[..data.len()].copy_from_slice(&data);
                Ok(ReceiveResult::data(data.len(), message_type, end_of_message))
            }
            Some(Incoming::Close(code)) => {
                if self.state() == SocketState::CloseSent {
                    self.set_state(SocketState::Closed);
                } else {
                    self.set_state(SocketState::CloseReceived);
                }
                Ok(ReceiveResult::close(Some(code), ""))
            }
            Some(Incoming::Fail) | None => Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionReset,
            ))),
        }
    }

    async fn close(&self, code: CloseCode, _reason: &str, _cancel: &CancellationToken) -> Result<()> {
        self.closes.lock().unwrap().push(code);
        match self.state() {
            SocketState::CloseReceived => self.set_state(SocketState::Closed),
            SocketState::Open => self.set_state(SocketState::CloseSent),
            _ => {}
        }
        Ok(())
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        if !self.state().is_terminal() {
            self.set_state(SocketState::Aborted);
        }
    }
}

/// Hands out one prepared socket, or fails.
#[derive(Debug)]
pub(crate) enum MockConnector {
    Ready(Mutex<Option<MockSocket>>),
    Refuse,
    Hang,
}

impl MockConnector {
    pub(crate) fn ready(socket: MockSocket) -> Self {
        MockConnector::Ready(Mutex::new(Some(socket)))
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    type Socket = MockSocket;

    async fn connect(&self, _uri: &str, cancel: &CancellationToken) -> Result<MockSocket> {
        match self {
            MockConnector::Ready(socket) => socket
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| Error::Connection("socket already handed out".to_string())),
            MockConnector::Refuse => Err(Error::Connection("connection refused".to_string())),
            MockConnector::Hang => {
                cancel.cancelled().await;
                Err(Error::Cancelled)
            }
        }
    }
}

/// Handler forwarding every message into a channel.
pub(crate) fn channel_handler() -> (Arc<dyn MessageHandler>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = from_fn(move |text| {
        tx.send(text)
            .map_err(|_| HandlerError::new("test receiver dropped"))
    });
    (Arc::new(handler), rx)
}
