//! Chunked framing engine
//!
//! A [`Protocol`] owns one connected socket. It splits outbound text into
//! fixed-size fragments, reassembles inbound fragments into whole messages
//! for the [`MessageHandler`], and keeps the two directions from interleaving
//! through a single-permit write lock: a sender holds it for the whole
//! message, and the receive path holds it from the first non-final fragment
//! of an inbound message until its last one.

use crate::config::ClientConfig;
use crate::event_loop::EventLoopManager;
use crate::handler::MessageHandler;
use crate::socket::ClientWebSocket;
use bytes::BytesMut;
use roslink_core::error::TimeoutError;
use roslink_core::protocol::constants::DEFAULT_CLOSE_TIMEOUT;
use roslink_core::{
    CloseCode, ConnectionState, Error, HandlerError, MessageType, ReceiveResult, Result,
    SocketState, WebSocket,
};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Framing engine bound to one socket.
pub struct Protocol<S: WebSocket = ClientWebSocket> {
    socket: S,
    state: AtomicU8,
    write_lock: Arc<Semaphore>,
    manager: EventLoopManager,
    handler: Arc<dyn MessageHandler>,
    send_chunk_size: usize,
    receive_chunk_size: usize,
}

impl<S: WebSocket + fmt::Debug> fmt::Debug for Protocol<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("socket", &self.socket)
            .field("state", &self.state())
            .field("send_chunk_size", &self.send_chunk_size)
            .field("receive_chunk_size", &self.receive_chunk_size)
            .finish_non_exhaustive()
    }
}

impl<S: WebSocket> Protocol<S> {
    /// Bind a connected socket. The protocol starts in `Connecting` until
    /// [`open`](Self::open) runs.
    pub fn new(
        socket: S,
        manager: EventLoopManager,
        handler: Arc<dyn MessageHandler>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            socket,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            write_lock: Arc::new(Semaphore::new(1)),
            manager,
            handler,
            send_chunk_size: config.send_chunk_size.max(1),
            receive_chunk_size: config.receive_chunk_size.max(1),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The underlying socket
    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// The manager of this connection
    pub fn manager(&self) -> &EventLoopManager {
        &self.manager
    }

    /// Whether the underlying socket is open
    pub fn is_connected(&self) -> bool {
        self.socket.state() == SocketState::Open
    }

    fn advance(&self, next: ConnectionState) -> bool {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                ConnectionState::from_u8(current)
                    .can_transition_to(next)
                    .then_some(next as u8)
            })
            .is_ok()
    }

    /// Mark the connection open and deliver `on_open` to the handler.
    pub fn open(&self) {
        if !self.advance(ConnectionState::Open) {
            warn!(state = %self.state(), "open called on a connection that is not connecting");
            return;
        }
        info!("connection to rosbridge ready");

        let handler = &self.handler;
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_open())) {
            error!(
                error = %Error::from(HandlerError::Panicked(panic_message(&panic))),
                "on_open handler failed"
            );
        }
    }

    /// Send one text message as a sequence of fragments.
    ///
    /// Fails with [`Error::NotOpen`] without touching the write lock when the
    /// connection is not open. Concurrent sends are served one whole message
    /// at a time, in the order they reached the lock.
    pub async fn send(&self, payload: &str) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(Error::NotOpen { state });
        }

        let _permit = self.acquire_write_lock().await?;
        let cancel = self.manager.cancellation_token();
        let operation = SendOperation::new(payload.as_bytes(), self.send_chunk_size);
        let chunks = operation.chunk_count();

        for (index, (chunk, is_last)) in operation.enumerate() {
            trace!(
                chunk = index + 1,
                of = chunks,
                bytes = chunk.len(),
                is_last,
                "sending chunk"
            );
            if let Err(e) = self.socket.send(chunk, is_last, cancel).await {
                if e.is_cancelled() {
                    debug!("send cancelled");
                } else {
                    error!(error = %e, "send failed");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Listen until the connection is disposed or the peer closes.
    ///
    /// Every reassembled text message is handed to the handler in arrival
    /// order. After a local [`close`](Self::close) the loop keeps reading
    /// until the peer's close frame. The protocol is disposed when the loop
    /// ends, whatever the reason.
    pub async fn start_listening(self: Arc<Self>) {
        let _guard = DisposeGuard(self.clone());
        debug!(socket_state = %self.socket.state(), "about to start listening");

        while matches!(self.state(), ConnectionState::Open | ConnectionState::Closing) {
            trace!("waiting for messages");
            match self.pump_message().await {
                Ok(Some(assembly)) => self.dispatch(assembly),
                Ok(None) => break,
                Err(e) if e.is_cancelled() => {
                    debug!("listening cancelled");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "receive failed, processing will be aborted");
                    break;
                }
            }
        }
        debug!(state = %self.state(), "listening stopped");
    }

    /// Read chunks until one message is complete.
    ///
    /// Returns `None` when the peer started the close handshake.
    async fn pump_message(&self) -> Result<Option<MessageAssembly>> {
        let cancel = self.manager.cancellation_token();
        let mut assembly = MessageAssembly::new();
        let mut permit: Option<OwnedSemaphorePermit> = None;
        let mut buf = vec![0u8; self.receive_chunk_size];

        loop {
            let result = self.socket.receive(&mut buf, cancel).await?;

            if result.is_close() {
                drop(permit.take());
                self.shutdown_on_close(&result).await;
                return Ok(None);
            }

            assembly.push(&buf[..result.count], result.message_type);
            trace!(
                bytes = result.count,
                end_of_message = result.end_of_message,
                "chunk received"
            );

            if result.end_of_message {
                return Ok(Some(assembly));
            }
            if permit.is_none() {
                permit = Some(self.acquire_write_lock().await?);
            }
        }
    }

    async fn acquire_write_lock(&self) -> Result<OwnedSemaphorePermit> {
        let cancel = self.manager.cancellation_token();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            permit = self.write_lock.clone().acquire_owned() => permit.map_err(|_| Error::Cancelled),
        }
    }

    fn dispatch(&self, assembly: MessageAssembly) {
        if assembly.message_type() != Some(MessageType::Text) {
            debug!(
                message_type = ?assembly.message_type(),
                bytes = assembly.len(),
                "non-text message skipped"
            );
            return;
        }
        let text = assembly.complete();
        trace!(bytes = text.len(), "message reception completed");

        let handler = &self.handler;
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.on_message(text))) {
            Ok(result) => result,
            Err(panic) => Err(HandlerError::Panicked(panic_message(&panic))),
        };
        if let Err(e) = outcome {
            error!(
                error = %Error::from(e),
                "message handler failed, message skipped"
            );
        }
    }

    async fn shutdown_on_close(&self, close: &ReceiveResult) {
        info!(
            code = ?close.close_status,
            description = close.close_description.as_deref().unwrap_or(""),
            "websocket connection closed by peer"
        );
        self.advance(ConnectionState::Closing);
        if let Err(e) = self.send_close().await {
            warn!(error = %e, "failed to acknowledge close");
        }
        self.dispose();
    }

    async fn send_close(&self) -> Result<()> {
        if !self.socket.state().can_send() {
            return Ok(());
        }
        // Independent of the connection token so a terminated connection
        // still gets its close frame out.
        let cancel = CancellationToken::new();
        match tokio::time::timeout(
            DEFAULT_CLOSE_TIMEOUT,
            self.socket.close(CloseCode::Normal, "", &cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TimeoutError::Close {
                timeout: DEFAULT_CLOSE_TIMEOUT,
            }
            .into()),
        }
    }

    /// Close the connection with a normal-closure frame, then dispose.
    ///
    /// Once the frame is out, waits up to `DEFAULT_CLOSE_TIMEOUT` for the
    /// listening loop to see the peer's answering close frame.
    pub async fn close(&self) -> Result<()> {
        if self.state() == ConnectionState::Disposed {
            return Ok(());
        }
        self.advance(ConnectionState::Closing);
        let result = self.send_close().await;

        if result.is_ok() && self.socket.state() == SocketState::CloseSent {
            match tokio::time::timeout(DEFAULT_CLOSE_TIMEOUT, self.manager.run_forever()).await {
                Ok(_) => debug!("close handshake completed"),
                Err(_) => warn!(
                    timeout = ?DEFAULT_CLOSE_TIMEOUT,
                    "peer did not answer the close frame"
                ),
            }
        }
        self.dispose();
        result
    }

    /// Release everything held by this connection. Idempotent.
    ///
    /// Signals disconnection to the manager, fires the cancellation token,
    /// fails pending write-lock waiters and aborts the socket.
    pub fn dispose(&self) {
        let previous =
            ConnectionState::from_u8(self.state.swap(ConnectionState::Disposed as u8, Ordering::SeqCst));
        if previous == ConnectionState::Disposed {
            return;
        }

        self.manager.trigger_disconnect();
        self.manager.terminate();
        self.write_lock.close();
        self.socket.abort();
        debug!(from = %previous, "websocket disposed");
    }

    #[cfg(test)]
    pub(crate) fn write_lock_available(&self) -> usize {
        self.write_lock.available_permits()
    }
}

/// Disposes the protocol when the listening task ends, including by panic.
struct DisposeGuard<S: WebSocket>(Arc<Protocol<S>>);

impl<S: WebSocket> Drop for DisposeGuard<S> {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

/// One outbound message cut into fixed-size chunks.
///
/// Yields `(chunk, is_last)`. An empty payload yields a single empty final
/// chunk.
#[derive(Debug)]
pub(crate) struct SendOperation<'a> {
    payload: &'a [u8],
    chunk_size: usize,
    chunks: usize,
    index: usize,
}

impl<'a> SendOperation<'a> {
    pub(crate) fn new(payload: &'a [u8], chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            payload,
            chunk_size,
            chunks: payload.len().div_ceil(chunk_size).max(1),
            index: 0,
        }
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks
    }
}

impl<'a> Iterator for SendOperation<'a> {
    type Item = (&'a [u8], bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.chunks {
            return None;
        }
        let start = self.index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.payload.len());
        self.index += 1;
        Some((&self.payload[start..end], self.index == self.chunks))
    }
}

/// Bytes of one inbound message, decoded once complete.
///
/// Chunks are kept as raw bytes so a character split across two chunks
/// decodes intact.
#[derive(Debug, Default)]
pub(crate) struct MessageAssembly {
    buffer: BytesMut,
    message_type: Option<MessageType>,
}

impl MessageAssembly {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, chunk: &[u8], message_type: MessageType) {
        self.message_type.get_or_insert(message_type);
        self.buffer.extend_from_slice(chunk);
    }

    pub(crate) fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Decode as UTF-8; invalid sequences become U+FFFD.
    pub(crate) fn complete(self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::testing::{channel_handler, MockPeer, MockSocket};
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn open_protocol(socket: MockSocket, handler: Arc<dyn MessageHandler>) -> Arc<Protocol<MockSocket>> {
        let protocol = Arc::new(Protocol::new(
            socket,
            EventLoopManager::new(),
            handler,
            &ClientConfig::default(),
        ));
        protocol.open();
        protocol
    }

    fn listening() -> (
        Arc<Protocol<MockSocket>>,
        MockPeer,
        mpsc::UnboundedReceiver<String>,
        tokio::task::JoinHandle<()>,
    ) {
        let (socket, peer) = MockSocket::pair();
        let (handler, rx) = channel_handler();
        let protocol = open_protocol(socket, handler);
        let task = tokio::spawn(protocol.clone().start_listening());
        (protocol, peer, rx, task)
    }

    async fn wait_for_lock_held(protocol: &Protocol<MockSocket>) {
        for _ in 0..1000 {
            if protocol.write_lock_available() == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("write lock was never taken");
    }

    #[tokio::test]
    async fn send_splits_into_fixed_chunks() {
        let (socket, _peer) = MockSocket::pair();
        let (handler, _rx) = channel_handler();
        let protocol = open_protocol(socket, handler);

        let payload = "x".repeat(2500);
        protocol.send(&payload).await.unwrap();

        assert_eq!(protocol.socket().sent_sizes(), vec![1024, 1024, 452]);
        let flags: Vec<bool> = protocol.socket().sent().iter().map(|(_, last)| *last).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert_eq!(protocol.write_lock_available(), 1);
    }

    #[tokio::test]
    async fn empty_payload_sends_one_final_chunk() {
        let (socket, _peer) = MockSocket::pair();
        let (handler, _rx) = channel_handler();
        let protocol = open_protocol(socket, handler);

        protocol.send("").await.unwrap();
        assert_eq!(protocol.socket().sent(), vec![(Vec::new(), true)]);
    }

    #[tokio::test]
    async fn send_when_not_open_fails_without_locking() {
        let (socket, _peer) = MockSocket::pair();
        let (handler, _rx) = channel_handler();
        let protocol = Protocol::new(socket, EventLoopManager::new(), handler, &ClientConfig::default());

        assert!(matches!(
            protocol.send("hi").await,
            Err(Error::NotOpen { state: ConnectionState::Connecting })
        ));
        assert_eq!(protocol.write_lock_available(), 1);

        protocol.open();
        protocol.dispose();
        let err = protocol.send("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Connection is not open. Connection state: Disposed");
        assert!(protocol.socket().sent().is_empty());
    }

    #[tokio::test]
    async fn chunks_are_reassembled_into_one_message() {
        let (protocol, peer, mut rx, _task) = listening();

        peer.chunk(b"{\"op\":", false);
        peer.chunk(b"\"publish\",", false);
        peer.chunk(b"\"msg\":{}}", true);

        assert_eq!(rx.recv().await.unwrap(), "{\"op\":\"publish\",\"msg\":{}}");
        assert_eq!(protocol.write_lock_available(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn character_split_across_chunks_decodes_intact() {
        let (_protocol, peer, mut rx, _task) = listening();

        let text = "café";
        let bytes = text.as_bytes();
        let split = bytes.len() - 1;
        peer.chunk(&bytes[..split], false);
        peer.chunk(&bytes[split..], true);

        assert_eq!(rx.recv().await.unwrap(), text);
    }

    #[tokio::test]
    async fn invalid_utf8_is_delivered_with_replacement_characters() {
        let (_protocol, peer, mut rx, _task) = listening();

        peer.chunk(&[b'a', 0xff, b'b'], true);
        peer.chunk(b"next", true);

        assert_eq!(rx.recv().await.unwrap(), "a\u{FFFD}b");
        assert_eq!(rx.recv().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn binary_messages_are_not_dispatched() {
        let (protocol, peer, mut rx, _task) = listening();

        peer.binary(&[0x00, 0x01], false);
        wait_for_lock_held(&protocol).await;
        peer.binary(&[0x02], true);
        peer.chunk(b"text", true);

        assert_eq!(rx.recv().await.unwrap(), "text");
        assert_eq!(protocol.write_lock_available(), 1);
        assert_eq!(protocol.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn messages_are_dispatched_in_order() {
        let (_protocol, peer, mut rx, _task) = listening();

        for i in 0..5 {
            peer.chunk(format!("message {i}").as_bytes(), true);
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), format!("message {i}"));
        }
    }

    #[tokio::test]
    async fn handler_failures_do_not_stop_listening() {
        let (socket, peer) = MockSocket::pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = from_fn(move |text: String| {
            match text.as_str() {
                "fail" => return Err(HandlerError::new("rejected")),
                "panic" => panic!("handler exploded"),
                _ => {}
            }
            tx.send(text).map_err(HandlerError::new)
        });
        let protocol = open_protocol(socket, Arc::new(handler));
        let _task = tokio::spawn(protocol.clone().start_listening());

        peer.chunk(b"fail", true);
        peer.chunk(b"panic", true);
        peer.chunk(&[0xff, 0xfe], true);
        peer.chunk(b"after", true);

        assert_eq!(rx.recv().await.unwrap(), "\u{FFFD}\u{FFFD}");
        assert_eq!(rx.recv().await.unwrap(), "after");
        assert_eq!(protocol.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn receive_holds_lock_until_final_chunk() {
        let (protocol, peer, mut rx, _task) = listening();

        peer.chunk(b"abc", false);
        wait_for_lock_held(&protocol).await;

        let mut sender = tokio_test::task::spawn(protocol.send("reply"));
        tokio_test::assert_pending!(sender.poll());
        assert!(protocol.socket().sent().is_empty());

        peer.chunk(b"def", true);
        assert_eq!(rx.recv().await.unwrap(), "abcdef");
        assert!(sender.is_woken());
        tokio_test::assert_ready_ok!(sender.poll());
        assert_eq!(protocol.socket().sent(), vec![(b"reply".to_vec(), true)]);
    }

    #[tokio::test]
    async fn close_frame_mid_message_releases_lock_and_disposes() {
        let (protocol, peer, mut rx, task) = listening();

        peer.chunk(b"partial", false);
        wait_for_lock_held(&protocol).await;
        peer.close(CloseCode::Away);

        task.await.unwrap();
        assert_eq!(protocol.write_lock_available(), 1);
        assert_eq!(protocol.state(), ConnectionState::Disposed);
        assert_eq!(protocol.socket().closes(), vec![CloseCode::Normal]);
        assert_eq!(protocol.socket().state(), SocketState::Closed);
        assert_eq!(protocol.socket().aborts(), 1);
        assert!(protocol.manager().is_disconnected());
        assert!(protocol.manager().is_terminated());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn io_error_ends_listening_and_disposes() {
        let (protocol, peer, _rx, task) = listening();

        peer.fail();
        task.await.unwrap();

        assert_eq!(protocol.state(), ConnectionState::Disposed);
        assert!(protocol.socket().closes().is_empty());
        assert!(protocol.manager().run_forever().await.is_ok());
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let (protocol, _peer, _rx, task) = listening();

        protocol.dispose();
        protocol.dispose();
        task.await.unwrap();
        protocol.dispose();

        assert_eq!(protocol.socket().aborts(), 1);
        assert_eq!(protocol.state(), ConnectionState::Disposed);
    }

    #[tokio::test]
    async fn close_waits_for_peer_close_frame() {
        let (protocol, peer, _rx, task) = listening();

        let closing = {
            let protocol = protocol.clone();
            tokio::spawn(async move { protocol.close().await })
        };
        for _ in 0..1000 {
            if protocol.socket().state() == SocketState::CloseSent {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(protocol.socket().state(), SocketState::CloseSent);
        assert_eq!(protocol.state(), ConnectionState::Closing);
        assert!(!closing.is_finished());

        peer.close(CloseCode::Normal);
        tokio::time::timeout(Duration::from_secs(1), closing)
            .await
            .expect("close did not finish after the peer answered")
            .unwrap()
            .unwrap();
        task.await.unwrap();
        protocol.close().await.unwrap();

        assert_eq!(protocol.state(), ConnectionState::Disposed);
        assert_eq!(protocol.socket().state(), SocketState::Closed);
        assert_eq!(protocol.socket().closes(), vec![CloseCode::Normal]);
        assert_eq!(protocol.socket().aborts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_gives_up_waiting_after_timeout() {
        let (protocol, _peer, _rx, task) = listening();

        let started = tokio::time::Instant::now();
        protocol.close().await.unwrap();
        assert!(started.elapsed() >= DEFAULT_CLOSE_TIMEOUT);

        task.await.unwrap();
        assert_eq!(protocol.state(), ConnectionState::Disposed);
        assert_eq!(protocol.socket().state(), SocketState::Aborted);
        assert_eq!(protocol.socket().closes(), vec![CloseCode::Normal]);
    }

    #[tokio::test]
    async fn terminate_unblocks_sender_waiting_for_lock() {
        let (protocol, peer, _rx, task) = listening();

        peer.chunk(b"never finished", false);
        wait_for_lock_held(&protocol).await;

        let sender = {
            let protocol = protocol.clone();
            tokio::spawn(async move { protocol.send("blocked").await })
        };
        tokio::task::yield_now().await;
        protocol.manager().terminate();

        let result = tokio::time::timeout(Duration::from_secs(1), sender)
            .await
            .expect("send stayed blocked after terminate")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("listening stayed blocked after terminate")
            .unwrap();
        assert_eq!(protocol.state(), ConnectionState::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sends_do_not_interleave() {
        let (socket, _peer) = MockSocket::with_send_delay(Duration::from_millis(10));
        let (handler, _rx) = channel_handler();
        let protocol = open_protocol(socket, handler);

        let sends = ["a", "b", "c"].map(|fill| {
            let protocol = protocol.clone();
            let payload = fill.repeat(3000);
            tokio::spawn(async move { protocol.send(&payload).await })
        });
        for send in futures_util::future::join_all(sends).await {
            send.unwrap().unwrap();
        }

        let sent = protocol.socket().sent();
        assert_eq!(sent.len(), 9);
        for message in sent.chunks(3) {
            let fill = message[0].0[0];
            assert!(message.iter().all(|(chunk, _)| chunk.iter().all(|b| *b == fill)));
            let flags: Vec<bool> = message.iter().map(|(_, last)| *last).collect();
            assert_eq!(flags, vec![false, false, true]);
        }
        // spawned in order, served in lock acquisition order
        let order: Vec<u8> = sent.chunks(3).map(|m| m[0].0[0]).collect();
        assert_eq!(order, b"abc".to_vec());
    }

    #[test]
    fn send_operation_chunk_boundaries() {
        let payload = vec![0u8; 2048];
        let sizes: Vec<(usize, bool)> = SendOperation::new(&payload, 1024)
            .map(|(chunk, last)| (chunk.len(), last))
            .collect();
        assert_eq!(sizes, vec![(1024, false), (1024, true)]);
    }

    proptest! {
        #[test]
        fn chunking_round_trips(payload in proptest::collection::vec(any::<u8>(), 0..5000), chunk_size in 1usize..2048) {
            let operation = SendOperation::new(&payload, chunk_size);
            let expected = payload.len().div_ceil(chunk_size).max(1);
            prop_assert_eq!(operation.chunk_count(), expected);

            let mut assembly = MessageAssembly::new();
            let mut finals = 0;
            for (chunk, is_last) in operation {
                prop_assert!(chunk.len() <= chunk_size);
                if is_last {
                    finals += 1;
                } else {
                    prop_assert_eq!(chunk.len(), chunk_size);
                }
                assembly.push(chunk, MessageType::Text);
            }
            prop_assert_eq!(finals, 1);
            prop_assert_eq!(&assembly.buffer[..], &payload[..]);
        }
    }
}
