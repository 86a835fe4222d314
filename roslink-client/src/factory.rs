//! Connection factory
//!
//! Opens the socket, binds a [`Protocol`] to it and publishes the protocol
//! through a one-shot readiness latch.

use crate::config::ClientConfig;
use crate::event_loop::EventLoopManager;
use crate::handler::MessageHandler;
use crate::protocol::Protocol;
use crate::ready::ReadyLatch;
use crate::socket::TcpConnector;
use roslink_core::{Connector, Error, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

struct FactoryInner<C: Connector> {
    connector: C,
    config: ClientConfig,
    handler: Arc<dyn MessageHandler>,
    manager: EventLoopManager,
    latch: ReadyLatch<Protocol<C::Socket>>,
}

/// Creates the [`Protocol`] of one connection.
pub struct ConnectionFactory<C: Connector = TcpConnector> {
    inner: Arc<FactoryInner<C>>,
}

impl<C: Connector> Clone for ConnectionFactory<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector + fmt::Debug> fmt::Debug for ConnectionFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("uri", &self.inner.config.uri)
            .field("connector", &self.inner.connector)
            .field("ready", &self.inner.latch.is_set())
            .finish_non_exhaustive()
    }
}

impl ConnectionFactory<TcpConnector> {
    /// Factory connecting over TCP with `config`
    pub fn new(config: ClientConfig, handler: impl MessageHandler) -> Result<Self> {
        let connector = TcpConnector::new(config.clone());
        Self::with_connector(connector, config, handler)
    }
}

impl<C: Connector> ConnectionFactory<C> {
    /// Factory provisioning sockets through `connector`
    pub fn with_connector(connector: C, config: ClientConfig, handler: impl MessageHandler) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(FactoryInner {
                connector,
                config,
                handler: Arc::new(handler),
                manager: EventLoopManager::new(),
                latch: ReadyLatch::new(),
            }),
        })
    }

    /// Start connecting in the background.
    ///
    /// On success the protocol is opened, published through
    /// [`on_ready`](Self::on_ready) and starts listening. The attempt is
    /// abandoned when the manager is terminated.
    pub fn connect(&self) -> ConnectHandle<C::Socket> {
        let inner = self.inner.clone();
        let handle = self.inner.manager.call_in_task(async move { inner.establish().await });
        ConnectHandle { handle }
    }

    /// Publish `protocol` as the active connection. Only the first call has
    /// any effect.
    pub fn ready(&self, protocol: Arc<Protocol<C::Socket>>) {
        self.inner.ready(protocol);
    }

    /// Run `callback` with the active protocol, now if ready or once it is.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(Arc<Protocol<C::Socket>>) + Send + 'static,
    {
        self.inner.latch.subscribe(callback);
    }

    /// Wait for the active protocol.
    pub async fn ready_protocol(&self) -> Result<Arc<Protocol<C::Socket>>> {
        let (tx, rx) = oneshot::channel();
        self.on_ready(move |protocol| {
            let _ = tx.send(protocol);
        });

        let cancel = self.inner.manager.cancellation_token();
        tokio::select! {
            biased;
            protocol = rx => protocol.map_err(|_| Error::Cancelled),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// The active protocol, if any
    pub fn protocol(&self) -> Option<Arc<Protocol<C::Socket>>> {
        self.inner.latch.get()
    }

    /// Whether a protocol is active and its socket is open
    pub fn is_connected(&self) -> bool {
        self.inner
            .latch
            .get()
            .map(|protocol| protocol.is_connected())
            .unwrap_or(false)
    }

    /// The event loop manager of this connection
    pub fn manager(&self) -> &EventLoopManager {
        &self.inner.manager
    }

    /// The configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl<C: Connector> FactoryInner<C> {
    fn ready(&self, protocol: Arc<Protocol<C::Socket>>) {
        if !self.latch.set(protocol) {
            warn!("connection already marked ready, ignoring");
        }
    }

    async fn establish(self: Arc<Self>) -> Result<Arc<Protocol<C::Socket>>> {
        debug!(uri = %self.config.uri, "started to connect");
        let cancel = self.manager.cancellation_token();

        let socket = match self.connector.connect(&self.config.uri, cancel).await {
            Ok(socket) => socket,
            Err(e) => {
                if e.is_cancelled() {
                    debug!("connect cancelled");
                } else {
                    error!(uri = %self.config.uri, error = %e, "failed to connect");
                }
                self.manager.trigger_disconnect();
                return Err(e);
            }
        };

        let protocol = Arc::new(Protocol::new(
            socket,
            self.manager.clone(),
            self.handler.clone(),
            &self.config,
        ));
        protocol.open();
        self.ready(protocol.clone());
        self.manager.call_in_task(protocol.clone().start_listening());
        Ok(protocol)
    }
}

/// In-flight connection attempt returned by [`ConnectionFactory::connect`].
///
/// Await it for the outcome or [`abort`](Self::abort) it.
#[derive(Debug)]
pub struct ConnectHandle<S: roslink_core::WebSocket> {
    handle: JoinHandle<Result<Arc<Protocol<S>>>>,
}

impl<S: roslink_core::WebSocket> ConnectHandle<S> {
    /// Abandon the attempt
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Whether the attempt has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<S: roslink_core::WebSocket> Future for ConnectHandle<S> {
    type Output = Result<Arc<Protocol<S>>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => Err(Error::Connection(format!("connect task failed: {e}"))),
        })
    }
}
