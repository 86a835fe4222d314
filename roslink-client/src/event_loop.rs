//! Event loop manager
//!
//! One manager exists per connection. It owns the connection's cancellation
//! token and its disconnect signal, and schedules background work on the
//! tokio runtime.

use roslink_core::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
struct Inner {
    cancel: CancellationToken,
    disconnected: watch::Sender<bool>,
}

/// Schedules background work and signals disconnection for one connection.
///
/// Cloning yields another handle to the same manager.
#[derive(Debug, Clone)]
pub struct EventLoopManager {
    inner: Arc<Inner>,
}

impl Default for EventLoopManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoopManager {
    /// Create a manager with a fresh cancellation token
    pub fn new() -> Self {
        let (disconnected, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                cancel: CancellationToken::new(),
                disconnected,
            }),
        }
    }

    /// The token every blocking wait of this connection observes
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Wait until the connection reports disconnection.
    ///
    /// Returns `Err(Error::Cancelled)` if [`terminate`](Self::terminate)
    /// fires first. A disconnect that already happened returns immediately.
    pub async fn run_forever(&self) -> Result<()> {
        let mut disconnected = self.inner.disconnected.subscribe();
        let signaled = async move { disconnected.wait_for(|d| *d).await.is_ok() };

        let result = tokio::select! {
            biased;
            signaled = signaled => if signaled { Ok(()) } else { Err(Error::Cancelled) },
            _ = self.inner.cancel.cancelled() => Err(Error::Cancelled),
        };

        match &result {
            Ok(()) => debug!("received disconnect event on main loop"),
            Err(_) => debug!("main loop cancelled"),
        }
        result
    }

    /// Blocking form of [`run_forever`](Self::run_forever) for callers
    /// outside any async runtime.
    pub fn block_until_disconnected(&self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::Connection(
                "block_until_disconnected cannot be called from within an async runtime; use run_forever"
                    .to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_forever())
    }

    /// Signal that the connection has ended. Latched.
    pub fn trigger_disconnect(&self) {
        if !self.inner.disconnected.send_replace(true) {
            info!("connection ended");
        }
    }

    /// Fire the cancellation token, unblocking every wait of this connection.
    pub fn terminate(&self) {
        if !self.inner.cancel.is_cancelled() {
            debug!("cancelling connection token");
        }
        self.inner.cancel.cancel();
    }

    /// Whether [`terminate`](Self::terminate) fired
    pub fn is_terminated(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Whether disconnection was signaled
    pub fn is_disconnected(&self) -> bool {
        *self.inner.disconnected.borrow()
    }

    /// Run `callback` after `delay` unless the connection is cancelled first.
    pub fn call_later<F>(&self, delay: Duration, callback: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!("delayed callback cancelled"),
                _ = tokio::time::sleep(delay) => callback(),
            }
        })
    }

    /// Run blocking `callback` on the blocking thread pool.
    ///
    /// Yields `None` if the connection was cancelled before it started.
    pub fn call_in_thread<F, R>(&self, callback: F) -> JoinHandle<Option<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let cancel = self.inner.cancel.clone();
        tokio::task::spawn_blocking(move || {
            if cancel.is_cancelled() {
                None
            } else {
                Some(callback())
            }
        })
    }

    /// Spawn `future` as a background task
    pub fn call_in_task<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(future)
    }
}
