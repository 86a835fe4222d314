//! Transport layer abstraction
//!
//! The WebSocket layer talks to the network through a split pair: one
//! [`TransportReader`] owned by the receive path and one [`TransportWriter`]
//! shared by every writer. Any tokio byte stream can be adapted with
//! [`IoReader`] and [`IoWriter`].

use crate::error::Result;

/// Read half of a transport stream
#[async_trait::async_trait]
pub trait TransportReader: Send + Sync {
    /// Read into `buf`, returning `0` at end of stream
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Write half of a transport stream
#[async_trait::async_trait]
pub trait TransportWriter: Send + Sync {
    /// Write all of `buf`
    async fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush buffered bytes
    async fn flush(&mut self) -> Result<()>;

    /// Shut down the write direction
    async fn shutdown(&mut self) -> Result<()>;
}

#[cfg(feature = "tokio-runtime")]
pub use self::io::{IoReader, IoWriter};

#[cfg(feature = "tokio-runtime")]
mod io {
    use super::*;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    /// [`TransportReader`] over any tokio reader
    #[derive(Debug)]
    pub struct IoReader<R> {
        inner: R,
    }

    impl<R> IoReader<R> {
        /// Wrap a reader
        pub fn new(inner: R) -> Self {
            Self { inner }
        }

        /// Unwrap the reader
        pub fn into_inner(self) -> R {
            self.inner
        }
    }

    #[async_trait::async_trait]
    impl<R> TransportReader for IoReader<R>
    where
        R: AsyncRead + Unpin + Send + Sync,
    {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            Ok(self.inner.read(buf).await?)
        }
    }

    /// [`TransportWriter`] over any tokio writer
    #[derive(Debug)]
    pub struct IoWriter<W> {
        inner: W,
    }

    impl<W> IoWriter<W> {
        /// Wrap a writer
        pub fn new(inner: W) -> Self {
            Self { inner }
        }

        /// Unwrap the writer
        pub fn into_inner(self) -> W {
            self.inner
        }
    }

    #[async_trait::async_trait]
    impl<W> TransportWriter for IoWriter<W>
    where
        W: AsyncWrite + Unpin + Send + Sync,
    {
        async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
            Ok(self.inner.write_all(buf).await?)
        }

        async fn flush(&mut self) -> Result<()> {
            Ok(self.inner.flush().await?)
        }

        async fn shutdown(&mut self) -> Result<()> {
            Ok(self.inner.shutdown().await?)
        }
    }
}
