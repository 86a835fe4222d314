//! TCP transport implementation for roslink

use roslink_core::{Error, IoReader, IoWriter, Result};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream as TokioTcpStream;

/// Read half of a connected TCP stream
pub type TcpReader = IoReader<OwnedReadHalf>;

/// Write half of a connected TCP stream
pub type TcpWriter = IoWriter<OwnedWriteHalf>;

/// Connected TCP stream
#[derive(Debug)]
pub struct TcpStream {
    stream: TokioTcpStream,
    remote_addr: SocketAddr,
}

impl TcpStream {
    /// Create a new TCP stream from a tokio TCP stream
    pub fn from_tokio(stream: TokioTcpStream) -> Result<Self> {
        let remote_addr = stream.peer_addr().map_err(Error::Io)?;
        stream.set_nodelay(true).map_err(Error::Io)?;
        Ok(Self {
            stream,
            remote_addr,
        })
    }

    /// Resolve `host` and connect to the first address that accepts
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TokioTcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Connection(format!("failed to connect to {}:{}: {}", host, port, e)))?;

        Self::from_tokio(stream)
    }

    /// Get the remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Get the local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Error::Io)
    }

    /// Split into independently owned read and write halves
    pub fn into_split(self) -> (TcpReader, TcpWriter) {
        let (read, write) = self.stream.into_split();
        (IoReader::new(read), IoWriter::new(write))
    }
}
