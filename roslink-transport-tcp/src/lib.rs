//! TCP transport for roslink
//!
//! Plain TCP byte streams for `ws://` connections, split into the reader and
//! writer halves the WebSocket layer works with.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod tcp;

// Re-export TCP transport types
pub use tcp::{TcpReader, TcpStream, TcpWriter};

/// Prelude module
pub mod prelude {
    pub use crate::tcp::{TcpReader, TcpStream, TcpWriter};
    pub use roslink_core::transport::{TransportReader, TransportWriter};
}
