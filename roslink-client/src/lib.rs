//! roslink client
//!
//! Chunked WebSocket transport for rosbridge clients.
//!
//! A [`ConnectionFactory`] opens the socket and hands out a [`Protocol`]
//! once the handshake succeeds. The protocol splits outbound text into
//! 1024-byte fragments, reassembles inbound fragments into whole messages for
//! a [`MessageHandler`], and keeps the two directions from interleaving. The
//! [`EventLoopManager`] of the connection schedules background work and
//! reports disconnection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roslink_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let handler = from_fn(|text| {
//!         println!("received: {}", text);
//!         Ok(())
//!     });
//!
//!     let factory = ConnectionFactory::new(ClientConfig::new("ws://localhost:9090"), handler)?;
//!     let protocol = factory.connect().await?;
//!     protocol
//!         .send(r#"{"op":"subscribe","topic":"/chatter"}"#)
//!         .await?;
//!
//!     factory.manager().run_forever().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Public modules
pub mod config;
pub mod event_loop;
pub mod factory;
pub mod handler;
pub mod logging;
pub mod protocol;
pub mod ready;
pub mod socket;

#[cfg(test)]
mod testing;

// Prelude module
pub mod prelude;

// Re-export key types for convenience
pub use config::ClientConfig;
pub use event_loop::EventLoopManager;
pub use factory::{ConnectHandle, ConnectionFactory};
pub use handler::{from_fn, FnHandler, MessageHandler};
pub use logging::init_logging;
pub use protocol::Protocol;
pub use ready::ReadyLatch;
pub use socket::{ClientWebSocket, SocketOptions, TcpConnector};
