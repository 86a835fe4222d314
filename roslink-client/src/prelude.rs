//! Prelude module for roslink client
//!
//! Re-exports the types needed to connect, send and handle messages.

pub use crate::config::ClientConfig;
pub use crate::event_loop::EventLoopManager;
pub use crate::factory::{ConnectHandle, ConnectionFactory};
pub use crate::handler::{from_fn, MessageHandler};
pub use crate::protocol::Protocol;
pub use crate::socket::{ClientWebSocket, TcpConnector};

// Re-export core types for convenience
pub use roslink_core::prelude::*;

// Re-export commonly used external dependencies
pub use std::time::Duration;
