//! # roslink
//!
//! Chunked WebSocket transport for rosbridge clients.
//!
//! Messages of any size are sent as 1024-byte WebSocket fragments and
//! reassembled on receipt; sends and multi-fragment receives never interleave
//! on the shared socket; the connection reports readiness once and
//! disconnection through its event loop manager.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roslink::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let factory = ConnectionFactory::new(
//!         ClientConfig::new("ws://localhost:9090"),
//!         from_fn(|text| {
//!             println!("{}", text);
//!             Ok(())
//!         }),
//!     )?;
//!
//!     factory.on_ready(|protocol| {
//!         tokio::spawn(async move {
//!             let _ = protocol
//!                 .send(r#"{"op":"subscribe","topic":"/chatter","type":"std_msgs/String"}"#)
//!                 .await;
//!         });
//!     });
//!
//!     factory.connect().await?;
//!     factory.manager().run_forever().await
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

// Re-export core components
pub use roslink_core::*;

#[cfg(feature = "transport-tcp")]
pub use roslink_transport_tcp as transport_tcp;

#[cfg(feature = "client")]
pub use roslink_client as client;

/// Prelude module with common imports
pub mod prelude {
    pub use roslink_core::prelude::*;

    #[cfg(feature = "client")]
    pub use roslink_client::prelude::*;

    #[cfg(feature = "transport-tcp")]
    pub use roslink_transport_tcp::prelude::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_library_compiles() {
        assert_eq!(env!("CARGO_PKG_NAME"), "roslink");
    }
}
