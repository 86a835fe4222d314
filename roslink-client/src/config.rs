//! Client configuration for roslink

use roslink_core::error::ConfigError;
use roslink_core::handshake::HandshakeConfig;
use roslink_core::protocol::constants::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_MAX_FRAME_SIZE,
    RECEIVE_CHUNK_SIZE, SEND_CHUNK_SIZE,
};
use roslink_core::Error;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target `ws://` URI of the rosbridge server
    pub uri: String,
    /// Interval between keep-alive pings; zero disables them
    pub keep_alive_interval: Duration,
    /// Handshake timeout
    pub handshake_timeout: Duration,
    /// Size of each outbound fragment
    pub send_chunk_size: usize,
    /// Size of each inbound read
    pub receive_chunk_size: usize,
    /// Maximum accepted inbound frame size in bytes
    pub max_frame_size: usize,
    /// User agent string
    pub user_agent: String,
    /// Origin header
    pub origin: Option<String>,
    /// Custom headers
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: "ws://localhost:9090".to_string(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            send_chunk_size: SEND_CHUNK_SIZE,
            receive_chunk_size: RECEIVE_CHUNK_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            user_agent: format!("roslink-client/{}", env!("CARGO_PKG_VERSION")),
            origin: None,
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Configuration targeting `uri` with default settings
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> roslink_core::Result<()> {
        if self.uri.is_empty() {
            return Err(Error::Config(ConfigError::Validation(
                "uri must not be empty".to_string(),
            )));
        }

        if self.send_chunk_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "send_chunk_size must be greater than 0".to_string(),
            )));
        }

        if self.receive_chunk_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "receive_chunk_size must be greater than 0".to_string(),
            )));
        }

        if self.max_frame_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "max_frame_size must be greater than 0".to_string(),
            )));
        }

        if self.handshake_timeout.is_zero() {
            return Err(Error::Config(ConfigError::Validation(
                "handshake_timeout must be greater than 0".to_string(),
            )));
        }

        Ok(())
    }

    /// Headers and identity sent with the upgrade request
    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            origin: self.origin.clone(),
            user_agent: Some(self.user_agent.clone()),
            protocols: Vec::new(),
            extra_headers: self.headers.clone(),
        }
    }

    /// Set the target URI
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Set keep-alive interval
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set outbound fragment size
    pub fn send_chunk_size(mut self, size: usize) -> Self {
        self.send_chunk_size = size;
        self
    }

    /// Set inbound read size
    pub fn receive_chunk_size(mut self, size: usize) -> Self {
        self.receive_chunk_size = size;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: String) -> Self {
        self.user_agent = agent;
        self
    }

    /// Set origin
    pub fn origin(mut self, origin: String) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Add a custom header
    pub fn add_header(mut self, name: String, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}
