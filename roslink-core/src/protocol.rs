//! WebSocket protocol constants and utilities
//!
//! Opcodes, frame header bits and the handful of RFC 6455 constants the
//! client needs, plus the chunking defaults shared by both directions.

use std::time::Duration;

/// WebSocket opcodes as defined in RFC 6455 Section 5.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Continuation frame
    Continuation = 0x0,
    /// Text frame
    Text = 0x1,
    /// Binary frame
    Binary = 0x2,
    /// Close frame
    Close = 0x8,
    /// Ping frame
    Ping = 0x9,
    /// Pong frame
    Pong = 0xA,
}

impl Opcode {
    /// Create an Opcode from the low nibble of a frame header byte.
    ///
    /// Reserved opcodes yield `None`.
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Get the numeric value of the opcode
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Check if this is a control opcode
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// Protocol constants
pub mod constants {
    use super::Duration;

    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// WebSocket magic string for accept calculation
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// Size of one inbound read issued by the chunk pump.
    pub const RECEIVE_CHUNK_SIZE: usize = 1024;

    /// Size of one outbound fragment.
    pub const SEND_CHUNK_SIZE: usize = 1024;

    /// Interval between keep-alive pings on an idle socket.
    pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

    /// Default handshake timeout
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Upper bound for sending the close acknowledgment.
    pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum accepted size of a single inbound frame.
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB

    /// Default port for `ws://` URIs
    pub const DEFAULT_WS_PORT: u16 = 80;

    /// Maximum size of the HTTP upgrade response head
    pub const MAX_HEADER_SIZE: usize = 8192; // 8KB

    /// Maximum number of headers parsed from the upgrade response
    pub const MAX_HEADERS: usize = 64;

    /// Maximum payload of a control frame
    pub const MAX_CONTROL_PAYLOAD_SIZE: usize = 125;

    /// Maximum close reason size
    pub const MAX_CLOSE_REASON_SIZE: usize = 123;
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit position
    pub const FIN_BIT: u8 = 0x80;

    /// RSV1 bit position
    pub const RSV1_BIT: u8 = 0x40;

    /// RSV2 bit position
    pub const RSV2_BIT: u8 = 0x20;

    /// RSV3 bit position
    pub const RSV3_BIT: u8 = 0x10;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit position
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for 7-bit length
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}

/// HTTP header names used by the upgrade handshake (lowercase)
pub mod http_header {
    /// Host header
    pub const HOST: &str = "host";

    /// User-Agent header
    pub const USER_AGENT: &str = "user-agent";

    /// Origin header
    pub const ORIGIN: &str = "origin";

    /// Connection header
    pub const CONNECTION: &str = "connection";

    /// Upgrade header
    pub const UPGRADE: &str = "upgrade";

    /// Sec-WebSocket-Key header
    pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";

    /// Sec-WebSocket-Version header
    pub const SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";

    /// Sec-WebSocket-Protocol header
    pub const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";

    /// Sec-WebSocket-Accept header
    pub const SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";
}

/// HTTP status codes used in the handshake
pub mod http_status {
    /// HTTP Switching Protocols status
    pub const SWITCHING_PROTOCOLS: u16 = 101;
}

/// Key and accept computation
pub mod utils {
    use base64::{engine::general_purpose, Engine as _};
    use sha1::{Digest, Sha1};

    /// Generate a random `Sec-WebSocket-Key`
    pub fn generate_key() -> String {
        use rand::RngCore;
        let mut key_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        general_purpose::STANDARD.encode(key_bytes)
    }

    /// Compute the `Sec-WebSocket-Accept` value for a key
    pub fn calculate_accept(key: &str) -> String {
        let combined = format!("{}{}", key, super::constants::WEBSOCKET_MAGIC);
        let hash = Sha1::digest(combined.as_bytes());
        general_purpose::STANDARD.encode(hash)
    }

    /// Validate WebSocket key format
    pub fn validate_key(key: &str) -> bool {
        key.len() == 24 && general_purpose::STANDARD.decode(key).is_ok()
    }

    /// Check if a close code may appear on the wire
    pub fn is_valid_close_code(code: u16) -> bool {
        matches!(code, 1000..=1003 | 1007..=1011 | 3000..=4999)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(Opcode::from(0x1), Some(Opcode::Text));
        assert_eq!(Opcode::from(0x3), None);
        assert_eq!(Opcode::from(0xFF), None);
        assert_eq!(Opcode::Text.value(), 0x1);
        assert!(Opcode::Ping.is_control());
    }

    #[test]
    fn test_websocket_key_generation() {
        let key = utils::generate_key();
        assert!(utils::validate_key(&key));
    }

    #[test]
    fn test_websocket_accept_calculation() {
        let key = "dGhlIHNhbXBsZSBub25jZQ=="; // "the sample nonce"
        assert_eq!(utils::calculate_accept(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_close_code_validation() {
        assert!(utils::is_valid_close_code(1000));
        assert!(utils::is_valid_close_code(3000));
        assert!(!utils::is_valid_close_code(1005));
        assert!(!utils::is_valid_close_code(999));
    }

    #[test]
    fn test_chunk_defaults() {
        assert_eq!(constants::SEND_CHUNK_SIZE, 1024);
        assert_eq!(constants::RECEIVE_CHUNK_SIZE, 1024);
        assert_eq!(constants::DEFAULT_KEEP_ALIVE_INTERVAL, Duration::from_secs(5));
    }
}
