//! Connection and socket state machines
//!
//! [`ConnectionState`] belongs to the framing engine and only moves forward.
//! [`SocketState`] mirrors the live state of the underlying WebSocket.
//! Both round-trip through `u8` so they can live in an atomic.

use std::fmt;

/// Lifecycle of one framing-engine connection.
///
/// Transitions are monotonic: `Connecting -> Open -> Closing -> Disposed`,
/// where any state may jump straight to `Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Handshake finished, `on_open` not yet delivered
    Connecting = 0,
    /// Messages may be sent and received
    Open = 1,
    /// A close frame was seen or requested
    Closing = 2,
    /// Resources released; terminal
    Disposed = 3,
}

impl ConnectionState {
    /// Decode a state previously stored with `as u8`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Disposed,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        match (self, next) {
            (ConnectionState::Disposed, _) => false,
            (_, ConnectionState::Disposed) => true,
            (ConnectionState::Connecting, ConnectionState::Open) => true,
            (ConnectionState::Open, ConnectionState::Closing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}

/// Live state of a WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketState {
    /// Not connected yet
    None = 0,
    /// TCP connect or upgrade handshake in progress
    Connecting = 1,
    /// Handshake complete
    Open = 2,
    /// We sent a close frame and wait for the peer's
    CloseSent = 3,
    /// The peer sent a close frame and we have not answered
    CloseReceived = 4,
    /// Close handshake finished
    Closed = 5,
    /// Torn down without a close handshake
    Aborted = 6,
}

impl SocketState {
    /// Decode a state previously stored with `as u8`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SocketState::None,
            1 => SocketState::Connecting,
            2 => SocketState::Open,
            3 => SocketState::CloseSent,
            4 => SocketState::CloseReceived,
            5 => SocketState::Closed,
            _ => SocketState::Aborted,
        }
    }

    /// Whether data frames may still be written.
    pub fn can_send(self) -> bool {
        matches!(self, SocketState::Open | SocketState::CloseReceived)
    }

    /// Whether frames may still be read.
    pub fn can_receive(self) -> bool {
        matches!(self, SocketState::Open | SocketState::CloseSent)
    }

    /// Whether the socket reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, SocketState::Closed | SocketState::Aborted)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_is_monotonic() {
        use ConnectionState::*;
        assert!(Connecting.can_transition_to(Open));
        assert!(Open.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Disposed));
        assert!(Connecting.can_transition_to(Disposed));
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Closing.can_transition_to(Open));
        assert!(!Disposed.can_transition_to(Disposed));
    }

    #[test]
    fn states_round_trip_through_u8() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Disposed,
        ] {
            assert_eq!(ConnectionState::from_u8(state as u8), state);
        }
        assert_eq!(SocketState::from_u8(SocketState::CloseSent as u8), SocketState::CloseSent);
        assert_eq!(SocketState::from_u8(200), SocketState::Aborted);
    }

    #[test]
    fn socket_state_capabilities() {
        assert!(SocketState::Open.can_send());
        assert!(SocketState::CloseReceived.can_send());
        assert!(!SocketState::CloseSent.can_send());
        assert!(SocketState::CloseSent.can_receive());
        assert!(SocketState::Aborted.is_terminal());
        assert_eq!(SocketState::Open.to_string(), "Open");
    }
}
