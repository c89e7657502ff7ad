//! Connection lifecycle states.
//!
//! | From | To | Trigger |
//! |------|----|---------|
//! | Disconnected | Connecting | `connect()` |
//! | Connecting | Open | transport opened |
//! | Connecting | Reconnecting | handshake failed |
//! | Connecting | Disconnected | handshake timed out, `disconnect()` |
//! | Open | Reconnecting | abnormal close, missed pongs |
//! | Open | Closing | `disconnect()` |
//! | Open | Disconnected | collector closed normally |
//! | Reconnecting | Open | transport opened |
//! | Reconnecting | Disconnected | attempts exhausted, `disconnect()` |
//! | Closing | Disconnected | close frame written |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// State of a [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport and nothing scheduled.
    #[default]
    Disconnected,
    /// A caller-initiated handshake is in flight.
    Connecting,
    /// Transport open; heartbeat running.
    Open,
    /// Waiting for, or performing, an automatic reconnection attempt.
    Reconnecting,
    /// Deliberate close in progress.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Closing, Connecting, Disconnected, Open, Reconnecting};

        matches!(
            (self, next),
            (Disconnected, Connecting | Reconnecting)
                | (Connecting, Open | Reconnecting | Disconnected)
                | (Open, Closing | Reconnecting | Disconnected)
                | (Reconnecting, Open | Disconnected)
                | (Closing, Disconnected | Connecting | Reconnecting)
        )
    }

    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
