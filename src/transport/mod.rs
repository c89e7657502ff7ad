//! WebSocket transport layer.
//!
//! This module isolates socket I/O from the connection state machine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  ConnectionManager   │                          │  Collector      │
//! │                      │        WebSocket         │  service        │
//! │  Transport::connect  │─────────────────────────►│                 │
//! │  → Link (I/O loop)   │◄────────────────────────►│                 │
//! └──────────────────────┘  ?clientId=..&websiteId= └─────────────────┘
//! ```
//!
//! A [`Transport`] opens one socket and hands back a frame sink and a frame
//! stream. The [`Link`](link::Link) event loop owns both halves for the
//! lifetime of that socket.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `link` | Per-socket event loop |
//! | `tls` | TLS crypto provider setup |
//! | `tungstenite` | `tokio-tungstenite` client transport |

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Per-socket event loop.
pub(crate) mod link;

/// TLS crypto provider setup.
pub(crate) mod tls;

/// `tokio-tungstenite` client transport.
pub mod tungstenite;

// ============================================================================
// Re-exports
// ============================================================================

pub use tungstenite::TungsteniteTransport;

// ============================================================================
// Constants
// ============================================================================

/// Close code for a deliberate, normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ============================================================================
// Frame
// ============================================================================

/// Close frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// WebSocket close code.
    pub code: u16,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseFrame {
    /// Creates a normal-closure frame.
    #[inline]
    #[must_use]
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: reason.into(),
        }
    }

    /// Returns `true` for a normal closure.
    #[inline]
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}

/// A transport-level frame.
///
/// Binary and control frames are handled by the transport itself and never
/// reach the connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame carrying one JSON message.
    Text(String),
    /// Close frame.
    Close(Option<CloseFrame>),
}

// ============================================================================
// Transport
// ============================================================================

/// Outbound half of an open socket.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = Error> + Send>>;

/// Inbound half of an open socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Future returned by [`Transport::connect`].
pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<(FrameSink, FrameStream)>> + Send>>;

/// Opens sockets to the collector.
///
/// Implementations only perform the handshake; timeouts, retries and
/// lifecycle live in the connection manager.
pub trait Transport: Send + Sync + 'static {
    /// Opens one socket to `url`.
    fn connect(&self, url: &Url) -> ConnectFuture;
}

// ============================================================================
// Tests
// ============================================================================
