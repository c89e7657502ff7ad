//! livepulse - Embeddable real-time engagement widget core.
//!
//! This library runs inside a host page, reports visitor activity to a
//! collector service over one persistent WebSocket, receives aggregated live
//! statistics back and fans them out to pluggable UI widgets.
//!
//! # Architecture
//!
//! - **[`ConnectionManager`]**: one socket per host; connect, heartbeat,
//!   fixed-delay reconnection, typed messages, event handlers
//! - **[`ActivityTracker`]**: folds scroll/click/visibility signals into
//!   periodic [`ActivityMetrics`] snapshots
//! - **[`WidgetRegistry`]**: widget factories by type, active instances,
//!   data fan-out
//! - **[`WidgetHost`]**: wires the three together for one page
//!
//! Key design principles:
//!
//! - No global state: every host owns its own connection, tracker and registry
//! - Explicit state machine with a single transition function
//! - At-most-once, best-effort reporting (no buffering or replay)
//! - Failures are contained per component and surfaced through logs and
//!   `error` subscribers
//!
//! # Quick Start
//!
//! ```no_run
//! use livepulse::{MemoryContainer, PageSignal, Result, WidgetConfig, WidgetHost};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = WidgetHost::builder()
//!         .server_url("wss://collector.example.com/ws")
//!         .website_id("W1")
//!         .widget(WidgetConfig::new("viewers"))
//!         .container(MemoryContainer::shared("sidebar"))
//!         .build()?;
//!
//!     host.start().await;
//!     host.record(PageSignal::Click);
//!     host.stop().await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`activity`] | Page signal sampling and activity snapshots |
//! | [`config`] | JSON host configuration |
//! | [`connection`] | Connection state machine and event handlers |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | [`WidgetHost`] orchestrator and builder |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`session`] | Client session and client id storage |
//! | [`testing`] | In-memory transport for tests and offline demos |
//! | [`transport`] | WebSocket transport layer |
//! | [`widget`] | Widget trait, registry and built-in widgets |

// ============================================================================
// Modules
// ============================================================================

/// Page signal sampling and activity snapshots.
pub mod activity;

/// JSON host configuration.
pub mod config;

/// Connection state machine and event handlers.
///
/// Use [`ConnectionManager::connect`] to open the socket.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Orchestrator wiring connection, tracker and widgets.
///
/// Use [`WidgetHost::builder()`] to create a configured host.
pub mod host;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire message types.
pub mod protocol;

/// Client session and client id storage.
pub mod session;

/// In-memory transport for tests and offline demos.
pub mod testing;

/// WebSocket transport layer.
///
/// The [`Transport`](transport::Transport) trait is the seam between the
/// connection state machine and socket I/O.
pub mod transport;

/// Widget trait, registry and built-in widgets.
pub mod widget;

// ============================================================================
// Re-exports
// ============================================================================

// Activity types
pub use activity::{ActivitySink, ActivityTracker, PageSignal, TrackerOptions, Visibility};

// Configuration
pub use config::HostConfig;

// Connection types
pub use connection::{
    ConnectionEvent, ConnectionManager, ConnectionOptions, ConnectionState, DisconnectReason,
    EventHandler, EventKind,
};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{WidgetHost, WidgetHostBuilder};

// Identifier types
pub use identifiers::{ClientId, HandlerId, WebsiteId};

// Protocol types
pub use protocol::{ActivityMetrics, ClientMessage, ServerMessage, StatsMessage};

// Session types
pub use session::{ClientIdStore, ClientSession, FileClientIdStore, MemoryClientIdStore};

// Widget types
pub use widget::{
    Container, ContainerRef, MemoryContainer, PurchaseNotice, Widget, WidgetConfig, WidgetData,
    WidgetFactory, WidgetRegistry,
};
