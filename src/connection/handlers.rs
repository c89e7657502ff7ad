//! Event subscriptions for the connection manager.
//!
//! Handlers are grouped by [`EventKind`]. Within one kind they run in
//! registration order; a panicking handler is logged and its siblings still
//! run.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::error::Error;
use crate::identifiers::HandlerId;
use crate::protocol::StatsMessage;

// ============================================================================
// EventKind
// ============================================================================

/// Kinds of events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Live statistics broadcast.
    Stats,
    /// Connection reached `Open`.
    Connect,
    /// Connection left `Open`.
    Disconnect,
    /// Transport failure.
    Error,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Stats, Self::Connect, Self::Disconnect, Self::Error];

    /// Returns the lowercase kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Error => "error",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Stats => 0,
            Self::Connect => 1,
            Self::Disconnect => 2,
            Self::Error => 3,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown event kind: {s}")))
    }
}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Why the connection left `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectReason {
    /// Close code; 1006 when the socket dropped without a close frame.
    pub code: u16,
    /// Whether an automatic reconnection was scheduled.
    pub will_reconnect: bool,
}

/// An event delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Live statistics broadcast.
    Stats(StatsMessage),
    /// Connection reached `Open`.
    Connect,
    /// Connection left `Open`.
    Disconnect(DisconnectReason),
    /// Transport failure description.
    Error(String),
}

impl ConnectionEvent {
    /// Returns the subscription kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Stats(_) => EventKind::Stats,
            Self::Connect => EventKind::Connect,
            Self::Disconnect(_) => EventKind::Disconnect,
            Self::Error(_) => EventKind::Error,
        }
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Event handler callback type.
pub type EventHandler = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

type HandlerList = Vec<(HandlerId, EventHandler)>;

/// Ordered, de-duplicated handler lists per [`EventKind`].
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    lists: Mutex<[HandlerList; 4]>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `kind`.
    ///
    /// Registering the same handler (same `Arc`) twice for one kind returns
    /// the existing id and keeps its original position.
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> HandlerId {
        let mut lists = self.lists.lock();
        let list = &mut lists[kind.index()];

        if let Some((id, _)) = list.iter().find(|(_, h)| Arc::ptr_eq(h, &handler)) {
            trace!(%kind, %id, "Handler already registered");
            return *id;
        }

        let id = HandlerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        list.push((id, handler));
        id
    }

    /// Unsubscribes a handler. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut lists = self.lists.lock();
        let list = &mut lists[kind.index()];
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Returns the number of handlers subscribed to `kind`.
    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.lists.lock()[kind.index()].len()
    }

    /// Returns `true` if no handler is subscribed to `kind`.
    #[must_use]
    pub fn is_empty(&self, kind: EventKind) -> bool {
        self.len(kind) == 0
    }

    /// Removes every handler of every kind.
    pub fn clear(&self) {
        for list in self.lists.lock().iter_mut() {
            list.clear();
        }
    }

    /// Invokes every handler subscribed to the event's kind.
    ///
    /// Iterates a snapshot taken before the first call, so handlers may
    /// subscribe or unsubscribe freely. Returns how many handlers ran
    /// without panicking.
    pub fn notify(&self, event: &ConnectionEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(HandlerId, EventHandler)> = self.lists.lock()[kind.index()]
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        let mut completed = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(_) => error!(%kind, %id, "Event handler panicked"),
            }
        }
        completed
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lists = self.lists.lock();
        let mut debug = f.debug_struct("HandlerRegistry");
        for kind in EventKind::ALL {
            debug.field(kind.as_str(), &lists[kind.index()].len());
        }
        debug.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
