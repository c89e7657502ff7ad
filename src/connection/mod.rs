//! Persistent collector connection.
//!
//! A [`ConnectionManager`] owns one WebSocket to the collector and drives it
//! through the [`ConnectionState`] machine: handshake with timeout, `join` on
//! open, heartbeat pings with a liveness window, fixed-delay reconnection with
//! a capped attempt counter, and a deliberate `leave` + normal close.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use livepulse::{ClientSession, ConnectionManager, ConnectionOptions, EventKind};
//! use livepulse::transport::TungsteniteTransport;
//!
//! let connection = ConnectionManager::new(
//!     session,
//!     ConnectionOptions::default(),
//!     Arc::new(TungsteniteTransport::new()),
//! );
//! connection.on(EventKind::Stats, Arc::new(|event| println!("{event:?}")));
//! connection.connect().await?;
//! ```
//!
//! # Concurrency
//!
//! All mutable state lives in one `parking_lot::Mutex`. It is never held
//! across an `.await` or while handlers run: state changes are computed under
//! the lock, then waiters are settled and handlers notified after it is
//! released. Every socket and timer is tagged with a generation number so late
//! events from a superseded socket are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, timeout};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::activity::ActivitySink;
use crate::error::{Error, Result};
use crate::identifiers::{ClientId, HandlerId, WebsiteId};
use crate::protocol::{ActivityMetrics, ClientMessage, ServerMessage};
use crate::session::ClientSession;
use crate::transport::link::{Link, LinkEvent, LinkListener};
use crate::transport::{
    ABNORMAL_CLOSURE, CloseFrame, Frame, FrameSink, FrameStream, NORMAL_CLOSURE, Transport,
};

// ============================================================================
// Submodules
// ============================================================================

/// Event kinds, events and the handler registry.
pub mod handlers;

/// Connection timing configuration.
pub mod options;

/// Connection lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use handlers::{ConnectionEvent, DisconnectReason, EventHandler, EventKind, HandlerRegistry};
pub use options::ConnectionOptions;
pub use state::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// How long `disconnect()` waits for the close frame to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Internal Types
// ============================================================================

/// Who started the in-flight connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOrigin {
    /// A `connect()` call.
    Caller,
    /// The reconnect timer.
    Reconnect,
}

/// Outcome delivered to every pending `connect()` caller.
enum Settlement {
    Connected,
    Failed(String),
    TimedOut(u64),
    Cancelled,
}

impl Settlement {
    fn to_result(&self) -> Result<()> {
        match self {
            Self::Connected => Ok(()),
            Self::Failed(message) => Err(Error::connection(message.clone())),
            Self::TimedOut(timeout_ms) => Err(Error::connection_timeout(*timeout_ms)),
            Self::Cancelled => Err(Error::ConnectionClosed),
        }
    }
}

type Waiter = oneshot::Sender<Result<()>>;

/// Work to perform once the state lock is released.
#[derive(Default)]
struct Effects {
    settle: Option<(Vec<Waiter>, Settlement)>,
    events: Vec<ConnectionEvent>,
}

/// Mutable connection state.
#[derive(Default)]
struct Machine {
    state: ConnectionState,
    /// Bumped whenever a socket or attempt is superseded.
    generation: u64,
    attempt: Option<AttemptOrigin>,
    attempt_task: Option<JoinHandle<()>>,
    waiters: Vec<Waiter>,
    link: Option<Link>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    reconnect_attempts: u32,
    /// Send time of the oldest ping not yet answered by a `pong`.
    awaiting_pong_since: Option<Instant>,
    last_pong: Option<Instant>,
}

impl Drop for Machine {
    fn drop(&mut self) {
        let tasks = [
            self.attempt_task.take(),
            self.heartbeat.take(),
            self.reconnect_timer.take(),
        ];
        for task in tasks.into_iter().flatten() {
            task.abort();
        }
    }
}

/// State shared between the manager handle and its background tasks.
///
/// Tasks hold a `Weak` reference so dropping the last manager handle tears
/// everything down.
struct Shared {
    client_id: ClientId,
    website_id: WebsiteId,
    server_url: Url,
    connection_url: Url,
    options: ConnectionOptions,
    transport: Arc<dyn Transport>,
    handlers: HandlerRegistry,
    machine: Mutex<Machine>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the connection to the collector.
///
/// Cheap to clone; clones share the same connection. Methods that may arm a
/// timer must be called from within a tokio runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("client_id", &self.shared.client_id)
            .field("website_id", &self.shared.website_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a disconnected manager for `session`.
    ///
    /// Nothing is spawned until [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(
        session: ClientSession,
        options: ConnectionOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let connection_url = session.connection_url();

        Self {
            shared: Arc::new(Shared {
                client_id: session.client_id,
                website_id: session.website_id,
                server_url: session.server_url,
                connection_url,
                options,
                transport,
                handlers: HandlerRegistry::new(),
                machine: Mutex::new(Machine::default()),
            }),
        }
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Opens the connection.
    ///
    /// Returns immediately if already open. If an attempt is in flight the
    /// caller joins it instead of starting a second one, and every joined
    /// caller observes the same outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the handshake failed (a reconnection is
    ///   scheduled)
    /// - [`Error::ConnectionTimeout`] if the handshake did not settle in time
    /// - [`Error::ConnectionClosed`] if [`disconnect`](Self::disconnect) was
    ///   called while waiting
    pub async fn connect(&self) -> Result<()> {
        let rx = {
            let mut m = self.shared.machine.lock();
            if m.state.is_open() {
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            m.waiters.push(tx);

            if m.attempt.is_some() {
                debug!(waiters = m.waiters.len(), "Joining in-flight connection attempt");
            } else {
                if m.state == ConnectionState::Reconnecting {
                    if let Some(timer) = m.reconnect_timer.take() {
                        timer.abort();
                    }
                } else {
                    self.shared.transition(&mut m, ConnectionState::Connecting);
                }
                info!(url = %self.shared.server_url, client_id = %self.shared.client_id, "Connecting");
                self.shared.start_attempt(&mut m, AttemptOrigin::Caller);
            }
            rx
        };

        rx.await.unwrap_or(Err(Error::ConnectionClosed))
    }

    /// Closes the connection deliberately.
    ///
    /// Sends a best-effort `leave` if open, then a normal-closure close frame.
    /// Cancels the heartbeat, any pending reconnection and any in-flight
    /// attempt. Never schedules a reconnection. Idempotent.
    pub async fn disconnect(&self) {
        let shared = &self.shared;
        let mut effects = Effects::default();

        let (closing, generation) = {
            let mut m = shared.machine.lock();

            if let Some(task) = m.attempt_task.take() {
                task.abort();
            }
            if let Some(timer) = m.reconnect_timer.take() {
                timer.abort();
            }
            m.attempt = None;
            m.generation += 1;
            m.reconnect_attempts = 0;

            if !m.waiters.is_empty() {
                effects.settle = Some((mem::take(&mut m.waiters), Settlement::Cancelled));
            }

            let closing = match m.link.take() {
                Some(link) if m.state.is_open() => {
                    let leave = ClientMessage::leave(&shared.client_id, &shared.website_id);
                    if let Err(e) = encode(&leave).and_then(|frame| link.send(frame)) {
                        debug!(error = %e, "Failed to queue leave");
                    }
                    shared.transition(&mut m, ConnectionState::Closing);
                    effects.events.push(ConnectionEvent::Disconnect(DisconnectReason {
                        code: NORMAL_CLOSURE,
                        will_reconnect: false,
                    }));
                    Some(link.close(CloseFrame::normal("client disconnect")))
                }
                Some(link) => {
                    link.abort();
                    shared.transition(&mut m, ConnectionState::Disconnected);
                    None
                }
                None => {
                    shared.transition(&mut m, ConnectionState::Disconnected);
                    None
                }
            };

            (closing, m.generation)
        };

        shared.apply(effects);

        let Some(handle) = closing else {
            return;
        };

        let abort = handle.abort_handle();
        if timeout(CLOSE_TIMEOUT, handle).await.is_err() {
            warn!(timeout_ms = CLOSE_TIMEOUT.as_millis() as u64, "Close frame not written in time");
            abort.abort();
        }

        let mut m = shared.machine.lock();
        if m.generation == generation && m.state == ConnectionState::Closing {
            shared.transition(&mut m, ConnectionState::Disconnected);
        }
        info!(client_id = %shared.client_id, "Disconnected");
    }

    /// Drops the current socket and schedules one fixed-delay reconnection.
    ///
    /// No-op while an attempt or a reconnection is already pending. After the
    /// attempt cap was exhausted the counter starts over.
    pub fn reconnect(&self) {
        let mut effects = Effects::default();
        {
            let mut m = self.shared.machine.lock();
            if m.state == ConnectionState::Disconnected {
                m.reconnect_attempts = 0;
            }
            self.shared.force_reconnect(&mut m, &mut effects);
        }
        self.shared.apply(effects);
    }
}

// ============================================================================
// ConnectionManager - Messaging
// ============================================================================

impl ConnectionManager {
    /// Sends a message.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the connection is open
    /// - [`Error::Json`] if the message cannot be encoded
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        let m = self.shared.machine.lock();
        if !m.state.is_open() {
            return Err(Error::NotConnected);
        }
        trace!(kind = message.kind(), "Sending message");
        Shared::send_locked(&m, &message)
    }

    /// Sends an `activity` report for this client.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub fn send_activity(&self, metrics: ActivityMetrics) -> Result<()> {
        self.send(ClientMessage::activity(
            &self.shared.client_id,
            &self.shared.website_id,
            metrics,
        ))
    }

    /// Subscribes a handler; see [`HandlerRegistry::on`].
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> HandlerId {
        self.shared.handlers.on(kind, handler)
    }

    /// Unsubscribes a handler. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        self.shared.handlers.off(kind, id)
    }
}

// ============================================================================
// ConnectionManager - Accessors
// ============================================================================

impl ConnectionManager {
    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.machine.lock().state
    }

    /// Returns `true` if the connection is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Returns the number of reconnection attempts since the last open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.machine.lock().reconnect_attempts
    }

    /// Returns when the last `pong` arrived on the current socket.
    #[must_use]
    pub fn last_pong(&self) -> Option<Instant> {
        self.shared.machine.lock().last_pong
    }

    /// Returns the client id.
    #[inline]
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.shared.client_id
    }

    /// Returns the website id.
    #[inline]
    #[must_use]
    pub fn website_id(&self) -> &WebsiteId {
        &self.shared.website_id
    }

    /// Returns the URL handshakes are made against.
    #[inline]
    #[must_use]
    pub fn connection_url(&self) -> &Url {
        &self.shared.connection_url
    }

    /// Returns the connection options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.shared.options
    }

    /// Returns a snapshot of the session including the current state.
    #[must_use]
    pub fn session(&self) -> ClientSession {
        ClientSession {
            client_id: self.shared.client_id.clone(),
            website_id: self.shared.website_id.clone(),
            server_url: self.shared.server_url.clone(),
            connection_state: self.state(),
        }
    }
}

impl ActivitySink for ConnectionManager {
    fn is_open(&self) -> bool {
        ConnectionManager::is_open(self)
    }

    fn send_activity(&self, metrics: ActivityMetrics) -> Result<()> {
        ConnectionManager::send_activity(self, metrics)
    }
}

// ============================================================================
// Shared - State Machine
// ============================================================================

impl Shared {
    /// Moves to `next`, arming and cancelling timers on the way.
    ///
    /// Leaving `Open` always cancels the heartbeat before anything new is
    /// armed; the heartbeat runs iff the state is `Open`.
    fn transition(self: &Arc<Self>, m: &mut Machine, next: ConnectionState) {
        let prev = m.state;
        if prev == next {
            return;
        }
        if !prev.can_transition_to(next) {
            warn!(from = %prev, to = %next, "Unexpected state transition");
        }

        if prev.is_open() {
            if let Some(heartbeat) = m.heartbeat.take() {
                heartbeat.abort();
            }
            m.awaiting_pong_since = None;
        }

        m.state = next;

        match next {
            ConnectionState::Open => {
                if let Some(timer) = m.reconnect_timer.take() {
                    timer.abort();
                }
                m.reconnect_attempts = 0;
                self.arm_heartbeat(m);
            }
            ConnectionState::Closing | ConnectionState::Disconnected => {
                if let Some(timer) = m.reconnect_timer.take() {
                    timer.abort();
                }
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
        }

        debug!(from = %prev, to = %next, "Connection state changed");
    }

    /// Starts one handshake bounded by the connect timeout.
    fn start_attempt(self: &Arc<Self>, m: &mut Machine, origin: AttemptOrigin) {
        m.generation += 1;
        m.attempt = Some(origin);

        let generation = m.generation;
        let connecting = self.transport.connect(&self.connection_url);
        let connect_timeout = self.options.connect_timeout;
        let weak = Arc::downgrade(self);

        m.attempt_task = Some(tokio::spawn(async move {
            let outcome = timeout(connect_timeout, connecting).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match outcome {
                Ok(Ok((sink, stream))) => shared.on_transport_open(generation, sink, stream),
                Ok(Err(e)) => shared.on_connect_failed(generation, &e),
                Err(_) => shared.on_connect_timeout(generation),
            }
        }));
    }

    /// Schedules the next reconnection attempt.
    ///
    /// Returns `false` and moves to `Disconnected` once the cap is reached.
    fn schedule_reconnect(self: &Arc<Self>, m: &mut Machine) -> bool {
        let max_attempts = self.options.reconnect_max_attempts;
        if m.reconnect_attempts >= max_attempts {
            warn!(attempts = m.reconnect_attempts, "Reconnection attempts exhausted");
            self.transition(m, ConnectionState::Disconnected);
            return false;
        }

        m.reconnect_attempts += 1;
        self.transition(m, ConnectionState::Reconnecting);

        if let Some(timer) = m.reconnect_timer.take() {
            timer.abort();
        }
        let delay = self.options.reconnect_delay;
        let generation = m.generation;
        let weak = Arc::downgrade(self);
        m.reconnect_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.on_reconnect_timer(generation);
            }
        }));

        info!(
            attempt = m.reconnect_attempts,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnection scheduled"
        );
        true
    }

    /// Drops the current socket and schedules a reconnection.
    fn force_reconnect(self: &Arc<Self>, m: &mut Machine, effects: &mut Effects) {
        if m.attempt.is_some() || m.reconnect_timer.is_some() {
            debug!("Reconnection already pending");
            return;
        }

        let was_open = m.state.is_open();
        if let Some(link) = m.link.take() {
            link.abort();
        }
        m.generation += 1;

        let will_reconnect = self.schedule_reconnect(m);
        if was_open {
            effects.events.push(ConnectionEvent::Disconnect(DisconnectReason {
                code: ABNORMAL_CLOSURE,
                will_reconnect,
            }));
        }
    }

    /// Settles waiters, then notifies handlers.
    fn apply(&self, effects: Effects) {
        if let Some((waiters, settlement)) = effects.settle {
            for waiter in waiters {
                let _ = waiter.send(settlement.to_result());
            }
        }
        for event in &effects.events {
            self.handlers.notify(event);
        }
    }

    fn send_locked(m: &Machine, message: &ClientMessage) -> Result<()> {
        let link = m.link.as_ref().ok_or(Error::NotConnected)?;
        link.send(encode(message)?)
    }
}

// ============================================================================
// Shared - Attempt Outcomes
// ============================================================================

impl Shared {
    fn on_transport_open(self: &Arc<Self>, generation: u64, sink: FrameSink, stream: FrameStream) {
        let mut effects = Effects::default();
        {
            let mut m = self.machine.lock();
            if m.generation != generation || m.attempt.is_none() {
                debug!(generation, "Discarding superseded transport");
                return;
            }
            m.attempt = None;
            m.attempt_task = None;

            let link = Link::spawn(sink, stream, self.link_listener(generation));
            let join = ClientMessage::join(&self.client_id, &self.website_id);
            if let Err(e) = encode(&join).and_then(|frame| link.send(frame)) {
                warn!(error = %e, "Failed to queue join");
            }
            m.link = Some(link);
            m.last_pong = None;

            self.transition(&mut m, ConnectionState::Open);
            info!(client_id = %self.client_id, website_id = %self.website_id, "Connected");

            effects.settle = Some((mem::take(&mut m.waiters), Settlement::Connected));
            effects.events.push(ConnectionEvent::Connect);
        }
        self.apply(effects);
    }

    fn on_connect_failed(self: &Arc<Self>, generation: u64, error: &Error) {
        let mut effects = Effects::default();
        {
            let mut m = self.machine.lock();
            if m.generation != generation || m.attempt.is_none() {
                return;
            }
            let origin = m.attempt.take();
            m.attempt_task = None;

            let message = error.to_string();
            warn!(error = %message, ?origin, "Connection attempt failed");
            self.schedule_reconnect(&mut m);

            effects.settle = Some((mem::take(&mut m.waiters), Settlement::Failed(message.clone())));
            effects.events.push(ConnectionEvent::Error(message));
        }
        self.apply(effects);
    }

    fn on_connect_timeout(self: &Arc<Self>, generation: u64) {
        let mut effects = Effects::default();
        {
            let mut m = self.machine.lock();
            if m.generation != generation || m.attempt.is_none() {
                return;
            }
            let origin = m.attempt.take();
            m.attempt_task = None;

            let timeout_ms = self.options.connect_timeout.as_millis() as u64;
            warn!(timeout_ms, ?origin, "Connection attempt timed out");

            match origin {
                Some(AttemptOrigin::Reconnect) => {
                    self.schedule_reconnect(&mut m);
                }
                _ => self.transition(&mut m, ConnectionState::Disconnected),
            }

            effects.settle = Some((mem::take(&mut m.waiters), Settlement::TimedOut(timeout_ms)));
        }
        self.apply(effects);
    }

    fn on_reconnect_timer(self: &Arc<Self>, generation: u64) {
        let mut m = self.machine.lock();
        if m.generation != generation
            || m.state != ConnectionState::Reconnecting
            || m.attempt.is_some()
        {
            return;
        }
        m.reconnect_timer = None;

        info!(attempt = m.reconnect_attempts, "Reconnecting");
        self.start_attempt(&mut m, AttemptOrigin::Reconnect);
    }
}

// ============================================================================
// Shared - Socket Events
// ============================================================================

impl Shared {
    fn link_listener(self: &Arc<Self>, generation: u64) -> LinkListener {
        let weak: Weak<Self> = Arc::downgrade(self);
        Box::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_link_event(generation, event);
            }
        })
    }

    fn on_link_event(self: &Arc<Self>, generation: u64, event: LinkEvent) {
        match event {
            LinkEvent::Text(text) => {
                if !self.is_current(generation) {
                    trace!(generation, "Dropping frame from superseded socket");
                    return;
                }
                self.dispatch_text(generation, &text);
            }
            LinkEvent::Error(e) => {
                if self.is_current(generation) {
                    self.handlers.notify(&ConnectionEvent::Error(e.to_string()));
                }
            }
            LinkEvent::Closed(frame) => self.on_link_closed(generation, frame),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let m = self.machine.lock();
        m.generation == generation && m.state.is_open()
    }

    fn dispatch_text(&self, generation: u64, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Stats(stats)) => {
                trace!(active_users = stats.active_users, "Stats received");
                self.handlers.notify(&ConnectionEvent::Stats(stats));
            }
            Ok(ServerMessage::Pong {}) => {
                let mut m = self.machine.lock();
                if m.generation == generation {
                    m.awaiting_pong_since = None;
                    m.last_pong = Some(Instant::now());
                }
            }
            Ok(ServerMessage::Unknown) => {
                trace!("Ignoring unrecognized message type");
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
            }
        }
    }

    fn on_link_closed(self: &Arc<Self>, generation: u64, frame: Option<CloseFrame>) {
        let mut effects = Effects::default();
        {
            let mut m = self.machine.lock();
            if m.generation != generation || m.link.is_none() {
                return;
            }
            m.link = None;

            let was_open = m.state.is_open();
            let code = frame.as_ref().map_or(ABNORMAL_CLOSURE, |f| f.code);

            let will_reconnect = if code == NORMAL_CLOSURE {
                info!(code, "Collector closed the connection");
                self.transition(&mut m, ConnectionState::Disconnected);
                false
            } else {
                warn!(code, "Connection lost");
                self.schedule_reconnect(&mut m)
            };

            if was_open {
                effects.events.push(ConnectionEvent::Disconnect(DisconnectReason {
                    code,
                    will_reconnect,
                }));
            }
        }
        self.apply(effects);
    }
}

// ============================================================================
// Shared - Heartbeat
// ============================================================================

impl Shared {
    /// Arms the ping timer for the current socket, replacing any previous one.
    fn arm_heartbeat(self: &Arc<Self>, m: &mut Machine) {
        if let Some(heartbeat) = m.heartbeat.take() {
            heartbeat.abort();
        }

        let period = self.options.update_interval;
        let generation = m.generation;
        let weak = Arc::downgrade(self);

        m.heartbeat = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.on_heartbeat_tick(generation) {
                    break;
                }
            }
        }));
    }

    /// Sends a ping, or forces a reconnect when the liveness window elapsed.
    ///
    /// Returns `false` when the heartbeat should stop.
    fn on_heartbeat_tick(self: &Arc<Self>, generation: u64) -> bool {
        let mut effects = Effects::default();
        let keep_running = {
            let mut m = self.machine.lock();
            if m.generation != generation || !m.state.is_open() {
                return false;
            }

            let now = Instant::now();
            match m.awaiting_pong_since {
                Some(since) if now.duration_since(since) >= self.options.liveness_window => {
                    warn!(
                        silent_ms = now.duration_since(since).as_millis() as u64,
                        "No pong within liveness window"
                    );
                    // This task is the heartbeat; detach instead of aborting it.
                    m.heartbeat = None;
                    self.force_reconnect(&mut m, &mut effects);
                    false
                }
                _ => {
                    if m.awaiting_pong_since.is_none() {
                        m.awaiting_pong_since = Some(now);
                    }
                    if let Err(e) = Self::send_locked(&m, &ClientMessage::ping(&self.client_id)) {
                        debug!(error = %e, "Failed to queue ping");
                    }
                    true
                }
            }
        };
        self.apply(effects);
        keep_running
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn encode(message: &ClientMessage) -> Result<Frame> {
    Ok(Frame::Text(serde_json::to_string(message)?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::{ConnectBehavior, MockTransport};

    fn manager(transport: &MockTransport) -> ConnectionManager {
        let session = ClientSession::new(
            ClientId::new("c-1"),
            WebsiteId::new("W1"),
            Url::parse("ws://collector.test/ws").expect("url"),
        );
        ConnectionManager::new(
            session,
            ConnectionOptions::default(),
            Arc::new(transport.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_sends_join_first() {
        let transport = MockTransport::new();
        let connection = manager(&transport);

        connection.connect().await.expect("connect");
        assert_eq!(connection.state(), ConnectionState::Open);

        let mut server = transport.next_server().await;
        assert_eq!(
            server.recv_json().await,
            Some(json!({ "type": "join", "clientId": "c-1", "websiteId": "W1" }))
        );
        assert_eq!(
            transport.urls()[0].as_str(),
            "ws://collector.test/ws?clientId=c-1&websiteId=W1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_when_open_is_noop() {
        let transport = MockTransport::new();
        let connection = manager(&transport);

        connection.connect().await.expect("connect");
        connection.connect().await.expect("second connect");
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_send_requires_open() {
        let transport = MockTransport::new();
        let connection = manager(&transport);

        let result = connection.send_activity(ActivityMetrics::default());
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_every_update_interval_and_pong_recorded() {
        let transport = MockTransport::new();
        let connection = manager(&transport);
        connection.connect().await.expect("connect");
        let mut server = transport.next_server().await;

        let _join = server.recv_json().await;
        let started = Instant::now();
        let ping = server.recv_json().await.expect("ping");
        assert_eq!(ping["type"], "ping");
        assert_eq!(ping["clientId"], "c-1");
        assert_eq!(started.elapsed(), Duration::from_secs(10));

        server.send_json(&json!({ "type": "pong" }));
        let _next_ping = server.recv_json().await.expect("ping");
        assert!(connection.last_pong().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connect_rejects_and_schedules_reconnect() {
        let transport = MockTransport::new();
        transport.push_behavior(ConnectBehavior::Refuse("refused".into()));
        let connection = manager(&transport);

        let err = connection.connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(connection.state(), ConnectionState::Reconnecting);
        assert_eq!(connection.reconnect_attempts(), 1);

        let _server = transport.next_server().await;
        assert_eq!(connection.state(), ConnectionState::Open);
        assert_eq!(connection.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_when_idle_is_idempotent() {
        let transport = MockTransport::new();
        let connection = manager(&transport);

        connection.disconnect().await;
        connection.disconnect().await;
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(transport.connect_count(), 0);
    }
}
