//! In-memory transport for exercising the connection manager without a socket.
//!
//! Intended for tests (unit and integration) and for offline demos that need
//! to emulate collector behavior: refuse or stall handshakes, push `stats`,
//! answer pings, drop the socket.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{future, sink, stream};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{CloseFrame, ConnectFuture, Frame, FrameSink, FrameStream, Transport};

// ============================================================================
// ConnectBehavior
// ============================================================================

/// How the next handshake behaves.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    /// Open immediately.
    Accept,
    /// Open after a delay.
    Delay(Duration),
    /// Fail with a connection error.
    Refuse(String),
    /// Never settle.
    Hang,
}

// ============================================================================
// MockTransport
// ============================================================================

struct MockInner {
    behaviors: Mutex<VecDeque<ConnectBehavior>>,
    connects: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    servers_tx: mpsc::UnboundedSender<MockServer>,
    servers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockServer>>,
}

/// Transport backed by in-memory channels.
///
/// Each accepted handshake yields a [`MockServer`] through
/// [`MockTransport::next_server`]. Handshakes accept by default; queue other
/// outcomes with [`MockTransport::push_behavior`].
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a transport that accepts every handshake.
    #[must_use]
    pub fn new() -> Self {
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                behaviors: Mutex::new(VecDeque::new()),
                connects: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
                servers_tx,
                servers_rx: tokio::sync::Mutex::new(servers_rx),
            }),
        }
    }

    /// Queues the behavior of a future handshake.
    pub fn push_behavior(&self, behavior: ConnectBehavior) {
        self.inner.behaviors.lock().push_back(behavior);
    }

    /// Returns how many handshakes were started.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Returns every URL a handshake was started for.
    #[must_use]
    pub fn urls(&self) -> Vec<Url> {
        self.inner.urls.lock().clone()
    }

    /// Waits for the next accepted handshake.
    ///
    /// # Panics
    ///
    /// Never in practice: the transport keeps its own sender alive.
    pub async fn next_server(&self) -> MockServer {
        self.inner
            .servers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("mock transport keeps its server channel open")
    }

    /// Returns the next accepted handshake if one is already waiting.
    #[must_use]
    pub fn try_next_server(&self) -> Option<MockServer> {
        self.inner.servers_rx.try_lock().ok()?.try_recv().ok()
    }

    fn open_socket(inner: &MockInner) -> (FrameSink, FrameStream) {
        let (client_tx, server_rx) = mpsc::unbounded_channel::<Frame>();
        let (server_tx, client_rx) = mpsc::unbounded_channel::<Result<Frame>>();

        let sink = sink::unfold(client_tx, |tx, frame: Frame| async move {
            tx.send(frame).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });
        let stream = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let server = MockServer {
            received: server_rx,
            outbound: Some(server_tx),
        };
        if inner.servers_tx.send(server).is_err() {
            tracing::trace!("Mock server handle dropped");
        }

        (Box::pin(sink), Box::pin(stream))
    }
}

impl Transport for MockTransport {
    fn connect(&self, url: &Url) -> ConnectFuture {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.urls.lock().push(url.clone());
        let behavior = self
            .inner
            .behaviors
            .lock()
            .pop_front()
            .unwrap_or(ConnectBehavior::Accept);
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            match behavior {
                ConnectBehavior::Accept => {}
                ConnectBehavior::Delay(delay) => tokio::time::sleep(delay).await,
                ConnectBehavior::Refuse(message) => return Err(Error::connection(message)),
                ConnectBehavior::Hang => future::pending::<()>().await,
            }
            Ok(Self::open_socket(&inner))
        })
    }
}

// ============================================================================
// MockServer
// ============================================================================

/// Collector side of one in-memory socket.
pub struct MockServer {
    /// Frames written by the client.
    received: mpsc::UnboundedReceiver<Frame>,
    /// Frames delivered to the client; `None` once the socket was dropped.
    outbound: Option<mpsc::UnboundedSender<Result<Frame>>>,
}

impl MockServer {
    /// Waits for the next frame written by the client.
    ///
    /// Returns `None` once the client side is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.received.recv().await
    }

    /// Returns the next frame written by the client if one is waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.received.try_recv().ok()
    }

    /// Waits for the next text frame and parses it as JSON.
    ///
    /// Close frames are skipped; returns `None` once the client side is gone.
    pub async fn recv_json(&mut self) -> Option<Value> {
        loop {
            match self.received.recv().await? {
                Frame::Text(text) => return serde_json::from_str(&text).ok(),
                Frame::Close(_) => continue,
            }
        }
    }

    /// Delivers a text frame to the client.
    pub fn send_text(&self, text: impl Into<String>) {
        self.push(Ok(Frame::Text(text.into())));
    }

    /// Delivers a JSON message to the client.
    pub fn send_json(&self, value: &Value) {
        self.send_text(value.to_string());
    }

    /// Sends a close frame and ends the stream.
    pub fn close(&mut self, frame: Option<CloseFrame>) {
        self.push(Ok(Frame::Close(frame)));
        self.outbound = None;
    }

    /// Fails the stream with a transport error and ends it.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.push(Err(Error::connection(message)));
        self.outbound = None;
    }

    /// Ends the stream without a close frame.
    pub fn drop_socket(&mut self) {
        self.outbound = None;
    }

    fn push(&self, item: Result<Frame>) {
        if let Some(tx) = &self.outbound
            && tx.send(item).is_err()
        {
            tracing::trace!("Client side of mock socket is gone");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
