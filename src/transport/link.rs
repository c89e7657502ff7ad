//! Per-socket event loop.
//!
//! A [`Link`] spawns a tokio task that owns both halves of one open socket.
//! The task handles:
//!
//! - Incoming text frames, forwarded to the listener in arrival order
//! - Outgoing frames from the connection manager, written in queue order
//! - Local close (close frame, then sink shutdown) and remote close
//!
//! Every socket gets its own listener closure; the connection manager tags it
//! with a generation number so events from a superseded socket are ignored.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::{CloseFrame, Frame, FrameSink, FrameStream};

// ============================================================================
// Types
// ============================================================================

/// Events reported by the event loop.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    /// A text frame arrived.
    Text(String),
    /// The socket failed; a `Closed` event follows.
    Error(Error),
    /// The socket closed remotely or dropped. `None` means no close frame.
    Closed(Option<CloseFrame>),
}

/// Listener callback for one socket.
pub(crate) type LinkListener = Box<dyn Fn(LinkEvent) + Send + Sync>;

/// Internal commands for the event loop.
enum LinkCommand {
    /// Write a frame.
    Send(Frame),
    /// Write a close frame and shut the socket down.
    Close(CloseFrame),
}

// ============================================================================
// Link
// ============================================================================

/// Handle to the event loop of one open socket.
///
/// Dropping the handle closes the socket quietly: no `Closed` event is
/// reported for a locally initiated shutdown.
pub(crate) struct Link {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    /// Event loop task.
    task: JoinHandle<()>,
}

impl Link {
    /// Spawns the event loop for an open socket.
    pub(crate) fn spawn(sink: FrameSink, stream: FrameStream, listener: LinkListener) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run_event_loop(sink, stream, command_rx, listener));

        Self { command_tx, task }
    }

    /// Queues a frame for writing.
    ///
    /// Frames are written in the order they are queued.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the event loop has exited
    pub(crate) fn send(&self, frame: Frame) -> Result<()> {
        self.command_tx
            .send(LinkCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Queues a close frame after any pending frames.
    ///
    /// Returns the event loop task so callers can wait for the close to be
    /// written.
    pub(crate) fn close(self, frame: CloseFrame) -> JoinHandle<()> {
        if self.command_tx.send(LinkCommand::Close(frame)).is_err() {
            trace!("Close requested on exited link");
        }
        self.task
    }

    /// Tears the socket down immediately, discarding queued frames.
    pub(crate) fn abort(self) {
        self.task.abort();
    }

    /// Event loop that handles socket I/O.
    async fn run_event_loop(
        mut sink: FrameSink,
        mut stream: FrameStream,
        mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
        listener: LinkListener,
    ) {
        let close_frame = loop {
            tokio::select! {
                // Incoming frames from the collector
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Frame::Text(text))) => {
                            trace!(len = text.len(), "Frame received");
                            listener(LinkEvent::Text(text));
                        }

                        Some(Ok(Frame::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break frame;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            listener(LinkEvent::Error(e));
                            break None;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break None;
                        }
                    }
                }

                // Commands from the connection manager
                command = command_rx.recv() => {
                    match command {
                        Some(LinkCommand::Send(frame)) => {
                            if let Err(e) = sink.send(frame).await {
                                warn!(error = %e, "Failed to write frame");
                            }
                        }

                        Some(LinkCommand::Close(frame)) => {
                            debug!(code = frame.code, "Closing link");
                            if let Err(e) = sink.send(Frame::Close(Some(frame))).await {
                                debug!(error = %e, "Failed to write close frame");
                            }
                            let _ = sink.close().await;
                            return;
                        }

                        None => {
                            debug!("Link handle dropped");
                            let _ = sink.close().await;
                            return;
                        }
                    }
                }
            }
        };

        listener(LinkEvent::Closed(close_frame));
        debug!("Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
