//! `tokio-tungstenite` client transport.

// ============================================================================
// Imports
// ============================================================================

use futures_util::future;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

use super::tls::install_crypto_provider;
use super::{CloseFrame, ConnectFuture, Frame, FrameSink, FrameStream, Transport};

// ============================================================================
// Conversions
// ============================================================================

/// Maps a transport frame onto a tungstenite message.
fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Close(frame) => Message::Close(frame.map(|f| WsCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.into(),
        })),
    }
}

/// Maps a tungstenite message onto a transport frame.
///
/// Ping/pong control frames are answered by tungstenite itself and binary
/// frames are not part of the protocol, so both are dropped.
fn message_to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
        Message::Close(frame) => Some(Frame::Close(frame.map(|f| CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned(),
        }))),
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

// ============================================================================
// TungsteniteTransport
// ============================================================================

/// WebSocket client transport over `tokio-tungstenite`.
///
/// Supports `ws://` and `wss://` URLs; TLS runs over rustls with the
/// webpki root certificates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Creates a new transport.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Opens one socket; see [`Transport::connect`].
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        Transport::connect(self, url).await
    }
}

impl Transport for TungsteniteTransport {
    fn connect(&self, url: &Url) -> ConnectFuture {
        let url = url.to_string();
        install_crypto_provider();

        Box::pin(async move {
            let (ws_stream, response) = connect_async(url.as_str()).await?;
            debug!(status = %response.status(), "WebSocket handshake completed");

            let (ws_write, ws_read) = ws_stream.split();

            let sink = ws_write
                .with(|frame: Frame| future::ready(Ok::<_, Error>(frame_to_message(frame))));
            let stream = ws_read.filter_map(|message| {
                future::ready(match message {
                    Ok(message) => message_to_frame(message).map(Ok),
                    Err(e) => Some(Err::<Frame, Error>(Error::from(e))),
                })
            });

            let sink: FrameSink = Box::pin(sink);
            let stream: FrameStream = Box::pin(stream);
            Ok::<_, Error>((sink, stream))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
