//! Collector-to-client messages.
//!
//! | `type` | Payload |
//! |--------|---------|
//! | `stats` | [`StatsMessage`] broadcast for the site |
//! | `pong` | heartbeat answer, no payload |
//!
//! Any other `type` parses to [`ServerMessage::Unknown`] and is ignored by
//! the dispatcher.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::WebsiteId;

// ============================================================================
// StatsMessage
// ============================================================================

/// Aggregated live statistics for one site.
///
/// Server-authoritative and read-only to the client. Missing numeric fields
/// default to zero so partial broadcasts still reach subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsMessage {
    /// Site the statistics belong to.
    pub website_id: WebsiteId,

    /// Visitors currently connected.
    pub active_users: u64,

    /// Clicks reported across all visitors.
    pub total_clicks: u64,

    /// Mean deepest-scroll percentage.
    pub avg_scroll_percentage: f64,

    /// Mean visible time on page, in seconds.
    pub avg_time_on_page: f64,

    /// Server timestamp of the aggregate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ============================================================================
// ServerMessage
// ============================================================================

/// A message received from the collector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Live statistics broadcast.
    Stats(StatsMessage),

    /// Heartbeat answer.
    Pong {},

    /// Any type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not a JSON object with a
    /// `type` field or a recognized payload is malformed.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::protocol(format!("{e}: {text}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
