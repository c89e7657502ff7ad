//! Client-to-collector messages.
//!
//! Every message is a flat JSON object with the `type` discriminator merged
//! at the top level:
//!
//! ```json
//! { "type": "join", "clientId": "c-1", "websiteId": "W1" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::identifiers::{ClientId, WebsiteId};

// ============================================================================
// ActivityMetrics
// ============================================================================

/// One activity snapshot for the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetrics {
    /// Clicks since the last successful flush.
    pub click_count: u64,

    /// Deepest scroll position reached, 0–100.
    pub scroll_percentage: f64,

    /// Visible time on page in whole seconds.
    pub time_on_page_seconds: u64,
}

// ============================================================================
// ClientMessage
// ============================================================================

/// A message sent from the client to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Announces the client right after the connection opens.
    Join {
        /// Sending client.
        client_id: ClientId,
        /// Site the client is on.
        website_id: WebsiteId,
    },

    /// Periodic activity report.
    Activity {
        /// Sending client.
        client_id: ClientId,
        /// Site the client is on.
        website_id: WebsiteId,
        /// Snapshot being reported.
        metrics: ActivityMetrics,
    },

    /// Heartbeat probe; the collector answers with `pong`.
    Ping {
        /// Sending client.
        client_id: ClientId,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },

    /// Best-effort goodbye sent before a deliberate close.
    Leave {
        /// Sending client.
        client_id: ClientId,
        /// Site the client is on.
        website_id: WebsiteId,
    },
}

impl ClientMessage {
    /// Creates a `join` message.
    #[inline]
    #[must_use]
    pub fn join(client_id: &ClientId, website_id: &WebsiteId) -> Self {
        Self::Join {
            client_id: client_id.clone(),
            website_id: website_id.clone(),
        }
    }

    /// Creates an `activity` message.
    #[inline]
    #[must_use]
    pub fn activity(client_id: &ClientId, website_id: &WebsiteId, metrics: ActivityMetrics) -> Self {
        Self::Activity {
            client_id: client_id.clone(),
            website_id: website_id.clone(),
            metrics,
        }
    }

    /// Creates a `ping` message stamped with the current wall-clock time.
    #[must_use]
    pub fn ping(client_id: &ClientId) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self::Ping {
            client_id: client_id.clone(),
            timestamp,
        }
    }

    /// Creates a `leave` message.
    #[inline]
    #[must_use]
    pub fn leave(client_id: &ClientId, website_id: &WebsiteId) -> Self {
        Self::Leave {
            client_id: client_id.clone(),
            website_id: website_id.clone(),
        }
    }

    /// Returns the wire name of the message type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Activity { .. } => "activity",
            Self::Ping { .. } => "ping",
            Self::Leave { .. } => "leave",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    fn ids() -> (ClientId, WebsiteId) {
        (ClientId::new("c-1"), WebsiteId::new("W1"))
    }

    #[test]
    fn test_join_is_flat() {
        let (client, site) = ids();
        let value = serde_json::to_value(ClientMessage::join(&client, &site)).expect("serialize");
        assert_eq!(
            value,
            json!({ "type": "join", "clientId": "c-1", "websiteId": "W1" })
        );
    }

    #[test]
    fn test_activity_nests_metrics() {
        let (client, site) = ids();
        let metrics = ActivityMetrics {
            click_count: 3,
            scroll_percentage: 42.5,
            time_on_page_seconds: 17,
        };
        let value =
            serde_json::to_value(ClientMessage::activity(&client, &site, metrics)).expect("serialize");

        assert_eq!(value["type"], "activity");
        assert_eq!(
            value["metrics"],
            json!({ "clickCount": 3, "scrollPercentage": 42.5, "timeOnPageSeconds": 17 })
        );
    }

    #[test]
    fn test_ping_has_timestamp() {
        let (client, _) = ids();
        let value: Value = serde_json::to_value(ClientMessage::ping(&client)).expect("serialize");
        assert_eq!(value["type"], "ping");
        assert_eq!(value["clientId"], "c-1");
        assert!(value["timestamp"].as_u64().unwrap_or_default() > 0);
    }

    #[test]
    fn test_kind_matches_tag() {
        let (client, site) = ids();
        let leave = ClientMessage::leave(&client, &site);
        let value = serde_json::to_value(&leave).expect("serialize");
        assert_eq!(value["type"], leave.kind());
    }
}
