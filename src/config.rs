//! Host configuration loaded from JSON.
//!
//! ```json
//! {
//!   "serverUrl": "wss://collector.example.com/ws",
//!   "websiteId": "W1",
//!   "widgets": [
//!     { "type": "viewers", "options": { "minViewers": 2 } },
//!     { "type": "urgency", "enabled": false }
//!   ],
//!   "connection": { "reconnectDelay": 20000 },
//!   "tracker": { "flushInterval": 30000 }
//! }
//! ```
//!
//! Durations are integers in milliseconds. Every section except `serverUrl`
//! and `websiteId` is optional.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activity::TrackerOptions;
use crate::connection::ConnectionOptions;
use crate::error::{Error, Result};
use crate::identifiers::WebsiteId;
use crate::widget::WidgetConfig;

// ============================================================================
// HostConfig
// ============================================================================

/// Complete configuration of a [`WidgetHost`](crate::WidgetHost).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Collector endpoint (`ws://` or `wss://`).
    pub server_url: String,

    /// Tenant site.
    pub website_id: WebsiteId,

    /// Widgets to initialize, in order.
    #[serde(default)]
    pub widgets: Vec<WidgetConfig>,

    /// Connection timings.
    #[serde(default)]
    pub connection: ConnectionOptions,

    /// Activity tracker timings.
    #[serde(default)]
    pub tracker: TrackerOptions,
}

impl HostConfig {
    /// Creates a configuration with default options and no widgets.
    #[must_use]
    pub fn new(server_url: impl Into<String>, website_id: impl Into<WebsiteId>) -> Self {
        Self {
            server_url: server_url.into(),
            website_id: website_id.into(),
            widgets: Vec::new(),
            connection: ConnectionOptions::default(),
            tracker: TrackerOptions::default(),
        }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the JSON does not describe a host configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("invalid host config: {e}")))
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Config`] if its contents are invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

// ============================================================================
// Duration Serialization
// ============================================================================

/// `serde(with = ..)` adapter for durations as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
