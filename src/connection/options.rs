//! Connection timing configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use livepulse::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_update_interval(Duration::from_secs(5))
//!     .with_reconnect_max_attempts(3);
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default heartbeat period.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Default window without a `pong` before the connection is considered dead.
pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(60);

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay before each reconnection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(20);

/// Default reconnection attempt cap.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 10;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Timing configuration for a [`ConnectionManager`](super::ConnectionManager).
///
/// Deserializes from camelCase JSON with durations in milliseconds; missing
/// fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionOptions {
    /// Heartbeat period while open.
    #[serde(with = "duration_ms")]
    pub update_interval: Duration,

    /// Maximum time without a `pong` before forcing a reconnect.
    #[serde(with = "duration_ms")]
    pub liveness_window: Duration,

    /// Handshake timeout.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Fixed delay before each reconnection attempt.
    #[serde(with = "duration_ms")]
    pub reconnect_delay: Duration,

    /// Maximum consecutive reconnection attempts.
    pub reconnect_max_attempts: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with the default timings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            liveness_window: DEFAULT_LIVENESS_WINDOW,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub const fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Sets the liveness window.
    #[inline]
    #[must_use]
    pub const fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reconnection delay.
    #[inline]
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the reconnection attempt cap.
    #[inline]
    #[must_use]
    pub const fn with_reconnect_max_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_max_attempts = attempts;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Validates the timings.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if any duration is zero
    /// - [`Error::Config`] if the liveness window is shorter than the
    ///   heartbeat period
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("updateInterval", self.update_interval),
            ("livenessWindow", self.liveness_window),
            ("connectTimeout", self.connect_timeout),
            ("reconnectDelay", self.reconnect_delay),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::config(format!("{name} must be greater than zero")));
        }

        if self.liveness_window < self.update_interval {
            return Err(Error::config(
                "livenessWindow must not be shorter than updateInterval",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.update_interval, Duration::from_secs(10));
        assert_eq!(options.liveness_window, Duration::from_secs(60));
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.reconnect_delay, Duration::from_secs(20));
        assert_eq!(options.reconnect_max_attempts, 10);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_methods_chain() {
        let options = ConnectionOptions::new()
            .with_update_interval(Duration::from_secs(1))
            .with_liveness_window(Duration::from_secs(3))
            .with_reconnect_max_attempts(2);

        assert_eq!(options.update_interval, Duration::from_secs(1));
        assert_eq!(options.liveness_window, Duration::from_secs(3));
        assert_eq!(options.reconnect_max_attempts, 2);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let err = ConnectionOptions::new()
            .with_connect_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("connectTimeout"));
    }

    #[test]
    fn test_validate_rejects_short_liveness_window() {
        let result = ConnectionOptions::new()
            .with_liveness_window(Duration::from_secs(5))
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let options: ConnectionOptions =
            serde_json::from_str(r#"{"reconnectDelay":500,"reconnectMaxAttempts":3}"#)
                .expect("deserialize");

        assert_eq!(options.reconnect_delay, Duration::from_millis(500));
        assert_eq!(options.reconnect_max_attempts, 3);
        assert_eq!(options.update_interval, DEFAULT_UPDATE_INTERVAL);
    }
}
