//! Activity tracker timing configuration.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::error::{Error, Result};

// ============================================================================
// TrackerOptions
// ============================================================================

/// Timing configuration for an [`ActivityTracker`](super::ActivityTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerOptions {
    /// Period of the regular flush.
    #[serde(with = "duration_ms")]
    pub flush_interval: Duration,

    /// Quiet time after the last click or scroll before an extra flush.
    #[serde(with = "duration_ms")]
    pub inactivity_timeout: Duration,

    /// Minimum spacing between two accepted scroll signals.
    #[serde(with = "duration_ms")]
    pub scroll_throttle: Duration,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerOptions {
    /// Creates options with the default timings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flush_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(60),
            scroll_throttle: Duration::from_millis(200),
        }
    }

    /// Sets the flush period.
    #[inline]
    #[must_use]
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the inactivity timeout.
    #[inline]
    #[must_use]
    pub const fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Sets the scroll throttle.
    #[inline]
    #[must_use]
    pub const fn with_scroll_throttle(mut self, throttle: Duration) -> Self {
        self.scroll_throttle = throttle;
        self
    }

    /// Validates the timings.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the flush interval or inactivity timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(Error::config("flushInterval must be greater than zero"));
        }
        if self.inactivity_timeout.is_zero() {
            return Err(Error::config("inactivityTimeout must be greater than zero"));
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
        let options = TrackerOptions::default();
        assert_eq!(options.flush_interval, Duration::from_secs(30));
        assert_eq!(options.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(options.scroll_throttle, Duration::from_millis(200));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_throttle_is_allowed() {
        let options = TrackerOptions::new().with_scroll_throttle(Duration::ZERO);
        assert!(options.validate().is_ok());
        assert!(
            TrackerOptions::new()
                .with_flush_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
