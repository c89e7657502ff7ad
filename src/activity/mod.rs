//! Visitor activity sampling.
//!
//! The embedding page feeds raw [`PageSignal`]s into an [`ActivityTracker`].
//! The tracker folds them into one [`ActivityMetrics`] snapshot and hands it
//! to an [`ActivitySink`] (normally the
//! [`ConnectionManager`](crate::ConnectionManager)):
//!
//! - every `flush_interval` (default 30s)
//! - after `inactivity_timeout` (default 60s) without clicks or scrolls
//! - immediately when the page becomes hidden
//! - once more on [`ActivityTracker::stop`]
//!
//! A snapshot is only handed over while the sink is open. Skipped snapshots
//! are not buffered; their clicks stay counted until a flush goes through.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::protocol::ActivityMetrics;

// ============================================================================
// Submodules
// ============================================================================

/// Tracker timing configuration.
pub mod options;

/// Raw page signals.
pub mod signal;

/// Activity tracker.
pub mod tracker;

// ============================================================================
// Re-exports
// ============================================================================

pub use options::TrackerOptions;
pub use signal::{PageSignal, Visibility};
pub use tracker::ActivityTracker;

// ============================================================================
// ActivitySink
// ============================================================================

/// Destination for activity snapshots.
pub trait ActivitySink: Send + Sync + 'static {
    /// Returns `true` if a snapshot would be delivered right now.
    fn is_open(&self) -> bool;

    /// Delivers one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be queued.
    fn send_activity(&self, metrics: ActivityMetrics) -> Result<()>;
}
