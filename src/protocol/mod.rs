//! WebSocket protocol message types.
//!
//! This module defines the message format exchanged with the collector.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `join` | Client → Collector | Announce client after open |
//! | `activity` | Client → Collector | Activity snapshot |
//! | `ping` | Client → Collector | Heartbeat probe |
//! | `leave` | Client → Collector | Deliberate goodbye |
//! | `stats` | Collector → Client | Live statistics broadcast |
//! | `pong` | Collector → Client | Heartbeat answer |
//!
//! Messages are flat JSON objects; the `type` field is merged at the top
//! level next to the payload fields.

// ============================================================================
// Submodules
// ============================================================================

/// Collector-to-client messages.
pub mod inbound;

/// Client-to-collector messages.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{ServerMessage, StatsMessage};
pub use outbound::{ActivityMetrics, ClientMessage};
