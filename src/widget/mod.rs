//! Pluggable UI widgets.
//!
//! A [`Widget`] consumes [`WidgetData`] and renders plain text into nodes of
//! a [`Container`]. Widget types are registered with a
//! [`WidgetRegistry`] as factories and instantiated from [`WidgetConfig`]s.
//!
//! # Built-in widgets
//!
//! | Type | Widget | Data |
//! |------|--------|------|
//! | `viewers` | [`ViewerCounter`] | `stats.activeUsers` |
//! | `urgency` | [`UrgencyBanner`] | `stats.activeUsers` over a threshold |
//! | `analytics` | [`AnalyticsPanel`] | clicks, scroll and time averages |
//! | `purchases` | [`PurchaseToast`] | [`PurchaseNotice`] pushed by the host |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::StatsMessage;

// ============================================================================
// Submodules
// ============================================================================

/// Analytics panel widget.
pub mod analytics;

/// Render targets.
pub mod container;

/// Purchase toast widget.
pub mod purchases;

/// Widget type registry and active instances.
pub mod registry;

/// Urgency banner widget.
pub mod urgency;

/// Viewer counter widget.
pub mod viewers;

// ============================================================================
// Re-exports
// ============================================================================

pub use analytics::AnalyticsPanel;
pub use container::{Container, ContainerRef, MemoryContainer};
pub use purchases::PurchaseToast;
pub use registry::WidgetRegistry;
pub use urgency::UrgencyBanner;
pub use viewers::ViewerCounter;

// ============================================================================
// Widget
// ============================================================================

/// A mounted UI component.
pub trait Widget: Send {
    /// Attaches the widget to `container` and renders its current state.
    ///
    /// Mounting again without [`unmount`](Self::unmount) moves the widget to
    /// the new container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WidgetInit`] if the widget cannot render.
    fn mount(&mut self, container: ContainerRef) -> Result<()>;

    /// Consumes inbound data. Irrelevant data is ignored.
    fn update(&mut self, data: &WidgetData);

    /// Removes every node and cancels every timer the widget created.
    fn unmount(&mut self);
}

/// Constructs a widget from its configuration.
pub type WidgetFactory = Arc<dyn Fn(&WidgetConfig) -> Result<Box<dyn Widget>> + Send + Sync>;

// ============================================================================
// WidgetData
// ============================================================================

/// A purchase to announce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseNotice {
    /// Product name.
    pub product: String,
    /// Where the buyer is, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Buyer display name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

impl PurchaseNotice {
    /// Creates a notice for `product`.
    #[must_use]
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            location: None,
            customer: None,
        }
    }

    /// Sets the buyer location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the buyer display name.
    #[must_use]
    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }
}

/// Data fanned out to widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetData {
    /// Live statistics from the collector.
    Stats(StatsMessage),
    /// A purchase pushed by the host page.
    Purchase(PurchaseNotice),
}

impl From<StatsMessage> for WidgetData {
    fn from(stats: StatsMessage) -> Self {
        Self::Stats(stats)
    }
}

impl From<PurchaseNotice> for WidgetData {
    fn from(notice: PurchaseNotice) -> Self {
        Self::Purchase(notice)
    }
}

// ============================================================================
// WidgetConfig
// ============================================================================

/// Configuration of one widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Registered widget type.
    #[serde(rename = "type")]
    pub widget_type: String,

    /// Disabled widgets are skipped by `initialize()`.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Widget-specific options.
    #[serde(default)]
    pub options: Value,
}

fn enabled_by_default() -> bool {
    true
}

impl WidgetConfig {
    /// Creates an enabled configuration without options.
    #[must_use]
    pub fn new(widget_type: impl Into<String>) -> Self {
        Self {
            widget_type: widget_type.into(),
            enabled: true,
            options: Value::Null,
        }
    }

    /// Replaces the options object.
    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    /// Marks the configuration as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Reads one option. Missing and `null` options are `None`.
    ///
    /// # Errors
    ///
    /// - [`Error::WidgetInit`] if the option has the wrong shape
    pub fn option<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                Error::widget_init(&self.widget_type, format!("invalid option '{key}': {e}"))
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
