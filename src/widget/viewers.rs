//! Viewer counter widget.
//!
//! Renders how many visitors are on the site right now.
//!
//! | Option | Type | Default | Meaning |
//! |--------|------|---------|---------|
//! | `minViewers` | integer | 0 | hide the counter below this many viewers |

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;

use super::container::ContainerRef;
use super::{Widget, WidgetConfig, WidgetData};

// ============================================================================
// ViewerCounter
// ============================================================================

/// Registered type name.
pub const WIDGET_TYPE: &str = "viewers";

/// Shows "N people are viewing this page".
#[derive(Default)]
pub struct ViewerCounter {
    min_viewers: u64,
    viewers: Option<u64>,
    container: Option<ContainerRef>,
}

impl ViewerCounter {
    /// Creates a counter from its configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::WidgetInit`](crate::Error::WidgetInit) if `minViewers` is
    ///   not a non-negative integer
    pub fn from_config(config: &WidgetConfig) -> Result<Self> {
        Ok(Self {
            min_viewers: config.option("minViewers")?.unwrap_or(0),
            ..Self::default()
        })
    }

    fn render(&self) {
        let (Some(container), Some(viewers)) = (&self.container, self.viewers) else {
            return;
        };

        if viewers < self.min_viewers || viewers == 0 {
            container.remove(WIDGET_TYPE);
            return;
        }

        let text = if viewers == 1 {
            "1 person is viewing this page".to_string()
        } else {
            format!("{viewers} people are viewing this page")
        };
        container.render(WIDGET_TYPE, &text);
    }
}

impl Widget for ViewerCounter {
    fn mount(&mut self, container: ContainerRef) -> Result<()> {
        if let Some(previous) = self.container.replace(container) {
            previous.remove(WIDGET_TYPE);
        }
        self.render();
        Ok(())
    }

    fn update(&mut self, data: &WidgetData) {
        if let WidgetData::Stats(stats) = data {
            self.viewers = Some(stats.active_users);
            self.render();
        }
    }

    fn unmount(&mut self) {
        if let Some(container) = self.container.take() {
            container.remove(WIDGET_TYPE);
        }
    }
}

/// Factory registered under [`WIDGET_TYPE`].
///
/// # Errors
///
/// See [`ViewerCounter::from_config`].
pub fn factory(config: &WidgetConfig) -> Result<Box<dyn Widget>> {
    Ok(Box::new(ViewerCounter::from_config(config)?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    use crate::protocol::StatsMessage;
    use crate::widget::container::MemoryContainer;

    fn stats(active_users: u64) -> WidgetData {
        WidgetData::Stats(StatsMessage {
            active_users,
            ..StatsMessage::default()
        })
    }

    #[test]
    fn test_renders_active_users() {
        let container = MemoryContainer::shared("root");
        let mut widget = ViewerCounter::from_config(&WidgetConfig::new(WIDGET_TYPE)).expect("config");
        widget.mount(Arc::clone(&container) as ContainerRef).expect("mount");
        assert!(container.is_empty());

        widget.update(&stats(5));
        assert_eq!(
            container.content(WIDGET_TYPE).as_deref(),
            Some("5 people are viewing this page")
        );

        widget.update(&stats(1));
        assert_eq!(
            container.content(WIDGET_TYPE).as_deref(),
            Some("1 person is viewing this page")
        );

        widget.unmount();
        assert!(container.is_empty());
    }

    #[test]
    fn test_hidden_below_min_viewers() {
        let container = MemoryContainer::shared("root");
        let config = WidgetConfig::new(WIDGET_TYPE).with_options(json!({ "minViewers": 3 }));
        let mut widget = ViewerCounter::from_config(&config).expect("config");
        widget.mount(Arc::clone(&container) as ContainerRef).expect("mount");

        widget.update(&stats(4));
        assert!(container.content(WIDGET_TYPE).is_some());
        widget.update(&stats(2));
        assert!(container.content(WIDGET_TYPE).is_none());
    }

    #[test]
    fn test_remount_moves_node() {
        let first = MemoryContainer::shared("first");
        let second = MemoryContainer::shared("second");
        let mut widget = ViewerCounter::default();

        widget.mount(Arc::clone(&first) as ContainerRef).expect("mount");
        widget.update(&stats(7));
        widget.mount(Arc::clone(&second) as ContainerRef).expect("remount");

        assert!(first.is_empty());
        assert_eq!(
            second.content(WIDGET_TYPE).as_deref(),
            Some("7 people are viewing this page")
        );
    }

    #[test]
    fn test_invalid_option_rejected() {
        let config = WidgetConfig::new(WIDGET_TYPE).with_options(json!({ "minViewers": "lots" }));
        assert!(ViewerCounter::from_config(&config).is_err());
    }
}
