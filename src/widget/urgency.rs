//! Urgency banner widget.
//!
//! Shown while the number of active visitors is at or above a threshold.
//!
//! | Option | Type | Default |
//! |--------|------|---------|
//! | `threshold` | integer | 10 |
//! | `message` | string, `{count}` is replaced | `"{count} people are looking at this right now"` |

use crate::error::{Error, Result};

use super::container::ContainerRef;
use super::{Widget, WidgetConfig, WidgetData};

/// Registered type name.
pub const WIDGET_TYPE: &str = "urgency";

const DEFAULT_THRESHOLD: u64 = 10;
const DEFAULT_MESSAGE: &str = "{count} people are looking at this right now";

/// Banner announcing high demand.
pub struct UrgencyBanner {
    threshold: u64,
    message: String,
    active_users: u64,
    container: Option<ContainerRef>,
}

impl UrgencyBanner {
    /// Creates a banner from its configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::WidgetInit`] if `threshold` is zero or an option has the
    ///   wrong type
    pub fn from_config(config: &WidgetConfig) -> Result<Self> {
        let threshold = config.option("threshold")?.unwrap_or(DEFAULT_THRESHOLD);
        if threshold == 0 {
            return Err(Error::widget_init(WIDGET_TYPE, "threshold must be at least 1"));
        }

        Ok(Self {
            threshold,
            message: config
                .option("message")?
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            active_users: 0,
            container: None,
        })
    }

    fn render(&self) {
        let Some(container) = &self.container else {
            return;
        };
        if self.active_users >= self.threshold {
            let text = self.message.replace("{count}", &self.active_users.to_string());
            container.render(WIDGET_TYPE, &text);
        } else {
            container.remove(WIDGET_TYPE);
        }
    }
}

impl Widget for UrgencyBanner {
    fn mount(&mut self, container: ContainerRef) -> Result<()> {
        if let Some(previous) = self.container.replace(container) {
            previous.remove(WIDGET_TYPE);
        }
        self.render();
        Ok(())
    }

    fn update(&mut self, data: &WidgetData) {
        if let WidgetData::Stats(stats) = data {
            self.active_users = stats.active_users;
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
/// See [`UrgencyBanner::from_config`].
pub fn factory(config: &WidgetConfig) -> Result<Box<dyn Widget>> {
    Ok(Box::new(UrgencyBanner::from_config(config)?))
}
