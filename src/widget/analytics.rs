//! Analytics panel widget.

use crate::error::Result;
use crate::protocol::StatsMessage;

use super::container::ContainerRef;
use super::{Widget, WidgetConfig, WidgetData};

/// Registered type name.
pub const WIDGET_TYPE: &str = "analytics";

/// Summary of site-wide engagement averages.
#[derive(Default)]
pub struct AnalyticsPanel {
    stats: Option<StatsMessage>,
    container: Option<ContainerRef>,
}

impl AnalyticsPanel {
    /// Creates an empty panel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self) {
        if let (Some(container), Some(stats)) = (&self.container, &self.stats) {
            container.render(WIDGET_TYPE, &summary(stats));
        }
    }
}

fn summary(stats: &StatsMessage) -> String {
    format!(
        "Active users: {} | Total clicks: {} | Avg scroll: {:.0}% | Avg time: {:.0}s",
        stats.active_users, stats.total_clicks, stats.avg_scroll_percentage, stats.avg_time_on_page
    )
}

impl Widget for AnalyticsPanel {
    fn mount(&mut self, container: ContainerRef) -> Result<()> {
        if let Some(previous) = self.container.replace(container) {
            previous.remove(WIDGET_TYPE);
        }
        self.render();
        Ok(())
    }

    fn update(&mut self, data: &WidgetData) {
        if let WidgetData::Stats(stats) = data {
            self.stats = Some(stats.clone());
            self.render();
        }
    }

    fn unmount(&mut self) {
        if let Some(container) = self.container.take() {
            container.remove(WIDGET_TYPE);
        }
    }
}

/// Factory registered under [`WIDGET_TYPE`]. Takes no options.
///
/// # Errors
///
/// Never fails.
pub fn factory(_config: &WidgetConfig) -> Result<Box<dyn Widget>> {
    Ok(Box::new(AnalyticsPanel::new()))
}
