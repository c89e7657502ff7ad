//! Purchase toast widget.
//!
//! Shows the most recent [`PurchaseNotice`] and hides it again after
//! `displayMs` milliseconds (default 5000). A newer notice replaces the toast
//! and restarts the timer.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};

use super::container::ContainerRef;
use super::{PurchaseNotice, Widget, WidgetConfig, WidgetData};

// ============================================================================
// PurchaseToast
// ============================================================================

/// Registered type name.
pub const WIDGET_TYPE: &str = "purchases";

const DEFAULT_DISPLAY: Duration = Duration::from_millis(5000);

/// Transient "someone just bought" notification.
pub struct PurchaseToast {
    display: Duration,
    container: Option<ContainerRef>,
    dismiss_timer: Option<JoinHandle<()>>,
}

impl PurchaseToast {
    /// Creates a toast from its configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::WidgetInit`] if `displayMs` is zero or not an integer
    pub fn from_config(config: &WidgetConfig) -> Result<Self> {
        let display_ms: u64 = config
            .option("displayMs")?
            .unwrap_or(DEFAULT_DISPLAY.as_millis() as u64);
        if display_ms == 0 {
            return Err(Error::widget_init(WIDGET_TYPE, "displayMs must be greater than zero"));
        }

        Ok(Self {
            display: Duration::from_millis(display_ms),
            container: None,
            dismiss_timer: None,
        })
    }

    fn show(&mut self, notice: &PurchaseNotice) {
        self.cancel_dismiss();
        let Some(container) = self.container.clone() else {
            return;
        };
        container.render(WIDGET_TYPE, &toast_text(notice));

        let Ok(runtime) = Handle::try_current() else {
            debug!("No runtime, purchase toast stays until replaced");
            return;
        };
        let display = self.display;
        self.dismiss_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(display).await;
            container.remove(WIDGET_TYPE);
        }));
    }

    fn cancel_dismiss(&mut self) {
        if let Some(timer) = self.dismiss_timer.take() {
            timer.abort();
        }
    }
}

fn toast_text(notice: &PurchaseNotice) -> String {
    let customer = notice.customer.as_deref().unwrap_or("Someone");
    match &notice.location {
        Some(location) => format!("{customer} in {location} just bought {}", notice.product),
        None => format!("{customer} just bought {}", notice.product),
    }
}

impl Widget for PurchaseToast {
    fn mount(&mut self, container: ContainerRef) -> Result<()> {
        self.cancel_dismiss();
        if let Some(previous) = self.container.replace(container) {
            previous.remove(WIDGET_TYPE);
        }
        Ok(())
    }

    fn update(&mut self, data: &WidgetData) {
        if let WidgetData::Purchase(notice) = data {
            self.show(notice);
        }
    }

    fn unmount(&mut self) {
        self.cancel_dismiss();
        if let Some(container) = self.container.take() {
            container.remove(WIDGET_TYPE);
        }
    }
}

impl Drop for PurchaseToast {
    fn drop(&mut self) {
        self.cancel_dismiss();
    }
}

/// Factory registered under [`WIDGET_TYPE`].
///
/// # Errors
///
/// See [`PurchaseToast::from_config`].
pub fn factory(config: &WidgetConfig) -> Result<Box<dyn Widget>> {
    Ok(Box::new(PurchaseToast::from_config(config)?))
}

// ============================================================================
// Tests
// ============================================================================
