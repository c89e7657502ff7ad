//! Orchestrator wiring connection, tracker and widgets together.
//!
//! ```text
//! page signals ──► ActivityTracker ──flush──► ConnectionManager ──► collector
//!                                                   │
//!                              stats ◄──────────────┘
//!                                │
//!                                ▼
//!                          WidgetRegistry ──► widgets ──► Container
//! ```
//!
//! # Example
//!
//! ```no_run
//! use livepulse::{MemoryContainer, PageSignal, WidgetConfig, WidgetHost};
//!
//! # async fn example() -> livepulse::Result<()> {
//! let host = WidgetHost::builder()
//!     .server_url("wss://collector.example.com/ws")
//!     .website_id("W1")
//!     .widget(WidgetConfig::new("viewers"))
//!     .container(MemoryContainer::shared("sidebar"))
//!     .build()?;
//!
//! host.start().await;
//! host.record(PageSignal::Click);
//! host.stop().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::activity::{ActivitySink, ActivityTracker, PageSignal, TrackerOptions};
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionOptions, EventHandler, EventKind,
};
use crate::error::Result;
use crate::identifiers::HandlerId;
use crate::session::ClientSession;
use crate::transport::Transport;
use crate::widget::{ContainerRef, WidgetConfig, WidgetData, WidgetFactory, WidgetRegistry};

// ============================================================================
// Submodules
// ============================================================================

/// Fluent host builder.
pub mod builder;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::WidgetHostBuilder;

// ============================================================================
// WidgetHost
// ============================================================================

/// One embedded widget instance on one page.
///
/// Owns exactly one [`ConnectionManager`], one [`ActivityTracker`] and one
/// [`WidgetRegistry`]. Steady-state operations never return errors; failures
/// are logged and surfaced to `error` subscribers of the connection.
pub struct WidgetHost {
    connection: ConnectionManager,
    tracker: ActivityTracker,
    registry: Arc<Mutex<WidgetRegistry>>,
    widgets: Vec<WidgetConfig>,
    /// Stats subscription while started.
    stats_handler: Mutex<Option<HandlerId>>,
}

impl std::fmt::Debug for WidgetHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetHost")
            .field("connection", &self.connection)
            .field("tracker", &self.tracker)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WidgetHost - Construction
// ============================================================================

impl WidgetHost {
    /// Creates a new host builder.
    #[inline]
    #[must_use]
    pub fn builder() -> WidgetHostBuilder {
        WidgetHostBuilder::new()
    }

    /// Builds a host from a loaded configuration with default transport and
    /// client id store.
    ///
    /// # Errors
    ///
    /// See [`WidgetHostBuilder::build`].
    pub fn from_config(config: crate::config::HostConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub(crate) fn assemble(
        session: ClientSession,
        connection_options: ConnectionOptions,
        tracker_options: TrackerOptions,
        transport: Arc<dyn Transport>,
        widgets: Vec<WidgetConfig>,
        factories: Vec<(String, WidgetFactory)>,
        container: Option<ContainerRef>,
    ) -> Self {
        let connection = ConnectionManager::new(session, connection_options, transport);
        let sink: Arc<dyn ActivitySink> = Arc::new(connection.clone());
        let tracker = ActivityTracker::new(sink, tracker_options);

        let mut registry = WidgetRegistry::with_builtin_widgets();
        for (widget_type, factory) in factories {
            registry.register(widget_type, move |config: &WidgetConfig| factory(config));
        }
        if let Some(container) = container {
            registry.set_container(container);
        }

        Self {
            connection,
            tracker,
            registry: Arc::new(Mutex::new(registry)),
            widgets,
            stats_handler: Mutex::new(None),
        }
    }
}

// ============================================================================
// WidgetHost - Lifecycle
// ============================================================================

impl WidgetHost {
    /// Starts the host.
    ///
    /// Initializes the configured widgets, routes `stats` to them, connects
    /// and starts activity tracking. A failed connect is logged; reconnection
    /// continues in the background. No-op if already started.
    pub async fn start(&self) {
        {
            let mut stats_handler = self.stats_handler.lock();
            if stats_handler.is_some() {
                debug!("Widget host already started");
                return;
            }

            let mounted = self.registry.lock().initialize(&self.widgets);
            debug!(mounted, "Widgets ready");

            *stats_handler = Some(self.connection.on(EventKind::Stats, self.stats_router()));
        }

        if let Err(e) = self.connection.connect().await {
            warn!(error = %e, "Initial connection failed");
        }

        self.tracker.start();
        info!(
            client_id = %self.connection.client_id(),
            website_id = %self.connection.website_id(),
            "Widget host started"
        );
    }

    /// Stops the host.
    ///
    /// Stops tracking with a final flush, disconnects and unmounts every
    /// widget. Idempotent.
    pub async fn stop(&self) {
        let handler = self.stats_handler.lock().take();
        let Some(handler) = handler else {
            return;
        };

        self.tracker.stop();
        self.connection.disconnect().await;
        self.connection.off(EventKind::Stats, handler);
        self.registry.lock().clean_up();

        info!("Widget host stopped");
    }

    /// Returns `true` between `start()` and `stop()`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.stats_handler.lock().is_some()
    }

    fn stats_router(&self) -> EventHandler {
        let registry = Arc::clone(&self.registry);
        Arc::new(move |event: &ConnectionEvent| {
            if let ConnectionEvent::Stats(stats) = event {
                registry.lock().update(&WidgetData::Stats(stats.clone()), None);
            }
        })
    }
}

// ============================================================================
// WidgetHost - Page Interaction
// ============================================================================

impl WidgetHost {
    /// Feeds a page signal to the activity tracker.
    #[inline]
    pub fn record(&self, signal: PageSignal) {
        self.tracker.record(signal);
    }

    /// Delivers data to one widget type, or to every active widget.
    pub fn push(&self, data: impl Into<WidgetData>, widget_type: Option<&str>) {
        self.registry.lock().update(&data.into(), widget_type);
    }

    /// Moves the widgets to a new mount point.
    pub fn set_container(&self, container: ContainerRef) {
        self.registry.lock().set_container(container);
    }
}

// ============================================================================
// WidgetHost - Accessors
// ============================================================================

impl WidgetHost {
    /// Returns the connection manager.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Returns the activity tracker.
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Runs `f` with exclusive access to the widget registry.
    ///
    /// Do not call back into the host from `f`.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut WidgetRegistry) -> R) -> R {
        f(&mut self.registry.lock())
    }

    /// Returns the configured widgets.
    #[inline]
    #[must_use]
    pub fn widget_configs(&self) -> &[WidgetConfig] {
        &self.widgets
    }
}
