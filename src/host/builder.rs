//! Builder pattern for host configuration.
//!
//! Provides a fluent API for configuring and creating [`WidgetHost`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use livepulse::{WidgetConfig, WidgetHost};
//!
//! # fn example() -> livepulse::Result<()> {
//! let host = WidgetHost::builder()
//!     .server_url("wss://collector.example.com/ws")
//!     .website_id("W1")
//!     .widget(WidgetConfig::new("viewers"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::activity::TrackerOptions;
use crate::config::HostConfig;
use crate::connection::ConnectionOptions;
use crate::error::{Error, Result};
use crate::identifiers::{ClientId, WebsiteId};
use crate::session::{ClientIdStore, ClientSession, MemoryClientIdStore};
use crate::transport::{Transport, TungsteniteTransport};
use crate::widget::{ContainerRef, Widget, WidgetConfig, WidgetFactory};

use super::WidgetHost;

// ============================================================================
// WidgetHostBuilder
// ============================================================================

/// Builder for configuring a [`WidgetHost`].
///
/// Use [`WidgetHost::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct WidgetHostBuilder {
    /// Collector endpoint.
    server_url: Option<String>,
    /// Tenant site.
    website_id: Option<WebsiteId>,
    /// Widgets to initialize on start.
    widgets: Vec<WidgetConfig>,
    /// Connection timings.
    connection_options: ConnectionOptions,
    /// Tracker timings.
    tracker_options: TrackerOptions,
    /// Client id storage; in-memory when unset.
    client_id_store: Option<Arc<dyn ClientIdStore>>,
    /// Socket transport; `tokio-tungstenite` when unset.
    transport: Option<Arc<dyn Transport>>,
    /// Initial mount point.
    container: Option<ContainerRef>,
    /// Widget types registered on top of the built-in ones.
    factories: Vec<(String, WidgetFactory)>,
}

// ============================================================================
// WidgetHostBuilder Implementation
// ============================================================================

impl WidgetHostBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collector endpoint (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Sets the tenant site.
    #[inline]
    #[must_use]
    pub fn website_id(mut self, id: impl Into<WebsiteId>) -> Self {
        self.website_id = Some(id.into());
        self
    }

    /// Adds one widget configuration.
    #[inline]
    #[must_use]
    pub fn widget(mut self, config: WidgetConfig) -> Self {
        self.widgets.push(config);
        self
    }

    /// Adds several widget configurations.
    #[inline]
    #[must_use]
    pub fn widgets(mut self, configs: impl IntoIterator<Item = WidgetConfig>) -> Self {
        self.widgets.extend(configs);
        self
    }

    /// Applies a loaded [`HostConfig`], replacing endpoint, site, widgets
    /// and options.
    #[must_use]
    pub fn config(mut self, config: HostConfig) -> Self {
        self.server_url = Some(config.server_url);
        self.website_id = Some(config.website_id);
        self.widgets = config.widgets;
        self.connection_options = config.connection;
        self.tracker_options = config.tracker;
        self
    }

    /// Sets the connection timings.
    #[inline]
    #[must_use]
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    /// Sets the activity tracker timings.
    #[inline]
    #[must_use]
    pub fn tracker_options(mut self, options: TrackerOptions) -> Self {
        self.tracker_options = options;
        self
    }

    /// Sets where the stable client id is kept.
    ///
    /// Without a store the host uses a [`MemoryClientIdStore`], so every
    /// process start reports a new visitor. Pass a
    /// [`FileClientIdStore`](crate::session::FileClientIdStore) to keep the
    /// id across restarts.
    #[inline]
    #[must_use]
    pub fn client_id_store(mut self, store: impl ClientIdStore + 'static) -> Self {
        self.client_id_store = Some(Arc::new(store));
        self
    }

    /// Sets the socket transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the initial mount point.
    #[inline]
    #[must_use]
    pub fn container(mut self, container: ContainerRef) -> Self {
        self.container = Some(container);
        self
    }

    /// Registers a custom widget type.
    ///
    /// A custom type named like a built-in one replaces it.
    #[must_use]
    pub fn register_widget<F>(mut self, widget_type: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&WidgetConfig) -> Result<Box<dyn Widget>> + Send + Sync + 'static,
    {
        self.factories.push((widget_type.into(), Arc::new(factory)));
        self
    }

    /// Builds the host with validation.
    ///
    /// Without [`client_id_store`](Self::client_id_store) the client id lives
    /// in memory only and is regenerated on every process start. A client id
    /// store that fails falls back to a fresh id for this run.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the server URL or website id is missing
    /// - [`Error::Url`] if the server URL cannot be parsed
    /// - [`Error::Config`] if the URL scheme is not `ws` or `wss`
    /// - [`Error::Config`] if connection or tracker options are invalid
    pub fn build(self) -> Result<WidgetHost> {
        let server_url = self.validate_server_url()?;
        let website_id = self.validate_website_id()?;
        self.connection_options.validate()?;
        self.tracker_options.validate()?;

        let client_id = self.resolve_client_id();
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport::new()));
        let session = ClientSession::new(client_id, website_id, server_url);

        Ok(WidgetHost::assemble(
            session,
            self.connection_options,
            self.tracker_options,
            transport,
            self.widgets,
            self.factories,
            self.container,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl WidgetHostBuilder {
    /// Validates the server URL configuration.
    fn validate_server_url(&self) -> Result<Url> {
        let raw = self.server_url.as_deref().ok_or_else(|| {
            Error::config(
                "Server URL is required. Use .server_url() to set it.\n\
                 Example: WidgetHost::builder().server_url(\"wss://collector.example.com/ws\")",
            )
        })?;

        let url = Url::parse(raw)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Server URL must use ws:// or wss://, got: {}",
                url.scheme()
            )));
        }

        Ok(url)
    }

    /// Validates the website id configuration.
    fn validate_website_id(&self) -> Result<WebsiteId> {
        match &self.website_id {
            Some(id) if !id.is_empty() => Ok(id.clone()),
            _ => Err(Error::config(
                "Website id is required. Use .website_id() to set it.",
            )),
        }
    }

    fn resolve_client_id(&self) -> ClientId {
        let store = self
            .client_id_store
            .clone()
            .unwrap_or_else(|| {
                debug!("No client id store set, client id will not persist");
                Arc::new(MemoryClientIdStore::new())
            });

        store.get_or_create().unwrap_or_else(|e| {
            warn!(error = %e, "Client id store failed, using a temporary id");
            ClientId::generate()
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::session::FileClientIdStore;
    use crate::testing::MockTransport;

    struct BrokenStore;

    impl ClientIdStore for BrokenStore {
        fn get_or_create(&self) -> Result<ClientId> {
            Err(Error::config("storage unavailable"))
        }
    }

    fn builder() -> WidgetHostBuilder {
        WidgetHostBuilder::new()
            .server_url("ws://collector.test/ws")
            .website_id("W1")
            .transport(MockTransport::new())
    }

    #[test]
    fn test_build_fails_without_server_url() {
        let err = WidgetHostBuilder::new().website_id("W1").build().unwrap_err();
        assert!(err.to_string().contains("Server URL"));
    }

    #[test]
    fn test_build_fails_without_website_id() {
        let err = WidgetHostBuilder::new()
            .server_url("ws://collector.test/")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Website id"));

        let err = WidgetHostBuilder::new()
            .server_url("ws://collector.test/")
            .website_id("")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_http_scheme() {
        let err = builder().server_url("https://collector.test/").build().unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn test_build_rejects_unparseable_url() {
        let err = builder().server_url("not a url").build().unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let result = builder()
            .connection_options(ConnectionOptions::new().with_reconnect_delay(Duration::ZERO))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_seeded_client_id_is_used() {
        let host = builder()
            .client_id_store(MemoryClientIdStore::with_id(ClientId::new("c-42")))
            .build()
            .expect("build");
        assert_eq!(host.connection().client_id().as_str(), "c-42");
        assert_eq!(
            host.connection().connection_url().as_str(),
            "ws://collector.test/ws?clientId=c-42&websiteId=W1"
        );
    }

    #[test]
    fn test_default_store_does_not_persist() {
        let first = builder().build().expect("build");
        let second = builder().build().expect("build");
        assert_ne!(
            first.connection().client_id(),
            second.connection().client_id()
        );
    }

    #[test]
    fn test_file_store_persists_across_hosts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client-id");

        let first = builder()
            .client_id_store(FileClientIdStore::new(&path))
            .build()
            .expect("build");
        let second = builder()
            .client_id_store(FileClientIdStore::new(&path))
            .build()
            .expect("build");
        assert_eq!(
            first.connection().client_id(),
            second.connection().client_id()
        );
    }

    #[test]
    fn test_broken_store_falls_back_to_generated_id() {
        let host = builder().client_id_store(BrokenStore).build().expect("build");
        assert!(!host.connection().client_id().as_str().is_empty());
    }

    #[test]
    fn test_config_applies_everything() {
        let config = HostConfig::from_json_str(
            r#"{"serverUrl":"wss://collector.test/ws","websiteId":"W9",
                "widgets":[{"type":"viewers"}],"connection":{"reconnectMaxAttempts":2}}"#,
        )
        .expect("config");

        let host = WidgetHostBuilder::new()
            .config(config)
            .transport(MockTransport::new())
            .build()
            .expect("build");

        assert_eq!(host.connection().website_id().as_str(), "W9");
        assert_eq!(host.connection().options().reconnect_max_attempts, 2);
        assert_eq!(host.widget_configs().len(), 1);
    }
}
