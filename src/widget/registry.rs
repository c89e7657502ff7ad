//! Widget type registry and active instances.
//!
//! # Lifecycle
//!
//! 1. [`register`](WidgetRegistry::register) factories by type
//! 2. [`set_container`](WidgetRegistry::set_container) to pick the mount point
//! 3. [`initialize`](WidgetRegistry::initialize) with the configured widgets
//! 4. [`update`](WidgetRegistry::update) as data arrives
//! 5. [`clean_up`](WidgetRegistry::clean_up) on shutdown
//!
//! After every `initialize()` the active set holds exactly the enabled,
//! registered types whose construction and mount succeeded. One widget's
//! failure or panic never affects its siblings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};

use super::container::ContainerRef;
use super::{Widget, WidgetConfig, WidgetData, WidgetFactory};
use super::{analytics, purchases, urgency, viewers};

// ============================================================================
// WidgetInstance
// ============================================================================

/// A mounted widget.
struct WidgetInstance {
    widget_type: String,
    widget: Box<dyn Widget>,
}

// ============================================================================
// WidgetRegistry
// ============================================================================

/// Registered widget types and the currently mounted instances.
#[derive(Default)]
pub struct WidgetRegistry {
    factories: FxHashMap<String, WidgetFactory>,
    instances: Vec<WidgetInstance>,
    container: Option<ContainerRef>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetRegistry")
            .field("registered", &self.registered_types())
            .field("active", &self.active_types())
            .field("container", &self.container.as_ref().map(|c| c.id().to_string()))
            .finish()
    }
}

// ============================================================================
// WidgetRegistry - Registration
// ============================================================================

impl WidgetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in widget types registered.
    #[must_use]
    pub fn with_builtin_widgets() -> Self {
        let mut registry = Self::new();
        registry.register_builtin_widgets();
        registry
    }

    /// Registers the built-in widget types, replacing same-named entries.
    pub fn register_builtin_widgets(&mut self) {
        self.register(viewers::WIDGET_TYPE, viewers::factory);
        self.register(urgency::WIDGET_TYPE, urgency::factory);
        self.register(analytics::WIDGET_TYPE, analytics::factory);
        self.register(purchases::WIDGET_TYPE, purchases::factory);
    }

    /// Registers a widget factory for `widget_type`.
    ///
    /// An existing registration is replaced with a warning. Returns `true` if
    /// one was replaced.
    pub fn register<F>(&mut self, widget_type: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&WidgetConfig) -> Result<Box<dyn Widget>> + Send + Sync + 'static,
    {
        let widget_type = widget_type.into();
        let factory: WidgetFactory = Arc::new(factory);

        let replaced = self.factories.insert(widget_type.clone(), factory).is_some();
        if replaced {
            warn!(widget_type = %widget_type, "Widget type re-registered, previous factory replaced");
        } else {
            trace!(widget_type = %widget_type, "Widget type registered");
        }
        replaced
    }

    /// Returns `true` if `widget_type` has a factory.
    #[must_use]
    pub fn is_registered(&self, widget_type: &str) -> bool {
        self.factories.contains_key(widget_type)
    }

    /// Returns the registered types, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

// ============================================================================
// WidgetRegistry - Container
// ============================================================================

impl WidgetRegistry {
    /// Sets the mount point and moves active widgets into it.
    ///
    /// A widget that fails to re-mount is logged and stays active.
    pub fn set_container(&mut self, container: ContainerRef) {
        debug!(container = container.id(), "Widget container set");

        for instance in &mut self.instances {
            let target = Arc::clone(&container);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                instance.widget.unmount();
                instance.widget.mount(target)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(widget_type = %instance.widget_type, error = %e, "Widget re-mount failed")
                }
                Err(_) => error!(widget_type = %instance.widget_type, "Widget panicked on re-mount"),
            }
        }

        self.container = Some(container);
    }

    /// Returns the current mount point.
    #[must_use]
    pub fn container(&self) -> Option<&ContainerRef> {
        self.container.as_ref()
    }
}

// ============================================================================
// WidgetRegistry - Lifecycle
// ============================================================================

impl WidgetRegistry {
    /// Replaces the active set with widgets built from `configs`.
    ///
    /// Cleans up first. Disabled entries, unregistered types and repeated
    /// types (first enabled entry wins) are skipped. Construction or mount
    /// failures are logged per widget. Returns the number of mounted widgets.
    pub fn initialize(&mut self, configs: &[WidgetConfig]) -> usize {
        self.clean_up();

        let mut seen = FxHashSet::default();
        for config in configs {
            let widget_type = config.widget_type.as_str();

            if !config.enabled {
                trace!(widget_type, "Widget disabled");
                continue;
            }
            if seen.contains(widget_type) {
                warn!(widget_type, "Duplicate widget config skipped");
                continue;
            }
            let Some(factory) = self.factories.get(widget_type).map(Arc::clone) else {
                warn!(widget_type, "Widget type not registered");
                continue;
            };
            seen.insert(widget_type.to_string());

            match self.instantiate(&factory, config) {
                Ok(widget) => {
                    debug!(widget_type, "Widget mounted");
                    self.instances.push(WidgetInstance {
                        widget_type: widget_type.to_string(),
                        widget,
                    });
                }
                Err(e) => error!(widget_type, error = %e, "Widget initialization failed"),
            }
        }

        info!(active = self.instances.len(), configured = configs.len(), "Widgets initialized");
        self.instances.len()
    }

    /// Delivers `data` to one widget type, or to every active widget.
    ///
    /// A targeted update for an inactive type is a no-op.
    pub fn update(&mut self, data: &WidgetData, widget_type: Option<&str>) {
        for instance in &mut self.instances {
            if widget_type.is_some_and(|target| target != instance.widget_type) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| instance.widget.update(data))).is_err() {
                error!(widget_type = %instance.widget_type, "Widget panicked on update");
            }
        }
    }

    /// Unmounts and discards every active widget. Idempotent.
    pub fn clean_up(&mut self) {
        for mut instance in self.instances.drain(..) {
            if catch_unwind(AssertUnwindSafe(|| instance.widget.unmount())).is_err() {
                error!(widget_type = %instance.widget_type, "Widget panicked on unmount");
            } else {
                trace!(widget_type = %instance.widget_type, "Widget unmounted");
            }
        }
    }

    /// Returns the active widget types in initialization order.
    #[must_use]
    pub fn active_types(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.widget_type.as_str()).collect()
    }

    /// Returns `true` if a widget of `widget_type` is mounted.
    #[must_use]
    pub fn is_active(&self, widget_type: &str) -> bool {
        self.instances.iter().any(|i| i.widget_type == widget_type)
    }

    /// Builds and mounts one widget, containing panics.
    fn instantiate(&self, factory: &WidgetFactory, config: &WidgetConfig) -> Result<Box<dyn Widget>> {
        let widget_type = config.widget_type.as_str();
        let container = self
            .container
            .clone()
            .ok_or_else(|| Error::widget_init(widget_type, "no container set"))?;

        catch_unwind(AssertUnwindSafe(|| {
            let mut widget = factory(config)?;
            widget.mount(container)?;
            Ok(widget)
        }))
        .unwrap_or_else(|_| Err(Error::widget_init(widget_type, "panicked during initialization")))
    }
}

impl Drop for WidgetRegistry {
    fn drop(&mut self) {
        self.clean_up();
    }
}

// ============================================================================
// Tests
// ============================================================================
