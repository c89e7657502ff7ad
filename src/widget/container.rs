//! Render targets.
//!
//! A [`Container`] is the mount point the host page provides. Widgets write
//! plain text into named nodes; styling is the page's concern.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

// ============================================================================
// Container
// ============================================================================

/// Mount point for widgets.
pub trait Container: Send + Sync {
    /// Returns the container identifier.
    fn id(&self) -> &str;

    /// Creates or replaces the content of `node`.
    fn render(&self, node: &str, content: &str);

    /// Removes `node`. Removing a missing node is a no-op.
    fn remove(&self, node: &str);
}

/// Shared container handle.
pub type ContainerRef = Arc<dyn Container>;

// ============================================================================
// MemoryContainer
// ============================================================================

/// Container that keeps rendered nodes in memory.
///
/// Suited to headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    id: String,
    nodes: Mutex<FxHashMap<String, String>>,
}

impl MemoryContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Creates an empty container behind a shared handle.
    #[must_use]
    pub fn shared(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(id))
    }

    /// Returns the content of `node`.
    #[must_use]
    pub fn content(&self, node: &str) -> Option<String> {
        self.nodes.lock().get(node).cloned()
    }

    /// Returns the rendered node names, sorted.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.nodes.lock().keys().cloned().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Returns `true` if nothing is rendered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

impl Container for MemoryContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn render(&self, node: &str, content: &str) {
        self.nodes.lock().insert(node.to_string(), content.to_string());
    }

    fn remove(&self, node: &str) {
        self.nodes.lock().remove(node);
    }
}
