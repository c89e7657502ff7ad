//! Client session and stable client identity.
//!
//! A [`ClientSession`] is created once per host start. Its client id comes
//! from a [`ClientIdStore`] so the same browser instance reports under the
//! same id across reloads.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::connection::ConnectionState;
use crate::error::Result;
use crate::identifiers::{ClientId, WebsiteId};

// ============================================================================
// ClientSession
// ============================================================================

/// Identity and endpoint of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    /// Stable client identifier.
    pub client_id: ClientId,
    /// Tenant site.
    pub website_id: WebsiteId,
    /// Collector endpoint without client query parameters.
    pub server_url: Url,
    /// Connection state at the time the snapshot was taken.
    pub connection_state: ConnectionState,
}

impl ClientSession {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(client_id: ClientId, website_id: WebsiteId, server_url: Url) -> Self {
        Self {
            client_id,
            website_id,
            server_url,
            connection_state: ConnectionState::Disconnected,
        }
    }

    /// Returns the handshake URL: the server URL with `clientId` and
    /// `websiteId` appended to its query.
    #[must_use]
    pub fn connection_url(&self) -> Url {
        let mut url = self.server_url.clone();
        url.query_pairs_mut()
            .append_pair("clientId", self.client_id.as_str())
            .append_pair("websiteId", self.website_id.as_str());
        url
    }
}

// ============================================================================
// ClientIdStore
// ============================================================================

/// Get-or-create storage for the stable client id.
pub trait ClientIdStore: Send + Sync {
    /// Returns the stored id, generating and storing one if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn get_or_create(&self) -> Result<ClientId>;
}

/// Client id kept for the lifetime of the store.
#[derive(Debug, Default)]
pub struct MemoryClientIdStore {
    id: Mutex<Option<ClientId>>,
}

impl MemoryClientIdStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with `id`.
    #[must_use]
    pub fn with_id(id: ClientId) -> Self {
        Self {
            id: Mutex::new(Some(id)),
        }
    }
}

impl ClientIdStore for MemoryClientIdStore {
    fn get_or_create(&self) -> Result<ClientId> {
        Ok(self.id.lock().get_or_insert_with(ClientId::generate).clone())
    }
}

/// Client id persisted as a single line in a file.
///
/// An empty or unreadable-as-text file is replaced with a fresh id.
#[derive(Debug, Clone)]
pub struct FileClientIdStore {
    path: PathBuf,
}

impl FileClientIdStore {
    /// Creates a store backed by `path`. Nothing is read until first use.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing(&self) -> Option<ClientId> {
        let bytes = fs::read(&self.path).ok()?;
        let Ok(text) = String::from_utf8(bytes) else {
            warn!(path = %self.path.display(), "Client id file is not valid UTF-8");
            return None;
        };
        let id = text.trim();
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            warn!(path = %self.path.display(), "Client id file is corrupt");
            return None;
        }
        Some(ClientId::new(id))
    }
}

impl ClientIdStore for FileClientIdStore {
    fn get_or_create(&self) -> Result<ClientId> {
        if let Some(id) = self.read_existing() {
            debug!(client_id = %id, "Loaded client id");
            return Ok(id);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let id = ClientId::generate();
        fs::write(&self.path, id.as_str())?;
        debug!(client_id = %id, path = %self.path.display(), "Generated client id");
        Ok(id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    fn session(server: &str) -> ClientSession {
        ClientSession::new(
            ClientId::new("c-1"),
            WebsiteId::new("W1"),
            Url::parse(server).expect("url"),
        )
    }

    #[test]
    fn test_connection_url_appends_ids() {
        let url = session("wss://collector.test/ws").connection_url();
        assert_eq!(url.as_str(), "wss://collector.test/ws?clientId=c-1&websiteId=W1");
    }

    #[test]
    fn test_connection_url_preserves_query() {
        let url = session("ws://collector.test/ws?v=2").connection_url();
        assert_eq!(url.as_str(), "ws://collector.test/ws?v=2&clientId=c-1&websiteId=W1");
    }

    #[test]
    fn test_new_session_is_disconnected() {
        assert_eq!(
            session("ws://collector.test/").connection_state,
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_memory_store_is_stable() {
        let store = MemoryClientIdStore::new();
        let first = store.get_or_create().expect("id");
        let second = store.get_or_create().expect("id");
        assert_eq!(first, second);

        let seeded = MemoryClientIdStore::with_id(ClientId::new("fixed"));
        assert_eq!(seeded.get_or_create().expect("id").as_str(), "fixed");
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("client-id");

        let first = FileClientIdStore::new(&path).get_or_create().expect("id");
        let second = FileClientIdStore::new(&path).get_or_create().expect("id");

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&path).expect("read"), first.as_str());
    }

    #[test]
    fn test_file_store_regenerates_corrupt_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("client-id");

        fs::write(&path, "").expect("write");
        let from_empty = FileClientIdStore::new(&path).get_or_create().expect("id");
        assert!(!from_empty.as_str().is_empty());

        fs::write(&path, [0xff, 0xfe, 0x00]).expect("write");
        let from_garbage = FileClientIdStore::new(&path).get_or_create().expect("id");
        assert_ne!(from_garbage, from_empty);
        assert_eq!(fs::read_to_string(&path).expect("read"), from_garbage.as_str());
    }
}
