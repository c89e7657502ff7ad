//! TLS crypto provider setup for `wss://` collectors.

use std::sync::OnceLock;

/// Installs the `ring` crypto provider as the process default.
///
/// rustls 0.23 cannot pick a provider on its own once more than one is
/// compiled in. Runs at most once; a provider installed elsewhere wins.
pub(crate) fn install_crypto_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
