use std::sync::Arc;
use std::time::Instant;

use outpost_config::Config;
use outpost_crypto::keys::RsaPrivateKey;
use outpost_storage::MetricsStore;

/// Server state shared by all handlers and middlewares.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Debug, Clone)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

#[derive(Debug)]
struct StateInner {
    config: Arc<Config>,
    store: Arc<MetricsStore>,
    private_key: Option<RsaPrivateKey>,
    started_at: Instant,
}

impl ServiceState {
    /// Creates the state from the loaded config and an optional private key.
    pub fn new(
        config: Arc<Config>,
        store: Arc<MetricsStore>,
        private_key: Option<RsaPrivateKey>,
    ) -> Self {
        Self {
            inner: Arc::new(StateInner {
                config,
                store,
                private_key,
                started_at: Instant::now(),
            }),
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the metric store.
    pub fn store(&self) -> &MetricsStore {
        &self.inner.store
    }

    /// Returns the RSA private key, if payload encryption is enabled.
    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.inner.private_key.as_ref()
    }

    /// Returns the shared HMAC secret, if payload hashing is enabled.
    pub fn hash_key(&self) -> Option<&[u8]> {
        self.inner.config.hash_key().map(str::as_bytes)
    }

    /// Seconds since the server started.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
