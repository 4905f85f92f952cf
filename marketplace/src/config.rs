//! Client configuration.
//!
//! Values are supplied by the host application; [`Default`] gives values
//! suitable for a mobile client on a typical network.

use marketplace_sync_runtime::StoreConfig;
use std::time::Duration;

/// Persisted key-value store keys for session credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Access token key.
    ///
    /// Default: `auth_token`
    pub auth_token: String,

    /// Refresh token key.
    ///
    /// Default: `refresh_token`
    pub refresh_token: String,

    /// User id key.
    ///
    /// Default: `user_id`
    pub user_id: String,
}

impl StorageKeys {
    /// All keys, in the order credentials are written.
    #[must_use]
    pub fn all(&self) -> [&str; 3] {
        [&self.auth_token, &self.refresh_token, &self.user_id]
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            auth_token: "auth_token".to_string(),
            refresh_token: "refresh_token".to_string(),
            user_id: "user_id".to_string(),
        }
    }
}

/// Marketplace client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Keys used for persisted credentials.
    pub storage_keys: StorageKeys,

    /// How long a [`Confirmation`](crate::client::Confirmation) waits for its
    /// remote call to settle.
    ///
    /// Default: 10 seconds
    pub confirmation_timeout: Duration,

    /// Timeout for request/response flows (sign-in, sign-out, refresh, checkout).
    ///
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Upper bound on a fresh product fetch before falling back to the
    /// catalog cache.
    ///
    /// Default: 3 seconds
    pub stock_fetch_timeout: Duration,

    /// Store runtime configuration.
    pub store: StoreConfig,
}

impl SyncConfig {
    /// Set the credential storage keys.
    #[must_use]
    pub fn with_storage_keys(mut self, keys: StorageKeys) -> Self {
        self.storage_keys = keys;
        self
    }

    /// Set the confirmation timeout.
    #[must_use]
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the fresh stock fetch timeout.
    #[must_use]
    pub const fn with_stock_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.stock_fetch_timeout = timeout;
        self
    }

    /// Set the store runtime configuration.
    #[must_use]
    pub const fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_keys: StorageKeys::default(),
            confirmation_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            stock_fetch_timeout: Duration::from_secs(3),
            store: StoreConfig::default(),
        }
    }
}
