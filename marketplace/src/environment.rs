//! Marketplace environment.
//!
//! Injected dependencies for the three engines.

use crate::config::SyncConfig;
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use marketplace_sync_core::DateTime;
use marketplace_sync_core::Utc;
use marketplace_sync_core::environment::{Clock, SystemClock};
use std::sync::Arc;

/// Marketplace environment.
///
/// # Type Parameters
///
/// - `G`: Remote data gateway
/// - `K`: Persisted key-value store
/// - `C`: Catalog cache
#[derive(Clone)]
pub struct MarketplaceEnvironment<G, K, C>
where
    G: RemoteGateway + Clone,
    K: KeyValueStore + Clone,
    C: CatalogCache + Clone,
{
    /// Remote data gateway.
    pub gateway: G,

    /// Persisted credential storage.
    pub storage: K,

    /// Read-only stock cache.
    pub catalog: C,

    /// Time source (cart line ordering).
    pub clock: Arc<dyn Clock>,

    /// Client configuration.
    pub config: SyncConfig,
}

impl<G, K, C> MarketplaceEnvironment<G, K, C>
where
    G: RemoteGateway + Clone,
    K: KeyValueStore + Clone,
    C: CatalogCache + Clone,
{
    /// Create an environment with the system clock and default configuration.
    #[must_use]
    pub fn new(gateway: G, storage: K, catalog: C) -> Self {
        Self {
            gateway,
            storage,
            catalog,
            clock: Arc::new(SystemClock),
            config: SyncConfig::default(),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
