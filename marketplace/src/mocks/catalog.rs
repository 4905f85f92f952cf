//! Mock catalog cache for testing.

use crate::providers::CatalogCache;
use crate::types::ProductId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Mock catalog cache.
///
/// Stock figures are set by the test; unknown products report `None`.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    stock: Arc<Mutex<HashMap<ProductId, u32>>>,
}

impl MockCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cached stock of a product.
    pub fn set_stock(&self, product: impl Into<ProductId>, stock: u32) {
        self.stock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.into(), stock);
    }

    /// Forget a product's stock (cache miss).
    pub fn forget(&self, product: &ProductId) {
        self.stock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(product);
    }
}

impl CatalogCache for MockCatalog {
    fn stock(&self, product: &ProductId) -> Option<u32> {
        self.stock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product)
            .copied()
    }
}
