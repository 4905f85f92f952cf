//! Catalog cache trait.

use crate::types::ProductId;

/// Read-only source of current stock per product.
///
/// Consumed, never written, by the cart engine. Lookups are synchronous and
/// best-effort: `None` means the cache cannot supply a figure.
pub trait CatalogCache: Send + Sync {
    /// Current stock for `product`, if known.
    fn stock(&self, product: &ProductId) -> Option<u32>;
}

impl<T: CatalogCache + ?Sized> CatalogCache for std::sync::Arc<T> {
    fn stock(&self, product: &ProductId) -> Option<u32> {
        (**self).stock(product)
    }
}
