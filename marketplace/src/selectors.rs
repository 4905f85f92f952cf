//! Derived views for the UI.
//!
//! Pure functions over [`AppState`]; nothing here mutates.

use crate::providers::CatalogCache;
use crate::state::AppState;
use crate::types::{CartLineItem, ItemId, ItemType, LineStaleness, UserId};

/// Whether a session is active.
#[must_use]
pub const fn is_authenticated(state: &AppState) -> bool {
    state.session.is_authenticated()
}

/// Whether the signed-in user has favorited the item.
#[must_use]
pub fn is_favorite(state: &AppState, item_id: &ItemId, item_type: ItemType) -> bool {
    state.favorites.is_favorite(item_type, item_id)
}

/// Cart lines in the order they were added.
#[must_use]
pub fn cart_line_items(state: &AppState) -> Vec<CartLineItem> {
    state.cart.line_items().into_iter().cloned().collect()
}

/// Per-line stock classification.
#[must_use]
pub fn cart_staleness(state: &AppState, catalog: &impl CatalogCache) -> Vec<LineStaleness> {
    state.cart.staleness(catalog)
}

/// Whether the checkout action should be enabled.
#[must_use]
pub fn can_checkout(state: &AppState, catalog: &impl CatalogCache) -> bool {
    state.cart.can_checkout(catalog)
}

/// Everything a render pass needs, read at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot {
    /// Signed-in user.
    pub user_id: Option<UserId>,
    /// Favorited items of that user.
    pub favorites: Vec<(ItemType, ItemId)>,
    /// Cart lines.
    pub cart: Vec<CartLineItem>,
    /// Cart line classification.
    pub staleness: Vec<LineStaleness>,
    /// Checkout gate.
    pub can_checkout: bool,
}

impl UiSnapshot {
    /// Whether a session is active.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether the item is in [`Self::favorites`].
    #[must_use]
    pub fn is_favorite(&self, item_id: &ItemId, item_type: ItemType) -> bool {
        self.favorites
            .iter()
            .any(|(kind, id)| *kind == item_type && id == item_id)
    }
}

/// Build a [`UiSnapshot`].
#[must_use]
pub fn ui_snapshot(state: &AppState, catalog: &impl CatalogCache) -> UiSnapshot {
    UiSnapshot {
        user_id: state.session.user_id().cloned(),
        favorites: state
            .favorites
            .entries()
            .map(|entry| (entry.key.item_type, entry.key.item_id.clone()))
            .collect(),
        cart: cart_line_items(state),
        staleness: cart_staleness(state, catalog),
        can_checkout: can_checkout(state, catalog),
    }
}
