//! Local client state.
//!
//! Each engine is the single writer of its slice; the others only read it.

use crate::optimistic::{Issue, OpId, OptimisticMap};
use crate::providers::CatalogCache;
use crate::types::{
    CartLineItem, FavoriteEntry, FavoriteKey, ItemId, ItemType, LineStaleness, ProductId,
    QuantityOutcome, Session, StalenessStatus, UserId,
};

/// Whole-client state held by the store.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Written by the session engine.
    pub session: SessionState,
    /// Written by the favorites engine.
    pub favorites: FavoritesState,
    /// Written by the cart engine.
    pub cart: CartState,
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// Progress of the one-shot credential restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreStatus {
    /// Not requested yet.
    #[default]
    NotStarted,
    /// Reading storage.
    InProgress,
    /// Finished (whether or not anything was found).
    Done,
}

/// Authenticated session state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Active session, if any.
    pub current: Option<Session>,
    /// Restore progress.
    pub restore: RestoreStatus,
}

impl SessionState {
    /// Active user.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.current.as_ref().map(|session| &session.user_id)
    }

    /// Whether a session is active.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Favorites
// ═══════════════════════════════════════════════════════════════════════

/// Favorite membership set of the current owner.
#[derive(Debug, Clone, Default)]
pub struct FavoritesState {
    /// User the set belongs to. Mutations for anyone else are refused.
    pub owner: Option<UserId>,
    /// Membership, keyed by (owner, item type, item id).
    pub entries: OptimisticMap<FavoriteKey, FavoriteEntry>,
    /// What the most recent mutation did.
    pub last_issue: Issue,
}

impl FavoritesState {
    /// Empty set owned by `owner`.
    #[must_use]
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Whether the current owner has favorited the item.
    #[must_use]
    pub fn is_favorite(&self, item_type: ItemType, item_id: &ItemId) -> bool {
        self.owner.as_ref().is_some_and(|owner| {
            self.entries.contains_key(&FavoriteKey {
                owner: owner.clone(),
                item_type,
                item_id: item_id.clone(),
            })
        })
    }

    /// Visible entries.
    pub fn entries(&self) -> impl Iterator<Item = &FavoriteEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Cart
// ═══════════════════════════════════════════════════════════════════════

/// Cart of the current owner.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    /// User the cart belongs to. Mutations for anyone else are refused.
    pub owner: Option<UserId>,
    /// Line items keyed by product.
    pub lines: OptimisticMap<ProductId, CartLineItem>,
    /// What the most recent single-line mutation did.
    pub last_issue: Issue,
    /// Operations issued by the most recent clear.
    pub last_batch: Vec<OpId>,
    /// Policy result of the most recent quantity change.
    pub last_outcome: Option<QuantityOutcome>,
}

impl CartState {
    /// Empty cart owned by `owner`.
    #[must_use]
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Line items in the order they were added.
    #[must_use]
    pub fn line_items(&self) -> Vec<&CartLineItem> {
        let mut lines: Vec<&CartLineItem> = self.lines.iter().map(|(_, line)| line).collect();
        lines.sort_by(|a, b| {
            a.added_at
                .cmp(&b.added_at)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        lines
    }

    /// Line for `product`.
    #[must_use]
    pub fn line(&self, product: &ProductId) -> Option<&CartLineItem> {
        self.lines.get(product)
    }

    /// Classify every line against live stock. Pure; unknown stock is ok.
    #[must_use]
    pub fn staleness(&self, catalog: &impl CatalogCache) -> Vec<LineStaleness> {
        self.line_items()
            .into_iter()
            .map(|line| LineStaleness {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                status: classify(line.quantity, catalog.stock(&line.product_id)),
            })
            .collect()
    }

    /// Products whose lines fail the checkout gate.
    #[must_use]
    pub fn stale_lines(&self, catalog: &impl CatalogCache) -> Vec<ProductId> {
        self.staleness(catalog)
            .into_iter()
            .filter(|line| !line.is_ok())
            .map(|line| line.product_id)
            .collect()
    }

    /// Every line is ok. An empty cart passes; checkout refuses it separately.
    #[must_use]
    pub fn can_checkout(&self, catalog: &impl CatalogCache) -> bool {
        self.staleness(catalog).iter().all(LineStaleness::is_ok)
    }
}

fn classify(quantity: u32, stock: Option<u32>) -> StalenessStatus {
    match stock {
        None => StalenessStatus::Ok,
        Some(0) => StalenessStatus::OutOfStock,
        Some(stock) if quantity > stock => StalenessStatus::InsufficientStock(stock),
        Some(_) => StalenessStatus::Ok,
    }
}
