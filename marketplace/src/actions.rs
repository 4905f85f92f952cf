//! Actions for the three engines.
//!
//! User intents and remote results are both actions. Intents are sent by the
//! [`MarketplaceClient`](crate::client::MarketplaceClient); results are
//! produced by effects and fed back through the store.

use crate::optimistic::{OpId, RemoteOutcome};
use crate::types::{
    AuthNotification, CartLineItem, Credentials, FavoriteEntry, FavoriteKey, OrderReceipt,
    ProductId, ProductSnapshot, RequestId, Session, StockReading, UserId,
};

/// Top-level action routed by [`AppReducer`](crate::reducers::AppReducer).
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Session lifecycle.
    Session(SessionAction),
    /// Favorite membership.
    Favorites(FavoritesAction),
    /// Cart consistency.
    Cart(CartAction),
}

/// Why a request/response flow failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The flow needs an active session and there is none.
    NoSession,
    /// The gateway call failed.
    Remote(String),
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// Session lifecycle actions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Restore credentials from storage. Only the first dispatch does anything.
    LoadPersisted,

    /// Storage read finished. `None` when nothing (or only part) was persisted.
    PersistedLoaded {
        /// Restored session
        session: Option<Session>,
    },

    /// The gateway answered whether a restored session is still valid.
    RemoteSessionChecked {
        /// User that was restored from storage
        restored: UserId,
        /// Remote view of the session
        result: Result<Option<Session>, String>,
    },

    /// Delivery from the remote auth event stream.
    RemoteAuthEvent(AuthNotification),

    /// Explicit sign-in.
    SignIn {
        /// Correlation id
        request: RequestId,
        /// Credentials to exchange
        credentials: Credentials,
    },

    /// Sign-in finished.
    SignInCompleted {
        /// Correlation id
        request: RequestId,
        /// New session or failure
        result: Result<Session, RequestError>,
    },

    /// Explicit sign-out. Local state is cleared immediately.
    SignOut {
        /// Correlation id
        request: RequestId,
    },

    /// Remote sign-out finished.
    SignOutCompleted {
        /// Correlation id
        request: RequestId,
        /// Remote result
        result: Result<(), RequestError>,
    },

    /// Force a token refresh.
    RefreshToken {
        /// Correlation id
        request: RequestId,
    },

    /// Token refresh finished.
    RefreshCompleted {
        /// Correlation id
        request: RequestId,
        /// Refreshed session or failure
        result: Result<Session, RequestError>,
    },
}

// ═══════════════════════════════════════════════════════════════════════
// Favorites
// ═══════════════════════════════════════════════════════════════════════

/// Favorite membership actions.
#[derive(Debug, Clone, PartialEq)]
pub enum FavoritesAction {
    /// Invert membership of `entry.key`.
    Toggle {
        /// Entry to add if currently absent
        entry: FavoriteEntry,
    },

    /// Ensure `entry.key` is present.
    Add {
        /// Entry to add
        entry: FavoriteEntry,
    },

    /// Ensure `key` is absent.
    Remove {
        /// Key to remove
        key: FavoriteKey,
    },

    /// A remote add/remove settled.
    RemoteResolved {
        /// Key the operation targeted
        key: FavoriteKey,
        /// Operation id
        op: OpId,
        /// Remote answer
        outcome: RemoteOutcome,
    },

    /// Load the remote favorites of `owner`.
    Refresh {
        /// New owner
        owner: UserId,
    },

    /// Remote listing arrived.
    Hydrated {
        /// Owner the listing belongs to
        owner: UserId,
        /// Listing or failure
        result: Result<Vec<FavoriteEntry>, String>,
    },

    /// Drop all user-scoped favorites (sign-out, user switch).
    UserDataCleared,
}

// ═══════════════════════════════════════════════════════════════════════
// Cart
// ═══════════════════════════════════════════════════════════════════════

/// How a quantity request relates to the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Set the quantity outright.
    Set(i64),
    /// Add `delta` to the current quantity (0 for a new line).
    By(i64),
    /// Re-run the stock policy at the current quantity.
    Revalidate,
}

/// Why checkout did not place an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutFailure {
    /// No session, or the cart belongs to someone else.
    Denied,
    /// Nothing to order.
    EmptyCart,
    /// Lines exceed live stock.
    Blocked(Vec<ProductId>),
    /// The service refused the order.
    Remote(String),
}

/// Cart actions.
#[derive(Debug, Clone, PartialEq)]
pub enum CartAction {
    /// Change the quantity of a product's line.
    SetQuantity {
        /// Cart owner
        owner: UserId,
        /// Product
        product_id: ProductId,
        /// Requested change
        change: QuantityChange,
        /// Stock resolved before dispatch
        stock: StockReading,
        /// Display data; required to create a new line
        snapshot: Option<ProductSnapshot>,
    },

    /// Delete a product's line.
    Remove {
        /// Cart owner
        owner: UserId,
        /// Product
        product_id: ProductId,
    },

    /// Delete every line, remotely as well as locally.
    Clear {
        /// Cart owner
        owner: UserId,
    },

    /// A remote line write settled.
    RemoteResolved {
        /// Line key
        product_id: ProductId,
        /// Operation id
        op: OpId,
        /// Remote answer
        outcome: RemoteOutcome,
    },

    /// Place an order for the current lines.
    Checkout {
        /// Cart owner
        owner: UserId,
        /// Correlation id
        request: RequestId,
    },

    /// Checkout finished.
    CheckoutCompleted {
        /// Correlation id
        request: RequestId,
        /// Receipt or failure
        result: Result<OrderReceipt, CheckoutFailure>,
    },

    /// Load the remote cart of `owner`.
    Refresh {
        /// New owner
        owner: UserId,
    },

    /// Remote cart arrived.
    Hydrated {
        /// Owner the cart belongs to
        owner: UserId,
        /// Lines or failure
        result: Result<Vec<CartLineItem>, String>,
    },

    /// Drop all user-scoped cart data (sign-out, user switch).
    UserDataCleared,
}
