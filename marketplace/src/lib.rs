//! # Marketplace Sync
//!
//! Client-side state consistency for a marketplace app: who is signed in,
//! what they have favorited, and what is in their cart, kept in step with a
//! remote service that answers late, out of order, or not at all.
//!
//! ## Engines
//!
//! - **Session**: restores persisted credentials once, follows remote auth
//!   events, and relays user changes to the other engines
//! - **Favorites**: optimistic membership per (owner, item type, item id)
//! - **Cart**: stock-clamped quantities, staleness classification and the
//!   checkout gate
//!
//! ## Architecture
//!
//! Every engine is a reducer over its own slice of [`AppState`], composed
//! into one [`AppReducer`](reducers::AppReducer) and driven by a single
//! store:
//!
//! ```text
//! intent ──▶ Reducer ──▶ local state (synchronous) ──▶ remote call (effect)
//!                 ▲                                          │
//!                 └────────── RemoteResolved (feedback) ◀────┘
//! ```
//!
//! Optimistic writes go through [`optimistic::OptimisticMap`]: a failed call
//! is rolled back against the state at the time it fails, so a newer intent
//! on the same key always wins.
//!
//! ## Example
//!
//! ```rust,ignore
//! use marketplace_sync::*;
//!
//! let client = MarketplaceClient::new(MarketplaceEnvironment::new(gateway, storage, catalog));
//! let _listener = client.attach_session_listener();
//! client.load_persisted_session().await?;
//!
//! let outcome = client.set_quantity(ProductId::new("p1"), 5).await?;
//! if let QuantityOutcome::InsufficientStock(stock) = outcome.value {
//!     show_notice(stock);
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod actions;
pub mod bridge;
pub mod client;
pub mod config;
pub mod environment;
pub mod error;
pub mod optimistic;
pub mod providers;
pub mod reducers;
pub mod selectors;
pub mod state;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use actions::{AppAction, CartAction, FavoritesAction, SessionAction};
pub use bridge::{SessionBridge, SessionListener};
pub use client::{Confirmation, MarketplaceClient, Pending};
pub use config::{StorageKeys, SyncConfig};
pub use environment::MarketplaceEnvironment;
pub use error::{GatewayError, Result, StorageError, SyncError};
pub use providers::{CatalogCache, KeyValueStore, RemoteGateway};
pub use state::AppState;
pub use types::{
    AuthEvent, AuthNotification, CartLineItem, Credentials, FavoriteEntry, FavoriteKey, ItemId,
    ItemType, OrderReceipt, ProductId, ProductSnapshot, QuantityOutcome, Session,
    StalenessStatus, StockReading, UserId,
};
