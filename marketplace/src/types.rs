//! Domain types shared by the three engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Identifier of an authenticated user (issued by the remote service).
    UserId
);

string_id!(
    /// Catalog product identifier.
    ProductId
);

string_id!(
    /// Identifier of a favoritable item (product, farm or service).
    ItemId
);

/// Correlation id for request/response flows (sign-in, sign-out, refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// The locally held proof of authenticated identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User the tokens belong to.
    pub user_id: UserId,
    /// Bearer token for gateway calls.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: String,
    /// Access token expiry, when the service reports one.
    pub expires_at: Option<DateTime<Utc>>,
}

// Tokens never reach logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Email/password credentials for an explicit sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Auth lifecycle events delivered by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session was established.
    SignedIn,
    /// The session ended (locally requested or revoked remotely).
    SignedOut,
    /// Tokens were rotated.
    TokenRefreshed,
    /// A password-recovery flow started. Informational.
    PasswordRecovery,
    /// An event this client does not understand.
    Other(String),
}

/// One delivery on the auth event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthNotification {
    /// What happened.
    pub event: AuthEvent,
    /// Session accompanying the event, if any.
    pub session: Option<Session>,
}

// ═══════════════════════════════════════════════════════════════════════
// Favorites
// ═══════════════════════════════════════════════════════════════════════

/// Kind of item a favorite points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Catalog product.
    Product,
    /// Producer farm.
    Farm,
    /// Bookable service.
    Service,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Product => "product",
            Self::Farm => "farm",
            Self::Service => "service",
        })
    }
}

/// Unique key of a favorite: (owner, item type, item id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FavoriteKey {
    /// User who owns the favorite.
    pub owner: UserId,
    /// Kind of item.
    pub item_type: ItemType,
    /// Item identifier.
    pub item_id: ItemId,
}

impl FavoriteKey {
    /// Create a key.
    #[must_use]
    pub fn new(owner: UserId, item_type: ItemType, item_id: impl Into<ItemId>) -> Self {
        Self {
            owner,
            item_type,
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for FavoriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.item_type, self.item_id)
    }
}

/// A favorite membership with the display data captured when it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    /// Membership key.
    pub key: FavoriteKey,
    /// Opaque display data (name, thumbnail, ...).
    pub snapshot: serde_json::Value,
}

// ═══════════════════════════════════════════════════════════════════════
// Catalog & Cart
// ═══════════════════════════════════════════════════════════════════════

/// Display data for a cart line, captured when the product was added.
///
/// `stock` is whatever the listing showed at the time. It is never used as
/// the stock source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product identifier.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in minor currency units.
    pub price_cents: u64,
    /// Thumbnail URL.
    pub image_url: Option<String>,
    /// Stock shown when the snapshot was taken.
    pub stock: Option<u32>,
}

/// Freshly fetched product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product identifier.
    pub product_id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price in minor currency units.
    pub price_cents: u64,
    /// Current stock.
    pub stock: u32,
}

/// A product in the cart. `quantity` is always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Product identifier (the line key).
    pub product_id: ProductId,
    /// Quantity, always > 0.
    pub quantity: u32,
    /// Display-only data.
    pub snapshot: ProductSnapshot,
    /// When the product was first added.
    pub added_at: DateTime<Utc>,
}

/// Where a stock figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockReading {
    /// Fetched from the gateway for this operation.
    Fresh(u32),
    /// Read from the catalog cache.
    Cached(u32),
    /// No source could supply a figure. Treated as valid.
    Unknown,
}

impl StockReading {
    /// The stock figure, if known.
    #[must_use]
    pub const fn stock(self) -> Option<u32> {
        match self {
            Self::Fresh(stock) | Self::Cached(stock) => Some(stock),
            Self::Unknown => None,
        }
    }
}

/// Result of a quantity change.
///
/// `OutOfStock` and `InsufficientStock` are domain outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityOutcome {
    /// Quantity set as requested.
    Accepted(u32),
    /// Requested more than available; clamped to the contained stock.
    InsufficientStock(u32),
    /// Product has no stock; cart unchanged.
    OutOfStock,
    /// Line removed (requested quantity was zero or less).
    Removed,
    /// The product is not in the cart and no snapshot was supplied.
    NotInCart,
}

impl QuantityOutcome {
    /// Quantity the line holds after this outcome, if the line exists.
    #[must_use]
    pub const fn quantity(self) -> Option<u32> {
        match self {
            Self::Accepted(quantity) | Self::InsufficientStock(quantity) => Some(quantity),
            Self::OutOfStock | Self::Removed | Self::NotInCart => None,
        }
    }
}

/// Classification of a line against live stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessStatus {
    /// Quantity is within stock (or stock unknown).
    Ok,
    /// Quantity exceeds the available stock.
    InsufficientStock(u32),
    /// Product has no stock.
    OutOfStock,
}

/// Staleness of one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStaleness {
    /// Product identifier.
    pub product_id: ProductId,
    /// Quantity in the cart.
    pub quantity: u32,
    /// Classification.
    pub status: StalenessStatus,
}

impl LineStaleness {
    /// Whether the line passes the checkout gate.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, StalenessStatus::Ok)
    }
}

/// A line submitted with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product identifier.
    pub product_id: ProductId,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price shown to the shopper.
    pub unit_price_cents: u64,
}

impl From<&CartLineItem> for OrderLine {
    fn from(line: &CartLineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price_cents: line.snapshot.price_cents,
        }
    }
}

/// Order accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Service-assigned order id.
    pub order_id: String,
    /// Total charged, in minor currency units.
    pub total_cents: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_redacts_tokens() {
        let session = Session {
            user_id: UserId::new("u-1"),
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_at: None,
        };
        let debug = format!("{session:?}");
        assert!(debug.contains("u-1"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn item_type_serializes_lowercase() {
        let json = serde_json::to_string(&ItemType::Farm).unwrap_or_default();
        assert_eq!(json, "\"farm\"");
    }

    #[test]
    fn favorite_key_display() {
        let key = FavoriteKey::new(UserId::new("u"), ItemType::Product, "p-9");
        assert_eq!(key.to_string(), "u/product/p-9");
    }

    #[test]
    fn unknown_stock_has_no_figure() {
        assert_eq!(StockReading::Unknown.stock(), None);
        assert_eq!(StockReading::Cached(4).stock(), Some(4));
    }
}
