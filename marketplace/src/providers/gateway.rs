//! Remote data gateway trait.

use crate::error::GatewayResult;
use crate::types::{
    AuthNotification, CartLineItem, Credentials, FavoriteEntry, FavoriteKey, OrderLine,
    OrderReceipt, ProductId, ProductRecord, Session, UserId,
};
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// The backend boundary: auth, catalog and persistence operations.
///
/// Every call resolves to a value or a [`GatewayError`](crate::error::GatewayError);
/// nothing panics across this boundary. Calls are made while the caller holds
/// local state, so implementations should only *start* the request in the
/// method body and do the work inside the returned future.
pub trait RemoteGateway: Send + Sync {
    // ═══════════════════════════════════════════════════════════
    // Auth
    // ═══════════════════════════════════════════════════════════

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` for bad credentials
    /// - `Network` if the service is unreachable
    fn sign_in(&self, credentials: Credentials) -> BoxFuture<'static, GatewayResult<Session>>;

    /// End the remote session.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the service is unreachable.
    fn sign_out(&self) -> BoxFuture<'static, GatewayResult<()>>;

    /// Rotate tokens for the current session.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the refresh token was revoked.
    fn refresh_session(&self) -> BoxFuture<'static, GatewayResult<Session>>;

    /// The session the service currently considers active, if any.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the service is unreachable.
    fn get_session(&self) -> BoxFuture<'static, GatewayResult<Option<Session>>>;

    /// Auth lifecycle events. Dropping the stream unsubscribes.
    fn auth_events(&self) -> BoxStream<'static, AuthNotification>;

    // ═══════════════════════════════════════════════════════════
    // Favorites
    // ═══════════════════════════════════════════════════════════

    /// Add a favorite membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses or is unreachable.
    fn add_favorite(&self, entry: FavoriteEntry) -> BoxFuture<'static, GatewayResult<()>>;

    /// Remove a favorite membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses or is unreachable.
    fn remove_favorite(&self, key: FavoriteKey) -> BoxFuture<'static, GatewayResult<()>>;

    /// All favorites of `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses or is unreachable.
    fn list_favorites(&self, owner: UserId) -> BoxFuture<'static, GatewayResult<Vec<FavoriteEntry>>>;

    // ═══════════════════════════════════════════════════════════
    // Catalog & Cart
    // ═══════════════════════════════════════════════════════════

    /// Fresh product record, including current stock.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown products.
    fn get_product_by_id(&self, product: ProductId) -> BoxFuture<'static, GatewayResult<ProductRecord>>;

    /// Persist a cart line quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses or is unreachable.
    fn persist_cart_line(
        &self,
        owner: UserId,
        product: ProductId,
        quantity: u32,
    ) -> BoxFuture<'static, GatewayResult<()>>;

    /// Delete a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses or is unreachable.
    fn remove_cart_line(&self, owner: UserId, product: ProductId) -> BoxFuture<'static, GatewayResult<()>>;

    /// The persisted cart of `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses or is unreachable.
    fn list_cart_lines(&self, owner: UserId) -> BoxFuture<'static, GatewayResult<Vec<CartLineItem>>>;

    /// Place an order. The service re-validates stock authoritatively.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the service refuses the order (e.g. stock moved).
    fn create_order(
        &self,
        owner: UserId,
        lines: Vec<OrderLine>,
    ) -> BoxFuture<'static, GatewayResult<OrderReceipt>>;
}
