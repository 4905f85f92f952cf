//! Client facade.
//!
//! [`MarketplaceClient`] owns the [`Store`] and the [`SessionBridge`] and
//! exposes every engine operation as a method.
//!
//! Optimistic mutations return a [`Pending`]: the local result is available
//! immediately and the [`Confirmation`] can be awaited for the remote answer,
//! or dropped.
//!
//! ```ignore
//! let pending = client
//!     .toggle_favorite(Some(user), ItemType::Product, "p1", snapshot)
//!     .await?;
//! render(pending.value);              // already reflected in state
//! pending.confirmed().await?;         // remote settled (or rolled back)
//! ```

use crate::actions::{
    AppAction, CartAction, CheckoutFailure, FavoritesAction, QuantityChange, RequestError,
    SessionAction,
};
use crate::bridge::{SessionBridge, SessionListener};
use crate::environment::MarketplaceEnvironment;
use crate::error::{Result, SyncError};
use crate::optimistic::{Issue, OpId, OpStatus, RemoteOutcome};
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use crate::reducers::AppReducer;
use crate::selectors::{self, UiSnapshot};
use crate::state::{AppState, RestoreStatus};
use crate::types::{
    CartLineItem, Credentials, FavoriteEntry, FavoriteKey, ItemId, ItemType, LineStaleness,
    OrderReceipt, ProductId, ProductSnapshot, QuantityOutcome, RequestId, Session, StockReading,
    UserId,
};
use futures::future::BoxFuture;
use marketplace_sync_runtime::{Store, StoreError};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// The store type driven by [`MarketplaceClient`].
pub type AppStore<G, K, C> =
    Store<AppState, AppAction, MarketplaceEnvironment<G, K, C>, AppReducer<G, K, C>>;

// ═══════════════════════════════════════════════════════════════════════
// Confirmation
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Favorites,
    Cart,
}

impl Engine {
    fn resolution(self, action: &AppAction) -> Option<(OpId, &RemoteOutcome)> {
        match (self, action) {
            (Self::Favorites, AppAction::Favorites(FavoritesAction::RemoteResolved { op, outcome, .. }))
            | (Self::Cart, AppAction::Cart(CartAction::RemoteResolved { op, outcome, .. })) => {
                Some((*op, outcome))
            },
            _ => None,
        }
    }

    fn status(self, state: &AppState, op: OpId) -> OpStatus {
        match self {
            Self::Favorites => state.favorites.entries.status(op),
            Self::Cart => state.cart.lines.status(op),
        }
    }
}

/// Reads op status from the store, for observers that lagged behind the broadcast.
type StatusLookup = Arc<dyn Fn(Vec<OpId>) -> BoxFuture<'static, Vec<(OpId, OpStatus)>> + Send + Sync>;

struct Awaiting {
    engine: Engine,
    operation: &'static str,
    ops: Vec<OpId>,
    events: broadcast::Receiver<AppAction>,
    lookup: StatusLookup,
    timeout: Duration,
}

impl Awaiting {
    fn settle(&mut self, op: OpId, outcome: &RemoteOutcome) -> Result<()> {
        let Some(index) = self.ops.iter().position(|pending| *pending == op) else {
            return Ok(());
        };
        self.ops.swap_remove(index);
        match outcome {
            RemoteOutcome::Confirmed => Ok(()),
            RemoteOutcome::Rejected(reason) => Err(SyncError::rejected(self.operation, reason.clone())),
        }
    }

    /// Settle from state whatever the broadcast dropped.
    async fn catch_up(&mut self) -> Result<()> {
        for (op, status) in (self.lookup)(self.ops.clone()).await {
            match status {
                OpStatus::InFlight => {},
                OpStatus::Settled(outcome) => self.settle(op, &outcome)?,
                OpStatus::Expired => {
                    tracing::warn!(%op, operation = self.operation, "Outcome no longer recorded; treating as settled");
                    self.settle(op, &RemoteOutcome::Confirmed)?;
                },
            }
        }
        Ok(())
    }
}

/// Remote settlement of an optimistic mutation.
///
/// Resolves once every remote call the mutation issued has settled. Dropping
/// it does not cancel anything.
pub struct Confirmation {
    awaiting: Option<Awaiting>,
}

impl Confirmation {
    /// A confirmation with nothing to wait for (the mutation was a no-op).
    #[must_use]
    pub const fn settled() -> Self {
        Self { awaiting: None }
    }

    fn awaiting(
        engine: Engine,
        operation: &'static str,
        ops: Vec<OpId>,
        events: broadcast::Receiver<AppAction>,
        lookup: StatusLookup,
        timeout: Duration,
    ) -> Self {
        if ops.is_empty() {
            return Self::settled();
        }
        Self {
            awaiting: Some(Awaiting {
                engine,
                operation,
                ops,
                events,
                lookup,
                timeout,
            }),
        }
    }

    /// Whether no remote call is outstanding for this mutation.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.awaiting.is_none()
    }

    /// Wait for the remote answer.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RemoteRejected`]: the remote refused; local state was rolled back
    ///   unless a newer mutation owns the key
    /// - [`SyncError::ConfirmationTimeout`]: no answer within the configured timeout
    /// - [`SyncError::Store`]: the store went away
    pub async fn confirmed(self) -> Result<()> {
        let Some(mut awaiting) = self.awaiting else {
            return Ok(());
        };

        let timeout = awaiting.timeout;
        tokio::time::timeout(timeout, async move {
            while !awaiting.ops.is_empty() {
                match awaiting.events.recv().await {
                    Ok(action) => {
                        if let Some((op, outcome)) = awaiting.engine.resolution(&action) {
                            awaiting.settle(op, outcome)?;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, operation = awaiting.operation, "Confirmation observer lagged; reading state");
                        awaiting.catch_up().await?;
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SyncError::Store(StoreError::ChannelClosed));
                    },
                }
            }
            Ok(())
        })
        .await
        .map_err(|_| SyncError::ConfirmationTimeout)?
    }
}

impl fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.awaiting {
            None => f.write_str("Confirmation::Settled"),
            Some(awaiting) => f
                .debug_struct("Confirmation")
                .field("engine", &awaiting.engine)
                .field("operation", &awaiting.operation)
                .field("ops", &awaiting.ops)
                .finish(),
        }
    }
}

/// Local result of an optimistic mutation plus its remote [`Confirmation`].
#[derive(Debug)]
#[must_use]
pub struct Pending<T> {
    /// Result as applied locally.
    pub value: T,
    confirmation: Confirmation,
}

impl<T> Pending<T> {
    const fn settled(value: T) -> Self {
        Self {
            value,
            confirmation: Confirmation::settled(),
        }
    }

    /// Whether no remote call is outstanding.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.confirmation.is_settled()
    }

    /// Split into the local value and the confirmation.
    pub fn into_parts(self) -> (T, Confirmation) {
        (self.value, self.confirmation)
    }

    /// Wait for the remote answer and return the local value.
    ///
    /// # Errors
    ///
    /// See [`Confirmation::confirmed`].
    pub async fn confirmed(self) -> Result<T> {
        let Self { value, confirmation } = self;
        confirmation.confirmed().await?;
        Ok(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════

fn request_failed(operation: &'static str, error: RequestError) -> SyncError {
    match error {
        RequestError::NoSession => SyncError::RequiresAuthentication,
        RequestError::Remote(reason) => SyncError::rejected(operation, reason),
    }
}

/// Marketplace client: session, favorites and cart in one store.
///
/// Cheap to clone; clones share the store and the session bridge.
pub struct MarketplaceClient<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    store: AppStore<G, K, C>,
    bridge: SessionBridge,
    requests: Arc<AtomicU64>,
}

impl<G, K, C> MarketplaceClient<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    /// Create a signed-out client.
    #[must_use]
    pub fn new(environment: MarketplaceEnvironment<G, K, C>) -> Self {
        let config = environment.config.store.clone();
        Self {
            store: Store::with_config(AppState::default(), AppReducer::new(), environment, config),
            bridge: SessionBridge::new(),
            requests: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &AppStore<G, K, C> {
        &self.store
    }

    /// The shared auth event bridge.
    #[must_use]
    pub const fn session_bridge(&self) -> &SessionBridge {
        &self.bridge
    }

    fn environment(&self) -> &MarketplaceEnvironment<G, K, C> {
        self.store.environment()
    }

    fn status_lookup(&self, engine: Engine) -> StatusLookup {
        let store = self.store.clone();
        Arc::new(move |ops: Vec<OpId>| -> BoxFuture<'static, Vec<(OpId, OpStatus)>> {
            let store = store.clone();
            Box::pin(async move {
                store
                    .state(|state| ops.into_iter().map(|op| (op, engine.status(state, op))).collect::<Vec<_>>())
                    .await
            })
        })
    }

    fn next_request(&self) -> RequestId {
        RequestId(self.requests.fetch_add(1, Ordering::Relaxed))
    }

    /// Send `action` and wait for the feedback action `extract` accepts.
    async fn request<T>(&self, action: AppAction, extract: impl Fn(&AppAction) -> Option<T>) -> Result<T> {
        let timeout = self.environment().config.request_timeout;
        let reply = self
            .store
            .send_and_wait_for(action, |action| extract(action).is_some(), timeout)
            .await?;
        extract(&reply).ok_or(SyncError::Store(StoreError::ChannelClosed))
    }

    async fn require_user(&self) -> Result<UserId> {
        self.store
            .state(|state| state.session.user_id().cloned())
            .await
            .ok_or(SyncError::RequiresAuthentication)
    }

    // ═══════════════════════════════════════════════════════════
    // Session
    // ═══════════════════════════════════════════════════════════

    /// Restore credentials persisted by a previous run.
    ///
    /// Only the first call reads storage; every call waits for that read and
    /// returns the restored user, if any. The restored session is then
    /// verified with the gateway in the background, so it may still be
    /// revoked after this returns.
    ///
    /// # Errors
    ///
    /// [`SyncError::Store`] if the store is shutting down or the read does not
    /// finish within the request timeout.
    pub async fn load_persisted_session(&self) -> Result<Option<UserId>> {
        let mut events = self.store.subscribe_actions();
        let (status, _) = self
            .store
            .send_then(AppAction::Session(SessionAction::LoadPersisted), |state| {
                state.session.restore
            })
            .await?;

        if status == RestoreStatus::Done {
            return Ok(self.current_user().await);
        }

        let timeout = self.environment().config.request_timeout;
        tokio::time::timeout(timeout, async {
            loop {
                match events.recv().await {
                    Ok(AppAction::Session(SessionAction::PersistedLoaded { session })) => {
                        return Ok(session.map(|session| session.user_id));
                    },
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Restore observer lagged; reading state");
                        let (restore, user) = self
                            .store
                            .state(|state| (state.session.restore, state.session.user_id().cloned()))
                            .await;
                        if restore == RestoreStatus::Done {
                            return Ok(user);
                        }
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SyncError::Store(StoreError::ChannelClosed));
                    },
                }
            }
        })
        .await
        .map_err(|_| SyncError::Store(StoreError::Timeout))?
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteRejected`] if the gateway refuses the credentials.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        let request = self.next_request();
        self.request(
            AppAction::Session(SessionAction::SignIn { request, credentials }),
            |action| match action {
                AppAction::Session(SessionAction::SignInCompleted { request: r, result }) if *r == request => {
                    Some(result.clone())
                },
                _ => None,
            },
        )
        .await?
        .map_err(|error| request_failed("sign_in", error))
    }

    /// Sign out. Local state and credentials are cleared before the remote call.
    ///
    /// # Errors
    ///
    /// [`SyncError::RemoteRejected`] if the remote sign-out failed. The local
    /// session stays cleared.
    pub async fn sign_out(&self) -> Result<()> {
        let request = self.next_request();
        self.request(
            AppAction::Session(SessionAction::SignOut { request }),
            |action| match action {
                AppAction::Session(SessionAction::SignOutCompleted { request: r, result }) if *r == request => {
                    Some(result.clone())
                },
                _ => None,
            },
        )
        .await?
        .map_err(|error| request_failed("sign_out", error))
    }

    /// Force a token refresh.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RequiresAuthentication`]: no active session
    /// - [`SyncError::RemoteRejected`]: the refresh failed
    pub async fn refresh_token(&self) -> Result<Session> {
        let request = self.next_request();
        self.request(
            AppAction::Session(SessionAction::RefreshToken { request }),
            |action| match action {
                AppAction::Session(SessionAction::RefreshCompleted { request: r, result }) if *r == request => {
                    Some(result.clone())
                },
                _ => None,
            },
        )
        .await?
        .map_err(|error| request_failed("refresh_token", error))
    }

    /// Start receiving remote auth events. Detaches when the guard drops.
    pub fn attach_session_listener(&self) -> SessionListener {
        self.bridge.attach(&self.store)
    }

    /// Active session.
    pub async fn session(&self) -> Option<Session> {
        self.store.state(|state| state.session.current.clone()).await
    }

    /// Active user.
    pub async fn current_user(&self) -> Option<UserId> {
        self.store.state(|state| state.session.user_id().cloned()).await
    }

    /// Whether a session is active.
    pub async fn is_authenticated(&self) -> bool {
        self.store.state(selectors::is_authenticated).await
    }

    // ═══════════════════════════════════════════════════════════
    // Favorites
    // ═══════════════════════════════════════════════════════════

    async fn mutate_favorite(
        &self,
        operation: &'static str,
        action: FavoritesAction,
        item_type: ItemType,
        item_id: ItemId,
    ) -> Result<Pending<bool>> {
        let events = self.store.subscribe_actions();
        let ((issue, present), _) = self
            .store
            .send_then(AppAction::Favorites(action), |state| {
                (state.favorites.last_issue, state.favorites.is_favorite(item_type, &item_id))
            })
            .await?;

        match issue {
            Issue::Denied => Err(SyncError::RequiresAuthentication),
            Issue::Unchanged => Ok(Pending::settled(present)),
            Issue::Issued(op) => Ok(Pending {
                value: present,
                confirmation: Confirmation::awaiting(
                    Engine::Favorites,
                    operation,
                    vec![op],
                    events,
                    self.status_lookup(Engine::Favorites),
                    self.environment().config.confirmation_timeout,
                ),
            }),
        }
    }

    /// Invert membership of an item. Returns the new membership.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an owner, or for an owner
    /// that is not signed in. Nothing is mutated.
    pub async fn toggle_favorite(
        &self,
        owner: Option<UserId>,
        item_type: ItemType,
        item_id: impl Into<ItemId>,
        snapshot: serde_json::Value,
    ) -> Result<Pending<bool>> {
        let owner = owner.ok_or(SyncError::RequiresAuthentication)?;
        let key = FavoriteKey::new(owner, item_type, item_id);
        let item_id = key.item_id.clone();
        let entry = FavoriteEntry { key, snapshot };
        self.mutate_favorite("toggle_favorite", FavoritesAction::Toggle { entry }, item_type, item_id)
            .await
    }

    /// Ensure an item is favorited. A no-op when it already is.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] as for [`Self::toggle_favorite`].
    pub async fn add_favorite(
        &self,
        owner: Option<UserId>,
        item_type: ItemType,
        item_id: impl Into<ItemId>,
        snapshot: serde_json::Value,
    ) -> Result<Pending<bool>> {
        let owner = owner.ok_or(SyncError::RequiresAuthentication)?;
        let key = FavoriteKey::new(owner, item_type, item_id);
        let item_id = key.item_id.clone();
        let entry = FavoriteEntry { key, snapshot };
        self.mutate_favorite("add_favorite", FavoritesAction::Add { entry }, item_type, item_id)
            .await
    }

    /// Ensure an item is not favorited. A no-op when it already is not.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] as for [`Self::toggle_favorite`].
    pub async fn remove_favorite(
        &self,
        owner: Option<UserId>,
        item_type: ItemType,
        item_id: impl Into<ItemId>,
    ) -> Result<Pending<bool>> {
        let owner = owner.ok_or(SyncError::RequiresAuthentication)?;
        let key = FavoriteKey::new(owner, item_type, item_id);
        let item_id = key.item_id.clone();
        self.mutate_favorite("remove_favorite", FavoritesAction::Remove { key }, item_type, item_id)
            .await
    }

    /// Whether the signed-in user has favorited the item.
    pub async fn is_favorite(&self, item_id: &ItemId, item_type: ItemType) -> bool {
        self.store
            .state(|state| selectors::is_favorite(state, item_id, item_type))
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Cart
    // ═══════════════════════════════════════════════════════════

    /// Freshest known stock: remote fetch, then catalog cache, then unknown.
    async fn resolve_stock(&self, product_id: &ProductId) -> StockReading {
        let env = self.environment();
        let fetch = env.gateway.get_product_by_id(product_id.clone());
        match tokio::time::timeout(env.config.stock_fetch_timeout, fetch).await {
            Ok(Ok(record)) => return StockReading::Fresh(record.stock),
            Ok(Err(error)) => {
                tracing::debug!(%product_id, %error, "Stock fetch failed; using catalog cache");
            },
            Err(_) => {
                tracing::debug!(%product_id, "Stock fetch timed out; using catalog cache");
            },
        }
        env.catalog
            .stock(product_id)
            .map_or(StockReading::Unknown, StockReading::Cached)
    }

    async fn change_quantity(
        &self,
        operation: &'static str,
        product_id: ProductId,
        change: QuantityChange,
        snapshot: Option<ProductSnapshot>,
    ) -> Result<Pending<QuantityOutcome>> {
        let owner = self.require_user().await?;
        let stock = self.resolve_stock(&product_id).await;

        let events = self.store.subscribe_actions();
        let ((issue, outcome), _) = self
            .store
            .send_then(
                AppAction::Cart(CartAction::SetQuantity {
                    owner,
                    product_id,
                    change,
                    stock,
                    snapshot,
                }),
                |state| (state.cart.last_issue, state.cart.last_outcome),
            )
            .await?;

        let outcome = outcome.unwrap_or(QuantityOutcome::NotInCart);
        self.cart_pending(operation, issue, outcome, events)
    }

    fn cart_pending<T>(
        &self,
        operation: &'static str,
        issue: Issue,
        value: T,
        events: broadcast::Receiver<AppAction>,
    ) -> Result<Pending<T>> {
        match issue {
            Issue::Denied => Err(SyncError::RequiresAuthentication),
            Issue::Unchanged => Ok(Pending::settled(value)),
            Issue::Issued(op) => Ok(Pending {
                value,
                confirmation: Confirmation::awaiting(
                    Engine::Cart,
                    operation,
                    vec![op],
                    events,
                    self.status_lookup(Engine::Cart),
                    self.environment().config.confirmation_timeout,
                ),
            }),
        }
    }

    /// Add `quantity` of a product, creating the line if needed.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn add_item(&self, snapshot: ProductSnapshot, quantity: u32) -> Result<Pending<QuantityOutcome>> {
        let product_id = snapshot.product_id.clone();
        self.change_quantity(
            "add_item",
            product_id,
            QuantityChange::By(i64::from(quantity)),
            Some(snapshot),
        )
        .await
    }

    /// Set a line's quantity, clamped to live stock. `0` or less removes it.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn set_quantity(&self, product_id: ProductId, quantity: i64) -> Result<Pending<QuantityOutcome>> {
        self.change_quantity("set_quantity", product_id, QuantityChange::Set(quantity), None)
            .await
    }

    /// Add one to a line.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn increment(&self, product_id: ProductId) -> Result<Pending<QuantityOutcome>> {
        self.change_quantity("increment", product_id, QuantityChange::By(1), None)
            .await
    }

    /// Take one from a line, removing it at zero.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn decrement(&self, product_id: ProductId) -> Result<Pending<QuantityOutcome>> {
        self.change_quantity("decrement", product_id, QuantityChange::By(-1), None)
            .await
    }

    /// Re-run the stock policy for a line at its current quantity.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn revalidate(&self, product_id: ProductId) -> Result<Pending<QuantityOutcome>> {
        self.change_quantity("revalidate", product_id, QuantityChange::Revalidate, None)
            .await
    }

    /// Revalidate every line, in line order.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn revalidate_all(&self) -> Result<Vec<(ProductId, Pending<QuantityOutcome>)>> {
        let products: Vec<ProductId> = self
            .store
            .state(|state| {
                state
                    .cart
                    .line_items()
                    .into_iter()
                    .map(|line| line.product_id.clone())
                    .collect()
            })
            .await;

        let mut results = Vec::with_capacity(products.len());
        for product_id in products {
            let pending = self.revalidate(product_id.clone()).await?;
            results.push((product_id, pending));
        }
        Ok(results)
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn remove_item(&self, product_id: ProductId) -> Result<Pending<QuantityOutcome>> {
        let owner = self.require_user().await?;
        let events = self.store.subscribe_actions();
        let ((issue, outcome), _) = self
            .store
            .send_then(AppAction::Cart(CartAction::Remove { owner, product_id }), |state| {
                (state.cart.last_issue, state.cart.last_outcome)
            })
            .await?;

        let outcome = outcome.unwrap_or(QuantityOutcome::NotInCart);
        self.cart_pending("remove_item", issue, outcome, events)
    }

    /// Empty the cart, remotely as well as locally.
    ///
    /// # Errors
    ///
    /// [`SyncError::RequiresAuthentication`] without an active session.
    pub async fn clear_cart(&self) -> Result<Pending<()>> {
        let owner = self.require_user().await?;
        let events = self.store.subscribe_actions();
        let ((issue, batch), _) = self
            .store
            .send_then(AppAction::Cart(CartAction::Clear { owner }), |state| {
                (state.cart.last_issue, state.cart.last_batch.clone())
            })
            .await?;

        match issue {
            Issue::Denied => Err(SyncError::RequiresAuthentication),
            Issue::Unchanged => Ok(Pending::settled(())),
            Issue::Issued(_) => Ok(Pending {
                value: (),
                confirmation: Confirmation::awaiting(
                    Engine::Cart,
                    "clear_cart",
                    batch,
                    events,
                    self.status_lookup(Engine::Cart),
                    self.environment().config.confirmation_timeout,
                ),
            }),
        }
    }

    /// Place an order for the current lines. Clears the cart on success.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RequiresAuthentication`]: no active session
    /// - [`SyncError::EmptyCart`]: nothing to order
    /// - [`SyncError::CheckoutBlocked`]: lines exceed live stock
    /// - [`SyncError::RemoteRejected`]: the service refused the order; cart kept
    pub async fn checkout(&self) -> Result<OrderReceipt> {
        let owner = self.require_user().await?;
        let request = self.next_request();
        let result = self
            .request(
                AppAction::Cart(CartAction::Checkout { owner, request }),
                |action| match action {
                    AppAction::Cart(CartAction::CheckoutCompleted { request: r, result }) if *r == request => {
                        Some(result.clone())
                    },
                    _ => None,
                },
            )
            .await?;

        result.map_err(|failure| match failure {
            CheckoutFailure::Denied => SyncError::RequiresAuthentication,
            CheckoutFailure::EmptyCart => SyncError::EmptyCart,
            CheckoutFailure::Blocked(stale_lines) => SyncError::CheckoutBlocked { stale_lines },
            CheckoutFailure::Remote(reason) => SyncError::rejected("checkout", reason),
        })
    }

    /// Cart lines in the order they were added.
    pub async fn cart_line_items(&self) -> Vec<CartLineItem> {
        self.store.state(selectors::cart_line_items).await
    }

    /// Per-line stock classification against the catalog cache.
    pub async fn cart_staleness(&self) -> Vec<LineStaleness> {
        let catalog = &self.environment().catalog;
        self.store
            .state(|state| selectors::cart_staleness(state, catalog))
            .await
    }

    /// Whether no line is stale. See [`Self::checkout`] for the empty-cart refusal.
    pub async fn can_checkout(&self) -> bool {
        let catalog = &self.environment().catalog;
        self.store
            .state(|state| selectors::can_checkout(state, catalog))
            .await
    }

    /// Every UI selector, read at one point in time.
    pub async fn ui_snapshot(&self) -> UiSnapshot {
        let catalog = &self.environment().catalog;
        self.store
            .state(|state| selectors::ui_snapshot(state, catalog))
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Stop accepting actions and wait for in-flight remote calls.
    ///
    /// # Errors
    ///
    /// [`SyncError::Store`] if remote calls are still running when the
    /// store's shutdown timeout expires.
    pub async fn shutdown(&self) -> Result<()> {
        self.store.shutdown(None).await?;
        Ok(())
    }
}

impl<G, K, C> Clone for MarketplaceClient<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bridge: self.bridge.clone(),
            requests: Arc::clone(&self.requests),
        }
    }
}
