//! Mock remote gateway for testing.

use crate::error::{GatewayError, GatewayResult};
use crate::providers::RemoteGateway;
use crate::types::{
    AuthNotification, CartLineItem, Credentials, FavoriteEntry, FavoriteKey, OrderLine,
    OrderReceipt, ProductId, ProductRecord, Session, UserId,
};
use futures::future::{BoxFuture, FutureExt, ready};
use futures::stream::{BoxStream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, oneshot};

/// Kind of gateway call, for scripting and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `sign_in`
    SignIn,
    /// `sign_out`
    SignOut,
    /// `refresh_session`
    RefreshSession,
    /// `get_session`
    GetSession,
    /// `add_favorite`
    AddFavorite,
    /// `remove_favorite`
    RemoveFavorite,
    /// `list_favorites`
    ListFavorites,
    /// `get_product_by_id`
    GetProduct,
    /// `persist_cart_line`
    PersistCartLine,
    /// `remove_cart_line`
    RemoveCartLine,
    /// `list_cart_lines`
    ListCartLines,
    /// `create_order`
    CreateOrder,
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    /// Sign-in with this email
    SignIn(String),
    /// Sign-out
    SignOut,
    /// Token refresh
    RefreshSession,
    /// Session check
    GetSession,
    /// Favorite added
    AddFavorite(FavoriteKey),
    /// Favorite removed
    RemoveFavorite(FavoriteKey),
    /// Favorites listed
    ListFavorites(UserId),
    /// Product fetched
    GetProduct(ProductId),
    /// Cart line written with this quantity
    PersistCartLine(ProductId, u32),
    /// Cart line deleted
    RemoveCartLine(ProductId),
    /// Cart listed
    ListCartLines(UserId),
    /// Order placed with these lines
    CreateOrder(Vec<OrderLine>),
}

impl GatewayCall {
    /// The call's kind.
    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::SignIn(_) => CallKind::SignIn,
            Self::SignOut => CallKind::SignOut,
            Self::RefreshSession => CallKind::RefreshSession,
            Self::GetSession => CallKind::GetSession,
            Self::AddFavorite(_) => CallKind::AddFavorite,
            Self::RemoveFavorite(_) => CallKind::RemoveFavorite,
            Self::ListFavorites(_) => CallKind::ListFavorites,
            Self::GetProduct(_) => CallKind::GetProduct,
            Self::PersistCartLine(..) => CallKind::PersistCartLine,
            Self::RemoveCartLine(_) => CallKind::RemoveCartLine,
            Self::ListCartLines(_) => CallKind::ListCartLines,
            Self::CreateOrder(_) => CallKind::CreateOrder,
        }
    }
}

#[derive(Debug)]
enum Plan {
    Fail(GatewayError),
    Hold(oneshot::Receiver<Option<GatewayError>>),
}

/// A call held open until the test releases it.
///
/// Dropping the handle without releasing fails the call with a network error.
#[derive(Debug)]
pub struct HeldCall {
    release: oneshot::Sender<Option<GatewayError>>,
}

impl HeldCall {
    /// Let the call succeed with the mock's configured response.
    pub fn succeed(self) {
        let _ = self.release.send(None);
    }

    /// Let the call fail.
    pub fn fail(self, error: GatewayError) {
        let _ = self.release.send(Some(error));
    }
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<GatewayCall>,
    plans: HashMap<CallKind, VecDeque<Plan>>,
    session: Option<Session>,
    products: HashMap<ProductId, ProductRecord>,
    favorites: HashMap<UserId, Vec<FavoriteEntry>>,
    cart_lines: HashMap<UserId, Vec<CartLineItem>>,
    orders: u64,
}

/// Mock remote gateway.
///
/// Unscripted calls succeed immediately with the configured data. Scripts are
/// consumed per [`CallKind`] in the order calls are made, and calls are logged
/// when the method is invoked (not when the future is polled).
#[derive(Debug, Clone)]
pub struct MockGateway {
    inner: Arc<Mutex<Inner>>,
    auth_events: Arc<Mutex<broadcast::Sender<AuthNotification>>>,
}

impl MockGateway {
    /// Create a gateway with no session and an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        let (auth_events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            auth_events: Arc::new(Mutex::new(auth_events)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn auth_sender(&self) -> std::sync::MutexGuard<'_, broadcast::Sender<AuthNotification>> {
        self.auth_events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ═══════════════════════════════════════════════════════════
    // Scripting
    // ═══════════════════════════════════════════════════════════

    /// Fail the next call of `kind`.
    pub fn fail_next(&self, kind: CallKind, error: GatewayError) {
        self.lock()
            .plans
            .entry(kind)
            .or_default()
            .push_back(Plan::Fail(error));
    }

    /// Hold the next call of `kind` open until the returned handle is released.
    #[must_use]
    pub fn hold_next(&self, kind: CallKind) -> HeldCall {
        let (release, held) = oneshot::channel();
        self.lock()
            .plans
            .entry(kind)
            .or_default()
            .push_back(Plan::Hold(held));
        HeldCall { release }
    }

    /// Session returned by sign-in, refresh and session checks.
    pub fn set_session(&self, session: Option<Session>) {
        self.lock().session = session;
    }

    /// Product returned by `get_product_by_id`.
    pub fn set_product(&self, product: ProductRecord) {
        self.lock().products.insert(product.product_id.clone(), product);
    }

    /// Remote favorites of `owner`.
    pub fn set_favorites(&self, owner: UserId, entries: Vec<FavoriteEntry>) {
        self.lock().favorites.insert(owner, entries);
    }

    /// Remote cart of `owner`.
    pub fn set_cart_lines(&self, owner: UserId, lines: Vec<CartLineItem>) {
        self.lock().cart_lines.insert(owner, lines);
    }

    // ═══════════════════════════════════════════════════════════
    // Auth events
    // ═══════════════════════════════════════════════════════════

    /// Deliver an auth event to every subscriber. Returns the subscriber count.
    pub fn emit(&self, notification: AuthNotification) -> usize {
        self.auth_sender().send(notification).unwrap_or(0)
    }

    /// End every open auth event stream. Later subscriptions work as usual.
    pub fn end_auth_events(&self) {
        let (fresh, _) = broadcast::channel(16);
        drop(std::mem::replace(&mut *self.auth_sender(), fresh));
    }

    /// Number of live auth event subscriptions.
    #[must_use]
    pub fn auth_subscribers(&self) -> usize {
        self.auth_sender().receiver_count()
    }

    // ═══════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Number of calls of `kind`.
    #[must_use]
    pub fn call_count(&self, kind: CallKind) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    fn respond<T: Send + 'static>(
        &self,
        call: GatewayCall,
        response: impl FnOnce(&mut Inner) -> GatewayResult<T>,
    ) -> BoxFuture<'static, GatewayResult<T>> {
        let (plan, response) = {
            let mut inner = self.lock();
            let kind = call.kind();
            inner.calls.push(call);
            let plan = inner.plans.get_mut(&kind).and_then(VecDeque::pop_front);
            (plan, response(&mut inner))
        };

        match plan {
            None => ready(response).boxed(),
            Some(Plan::Fail(error)) => ready(Err(error)).boxed(),
            Some(Plan::Hold(held)) => async move {
                match held.await {
                    Ok(None) => response,
                    Ok(Some(error)) => Err(error),
                    Err(_) => Err(GatewayError::Network("held call abandoned".to_string())),
                }
            }
            .boxed(),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteGateway for MockGateway {
    fn sign_in(&self, credentials: Credentials) -> BoxFuture<'static, GatewayResult<Session>> {
        self.respond(GatewayCall::SignIn(credentials.email), |inner| {
            inner.session.clone().ok_or(GatewayError::Unauthorized)
        })
    }

    fn sign_out(&self) -> BoxFuture<'static, GatewayResult<()>> {
        self.respond(GatewayCall::SignOut, |_| Ok(()))
    }

    fn refresh_session(&self) -> BoxFuture<'static, GatewayResult<Session>> {
        self.respond(GatewayCall::RefreshSession, |inner| {
            inner.session.clone().ok_or(GatewayError::Unauthorized)
        })
    }

    fn get_session(&self) -> BoxFuture<'static, GatewayResult<Option<Session>>> {
        self.respond(GatewayCall::GetSession, |inner| Ok(inner.session.clone()))
    }

    fn auth_events(&self) -> BoxStream<'static, AuthNotification> {
        let mut events = self.auth_sender().subscribe();
        async_stream::stream! {
            loop {
                match events.recv().await {
                    Ok(notification) => yield notification,
                    Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
        .boxed()
    }

    fn add_favorite(&self, entry: FavoriteEntry) -> BoxFuture<'static, GatewayResult<()>> {
        self.respond(GatewayCall::AddFavorite(entry.key), |_| Ok(()))
    }

    fn remove_favorite(&self, key: FavoriteKey) -> BoxFuture<'static, GatewayResult<()>> {
        self.respond(GatewayCall::RemoveFavorite(key), |_| Ok(()))
    }

    fn list_favorites(&self, owner: UserId) -> BoxFuture<'static, GatewayResult<Vec<FavoriteEntry>>> {
        let favorites = self.lock().favorites.get(&owner).cloned().unwrap_or_default();
        self.respond(GatewayCall::ListFavorites(owner), |_| Ok(favorites))
    }

    fn get_product_by_id(&self, product: ProductId) -> BoxFuture<'static, GatewayResult<ProductRecord>> {
        let record = self.lock().products.get(&product).cloned();
        self.respond(GatewayCall::GetProduct(product), |_| {
            record.ok_or(GatewayError::NotFound)
        })
    }

    fn persist_cart_line(
        &self,
        _owner: UserId,
        product: ProductId,
        quantity: u32,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        self.respond(GatewayCall::PersistCartLine(product, quantity), |_| Ok(()))
    }

    fn remove_cart_line(&self, _owner: UserId, product: ProductId) -> BoxFuture<'static, GatewayResult<()>> {
        self.respond(GatewayCall::RemoveCartLine(product), |_| Ok(()))
    }

    fn list_cart_lines(&self, owner: UserId) -> BoxFuture<'static, GatewayResult<Vec<CartLineItem>>> {
        let lines = self.lock().cart_lines.get(&owner).cloned().unwrap_or_default();
        self.respond(GatewayCall::ListCartLines(owner), |_| Ok(lines))
    }

    fn create_order(
        &self,
        _owner: UserId,
        lines: Vec<OrderLine>,
    ) -> BoxFuture<'static, GatewayResult<OrderReceipt>> {
        let total_cents = lines
            .iter()
            .map(|line| u64::from(line.quantity) * line.unit_price_cents)
            .sum();
        self.respond(GatewayCall::CreateOrder(lines), move |inner| {
            inner.orders += 1;
            Ok(OrderReceipt {
                order_id: format!("order-{}", inner.orders),
                total_cents,
            })
        })
    }
}
