//! Cart consistency reducer.
//!
//! Quantities are clamped to the freshest known stock before they land.
//! Line writes follow the same optimistic/rollback shape as favorites, keyed
//! by product id.
//!
//! # Stock policy
//!
//! Evaluated in this order for the requested quantity `q` and stock `s`:
//!
//! | Condition       | Result                         |
//! |-----------------|--------------------------------|
//! | `q <= 0`        | line removed                   |
//! | `s == 0`        | `OutOfStock`, cart unchanged   |
//! | `s` unknown     | accepted as requested          |
//! | `q <= s`        | accepted as requested          |
//! | `q > s`         | clamped, `InsufficientStock(s)`|

use crate::actions::{CartAction, CheckoutFailure, QuantityChange};
use crate::environment::MarketplaceEnvironment;
use crate::optimistic::{Issue, RemoteOutcome, Settlement, apply_optimistic};
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use crate::state::CartState;
use crate::types::{CartLineItem, OrderLine, ProductId, ProductSnapshot, QuantityOutcome, UserId};
use marketplace_sync_core::effect::Effect;
use marketplace_sync_core::reducer::Reducer;
use marketplace_sync_core::{SmallVec, smallvec};

type Effects = SmallVec<[Effect<CartAction>; 4]>;

/// Apply the stock policy to a requested quantity.
///
/// Never returns [`QuantityOutcome::NotInCart`]; that depends on the cart.
///
/// ```
/// use marketplace_sync::reducers::cart::quantity_policy;
/// use marketplace_sync::types::QuantityOutcome;
///
/// assert_eq!(quantity_policy(5, Some(3)), QuantityOutcome::InsufficientStock(3));
/// assert_eq!(quantity_policy(5, Some(0)), QuantityOutcome::OutOfStock);
/// assert_eq!(quantity_policy(5, None), QuantityOutcome::Accepted(5));
/// assert_eq!(quantity_policy(0, Some(0)), QuantityOutcome::Removed);
/// ```
#[must_use]
pub fn quantity_policy(requested: i64, stock: Option<u32>) -> QuantityOutcome {
    if requested <= 0 {
        return QuantityOutcome::Removed;
    }
    let requested = u32::try_from(requested).unwrap_or(u32::MAX);
    match stock {
        Some(0) => QuantityOutcome::OutOfStock,
        None => QuantityOutcome::Accepted(requested),
        Some(stock) if requested <= stock => QuantityOutcome::Accepted(requested),
        Some(stock) => QuantityOutcome::InsufficientStock(stock),
    }
}

/// Cart consistency reducer.
#[derive(Debug, Clone)]
pub struct CartReducer<G, K, C> {
    _phantom: std::marker::PhantomData<(G, K, C)>,
}

impl<G, K, C> CartReducer<G, K, C> {
    /// Create a new cart reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<G, K, C> Default for CartReducer<G, K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, K, C> CartReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    fn owned_by(state: &mut CartState, owner: &UserId) -> bool {
        if state.owner.as_ref() == Some(owner) {
            return true;
        }
        tracing::debug!(%owner, "Refusing cart mutation without a matching session");
        state.last_issue = Issue::Denied;
        false
    }

    fn unchanged(state: &mut CartState, outcome: QuantityOutcome) -> Effects {
        state.last_issue = Issue::Unchanged;
        state.last_outcome = Some(outcome);
        SmallVec::new()
    }

    fn write_line(state: &mut CartState, owner: UserId, line: CartLineItem, gateway: &G) -> Effects {
        let remote = gateway.persist_cart_line(owner, line.product_id.clone(), line.quantity);
        let (op, effect) = apply_optimistic(
            &mut state.lines,
            line.product_id.clone(),
            Some(line),
            remote,
            |product_id, op, outcome| CartAction::RemoteResolved {
                product_id,
                op,
                outcome,
            },
        );
        state.last_issue = Issue::Issued(op);
        smallvec![effect]
    }

    fn remove_line(state: &mut CartState, owner: UserId, product_id: ProductId, gateway: &G) -> Effect<CartAction> {
        let remote = gateway.remove_cart_line(owner, product_id.clone());
        let (op, effect) = apply_optimistic(
            &mut state.lines,
            product_id,
            None,
            remote,
            |product_id, op, outcome| CartAction::RemoteResolved {
                product_id,
                op,
                outcome,
            },
        );
        state.last_issue = Issue::Issued(op);
        effect
    }

    fn set_quantity(
        state: &mut CartState,
        owner: UserId,
        product_id: ProductId,
        change: QuantityChange,
        stock: Option<u32>,
        snapshot: Option<ProductSnapshot>,
        env: &MarketplaceEnvironment<G, K, C>,
    ) -> Effects {
        let current = state.lines.get(&product_id).cloned();
        let requested = match (change, &current) {
            (QuantityChange::Set(quantity), _) => quantity,
            (QuantityChange::By(delta), line) => {
                i64::from(line.as_ref().map_or(0, |line| line.quantity)).saturating_add(delta)
            },
            (QuantityChange::Revalidate, Some(line)) => i64::from(line.quantity),
            (QuantityChange::Revalidate, None) => {
                return Self::unchanged(state, QuantityOutcome::NotInCart);
            },
        };

        let outcome = quantity_policy(requested, stock);
        let quantity = match outcome {
            QuantityOutcome::Accepted(quantity) => quantity,
            QuantityOutcome::InsufficientStock(quantity) => {
                tracing::info!(%product_id, requested, stock = quantity, "Quantity clamped to stock");
                metrics::counter!("cart.clamped").increment(1);
                quantity
            },
            QuantityOutcome::OutOfStock => {
                tracing::info!(%product_id, "Product out of stock; cart unchanged");
                return Self::unchanged(state, outcome);
            },
            QuantityOutcome::Removed | QuantityOutcome::NotInCart => {
                if current.is_none() {
                    return Self::unchanged(state, QuantityOutcome::NotInCart);
                }
                state.last_outcome = Some(QuantityOutcome::Removed);
                return smallvec![Self::remove_line(state, owner, product_id, &env.gateway)];
            },
        };

        let line = match (current, snapshot) {
            (Some(line), _) if line.quantity == quantity => {
                return Self::unchanged(state, outcome);
            },
            (Some(mut line), snapshot) => {
                line.quantity = quantity;
                if let Some(snapshot) = snapshot {
                    line.snapshot = snapshot;
                }
                line
            },
            (None, Some(snapshot)) => CartLineItem {
                product_id,
                quantity,
                snapshot,
                added_at: env.now(),
            },
            (None, None) => return Self::unchanged(state, QuantityOutcome::NotInCart),
        };

        tracing::debug!(product_id = %line.product_id, quantity, "Cart line applied locally");
        state.last_outcome = Some(outcome);
        Self::write_line(state, owner, line, &env.gateway)
    }

    fn checkout_gate(state: &CartState, owner: &UserId, catalog: &C) -> Option<CheckoutFailure> {
        if state.owner.as_ref() != Some(owner) {
            return Some(CheckoutFailure::Denied);
        }
        if state.lines.is_empty() {
            return Some(CheckoutFailure::EmptyCart);
        }
        let stale = state.stale_lines(catalog);
        (!stale.is_empty()).then_some(CheckoutFailure::Blocked(stale))
    }
}

impl<G, K, C> Reducer for CartReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    type State = CartState;
    type Action = CartAction;
    type Environment = MarketplaceEnvironment<G, K, C>;

    #[allow(clippy::too_many_lines)] // One arm per cart operation
    fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment) -> Effects {
        match action {
            CartAction::SetQuantity {
                owner,
                product_id,
                change,
                stock,
                snapshot,
            } => {
                state.last_outcome = None;
                if !Self::owned_by(state, &owner) {
                    return SmallVec::new();
                }
                Self::set_quantity(state, owner, product_id, change, stock.stock(), snapshot, env)
            },

            CartAction::Remove { owner, product_id } => {
                state.last_outcome = None;
                if !Self::owned_by(state, &owner) {
                    return SmallVec::new();
                }
                if !state.lines.contains_key(&product_id) {
                    return Self::unchanged(state, QuantityOutcome::NotInCart);
                }
                state.last_outcome = Some(QuantityOutcome::Removed);
                smallvec![Self::remove_line(state, owner, product_id, &env.gateway)]
            },

            CartAction::Clear { owner } => {
                state.last_batch.clear();
                if !Self::owned_by(state, &owner) {
                    return SmallVec::new();
                }
                let products: Vec<ProductId> =
                    state.lines.iter().map(|(product_id, _)| product_id.clone()).collect();
                if products.is_empty() {
                    state.last_issue = Issue::Unchanged;
                    return SmallVec::new();
                }

                let mut effects = Vec::with_capacity(products.len());
                for product_id in products {
                    effects.push(Self::remove_line(state, owner.clone(), product_id, &env.gateway));
                    if let Issue::Issued(op) = state.last_issue {
                        state.last_batch.push(op);
                    }
                }
                tracing::debug!(lines = effects.len(), "Cart cleared locally");
                smallvec![Effect::merge(effects)]
            },

            CartAction::RemoteResolved {
                product_id,
                op,
                outcome,
            } => {
                match (state.lines.resolve(&product_id, op, &outcome), &outcome) {
                    (Settlement::RolledBack { restored }, RemoteOutcome::Rejected(reason)) => {
                        tracing::warn!(
                            %product_id,
                            %op,
                            %reason,
                            restored_quantity = restored.as_ref().map(|line| line.quantity),
                            "Cart line write rejected; rolled back"
                        );
                        metrics::counter!("cart.rollbacks").increment(1);
                    },
                    (Settlement::Superseded, RemoteOutcome::Rejected(reason)) => {
                        tracing::warn!(%product_id, %op, %reason, "Cart line write rejected; a newer change owns the line");
                    },
                    (settlement, _) => {
                        tracing::debug!(%product_id, %op, ?settlement, "Cart line write settled");
                    },
                }
                SmallVec::new()
            },

            CartAction::Checkout { owner, request } => {
                if let Some(failure) = Self::checkout_gate(state, &owner, &env.catalog) {
                    tracing::info!(?failure, "Checkout refused locally");
                    return smallvec![Effect::future(async move {
                        Some(CartAction::CheckoutCompleted {
                            request,
                            result: Err(failure),
                        })
                    })];
                }

                let lines: Vec<OrderLine> =
                    state.line_items().into_iter().map(OrderLine::from).collect();
                tracing::info!(%owner, lines = lines.len(), "Placing order");
                let order = env.gateway.create_order(owner, lines);
                smallvec![Effect::future(async move {
                    let result = order
                        .await
                        .map_err(|error| CheckoutFailure::Remote(error.to_string()));
                    Some(CartAction::CheckoutCompleted { request, result })
                })]
            },

            CartAction::CheckoutCompleted { result, .. } => {
                match result {
                    Ok(receipt) => {
                        tracing::info!(order_id = %receipt.order_id, "Order placed; cart cleared");
                        metrics::counter!("cart.orders").increment(1);
                        state.lines.clear();
                        state.last_issue = Issue::Unchanged;
                    },
                    Err(CheckoutFailure::Remote(reason)) => {
                        tracing::warn!(%reason, "Order rejected by remote; cart kept");
                    },
                    Err(_) => {},
                }
                SmallVec::new()
            },

            CartAction::Refresh { owner } => {
                if state.owner.as_ref() != Some(&owner) {
                    state.lines.clear();
                    state.owner = Some(owner.clone());
                }
                let listing = env.gateway.list_cart_lines(owner.clone());
                smallvec![Effect::future(async move {
                    let result = listing.await.map_err(|error| error.to_string());
                    Some(CartAction::Hydrated { owner, result })
                })]
            },

            CartAction::Hydrated { owner, result } => {
                if state.owner.as_ref() != Some(&owner) {
                    tracing::debug!(%owner, "Discarding cart listing for a previous user");
                    return SmallVec::new();
                }
                match result {
                    Ok(lines) => {
                        tracing::debug!(%owner, count = lines.len(), "Cart hydrated");
                        state.lines.hydrate(
                            lines
                                .into_iter()
                                .filter(|line| line.quantity > 0)
                                .map(|line| (line.product_id.clone(), line)),
                        );
                    },
                    Err(reason) => {
                        tracing::warn!(%owner, %reason, "Failed to load cart; keeping local lines");
                    },
                }
                SmallVec::new()
            },

            CartAction::UserDataCleared => {
                state.owner = None;
                state.lines.clear();
                state.last_issue = Issue::Unchanged;
                state.last_batch.clear();
                state.last_outcome = None;
                SmallVec::new()
            },
        }
    }
}
