//! Engine reducers.
//!
//! Each engine reduces its own slice of [`AppState`]. [`AppReducer`] routes
//! actions to them and relays session transitions:
//!
//! ```text
//!   SessionAction ──▶ SessionReducer ──┐ user changed?
//!                                      ├──▶ FavoritesAction::UserDataCleared / Refresh
//!                                      └──▶ CartAction::UserDataCleared / Refresh
//!   FavoritesAction ──▶ FavoritesReducer
//!   CartAction ──────▶ CartReducer
//! ```

pub mod cart;
pub mod favorites;
pub mod session;

pub use cart::CartReducer;
pub use favorites::FavoritesReducer;
pub use session::SessionReducer;

use crate::actions::{AppAction, CartAction, FavoritesAction, SessionAction};
use crate::environment::MarketplaceEnvironment;
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use crate::state::{AppState, CartState, FavoritesState, SessionState};
use marketplace_sync_core::composition::{ScopedReducer, scope_reducer};
use marketplace_sync_core::effect::Effect;
use marketplace_sync_core::reducer::Reducer;
use marketplace_sync_core::SmallVec;

type Env<G, K, C> = MarketplaceEnvironment<G, K, C>;

type ScopedSession<G, K, C> =
    ScopedReducer<AppState, SessionState, AppAction, SessionAction, Env<G, K, C>, SessionReducer<G, K, C>>;
type ScopedFavorites<G, K, C> = ScopedReducer<
    AppState,
    FavoritesState,
    AppAction,
    FavoritesAction,
    Env<G, K, C>,
    FavoritesReducer<G, K, C>,
>;
type ScopedCart<G, K, C> =
    ScopedReducer<AppState, CartState, AppAction, CartAction, Env<G, K, C>, CartReducer<G, K, C>>;

/// Root reducer for the marketplace client.
pub struct AppReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    session: ScopedSession<G, K, C>,
    favorites: ScopedFavorites<G, K, C>,
    cart: ScopedCart<G, K, C>,
}

impl<G, K, C> AppReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    /// Create the root reducer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: scope_reducer(
                SessionReducer::new(),
                |state: &mut AppState| &mut state.session,
                |action| match action {
                    AppAction::Session(action) => Some(action),
                    _ => None,
                },
                AppAction::Session,
            ),
            favorites: scope_reducer(
                FavoritesReducer::new(),
                |state: &mut AppState| &mut state.favorites,
                |action| match action {
                    AppAction::Favorites(action) => Some(action),
                    _ => None,
                },
                AppAction::Favorites,
            ),
            cart: scope_reducer(
                CartReducer::new(),
                |state: &mut AppState| &mut state.cart,
                |action| match action {
                    AppAction::Cart(action) => Some(action),
                    _ => None,
                },
                AppAction::Cart,
            ),
        }
    }
}

impl<G, K, C> Default for AppReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<G, K, C> Clone for AppReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            favorites: self.favorites.clone(),
            cart: self.cart.clone(),
        }
    }
}

impl<G, K, C> Reducer for AppReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    type State = AppState;
    type Action = AppAction;
    type Environment = Env<G, K, C>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            action @ AppAction::Session(_) => {
                let before = state.session.user_id().cloned();
                let mut effects = self.session.reduce(state, action, env);
                let after = state.session.user_id().cloned();

                if before != after {
                    tracing::debug!(?before, ?after, "Session user changed; relaying");
                    if before.is_some() {
                        effects.extend(self.favorites.reduce_child(state, FavoritesAction::UserDataCleared, env));
                        effects.extend(self.cart.reduce_child(state, CartAction::UserDataCleared, env));
                    }
                    if let Some(owner) = after {
                        effects.extend(self.favorites.reduce_child(
                            state,
                            FavoritesAction::Refresh { owner: owner.clone() },
                            env,
                        ));
                        effects.extend(self.cart.reduce_child(state, CartAction::Refresh { owner }, env));
                    }
                }
                effects
            },
            action @ AppAction::Favorites(_) => self.favorites.reduce(state, action, env),
            action @ AppAction::Cart(_) => self.cart.reduce(state, action, env),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CallKind, MockCatalog, MockGateway, MockKeyValueStore};
    use crate::types::{AuthEvent, AuthNotification, ItemType, Session, UserId};
    use crate::types::{FavoriteEntry, FavoriteKey};
    use marketplace_sync_testing::ReducerTest;

    type TestReducer = AppReducer<MockGateway, MockKeyValueStore, MockCatalog>;

    fn env(gateway: &MockGateway) -> Env<MockGateway, MockKeyValueStore, MockCatalog> {
        MarketplaceEnvironment::new(gateway.clone(), MockKeyValueStore::new(), MockCatalog::new())
    }

    fn auth(event: AuthEvent, user: Option<&str>) -> AppAction {
        AppAction::Session(SessionAction::RemoteAuthEvent(AuthNotification {
            event,
            session: user.map(|user| Session {
                user_id: UserId::new(user),
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_at: None,
            }),
        }))
    }

    #[test]
    fn sign_in_hydrates_both_engines() {
        let gateway = MockGateway::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(AppState::default())
            .when_action(auth(AuthEvent::SignedIn, Some("ana")))
            .then_state(|state| {
                assert_eq!(state.favorites.owner, Some(UserId::new("ana")));
                assert_eq!(state.cart.owner, Some(UserId::new("ana")));
            })
            .then_effects(|effects| assert_eq!(effects.len(), 3))
            .run();

        assert_eq!(gateway.call_count(CallKind::ListFavorites), 1);
        assert_eq!(gateway.call_count(CallKind::ListCartLines), 1);
    }

    #[test]
    fn sign_out_drops_user_scoped_data() {
        let gateway = MockGateway::new();
        let key = FavoriteKey::new(UserId::new("ana"), ItemType::Farm, "f1");

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(AppState::default())
            .when_action(auth(AuthEvent::SignedIn, Some("ana")))
            .when_action(AppAction::Favorites(FavoritesAction::Add {
                entry: FavoriteEntry {
                    key,
                    snapshot: serde_json::Value::Null,
                },
            }))
            .when_action(auth(AuthEvent::SignedOut, None))
            .then_state(|state| {
                assert!(!state.session.is_authenticated());
                assert!(state.favorites.owner.is_none());
                assert!(state.favorites.entries.is_empty());
                assert!(state.cart.owner.is_none());
            })
            .run();
    }

    #[test]
    fn token_refresh_does_not_relay() {
        let gateway = MockGateway::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(AppState::default())
            .when_action(auth(AuthEvent::SignedIn, Some("ana")))
            .when_action(auth(AuthEvent::TokenRefreshed, Some("ana")))
            .then_state(|state| assert!(state.session.is_authenticated()))
            .then_effects(|effects| assert_eq!(effects.len(), 1))
            .run();

        assert_eq!(gateway.call_count(CallKind::ListFavorites), 1);
    }
}
