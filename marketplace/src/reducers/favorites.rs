//! Favorite membership reducer.
//!
//! Membership per (owner, item type, item id) flips locally the moment a
//! mutation is reduced. The remote add/remove settles later through
//! [`FavoritesAction::RemoteResolved`]; rollbacks are decided by the
//! [`OptimisticMap`](crate::optimistic::OptimisticMap) against the state
//! present at that point.

use crate::actions::FavoritesAction;
use crate::environment::MarketplaceEnvironment;
use crate::optimistic::{Issue, RemoteOutcome, Settlement, apply_optimistic};
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use crate::state::FavoritesState;
use crate::types::{FavoriteEntry, FavoriteKey};
use marketplace_sync_core::effect::Effect;
use marketplace_sync_core::reducer::Reducer;
use marketplace_sync_core::{SmallVec, smallvec};

type Effects = SmallVec<[Effect<FavoritesAction>; 4]>;

/// What a mutation wants the key to look like.
enum Intent {
    Present(FavoriteEntry),
    Absent(FavoriteKey),
}

/// Favorite membership reducer.
#[derive(Debug, Clone)]
pub struct FavoritesReducer<G, K, C> {
    _phantom: std::marker::PhantomData<(G, K, C)>,
}

impl<G, K, C> FavoritesReducer<G, K, C> {
    /// Create a new favorites reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<G, K, C> Default for FavoritesReducer<G, K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, K, C> FavoritesReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    fn mutate(state: &mut FavoritesState, intent: Intent, gateway: &G) -> Effects {
        let key = match &intent {
            Intent::Present(entry) => entry.key.clone(),
            Intent::Absent(key) => key.clone(),
        };

        if state.owner.as_ref() != Some(&key.owner) {
            tracing::debug!(%key, "Refusing favorite mutation without a matching session");
            state.last_issue = Issue::Denied;
            return SmallVec::new();
        }

        let present = state.entries.contains_key(&key);
        let (target, remote) = match intent {
            Intent::Present(_) if present => {
                state.last_issue = Issue::Unchanged;
                return SmallVec::new();
            },
            Intent::Absent(_) if !present => {
                state.last_issue = Issue::Unchanged;
                return SmallVec::new();
            },
            Intent::Present(entry) => {
                let remote = gateway.add_favorite(entry.clone());
                (Some(entry), remote)
            },
            Intent::Absent(key) => (None, gateway.remove_favorite(key)),
        };

        let (op, effect) = apply_optimistic(
            &mut state.entries,
            key.clone(),
            target,
            remote,
            |key, op, outcome| FavoritesAction::RemoteResolved { key, op, outcome },
        );
        tracing::debug!(%key, %op, present = !present, "Favorite mutation applied locally");
        state.last_issue = Issue::Issued(op);
        smallvec![effect]
    }
}

impl<G, K, C> Reducer for FavoritesReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    type State = FavoritesState;
    type Action = FavoritesAction;
    type Environment = MarketplaceEnvironment<G, K, C>;

    fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment) -> Effects {
        match action {
            FavoritesAction::Toggle { entry } => {
                let intent = if state.entries.contains_key(&entry.key) {
                    Intent::Absent(entry.key)
                } else {
                    Intent::Present(entry)
                };
                Self::mutate(state, intent, &env.gateway)
            },

            FavoritesAction::Add { entry } => {
                Self::mutate(state, Intent::Present(entry), &env.gateway)
            },

            FavoritesAction::Remove { key } => Self::mutate(state, Intent::Absent(key), &env.gateway),

            FavoritesAction::RemoteResolved { key, op, outcome } => {
                match (state.entries.resolve(&key, op, &outcome), &outcome) {
                    (Settlement::RolledBack { restored }, RemoteOutcome::Rejected(reason)) => {
                        tracing::warn!(
                            %key,
                            %op,
                            %reason,
                            restored_present = restored.is_some(),
                            "Favorite mutation rejected; rolled back"
                        );
                        metrics::counter!("favorites.rollbacks").increment(1);
                    },
                    (Settlement::Superseded, RemoteOutcome::Rejected(reason)) => {
                        tracing::warn!(%key, %op, %reason, "Favorite mutation rejected; a newer change owns the key");
                    },
                    (Settlement::Unknown, _) => {
                        tracing::debug!(%key, %op, "Late favorite confirmation ignored");
                    },
                    (settlement, _) => {
                        tracing::debug!(%key, %op, ?settlement, "Favorite mutation settled");
                    },
                }
                SmallVec::new()
            },

            FavoritesAction::Refresh { owner } => {
                if state.owner.as_ref() != Some(&owner) {
                    state.entries.clear();
                    state.owner = Some(owner.clone());
                }
                let listing = env.gateway.list_favorites(owner.clone());
                smallvec![Effect::future(async move {
                    let result = listing.await.map_err(|error| error.to_string());
                    Some(FavoritesAction::Hydrated { owner, result })
                })]
            },

            FavoritesAction::Hydrated { owner, result } => {
                if state.owner.as_ref() != Some(&owner) {
                    tracing::debug!(%owner, "Discarding favorites listing for a previous user");
                    return SmallVec::new();
                }
                match result {
                    Ok(entries) => {
                        tracing::debug!(%owner, count = entries.len(), "Favorites hydrated");
                        state.entries.hydrate(
                            entries
                                .into_iter()
                                .filter(|entry| entry.key.owner == owner)
                                .map(|entry| (entry.key.clone(), entry)),
                        );
                    },
                    Err(reason) => {
                        tracing::warn!(%owner, %reason, "Failed to load favorites; keeping local set");
                    },
                }
                SmallVec::new()
            },

            FavoritesAction::UserDataCleared => {
                state.owner = None;
                state.entries.clear();
                state.last_issue = Issue::Unchanged;
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CallKind, GatewayCall, MockCatalog, MockGateway, MockKeyValueStore};
    use crate::types::{ItemType, UserId};
    use marketplace_sync_testing::{ReducerTest, assertions};

    type Env = MarketplaceEnvironment<MockGateway, MockKeyValueStore, MockCatalog>;
    type TestReducer = FavoritesReducer<MockGateway, MockKeyValueStore, MockCatalog>;

    fn env(gateway: &MockGateway) -> Env {
        MarketplaceEnvironment::new(gateway.clone(), MockKeyValueStore::new(), MockCatalog::new())
    }

    fn entry(owner: &str, item: &str) -> FavoriteEntry {
        FavoriteEntry {
            key: FavoriteKey::new(UserId::new(owner), ItemType::Product, item),
            snapshot: serde_json::json!({ "name": item }),
        }
    }

    #[test]
    fn toggle_adds_locally_and_calls_remote() {
        let gateway = MockGateway::new();
        let favorite = entry("ana", "p1");
        let key = favorite.key.clone();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(FavoritesState::for_owner(UserId::new("ana")))
            .when_action(FavoritesAction::Toggle { entry: favorite })
            .then_state(move |state| {
                assert!(state.entries.contains_key(&key));
                assert!(matches!(state.last_issue, Issue::Issued(_)));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();

        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::AddFavorite(entry("ana", "p1").key)]
        );
    }

    #[test]
    fn toggle_twice_restores_membership() {
        let gateway = MockGateway::new();
        let key = entry("ana", "p1").key;

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(FavoritesState::for_owner(UserId::new("ana")))
            .when_action(FavoritesAction::Toggle { entry: entry("ana", "p1") })
            .when_action(FavoritesAction::Toggle { entry: entry("ana", "p1") })
            .then_state(move |state| {
                assert!(!state.entries.contains_key(&key));
                assert_eq!(state.entries.pending_ops(), 2);
            })
            .run();

        assert_eq!(gateway.call_count(CallKind::AddFavorite), 1);
        assert_eq!(gateway.call_count(CallKind::RemoveFavorite), 1);
    }

    #[test]
    fn add_existing_is_a_no_op() {
        let gateway = MockGateway::new();
        let mut state = FavoritesState::for_owner(UserId::new("ana"));
        let favorite = entry("ana", "p1");
        state.entries.hydrate([(favorite.key.clone(), favorite.clone())]);

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(state)
            .when_action(FavoritesAction::Add { entry: favorite.clone() })
            .when_action(FavoritesAction::Add { entry: favorite })
            .then_state(|state| {
                assert_eq!(state.entries.len(), 1);
                assert_eq!(state.last_issue, Issue::Unchanged);
            })
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn mutation_for_another_owner_is_denied() {
        let gateway = MockGateway::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(FavoritesState::for_owner(UserId::new("ana")))
            .when_action(FavoritesAction::Toggle { entry: entry("bob", "p1") })
            .then_state(|state| {
                assert!(state.entries.is_empty());
                assert_eq!(state.last_issue, Issue::Denied);
            })
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn rejection_rolls_back() {
        let gateway = MockGateway::new();
        let env = env(&gateway);
        let favorite = entry("ana", "p1");
        let mut state = FavoritesState::for_owner(UserId::new("ana"));

        let _ = TestReducer::new().reduce(
            &mut state,
            FavoritesAction::Toggle { entry: favorite.clone() },
            &env,
        );
        let Issue::Issued(op) = state.last_issue else {
            unreachable!("toggle issues a remote call");
        };

        let _ = TestReducer::new().reduce(
            &mut state,
            FavoritesAction::RemoteResolved {
                key: favorite.key.clone(),
                op,
                outcome: RemoteOutcome::Rejected("offline".to_string()),
            },
            &env,
        );
        assert!(!state.entries.contains_key(&favorite.key));
        assert_eq!(state.entries.pending_ops(), 0);
    }

    #[test]
    fn listing_for_previous_owner_is_discarded() {
        let gateway = MockGateway::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(FavoritesState::for_owner(UserId::new("ana")))
            .when_action(FavoritesAction::Hydrated {
                owner: UserId::new("bob"),
                result: Ok(vec![entry("bob", "p1")]),
            })
            .then_state(|state| assert!(state.entries.is_empty()))
            .run();
    }

    #[test]
    fn user_data_cleared_drops_everything() {
        let gateway = MockGateway::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&gateway))
            .given_state(FavoritesState::for_owner(UserId::new("ana")))
            .when_action(FavoritesAction::Add { entry: entry("ana", "p1") })
            .when_action(FavoritesAction::UserDataCleared)
            .then_state(|state| {
                assert!(state.owner.is_none());
                assert!(state.entries.is_empty());
                assert_eq!(state.entries.pending_ops(), 0);
            })
            .run();
    }
}
