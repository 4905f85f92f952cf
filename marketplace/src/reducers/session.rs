//! Session lifecycle reducer.
//!
//! Owns the authenticated session and the persisted credentials.
//!
//! # Flow
//!
//! 1. `LoadPersisted` reads `auth_token`, `refresh_token` and `user_id` once
//! 2. A restored session is verified with the gateway; a remote "no session"
//!    is treated as a revocation
//! 3. Auth events, explicit sign-in/out and refreshes update state and storage
//!
//! Persistence is fire-and-forget: a failed write is logged and the session
//! carries on in memory for this run.

use crate::actions::{RequestError, SessionAction};
use crate::config::StorageKeys;
use crate::environment::MarketplaceEnvironment;
use crate::error::StorageResult;
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use crate::state::{RestoreStatus, SessionState};
use crate::types::{AuthEvent, AuthNotification, Session, UserId};
use futures::future::{BoxFuture, join_all};
use marketplace_sync_core::effect::Effect;
use marketplace_sync_core::reducer::Reducer;
use marketplace_sync_core::{SmallVec, smallvec};

type Effects = SmallVec<[Effect<SessionAction>; 4]>;

/// Session lifecycle reducer.
#[derive(Debug, Clone)]
pub struct SessionReducer<G, K, C> {
    _phantom: std::marker::PhantomData<(G, K, C)>,
}

impl<G, K, C> SessionReducer<G, K, C> {
    /// Create a new session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<G, K, C> Default for SessionReducer<G, K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, K, C> SessionReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    fn signed_in(
        state: &mut SessionState,
        session: Session,
        env: &MarketplaceEnvironment<G, K, C>,
    ) -> Effects {
        tracing::info!(user_id = %session.user_id, "Session established");
        let writes = persist_session(&env.storage, &env.config.storage_keys, &session);
        state.current = Some(session);
        smallvec![persistence("persist_session", writes)]
    }

    fn signed_out(state: &mut SessionState, env: &MarketplaceEnvironment<G, K, C>) -> Effects {
        if let Some(session) = state.current.take() {
            tracing::info!(user_id = %session.user_id, "Session ended");
        }
        let writes = clear_credentials(&env.storage, &env.config.storage_keys);
        smallvec![persistence("clear_credentials", writes)]
    }

    fn tokens_refreshed(
        state: &SessionState,
        session: &Session,
        env: &MarketplaceEnvironment<G, K, C>,
    ) -> Effects {
        if state.user_id() != Some(&session.user_id) {
            tracing::warn!(
                user_id = %session.user_id,
                "Ignoring refreshed tokens for a user that is not signed in"
            );
            return SmallVec::new();
        }
        tracing::debug!(user_id = %session.user_id, "Tokens refreshed");
        let writes = persist_tokens(&env.storage, &env.config.storage_keys, session);
        smallvec![persistence("persist_tokens", writes)]
    }

    fn auth_event(
        state: &mut SessionState,
        notification: AuthNotification,
        env: &MarketplaceEnvironment<G, K, C>,
    ) -> Effects {
        match (notification.event, notification.session) {
            (AuthEvent::SignedIn, Some(session)) => Self::signed_in(state, session, env),
            (AuthEvent::SignedOut, _) => Self::signed_out(state, env),
            (AuthEvent::TokenRefreshed, Some(session)) => {
                Self::tokens_refreshed(state, &session, env)
            },
            (event @ (AuthEvent::SignedIn | AuthEvent::TokenRefreshed), None) => {
                tracing::warn!(?event, "Auth event without a session; ignoring");
                SmallVec::new()
            },
            (AuthEvent::PasswordRecovery, _) => {
                tracing::info!("Password recovery started");
                SmallVec::new()
            },
            (AuthEvent::Other(name), _) => {
                tracing::debug!(event = %name, "Ignoring unknown auth event");
                SmallVec::new()
            },
        }
    }
}

impl<G, K, C> Reducer for SessionReducer<G, K, C>
where
    G: RemoteGateway + Clone + 'static,
    K: KeyValueStore + Clone + 'static,
    C: CatalogCache + Clone + 'static,
{
    type State = SessionState;
    type Action = SessionAction;
    type Environment = MarketplaceEnvironment<G, K, C>;

    #[allow(clippy::too_many_lines)] // One arm per lifecycle step
    fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment) -> Effects {
        match action {
            SessionAction::LoadPersisted => {
                if state.restore != RestoreStatus::NotStarted {
                    tracing::debug!(status = ?state.restore, "Persisted session already loading");
                    return SmallVec::new();
                }
                state.restore = RestoreStatus::InProgress;

                let keys = env.config.storage_keys.clone();
                let reads = keys.all().map(|key| env.storage.get(key));
                smallvec![Effect::future(async move {
                    let [access, refresh, user] = reads;
                    let (access, refresh, user) = futures::join!(access, refresh, user);

                    let session = match (
                        readable(&keys.auth_token, access),
                        readable(&keys.refresh_token, refresh),
                        readable(&keys.user_id, user),
                    ) {
                        (Some(access_token), Some(refresh_token), Some(user_id)) => Some(Session {
                            user_id: UserId::new(user_id),
                            access_token,
                            refresh_token,
                            expires_at: None,
                        }),
                        (None, None, None) => None,
                        _ => {
                            tracing::warn!("Partial credentials persisted; treating as signed out");
                            None
                        },
                    };
                    Some(SessionAction::PersistedLoaded { session })
                })]
            },

            SessionAction::PersistedLoaded { session } => {
                state.restore = RestoreStatus::Done;

                let Some(session) = session else {
                    tracing::debug!("No persisted session");
                    return SmallVec::new();
                };
                if state.current.is_some() {
                    tracing::debug!("Session established before restore finished; keeping it");
                    return SmallVec::new();
                }

                tracing::info!(user_id = %session.user_id, "Restored persisted session");
                let restored = session.user_id.clone();
                state.current = Some(session);

                let check = env.gateway.get_session();
                smallvec![Effect::future(async move {
                    let result = check.await.map_err(|error| error.to_string());
                    Some(SessionAction::RemoteSessionChecked { restored, result })
                })]
            },

            SessionAction::RemoteSessionChecked { restored, result } => {
                if state.user_id() != Some(&restored) {
                    // Session changed while the check was in flight
                    return SmallVec::new();
                }
                match result {
                    Ok(Some(remote)) if remote.user_id == restored => {
                        let effects = Self::tokens_refreshed(state, &remote, env);
                        state.current = Some(remote);
                        effects
                    },
                    Ok(Some(remote)) => Self::signed_in(state, remote, env),
                    Ok(None) => {
                        tracing::info!(user_id = %restored, "Restored session was revoked remotely");
                        Self::signed_out(state, env)
                    },
                    Err(reason) => {
                        tracing::warn!(%reason, "Could not verify restored session; continuing offline");
                        SmallVec::new()
                    },
                }
            },

            SessionAction::RemoteAuthEvent(notification) => {
                Self::auth_event(state, notification, env)
            },

            SessionAction::SignIn {
                request,
                credentials,
            } => {
                let call = env.gateway.sign_in(credentials);
                smallvec![Effect::future(async move {
                    let result = call
                        .await
                        .map_err(|error| RequestError::Remote(error.to_string()));
                    Some(SessionAction::SignInCompleted { request, result })
                })]
            },

            SessionAction::SignInCompleted { result, .. } => match result {
                Ok(session) => Self::signed_in(state, session, env),
                Err(error) => {
                    tracing::warn!(?error, "Sign-in failed");
                    SmallVec::new()
                },
            },

            SessionAction::SignOut { request } => {
                if state.current.is_none() {
                    return smallvec![Effect::future(async move {
                        Some(SessionAction::SignOutCompleted {
                            request,
                            result: Ok(()),
                        })
                    })];
                }

                let mut effects = Self::signed_out(state, env);
                let call = env.gateway.sign_out();
                effects.push(Effect::future(async move {
                    let result = call
                        .await
                        .map_err(|error| RequestError::Remote(error.to_string()));
                    Some(SessionAction::SignOutCompleted { request, result })
                }));
                effects
            },

            SessionAction::SignOutCompleted { result, .. } => {
                if let Err(error) = result {
                    tracing::warn!(?error, "Remote sign-out failed; local session already cleared");
                }
                SmallVec::new()
            },

            SessionAction::RefreshToken { request } => {
                if state.current.is_none() {
                    return smallvec![Effect::future(async move {
                        Some(SessionAction::RefreshCompleted {
                            request,
                            result: Err(RequestError::NoSession),
                        })
                    })];
                }

                let call = env.gateway.refresh_session();
                smallvec![Effect::future(async move {
                    let result = call
                        .await
                        .map_err(|error| RequestError::Remote(error.to_string()));
                    Some(SessionAction::RefreshCompleted { request, result })
                })]
            },

            SessionAction::RefreshCompleted { result, .. } => match result {
                Ok(session) => Self::tokens_refreshed(state, &session, env),
                Err(error) => {
                    tracing::warn!(?error, "Token refresh failed");
                    SmallVec::new()
                },
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════

type Write = BoxFuture<'static, StorageResult<()>>;

fn persist_session(storage: &impl KeyValueStore, keys: &StorageKeys, session: &Session) -> Vec<Write> {
    let mut writes = persist_tokens(storage, keys, session);
    writes.push(storage.set(&keys.user_id, session.user_id.as_str()));
    writes
}

fn persist_tokens(storage: &impl KeyValueStore, keys: &StorageKeys, session: &Session) -> Vec<Write> {
    vec![
        storage.set(&keys.auth_token, &session.access_token),
        storage.set(&keys.refresh_token, &session.refresh_token),
    ]
}

fn clear_credentials(storage: &impl KeyValueStore, keys: &StorageKeys) -> Vec<Write> {
    keys.all().into_iter().map(|key| storage.remove(key)).collect()
}

/// Await storage writes, logging failures. Never feeds an action back.
fn persistence<A: Send + 'static>(operation: &'static str, writes: Vec<Write>) -> Effect<A> {
    Effect::future(async move {
        for result in join_all(writes).await {
            if let Err(error) = result {
                tracing::warn!(operation, %error, "Credential persistence failed; will resync on next launch");
                metrics::counter!("session.persistence_failures").increment(1);
            }
        }
        None
    })
}

fn readable(key: &str, result: StorageResult<Option<String>>) -> Option<String> {
    result.unwrap_or_else(|error| {
        tracing::warn!(key, %error, "Failed to read persisted credential");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockCatalog, MockGateway, MockKeyValueStore};
    use marketplace_sync_testing::{ReducerTest, assertions};

    type Env = MarketplaceEnvironment<MockGateway, MockKeyValueStore, MockCatalog>;
    type TestReducer = SessionReducer<MockGateway, MockKeyValueStore, MockCatalog>;

    fn env(storage: &MockKeyValueStore) -> Env {
        MarketplaceEnvironment::new(MockGateway::new(), storage.clone(), MockCatalog::new())
    }

    fn session(user: &str) -> Session {
        Session {
            user_id: UserId::new(user),
            access_token: format!("{user}-access"),
            refresh_token: format!("{user}-refresh"),
            expires_at: None,
        }
    }

    fn signed_in(user: &str) -> SessionState {
        SessionState {
            current: Some(session(user)),
            restore: RestoreStatus::Done,
        }
    }

    fn event(event: AuthEvent, session: Option<Session>) -> SessionAction {
        SessionAction::RemoteAuthEvent(AuthNotification { event, session })
    }

    #[test]
    fn load_persisted_only_starts_once() {
        let storage = MockKeyValueStore::new();
        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(SessionState::default())
            .when_action(SessionAction::LoadPersisted)
            .when_action(SessionAction::LoadPersisted)
            .then_state(|state| assert_eq!(state.restore, RestoreStatus::InProgress))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn signed_in_event_updates_state_and_storage() {
        let storage = MockKeyValueStore::new();
        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(SessionState::default())
            .when_action(event(AuthEvent::SignedIn, Some(session("ana"))))
            .then_state(|state| assert_eq!(state.user_id(), Some(&UserId::new("ana"))))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();

        // Writes start while reducing
        assert_eq!(storage.value("auth_token").as_deref(), Some("ana-access"));
        assert_eq!(storage.value("user_id").as_deref(), Some("ana"));
    }

    #[test]
    fn signed_out_event_clears_credentials() {
        let storage = MockKeyValueStore::with_entries([
            ("auth_token", "ana-access"),
            ("refresh_token", "ana-refresh"),
            ("user_id", "ana"),
        ]);
        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(signed_in("ana"))
            .when_action(event(AuthEvent::SignedOut, None))
            .then_state(|state| assert!(!state.is_authenticated()))
            .run();

        assert!(storage.is_empty());
    }

    #[test]
    fn token_refresh_persists_tokens_only() {
        let storage = MockKeyValueStore::with_entries([("user_id", "ana")]);
        let mut rotated = session("ana");
        rotated.access_token = "rotated".to_string();

        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(signed_in("ana"))
            .when_action(event(AuthEvent::TokenRefreshed, Some(rotated)))
            .then_state(|state| {
                let current = state.current.as_ref().map(|s| s.access_token.as_str());
                assert_eq!(current, Some("ana-access"));
            })
            .run();

        assert_eq!(storage.value("auth_token").as_deref(), Some("rotated"));
        assert_eq!(storage.writes(), 2);
    }

    #[test]
    fn informational_and_unknown_events_change_nothing() {
        let storage = MockKeyValueStore::new();
        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(signed_in("ana"))
            .when_action(event(AuthEvent::PasswordRecovery, None))
            .when_action(event(AuthEvent::Other("user_updated".to_string()), None))
            .then_state(|state| assert!(state.is_authenticated()))
            .then_effects(assertions::assert_no_effects)
            .run();

        assert_eq!(storage.writes(), 0);
    }

    #[test]
    fn revoked_restore_signs_out() {
        let storage = MockKeyValueStore::with_entries([("user_id", "ana")]);
        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(signed_in("ana"))
            .when_action(SessionAction::RemoteSessionChecked {
                restored: UserId::new("ana"),
                result: Ok(None),
            })
            .then_state(|state| assert!(state.current.is_none()))
            .run();

        assert!(storage.is_empty());
    }

    #[test]
    fn offline_restore_keeps_session() {
        let storage = MockKeyValueStore::new();
        ReducerTest::new(TestReducer::new())
            .with_env(env(&storage))
            .given_state(signed_in("ana"))
            .when_action(SessionAction::RemoteSessionChecked {
                restored: UserId::new("ana"),
                result: Err("offline".to_string()),
            })
            .then_state(|state| assert!(state.is_authenticated()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn failed_writes_do_not_block_sign_in() {
        let storage = MockKeyValueStore::new();
        storage.fail_writes(true);
        let env = env(&storage);
        let mut state = SessionState::default();

        let effects = TestReducer::new().reduce(
            &mut state,
            SessionAction::SignInCompleted {
                request: crate::types::RequestId(1),
                result: Ok(session("ana")),
            },
            &env,
        );
        assert!(state.is_authenticated());

        for effect in effects {
            if let Effect::Future(fut) = effect {
                assert_eq!(fut.await, None);
            }
        }
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn load_reads_complete_credentials() {
        let storage = MockKeyValueStore::with_entries([
            ("auth_token", "a"),
            ("refresh_token", "r"),
            ("user_id", "ana"),
        ]);
        let env = env(&storage);
        let mut state = SessionState::default();

        let mut effects = TestReducer::new().reduce(&mut state, SessionAction::LoadPersisted, &env);
        let Some(Effect::Future(fut)) = effects.pop() else {
            unreachable!("load reads storage");
        };
        let Some(SessionAction::PersistedLoaded { session: Some(restored) }) = fut.await else {
            unreachable!("credentials are complete");
        };
        assert_eq!(restored.user_id, UserId::new("ana"));
        assert_eq!(restored.access_token, "a");
    }

    #[tokio::test]
    async fn partial_credentials_restore_nothing() {
        let storage = MockKeyValueStore::with_entries([("auth_token", "a")]);
        let env = env(&storage);
        let mut state = SessionState::default();

        let mut effects = TestReducer::new().reduce(&mut state, SessionAction::LoadPersisted, &env);
        let Some(Effect::Future(fut)) = effects.pop() else {
            unreachable!("load reads storage");
        };
        assert_eq!(fut.await, Some(SessionAction::PersistedLoaded { session: None }));
    }
}
