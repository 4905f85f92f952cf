//! Remote auth event bridge.
//!
//! One subscription to [`RemoteGateway::auth_events`] is shared by every
//! consumer that attaches. The first [`SessionBridge::attach`] starts a task
//! that feeds events into the store as [`SessionAction::RemoteAuthEvent`];
//! dropping the last [`SessionListener`] aborts it. If the gateway ends the
//! stream, the next attach subscribes again.

use crate::actions::{AppAction, SessionAction};
use crate::client::AppStore;
use crate::providers::{CatalogCache, KeyValueStore, RemoteGateway};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct BridgeState {
    listeners: usize,
    task: Option<JoinHandle<()>>,
}

impl BridgeState {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Reference-counted auth event subscription.
#[derive(Debug, Clone, Default)]
pub struct SessionBridge {
    state: Arc<Mutex<BridgeState>>,
}

impl SessionBridge {
    /// Create a detached bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a consumer, subscribing to the gateway if it is the first or
    /// the previous subscription has ended.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach<G, K, C>(&self, store: &AppStore<G, K, C>) -> SessionListener
    where
        G: RemoteGateway + Clone + 'static,
        K: KeyValueStore + Clone + 'static,
        C: CatalogCache + Clone + 'static,
    {
        let mut state = self.lock();
        state.listeners += 1;

        if !state.is_running() {
            let mut events = store.environment().gateway.auth_events();
            let store = store.clone();
            state.task = Some(tokio::spawn(async move {
                while let Some(notification) = events.next().await {
                    tracing::debug!(event = ?notification.event, "Auth event received");
                    let action = AppAction::Session(SessionAction::RemoteAuthEvent(notification));
                    if let Err(error) = store.send(action).await {
                        tracing::warn!(%error, "Store rejected auth event; stopping listener");
                        break;
                    }
                }
                tracing::debug!("Auth event stream ended");
            }));
            tracing::info!("Auth event listener started");
        }

        SessionListener {
            bridge: self.clone(),
            attached: true,
        }
    }

    /// Number of attached consumers.
    #[must_use]
    pub fn listeners(&self) -> usize {
        self.lock().listeners
    }

    /// Whether the event task is running.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.lock().is_running()
    }

    fn release(&self) {
        let mut state = self.lock();
        state.listeners = state.listeners.saturating_sub(1);
        if state.listeners > 0 {
            return;
        }
        if let Some(task) = state.task.take() {
            task.abort();
            tracing::info!("Auth event listener stopped");
        }
    }
}

/// Guard for one attached consumer. Detaches on drop.
#[derive(Debug)]
#[must_use = "dropping the listener detaches it immediately"]
pub struct SessionListener {
    bridge: SessionBridge,
    attached: bool,
}

impl SessionListener {
    /// Detach explicitly.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.bridge.release();
        }
    }
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        self.release();
    }
}
