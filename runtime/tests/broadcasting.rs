//! Integration tests for Store action broadcasting
//!
//! Observers use the broadcast to wait for remote confirmations by
//! correlation id. These tests pin down the ordering guarantees they rely on.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use marketplace_sync_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use marketplace_sync_runtime::{Store, StoreError};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Issue a remote call that confirms after `delay_ms`
    Issue { id: u64, delay_ms: u64 },
    /// Remote call confirmed
    Confirmed { id: u64 },
    /// Local only; no effects
    Bump,
}

#[derive(Debug, Clone, Default)]
struct TestState {
    bumps: u32,
    confirmed: Vec<u64>,
}

#[derive(Clone)]
struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TestAction::Issue { id, delay_ms } => smallvec![Effect::future(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Some(TestAction::Confirmed { id })
            })],
            TestAction::Confirmed { id } => {
                state.confirmed.push(id);
                SmallVec::new()
            },
            TestAction::Bump => {
                state.bumps += 1;
                SmallVec::new()
            },
        }
    }
}

fn store() -> Store<TestState, TestAction, (), TestReducer> {
    Store::new(TestState::default(), TestReducer, ())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn wait_for_returns_matching_confirmation() {
    let store = store();

    let result = store
        .send_and_wait_for(
            TestAction::Issue { id: 7, delay_ms: 5 },
            |a| matches!(a, TestAction::Confirmed { id: 7 }),
            Duration::from_secs(2),
        )
        .await;

    assert_eq!(result, Ok(TestAction::Confirmed { id: 7 }));
}

#[tokio::test]
async fn confirmation_is_reduced_before_it_is_broadcast() {
    let store = store();
    let mut rx = store.subscribe_actions();

    store
        .send(TestAction::Issue { id: 1, delay_ms: 0 })
        .await
        .unwrap();

    let action = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(action, TestAction::Confirmed { id: 1 });

    // The observer saw the action, so the state must already reflect it
    assert_eq!(store.state(|s| s.confirmed.clone()).await, vec![1]);
}

#[tokio::test]
async fn confirmations_may_arrive_out_of_issue_order() {
    let store = store();

    let mut slow = store
        .send(TestAction::Issue { id: 1, delay_ms: 60 })
        .await
        .unwrap();
    let mut fast = store
        .send(TestAction::Issue { id: 2, delay_ms: 0 })
        .await
        .unwrap();

    fast.wait_with_timeout(Duration::from_secs(2)).await.unwrap();
    slow.wait_with_timeout(Duration::from_secs(2)).await.unwrap();

    assert_eq!(store.state(|s| s.confirmed.clone()).await, vec![2, 1]);
}

#[tokio::test]
async fn actions_passed_to_send_are_not_broadcast() {
    let store = store();
    let mut rx = store.subscribe_actions();

    store.send(TestAction::Bump).await.unwrap();

    let received = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(received.is_err(), "only effect feedback is broadcast");
    assert_eq!(store.state(|s| s.bumps).await, 1);
}

#[tokio::test]
async fn wait_for_times_out_without_match() {
    let store = store();

    let result = store
        .send_and_wait_for(
            TestAction::Issue { id: 3, delay_ms: 0 },
            |a| matches!(a, TestAction::Confirmed { id: 4 }),
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(result, Err(StoreError::Timeout));
}

#[tokio::test]
async fn shutdown_drains_in_flight_feedback() {
    let store = store();

    store
        .send(TestAction::Issue { id: 5, delay_ms: 20 })
        .await
        .unwrap();
    assert_eq!(store.pending_effects(), 1);

    store.shutdown(Some(Duration::from_secs(2))).await.unwrap();

    assert_eq!(store.pending_effects(), 0);
    assert_eq!(store.state(|s| s.confirmed.clone()).await, vec![5]);
}

#[tokio::test]
async fn shutdown_times_out_with_slow_effect() {
    let store = store();

    store
        .send(TestAction::Issue { id: 6, delay_ms: 500 })
        .await
        .unwrap();

    let result = store.shutdown(Some(Duration::from_millis(30))).await;
    assert_eq!(result, Err(StoreError::ShutdownTimeout(1)));
}
