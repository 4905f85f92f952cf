//! Favorite membership through the client: optimistic toggles, rollbacks and
//! out-of-order confirmations.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{harness, signed_in};
use marketplace_sync::mocks::{CallKind, GatewayCall};
use marketplace_sync::{FavoriteKey, GatewayError, ItemId, ItemType, SyncError, UserId};
use serde_json::json;

fn p(id: &str) -> ItemId {
    ItemId::new(id)
}

#[tokio::test]
async fn toggle_applies_before_remote_confirms() {
    let (h, ana) = signed_in("ana").await;
    let held = h.gateway.hold_next(CallKind::AddFavorite);

    let pending = h
        .client
        .toggle_favorite(Some(ana), ItemType::Product, "p1", json!({ "name": "Honey" }))
        .await
        .unwrap();

    assert!(pending.value);
    assert!(!pending.is_settled());
    assert!(h.client.is_favorite(&p("p1"), ItemType::Product).await);

    held.succeed();
    assert!(pending.confirmed().await.unwrap());
    assert!(h.client.is_favorite(&p("p1"), ItemType::Product).await);
}

#[tokio::test]
async fn toggle_twice_restores_original_membership() {
    let (h, ana) = signed_in("ana").await;

    let first = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Farm, "f1", json!({}))
        .await
        .unwrap();
    let second = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Farm, "f1", json!({}))
        .await
        .unwrap();

    assert!(first.value);
    assert!(!second.value);
    first.confirmed().await.unwrap();
    second.confirmed().await.unwrap();

    assert!(!h.client.is_favorite(&p("f1"), ItemType::Farm).await);
    let key = FavoriteKey::new(ana, ItemType::Farm, "f1");
    assert_eq!(
        h.gateway.calls()[3..],
        [GatewayCall::AddFavorite(key.clone()), GatewayCall::RemoveFavorite(key)]
    );
}

#[tokio::test]
async fn failed_toggle_rolls_back_only_its_own_key() {
    let (h, ana) = signed_in("ana").await;
    h.gateway
        .fail_next(CallKind::AddFavorite, GatewayError::Network("offline".to_string()));

    let failing = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Product, "p1", json!({}))
        .await
        .unwrap();
    let succeeding = h
        .client
        .toggle_favorite(Some(ana), ItemType::Product, "p2", json!({}))
        .await
        .unwrap();

    assert!(matches!(
        failing.confirmed().await,
        Err(SyncError::RemoteRejected {
            operation: "toggle_favorite",
            ..
        })
    ));
    succeeding.confirmed().await.unwrap();

    assert!(!h.client.is_favorite(&p("p1"), ItemType::Product).await);
    assert!(h.client.is_favorite(&p("p2"), ItemType::Product).await);
}

#[tokio::test]
async fn repeated_add_never_duplicates() {
    let (h, ana) = signed_in("ana").await;

    let first = h
        .client
        .add_favorite(Some(ana.clone()), ItemType::Service, "s1", json!({}))
        .await
        .unwrap();
    let second = h
        .client
        .add_favorite(Some(ana), ItemType::Service, "s1", json!({}))
        .await
        .unwrap();

    assert!(second.is_settled());
    first.confirmed().await.unwrap();

    let snapshot = h.client.ui_snapshot().await;
    assert_eq!(snapshot.favorites, vec![(ItemType::Service, p("s1"))]);
    assert_eq!(h.gateway.call_count(CallKind::AddFavorite), 1);
}

#[tokio::test]
async fn remove_of_absent_item_is_a_no_op() {
    let (h, ana) = signed_in("ana").await;

    let pending = h
        .client
        .remove_favorite(Some(ana), ItemType::Product, "p9")
        .await
        .unwrap();

    assert!(!pending.value);
    assert!(pending.is_settled());
    assert_eq!(h.gateway.call_count(CallKind::RemoveFavorite), 0);
}

#[tokio::test]
async fn toggle_without_owner_requires_authentication() {
    let h = harness();

    let result = h
        .client
        .toggle_favorite(None, ItemType::Product, "p1", json!({}))
        .await;

    assert!(matches!(result, Err(SyncError::RequiresAuthentication)));
    assert!(h.client.ui_snapshot().await.favorites.is_empty());
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn toggle_for_another_user_is_refused() {
    let (h, _ana) = signed_in("ana").await;
    let calls_before = h.gateway.calls().len();

    let result = h
        .client
        .toggle_favorite(Some(UserId::new("bob")), ItemType::Product, "p1", json!({}))
        .await;

    assert!(matches!(result, Err(SyncError::RequiresAuthentication)));
    assert_eq!(h.gateway.calls().len(), calls_before);
}

#[tokio::test]
async fn newer_intent_wins_when_older_call_settles_last() {
    let (h, ana) = signed_in("ana").await;

    // Slow add, fast remove
    let slow_add = h.gateway.hold_next(CallKind::AddFavorite);
    let add = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Product, "p1", json!({}))
        .await
        .unwrap();
    let remove = h
        .client
        .toggle_favorite(Some(ana), ItemType::Product, "p1", json!({}))
        .await
        .unwrap();

    remove.confirmed().await.unwrap();
    assert!(!h.client.is_favorite(&p("p1"), ItemType::Product).await);

    slow_add.succeed();
    add.confirmed().await.unwrap();
    assert!(!h.client.is_favorite(&p("p1"), ItemType::Product).await);
}

#[tokio::test]
async fn late_failure_of_superseded_add_keeps_newer_intent() {
    let (h, ana) = signed_in("ana").await;

    let slow_add = h.gateway.hold_next(CallKind::AddFavorite);
    let add = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Product, "p1", json!({}))
        .await
        .unwrap();
    let remove = h
        .client
        .toggle_favorite(Some(ana), ItemType::Product, "p1", json!({}))
        .await
        .unwrap();
    remove.confirmed().await.unwrap();

    slow_add.fail(GatewayError::Network("timeout".to_string()));
    assert!(matches!(add.confirmed().await, Err(SyncError::RemoteRejected { .. })));
    assert!(!h.client.is_favorite(&p("p1"), ItemType::Product).await);
    assert!(h.client.ui_snapshot().await.favorites.is_empty());
}

#[tokio::test]
async fn favorites_hydrate_from_remote_on_sign_in() {
    let h = harness();
    let ana = UserId::new("ana");
    h.gateway.set_favorites(
        ana.clone(),
        vec![marketplace_sync::FavoriteEntry {
            key: FavoriteKey::new(ana, ItemType::Farm, "f7"),
            snapshot: json!({ "name": "Hill Farm" }),
        }],
    );

    common::sign_in(&h, "ana").await;

    assert!(h.client.is_favorite(&p("f7"), ItemType::Farm).await);
}

#[tokio::test]
async fn late_awaited_confirmation_reads_outcome_from_state() {
    let (h, ana) = signed_in("ana").await;
    let early = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Product, "p0", json!({}))
        .await
        .unwrap();

    // More resolutions than the broadcast holds, so `early` falls behind.
    for index in 1..80 {
        h.client
            .toggle_favorite(Some(ana.clone()), ItemType::Product, format!("p{index}").as_str(), json!({}))
            .await
            .unwrap()
            .confirmed()
            .await
            .unwrap();
    }

    assert!(early.confirmed().await.unwrap());
    assert!(h.client.is_favorite(&p("p0"), ItemType::Product).await);
}

#[tokio::test]
async fn late_awaited_rejection_is_still_reported() {
    let (h, ana) = signed_in("ana").await;
    h.gateway
        .fail_next(CallKind::AddFavorite, GatewayError::Network("offline".to_string()));
    let early = h
        .client
        .toggle_favorite(Some(ana.clone()), ItemType::Product, "p0", json!({}))
        .await
        .unwrap();

    for index in 1..80 {
        h.client
            .toggle_favorite(Some(ana.clone()), ItemType::Product, format!("p{index}").as_str(), json!({}))
            .await
            .unwrap()
            .confirmed()
            .await
            .unwrap();
    }

    let error = early.confirmed().await.unwrap_err();
    assert!(matches!(error, SyncError::RemoteRejected { .. }), "{error:?}");
    assert!(!h.client.is_favorite(&p("p0"), ItemType::Product).await);
}
