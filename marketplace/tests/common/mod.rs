//! Shared fixtures for client integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use marketplace_sync::mocks::{MockCatalog, MockGateway, MockKeyValueStore};
use marketplace_sync::{
    AppAction, CartAction, Credentials, FavoritesAction, MarketplaceClient, MarketplaceEnvironment,
    ProductId, ProductSnapshot, Session, SyncConfig, UserId,
};
use marketplace_sync::types::ProductRecord;
use marketplace_sync_testing::{FixedClock, init_test_tracing, test_clock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub type Client = MarketplaceClient<MockGateway, MockKeyValueStore, MockCatalog>;

/// A client wired to mocks the test can script and inspect.
pub struct Harness {
    pub client: Client,
    pub gateway: MockGateway,
    pub storage: MockKeyValueStore,
    pub catalog: MockCatalog,
    pub clock: Arc<FixedClock>,
}

pub fn config() -> SyncConfig {
    SyncConfig::default()
        .with_confirmation_timeout(Duration::from_secs(2))
        .with_request_timeout(Duration::from_secs(2))
        .with_stock_fetch_timeout(Duration::from_millis(100))
}

pub fn harness_with_storage(storage: MockKeyValueStore) -> Harness {
    init_test_tracing();
    let gateway = MockGateway::new();
    let catalog = MockCatalog::new();
    let clock = Arc::new(test_clock());
    let environment = MarketplaceEnvironment::new(gateway.clone(), storage.clone(), catalog.clone())
        .with_clock(clock.clone())
        .with_config(config());

    Harness {
        client: MarketplaceClient::new(environment),
        gateway,
        storage,
        catalog,
        clock,
    }
}

pub fn harness() -> Harness {
    harness_with_storage(MockKeyValueStore::new())
}

pub fn session(user: &str, generation: &str) -> Session {
    Session {
        user_id: UserId::new(user),
        access_token: format!("{user}-access-{generation}"),
        refresh_token: format!("{user}-refresh-{generation}"),
        expires_at: None,
    }
}

pub fn credentials(user: &str) -> Credentials {
    Credentials::new(format!("{user}@example.com"), "correct horse")
}

/// Sign `user` in and wait until both engines have hydrated.
pub async fn sign_in(harness: &Harness, user: &str) -> UserId {
    let mut events = harness.client.store().subscribe_actions();
    harness.gateway.set_session(Some(session(user, "1")));
    harness.client.sign_in(credentials(user)).await.unwrap();

    let (mut favorites, mut cart) = (false, false);
    tokio::time::timeout(Duration::from_secs(2), async {
        while !(favorites && cart) {
            match events.recv().await.unwrap() {
                AppAction::Favorites(FavoritesAction::Hydrated { .. }) => favorites = true,
                AppAction::Cart(CartAction::Hydrated { .. }) => cart = true,
                _ => {},
            }
        }
    })
    .await
    .expect("engines hydrate after sign-in");

    UserId::new(user)
}

pub async fn signed_in(user: &str) -> (Harness, UserId) {
    let harness = harness();
    let user = sign_in(&harness, user).await;
    (harness, user)
}

pub fn snapshot(product: &str, price_cents: u64) -> ProductSnapshot {
    ProductSnapshot {
        product_id: ProductId::new(product),
        name: product.to_uppercase(),
        price_cents,
        image_url: None,
        stock: Some(10),
    }
}

/// Make the gateway report `stock` for `product` on a fresh fetch.
pub fn remote_stock(harness: &Harness, product: &str, stock: u32) {
    harness.gateway.set_product(ProductRecord {
        product_id: ProductId::new(product),
        name: product.to_uppercase(),
        price_cents: 250,
        stock,
    });
}

/// Poll `check` until it holds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}
