//! Mock providers for testing.
//!
//! In-memory implementations of the provider traits. Enabled by the
//! `test-utils` feature (on by default).

mod catalog;
mod gateway;
mod storage;

pub use catalog::MockCatalog;
pub use gateway::{CallKind, GatewayCall, HeldCall, MockGateway};
pub use storage::MockKeyValueStore;

use crate::environment::MarketplaceEnvironment;

/// Environment wired entirely with mocks.
pub type MockEnvironment = MarketplaceEnvironment<MockGateway, MockKeyValueStore, MockCatalog>;
