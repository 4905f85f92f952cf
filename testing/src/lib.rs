//! # Marketplace Sync Testing
//!
//! Testing utilities and helpers for the marketplace state-consistency layer.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given/When/Then harness for reducers
//! - Effect assertion helpers
//! - A deterministic clock
//! - Tracing output for tests
//!
//! Domain mocks (gateway, key-value store, catalog) live next to the traits
//! they implement, in `marketplace_sync::mocks`.
//!
//! ## Example
//!
//! ```ignore
//! use marketplace_sync_testing::{init_test_tracing, test_clock};
//!
//! #[tokio::test]
//! async fn cart_add_lands_locally() {
//!     init_test_tracing();
//!     let client = MarketplaceClient::new(test_environment(test_clock()));
//!
//!     let pending = client.add_item(snapshot, 2).await?;
//!     assert_eq!(pending.value, QuantityOutcome::Accepted(2));
//! }
//! ```

use chrono::{DateTime, Utc};
use marketplace_sync_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of core environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until [`advance`](Self::advance) is called.
    ///
    /// # Example
    ///
    /// ```
    /// use marketplace_sync_testing::mocks::FixedClock;
    /// use marketplace_sync_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::seconds(1));
    /// assert!(clock.now() > time1);
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }
}

pub use mocks::{FixedClock, test_clock};

/// Install a `tracing` subscriber that writes through the test harness
///
/// Honours `RUST_LOG` (defaults to `debug` for the marketplace crates). Safe
/// to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("marketplace_sync=debug,marketplace_sync_runtime=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
