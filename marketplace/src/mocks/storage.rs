//! Mock persisted key-value store for testing.

use crate::error::{StorageError, StorageResult};
use crate::providers::KeyValueStore;
use futures::future::{BoxFuture, FutureExt, ready};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock key-value store.
///
/// Writes apply when the call is made, so their order is the order in which
/// reducers issued them.
#[derive(Debug, Clone, Default)]
pub struct MockKeyValueStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MockKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entries`.
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        store.values.lock().unwrap_or_else(PoisonError::into_inner).extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        store
    }

    /// Make every subsequent write (set and remove) fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current value of `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Number of successful writes (sets and removes).
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn write(&self, key: &str, apply: impl FnOnce(&mut HashMap<String, String>)) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "disk full".to_string(),
            });
        }
        apply(&mut self.values.lock().unwrap_or_else(PoisonError::into_inner));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl KeyValueStore for MockKeyValueStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>> {
        ready(Ok(self.value(key))).boxed()
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(key, |values| {
            values.insert(key.to_string(), value.to_string());
        });
        ready(result).boxed()
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(key, |values| {
            values.remove(key);
        });
        ready(result).boxed()
    }
}
