//! Persisted key-value store trait.

use crate::error::StorageResult;
use futures::future::BoxFuture;

/// Device-local persisted storage (secure storage, preferences).
///
/// Writes are fire-and-forget from the engines' point of view: failures are
/// logged and never block the session.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`](crate::error::StorageError::Read) if the platform store fails.
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`](crate::error::StorageError::Write) if the platform store fails.
    fn set(&self, key: &str, value: &str) -> BoxFuture<'static, StorageResult<()>>;

    /// Delete a value. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`](crate::error::StorageError::Write) if the platform store fails.
    fn remove(&self, key: &str) -> BoxFuture<'static, StorageResult<()>>;
}
