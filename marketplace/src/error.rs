//! Error types for the marketplace consistency layer.

use marketplace_sync_runtime::StoreError;
use thiserror::Error;

/// Result type alias for client-facing operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for remote gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result type alias for persisted key-value store calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Client-facing error taxonomy.
///
/// Domain conditions (`OutOfStock`, `InsufficientStock`) are *not* errors;
/// they are returned as part of a [`QuantityOutcome`](crate::types::QuantityOutcome).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    // ═══════════════════════════════════════════════════════════
    // Capability
    // ═══════════════════════════════════════════════════════════

    /// A mutation was requested without an active session.
    ///
    /// Never retried; the caller should redirect to sign-in.
    #[error("Sign-in required")]
    RequiresAuthentication,

    // ═══════════════════════════════════════════════════════════
    // Remote
    // ═══════════════════════════════════════════════════════════

    /// A gateway call failed. Optimistic state has been rolled back.
    #[error("{operation} rejected by remote: {reason}")]
    RemoteRejected {
        /// Operation that failed (e.g. `add_favorite`)
        operation: &'static str,
        /// Gateway-provided reason
        reason: String,
    },

    /// No remote confirmation arrived in time.
    ///
    /// The local mutation stays applied; the remote call may still settle.
    #[error("Timed out waiting for remote confirmation")]
    ConfirmationTimeout,

    // ═══════════════════════════════════════════════════════════
    // Checkout
    // ═══════════════════════════════════════════════════════════

    /// Checkout gated by stale line items.
    #[error("Checkout blocked: {} line item(s) exceed current stock", stale_lines.len())]
    CheckoutBlocked {
        /// Products whose quantity no longer matches stock
        stale_lines: Vec<crate::types::ProductId>,
    },

    /// Checkout requested on an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    // ═══════════════════════════════════════════════════════════
    // Runtime
    // ═══════════════════════════════════════════════════════════

    /// The store rejected the action (usually shutting down).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Build a `RemoteRejected` from a gateway failure.
    #[must_use]
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::RemoteRejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Failures reported by the remote data gateway.
///
/// The gateway never panics across the core boundary; every call resolves
/// to one of these or a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure (offline, timeout, DNS).
    #[error("Network error: {0}")]
    Network(String),

    /// The service refused the request.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Credentials are missing, expired or revoked.
    #[error("Unauthorized")]
    Unauthorized,

    /// The requested record does not exist.
    #[error("Not found")]
    NotFound,
}

/// Local persistence failure.
///
/// Logged, never propagated: the session continues in memory for this run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Read failed.
    #[error("Failed to read {key}: {reason}")]
    Read {
        /// Storage key
        key: String,
        /// Platform error
        reason: String,
    },

    /// Write or delete failed.
    #[error("Failed to write {key}: {reason}")]
    Write {
        /// Storage key
        key: String,
        /// Platform error
        reason: String,
    },
}
