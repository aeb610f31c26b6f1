//! Error types for the data layer.
//!
//! [`StoreError`] covers the key-value store. Every variant means the store
//! could not complete the operation; callers surface it unchanged and never
//! substitute default values. [`ArchiveError`] covers the `PostgreSQL`
//! question archive.

use uuid::Uuid;

/// Errors from the key-value store backing live polls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing connection failed to complete the operation.
    #[error("store unavailable during {operation}: {reason}")]
    Unavailable {
        /// The store command that failed.
        operation: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// The operation did not complete within the configured deadline.
    #[error("store timed out during {operation} after {timeout_ms} ms")]
    Timeout {
        /// The store command that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The key holds a value of a different type than the operation expects.
    #[error("wrong value type at key {key} for {operation}")]
    WrongType {
        /// The store command that was refused.
        operation: &'static str,
        /// The offending key.
        key: String,
    },

    /// A configuration error (bad URL, etc.).
    #[error("store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Build an [`StoreError::Unavailable`] from any displayable cause.
    pub fn unavailable(operation: &'static str, reason: impl core::fmt::Display) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Whether the error was a deadline expiry rather than a hard failure.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors from the question archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// No archived question has the given identifier.
    #[error("archived question not found: {0}")]
    NotFound(Uuid),

    /// A value could not be represented in the archive schema.
    #[error("invalid archive value: {0}")]
    InvalidValue(String),

    /// A configuration error.
    #[error("archive configuration error: {0}")]
    Config(String),
}
