use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found")]
    NotFound,
    #[error("Session store operation timed out")]
    Timeout,
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// Revocable, self-expiring mapping from session id to owning user id.
///
/// Every operation must be atomic per key: two concurrent `delete` calls on the
/// same live id must report `1` to exactly one of them.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Creates or overwrites a session that disappears on its own after `ttl`.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` or `StoreError::Timeout` if the backend fails.
    async fn put(&self, session_id: &str, user_id: i64, ttl: Duration) -> Result<(), StoreError>;

    /// Looks up the owner of a live session.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the session was revoked, expired or never existed.
    async fn get(&self, session_id: &str) -> Result<i64, StoreError>;

    /// Removes a session and reports how many live entries were removed (0 or 1).
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` or `StoreError::Timeout` if the backend fails.
    async fn delete(&self, session_id: &str) -> Result<u64, StoreError>;

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if it is not.
    async fn ping(&self) -> Result<(), StoreError>;
}
