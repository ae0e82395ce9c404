//! Refresh token storage trait.
//!
//! Tokens are stored as SHA-256 hashes only. Rotation is a single
//! atomic operation so a presented token can be redeemed at most once
//! under concurrency.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::RefreshToken;

/// Storage trait for refresh tokens.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Finds a refresh token by its hash.
    ///
    /// Returns tokens regardless of validity; callers check
    /// `is_valid()` before redeeming.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Finds a refresh token by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<RefreshToken>>;

    /// Atomically rotates a token: marks the record with `old_hash` as
    /// replaced by `replacement.id` and stores the replacement.
    ///
    /// Returns `false` without storing anything if the old token does
    /// not exist or was already rotated or revoked; a second concurrent
    /// rotation of the same hash must observe `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn rotate(&self, old_hash: &str, replacement: &RefreshToken) -> AuthResult<bool>;

    /// Revokes the refresh token with this hash. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not found or the operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<()>;

    /// Revokes the refresh token with this ID. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn revoke_by_id(&self, id: Uuid) -> AuthResult<()>;

    /// Deletes expired and revoked tokens. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
