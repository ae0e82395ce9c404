//! Access token storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::AccessToken;

/// Storage trait for opaque access tokens.
#[async_trait]
pub trait AccessTokenStorage: Send + Sync {
    /// Stores a new access token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create(&self, token: &AccessToken) -> AuthResult<()>;

    /// Finds an access token by its hash.
    ///
    /// Returns tokens regardless of expiration and revocation status;
    /// callers check `is_active()` before honoring one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<AccessToken>>;

    /// Revokes the access token with this hash. Idempotent: revoking an
    /// already-revoked token succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not found or the operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<()>;

    /// Revokes every access token issued alongside the given refresh
    /// token. Returns the number revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn revoke_by_refresh_token(&self, refresh_token_id: Uuid) -> AuthResult<u64>;

    /// Deletes expired and revoked tokens. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
