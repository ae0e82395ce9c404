//! JWT ID replay-tracking storage trait.
//!
//! RFC 7523 client assertions and JWT-bearer grants carry a `jti`
//! claim; accepting the same `jti` twice within its validity window
//! would allow assertion replay.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// Storage trait for tracking used JWT IDs.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Atomically registers a `jti` scoped to a client.
    ///
    /// Returns `true` if the `jti` was fresh and is now recorded until
    /// `expires_at`, `false` if it was already seen. Two concurrent
    /// calls with the same pair must not both observe `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn try_register(
        &self,
        client_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> AuthResult<bool>;

    /// Deletes entries past their expiry. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
