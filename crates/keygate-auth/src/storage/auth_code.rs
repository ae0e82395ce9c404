//! Authorization code storage trait.
//!
//! The single-use property of authorization codes lives here:
//! [`AuthCodeStorage::consume`] must atomically mark a code used and
//! return it, so two concurrent exchanges of the same code can never
//! both succeed.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::AuthorizationCode;

/// Storage trait for authorization codes.
#[async_trait]
pub trait AuthCodeStorage: Send + Sync {
    /// Stores a new authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Atomically marks the code with this hash as used and returns it.
    ///
    /// Returns `None` if no code with this hash exists OR the code was
    /// already used; a second concurrent call for the same hash must
    /// observe `None`. The returned record may still be expired; callers
    /// check `is_expired()` after consuming.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, code_hash: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Deletes expired codes. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
