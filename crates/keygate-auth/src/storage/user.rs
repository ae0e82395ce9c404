//! Resource-owner credential storage trait.

use async_trait::async_trait;

use crate::AuthResult;

/// Storage trait backing the resource-owner password grant.
///
/// The engine never sees stored passwords; the backend performs the
/// comparison with whatever KDF it uses and returns the subject
/// identifier on success.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Verifies a username/password pair.
    ///
    /// Returns `Some(subject)` on success, `None` for unknown users and
    /// wrong passwords alike.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<Option<String>>;
}
