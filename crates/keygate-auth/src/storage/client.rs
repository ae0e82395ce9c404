//! Client registration storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage trait for OAuth 2.0 client registrations.
///
/// `verify_secret` is part of the trait so that a backend can keep
/// secrets in a derived form (argon2, HSM) without the engine ever
/// seeing them; the reference in-memory backend compares SHA-256
/// digests.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Stores a new client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client_id already exists or the storage
    /// operation fails.
    async fn create(&self, client: &Client) -> AuthResult<()>;

    /// Finds a client by its client_id.
    ///
    /// Returns inactive clients too; callers check `active` themselves
    /// so they can distinguish "unknown" from "disabled" in logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Verifies a presented secret against the stored credential.
    ///
    /// Returns `false` for unknown clients and clients without a secret.
    /// Implementations must compare in constant time.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool>;
}
