//! Token signing seam.
//!
//! Access and refresh tokens are opaque, but OpenID Connect ID tokens
//! must be signed JWTs. The engine delegates that to a [`TokenSigner`]
//! so key management stays a deployment concern.

use async_trait::async_trait;
use serde_json::Value;

use crate::AuthResult;

/// Signs claim sets into compact JWTs.
#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// Signs the claim set and returns the compact JWT serialization.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no signing key is available.
    async fn sign(&self, claims: &Value) -> AuthResult<String>;

    /// The `alg` header value this signer produces.
    fn algorithm(&self) -> &'static str;
}
