//! Domain types for the authorization engine.
//!
//! Clients, authorization codes, access tokens, and refresh tokens.
//! All credential-bearing artifacts follow the same storage rule: the
//! plaintext value goes to the client once and only its SHA-256 hash is
//! persisted.

mod access_token;
mod auth_code;
mod client;
mod refresh_token;

pub use access_token::{AccessToken, TokenType};
pub use auth_code::AuthorizationCode;
pub use client::{Client, ClientAuthMethod, ClientValidationError};
pub use refresh_token::RefreshToken;

/// Hash a token value using SHA-256, hex-encoded.
///
/// Used both when storing new artifacts and when looking them up.
#[must_use]
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a cryptographically secure random token.
///
/// Returns `len` random bytes encoded as base64url.
#[must_use]
pub fn generate_token(len: usize) -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = vec![0u8; len];
    rand::Rng::fill(&mut rand::thread_rng(), bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}
