//! Authorization code domain type.
//!
//! Codes are single-use, short-lived, and bound at issuance to the
//! client, redirect URI, granted scope, and (when present) the PKCE
//! challenge. The code value itself is never stored; only its SHA-256
//! hash is.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pkce::PkceChallengeMethod;

/// Authorization code stored between the authorization and token
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCode {
    /// Unique identifier for this code record.
    pub id: Uuid,

    /// SHA-256 hash of the code value handed to the client.
    pub code_hash: String,

    /// Client the code was issued to. Exchange by any other client
    /// fails.
    pub client_id: String,

    /// Subject of the authenticated end user.
    pub user_id: String,

    /// Redirect URI the authorization request used. The token request
    /// must repeat it exactly.
    pub redirect_uri: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// PKCE challenge captured at authorization time, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// Method the challenge was produced with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// OpenID Connect nonce to echo into the ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// When the end user last authenticated.
    #[serde(with = "time::serde::rfc3339")]
    pub auth_time: OffsetDateTime,

    /// When this code was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this code expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the exchange issues a refresh token, decided from the
    /// client's registration at authorization time.
    #[serde(default)]
    pub issue_refresh_token: bool,

    /// Whether this code has already been exchanged.
    pub used: bool,
}

impl AuthorizationCode {
    /// Returns `true` if this code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this code can still be exchanged.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.used && !self.is_expired()
    }

    /// Returns the stored PKCE challenge method, parsed.
    ///
    /// `None` when no challenge was captured. A stored method string
    /// that no longer parses is treated as absent; issuance validates
    /// the method, so this only happens with hand-edited records.
    #[must_use]
    pub fn challenge_method(&self) -> Option<PkceChallengeMethod> {
        self.code_challenge_method
            .as_deref()
            .and_then(|m| PkceChallengeMethod::parse(m).ok())
    }
}
