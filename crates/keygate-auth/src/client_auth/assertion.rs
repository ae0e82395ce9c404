//! JWT client assertion validation (RFC 7523).
//!
//! Covers both `client_secret_jwt` (HMAC keyed with the client secret)
//! and `private_key_jwt` (asymmetric, verified against the client's
//! registered JWKS). The assertion must carry:
//!
//! - `iss` and `sub` equal to the client_id
//! - `aud` containing the token endpoint URL
//! - `exp` within the configured maximum lifetime
//! - `jti` unique per client within its validity window

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::JtiStorage;
use crate::types::Client;

/// The only client assertion type the token endpoint accepts.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// JWT claims for client assertions per RFC 7523.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer, must be the client_id.
    pub iss: String,

    /// Subject, must be the client_id.
    pub sub: String,

    /// Audience, must contain the token endpoint URL.
    pub aud: StringOrArray,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// JWT ID for replay prevention.
    pub jti: String,

    /// Issued-at time as Unix timestamp (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Audience claim: a single string or an array of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// Single audience value.
    String(String),
    /// Multiple audience values.
    Array(Vec<String>),
}

impl StringOrArray {
    /// Checks if the audience contains the given value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::Array(arr) => arr.iter().any(|s| s == value),
        }
    }
}

// =============================================================================
// Unverified Header Inspection
// =============================================================================

fn decode_segment(segment: &str, what: &str) -> AuthResult<Vec<u8>> {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::invalid_client(format!("Invalid JWT {what} encoding")))
}

fn split_jwt(assertion: &str) -> AuthResult<[&str; 3]> {
    let mut parts = assertion.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => Ok([h, p, s]),
        _ => Err(AuthError::invalid_client("Invalid JWT format")),
    }
}

/// Extracts the client_id from an unverified assertion payload.
///
/// Used to look up the client before the signature can be checked.
/// Prefers `iss`, falls back to `sub`.
pub fn extract_client_id_unverified(assertion: &str) -> AuthResult<String> {
    let [_, payload, _] = split_jwt(assertion)?;
    let bytes = decode_segment(payload, "payload")?;

    #[derive(Deserialize)]
    struct MinimalClaims {
        #[serde(default)]
        iss: Option<String>,
        #[serde(default)]
        sub: Option<String>,
    }

    let claims: MinimalClaims = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::invalid_client("Invalid JWT payload JSON"))?;

    claims
        .iss
        .or(claims.sub)
        .ok_or_else(|| AuthError::invalid_client("JWT missing iss and sub claims"))
}

/// Extracts the signing algorithm from an unverified JWT header.
pub fn extract_algorithm(assertion: &str) -> AuthResult<Algorithm> {
    let [header, _, _] = split_jwt(assertion)?;
    let bytes = decode_segment(header, "header")?;

    #[derive(Deserialize)]
    struct JwtHeader {
        alg: String,
    }

    let header: JwtHeader = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::invalid_client("Invalid JWT header JSON"))?;

    match header.alg.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        "PS256" => Ok(Algorithm::PS256),
        "PS384" => Ok(Algorithm::PS384),
        "PS512" => Ok(Algorithm::PS512),
        other => Err(AuthError::invalid_client(format!(
            "Unsupported JWT algorithm: {other}"
        ))),
    }
}

/// Extracts the key ID from an unverified JWT header, if present.
pub fn extract_key_id(assertion: &str) -> AuthResult<Option<String>> {
    let [header, _, _] = split_jwt(assertion)?;
    let bytes = decode_segment(header, "header")?;

    #[derive(Deserialize)]
    struct JwtHeader {
        #[serde(default)]
        kid: Option<String>,
    }

    let header: JwtHeader = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::invalid_client("Invalid JWT header JSON"))?;

    Ok(header.kid)
}

/// Returns `true` if the algorithm belongs to the HMAC family, which
/// selects `client_secret_jwt` over `private_key_jwt`.
#[must_use]
pub fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

// =============================================================================
// Assertion Validator
// =============================================================================

/// Validates JWT client assertions and tracks `jti` values to prevent
/// replay.
pub struct AssertionValidator {
    token_endpoint: String,
    max_lifetime_secs: i64,
    jti_storage: Arc<dyn JtiStorage>,
}

impl AssertionValidator {
    /// Creates a validator bound to the token endpoint URL it accepts
    /// as audience.
    pub fn new(
        token_endpoint: impl Into<String>,
        max_lifetime_secs: i64,
        jti_storage: Arc<dyn JtiStorage>,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            max_lifetime_secs,
            jti_storage,
        }
    }

    /// Resolves the decoding key for an assertion from the client's
    /// registration.
    ///
    /// HMAC algorithms key off the client secret; everything else is
    /// looked up in the client's JWKS by `kid`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the registration lacks the needed
    /// material or no JWKS key matches.
    pub fn decoding_key(
        &self,
        client: &Client,
        algorithm: Algorithm,
        kid: Option<&str>,
    ) -> AuthResult<DecodingKey> {
        if is_hmac(algorithm) {
            let secret = client.client_secret.as_deref().ok_or_else(|| {
                AuthError::invalid_client("Client has no secret for client_secret_jwt")
            })?;
            return Ok(DecodingKey::from_secret(secret.as_bytes()));
        }

        let jwks = client.jwks.as_ref().ok_or_else(|| {
            AuthError::invalid_client("Client has no JWKS registered for private_key_jwt")
        })?;

        let jwk = match kid {
            Some(kid) => jwks.find(kid),
            // Without a kid the key set must be unambiguous
            None if jwks.keys.len() == 1 => jwks.keys.first(),
            None => None,
        }
        .ok_or_else(|| AuthError::invalid_client("No matching key in client JWKS"))?;

        DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::invalid_client(format!("Unusable JWKS key: {e}")))
    }

    /// Validates an assertion end to end and consumes its `jti`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for signature, claim, lifetime, and
    /// replay failures.
    pub async fn validate(
        &self,
        assertion: &str,
        expected_client_id: &str,
        decoding_key: &DecodingKey,
        algorithm: Algorithm,
    ) -> AuthResult<AssertionClaims> {
        // 1. Signature plus exp/aud/iss via jsonwebtoken
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.token_endpoint]);
        validation.set_issuer(&[expected_client_id]);

        let token_data = jsonwebtoken::decode::<AssertionClaims>(assertion, decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(client_id = expected_client_id, error = %e, "client assertion rejected");
                AuthError::invalid_client(format!("Invalid client assertion: {e}"))
            })?;

        let claims = token_data.claims;

        // 2. iss == sub == client_id
        if claims.iss != expected_client_id || claims.sub != expected_client_id {
            return Err(AuthError::invalid_client(
                "Assertion iss and sub must equal client_id",
            ));
        }

        // 3. aud contains the token endpoint (jsonwebtoken accepts any
        // match; re-check against the exact URL)
        if !claims.aud.contains(&self.token_endpoint) {
            return Err(AuthError::invalid_client(
                "Assertion audience must contain the token endpoint URL",
            ));
        }

        // 4. exp within the accepted window
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if claims.exp > now + self.max_lifetime_secs {
            return Err(AuthError::invalid_client(format!(
                "Assertion exp must be within {} seconds",
                self.max_lifetime_secs
            )));
        }

        // 5. jti replay check
        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|_| AuthError::invalid_client("Invalid exp timestamp"))?;
        let fresh = self
            .jti_storage
            .try_register(expected_client_id, &claims.jti, expires_at)
            .await?;
        if !fresh {
            return Err(AuthError::invalid_client("Assertion jti already used"));
        }

        Ok(claims)
    }

    /// Validates an RFC 7523 authorization-grant assertion.
    ///
    /// Unlike client-authentication assertions, `sub` names the end
    /// user the client is asserting authorization for; `iss` must still
    /// equal the client_id of the already-authenticated client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` for signature, claim, lifetime, and
    /// replay failures.
    pub async fn validate_grant(
        &self,
        assertion: &str,
        client_id: &str,
        decoding_key: &DecodingKey,
        algorithm: Algorithm,
    ) -> AuthResult<AssertionClaims> {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.token_endpoint]);
        validation.set_issuer(&[client_id]);

        let token_data = jsonwebtoken::decode::<AssertionClaims>(assertion, decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(client_id, error = %e, "grant assertion rejected");
                AuthError::invalid_grant(format!("Invalid assertion: {e}"))
            })?;

        let claims = token_data.claims;

        if claims.iss != client_id {
            return Err(AuthError::invalid_grant(
                "Assertion issuer must equal client_id",
            ));
        }
        if claims.sub.is_empty() {
            return Err(AuthError::invalid_grant("Assertion sub must name a subject"));
        }
        if !claims.aud.contains(&self.token_endpoint) {
            return Err(AuthError::invalid_grant(
                "Assertion audience must contain the token endpoint URL",
            ));
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        if claims.exp > now + self.max_lifetime_secs {
            return Err(AuthError::invalid_grant(format!(
                "Assertion exp must be within {} seconds",
                self.max_lifetime_secs
            )));
        }

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|_| AuthError::invalid_grant("Invalid exp timestamp"))?;
        let fresh = self
            .jti_storage
            .try_register(client_id, &claims.jti, expires_at)
            .await?;
        if !fresh {
            return Err(AuthError::invalid_grant("Assertion jti already used"));
        }

        Ok(claims)
    }
}
