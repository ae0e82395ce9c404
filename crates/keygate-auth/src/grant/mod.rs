//! Grant type handlers for the token endpoint.
//!
//! Each grant type is a [`GrantHandler`] registered by wire name in a
//! [`GrantRegistry`]. A handler validates its grant and fills a
//! [`GrantData`] accumulator; the token endpoint performs the actual
//! issuance from the accumulated data, so handlers never mint tokens
//! themselves.

mod authorization_code;
mod client_credentials;
mod jwt_bearer;
mod password;
mod refresh_token;

pub use authorization_code::AuthorizationCodeGrant;
pub use client_credentials::ClientCredentialsGrant;
pub use jwt_bearer::JwtBearerGrant;
pub use password::PasswordGrant;
pub use refresh_token::RefreshTokenGrant;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::client_auth::AuthenticatedClient;
use crate::error::AuthError;

/// Wire name of the authorization-code grant.
pub const AUTHORIZATION_CODE: &str = "authorization_code";
/// Wire name of the client-credentials grant.
pub const CLIENT_CREDENTIALS: &str = "client_credentials";
/// Wire name of the refresh-token grant.
pub const REFRESH_TOKEN: &str = "refresh_token";
/// Wire name of the resource-owner password grant.
pub const PASSWORD: &str = "password";
/// Wire name of the RFC 7523 JWT-bearer authorization grant.
pub const JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

// =============================================================================
// Token Request
// =============================================================================

/// Form body of a token-endpoint request.
///
/// All grant-specific parameters are optional at parse time; each
/// handler enforces presence of the ones it needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// The requested grant type.
    pub grant_type: String,

    /// Authorization code (authorization_code grant).
    pub code: Option<String>,

    /// Redirect URI used in the authorization request.
    pub redirect_uri: Option<String>,

    /// PKCE code verifier.
    pub code_verifier: Option<String>,

    /// Refresh token value (refresh_token grant).
    pub refresh_token: Option<String>,

    /// Requested scope.
    pub scope: Option<String>,

    /// Resource-owner username (password grant).
    pub username: Option<String>,

    /// Resource-owner password (password grant).
    pub password: Option<String>,

    /// JWT authorization grant assertion (jwt-bearer grant).
    pub assertion: Option<String>,

    /// Client ID (public clients and client_secret_post).
    pub client_id: Option<String>,

    /// Client secret (client_secret_post).
    pub client_secret: Option<String>,

    /// Client assertion (client_secret_jwt / private_key_jwt).
    pub client_assertion: Option<String>,

    /// Client assertion type.
    pub client_assertion_type: Option<String>,
}

// =============================================================================
// Grant Data
// =============================================================================

/// Pending refresh-token rotation recorded by the refresh grant.
///
/// Issuance performs the rotation atomically; carrying the old hash
/// here keeps the redeem-at-most-once decision inside storage.
#[derive(Debug, Clone)]
pub struct RefreshRotation {
    /// Hash of the token being rotated away.
    pub old_hash: String,

    /// Expiry carried over to the replacement (no sliding window).
    pub expires_at: Option<OffsetDateTime>,
}

/// Accumulator a grant handler fills while validating a request.
///
/// Immutable by convention: every mutation goes through a `with_*`
/// builder that consumes and returns the value.
#[derive(Debug, Clone)]
pub struct GrantData {
    /// Client the tokens will be issued to.
    pub client_id: String,

    /// Authenticated subject, absent for machine grants.
    pub subject: Option<String>,

    /// Scopes the issued tokens will carry, in request order.
    pub scope: Vec<String>,

    /// OpenID Connect nonce carried from the authorization request.
    pub nonce: Option<String>,

    /// When the end user authenticated.
    pub auth_time: Option<OffsetDateTime>,

    /// Whether a refresh token is issued alongside the access token.
    pub issue_refresh_token: bool,

    /// Rotation to perform instead of creating a fresh refresh token.
    pub refresh_rotation: Option<RefreshRotation>,

    /// Free-form annotations carried onto the issued access token.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GrantData {
    /// Starts an accumulator for the given client.
    #[must_use]
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            subject: None,
            scope: Vec::new(),
            nonce: None,
            auth_time: None,
            issue_refresh_token: false,
            refresh_rotation: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the authenticated subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the granted scope list.
    #[must_use]
    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the OpenID Connect nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the end-user authentication time.
    #[must_use]
    pub fn with_auth_time(mut self, auth_time: OffsetDateTime) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Requests a refresh token alongside the access token.
    #[must_use]
    pub fn with_refresh_token(mut self) -> Self {
        self.issue_refresh_token = true;
        self
    }

    /// Requests rotation of an existing refresh token.
    #[must_use]
    pub fn with_refresh_rotation(mut self, rotation: RefreshRotation) -> Self {
        self.issue_refresh_token = true;
        self.refresh_rotation = Some(rotation);
        self
    }

    /// Records one metadata entry carried onto the issued access token.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether an ID token is due: OpenID request with a known subject.
    #[must_use]
    pub fn wants_id_token(&self) -> bool {
        self.subject.is_some() && self.scope.iter().any(|s| s == "openid")
    }
}

// =============================================================================
// Handler Trait and Registry
// =============================================================================

/// A grant type implementation.
#[async_trait]
pub trait GrantHandler: Send + Sync {
    /// The wire name this handler serves.
    fn grant_type(&self) -> &'static str;

    /// Validates the grant and fills the accumulator.
    ///
    /// The caller has already authenticated the client and checked that
    /// the grant type is registered for it.
    ///
    /// # Errors
    ///
    /// Returns the OAuth error to surface for this request.
    async fn validate(
        &self,
        request: &TokenRequest,
        client: &AuthenticatedClient,
        data: GrantData,
    ) -> AuthResult<GrantData>;
}

impl std::fmt::Debug for dyn GrantHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantHandler")
            .field("grant_type", &self.grant_type())
            .finish()
    }
}

/// Name-keyed registry of grant handlers.
#[derive(Default)]
pub struct GrantRegistry {
    handlers: HashMap<&'static str, Arc<dyn GrantHandler>>,
}

impl GrantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own wire name, replacing any
    /// previous handler with that name.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn GrantHandler>) -> Self {
        self.handlers.insert(handler.grant_type(), handler);
        self
    }

    /// Looks up the handler for a wire name.
    ///
    /// # Errors
    ///
    /// Returns `unsupported_grant_type` when no handler is registered.
    pub fn get(&self, grant_type: &str) -> AuthResult<&Arc<dyn GrantHandler>> {
        self.handlers
            .get(grant_type)
            .ok_or_else(|| AuthError::unsupported_grant_type(grant_type))
    }

    /// Registered grant type names, for metadata documents.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyGrant;

    #[async_trait]
    impl GrantHandler for DummyGrant {
        fn grant_type(&self) -> &'static str {
            "dummy"
        }

        async fn validate(
            &self,
            _request: &TokenRequest,
            client: &AuthenticatedClient,
            data: GrantData,
        ) -> AuthResult<GrantData> {
            Ok(data.with_subject(client.client.client_id.clone()))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = GrantRegistry::new().with_handler(Arc::new(DummyGrant));
        assert!(registry.get("dummy").is_ok());

        let err = registry.get("saml2").unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_grant_type");
        assert_eq!(registry.names(), vec!["dummy"]);
    }

    #[test]
    fn test_grant_data_builders() {
        let now = OffsetDateTime::now_utc();
        let data = GrantData::for_client("web")
            .with_subject("user-1")
            .with_scope(vec!["openid".to_string()])
            .with_nonce("n-123")
            .with_auth_time(now)
            .with_metadata("redirect_uri", serde_json::json!("https://app/cb"))
            .with_refresh_token();

        assert_eq!(data.client_id, "web");
        assert_eq!(data.subject.as_deref(), Some("user-1"));
        assert!(data.issue_refresh_token);
        assert!(data.wants_id_token());
        assert_eq!(
            data.metadata.get("redirect_uri"),
            Some(&serde_json::json!("https://app/cb"))
        );

        let machine = GrantData::for_client("svc")
            .with_scope(vec!["openid".to_string()]);
        assert!(!machine.wants_id_token());
    }
}
