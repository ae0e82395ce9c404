//! OAuth 2.0 client registration types.

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::TokenType;

// =============================================================================
// Client Authentication Method
// =============================================================================

/// Token-endpoint authentication methods a client can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// Public client, no credentials. Must still send `client_id`.
    None,
    /// Secret in the HTTP Basic Authorization header.
    ClientSecretBasic,
    /// Secret in the request body (`client_secret` parameter).
    ClientSecretPost,
    /// HMAC-signed JWT assertion keyed with the client secret (RFC 7523).
    ClientSecretJwt,
    /// Asymmetrically signed JWT assertion verified against the client's
    /// registered JWKS (RFC 7523).
    PrivateKeyJwt,
}

impl ClientAuthMethod {
    /// Returns the registered metadata name for this method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
        }
    }

    /// Returns `true` if this method proves possession of a client secret.
    #[must_use]
    pub fn uses_secret(&self) -> bool {
        matches!(
            self,
            Self::ClientSecretBasic | Self::ClientSecretPost | Self::ClientSecretJwt
        )
    }
}

impl std::fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// OAuth 2.0 client registration.
///
/// Grant types and response types are open-ended name lists so that
/// extension grants (for example the RFC 7523 JWT-bearer URN) fit the
/// same registration shape; a name with no registered handler simply
/// never matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Registered client secret (for confidential clients). Stored here
    /// in the registration record; a production backend may keep a
    /// derived form behind its own [`crate::storage::ClientStorage`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// When the registered secret stops being accepted. `None` means the
    /// secret never expires.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub secret_expires_at: Option<OffsetDateTime>,

    /// Human-readable display name.
    pub name: String,

    /// Grant type names this client may use at the token endpoint.
    pub grant_types: Vec<String>,

    /// Response type names this client may use at the authorization
    /// endpoint.
    #[serde(default)]
    pub response_types: Vec<String>,

    /// Token type names this client may be issued. Empty list means the
    /// server default, Bearer.
    #[serde(default)]
    pub token_types: Vec<String>,

    /// Registered token-endpoint authentication method.
    pub auth_method: ClientAuthMethod,

    /// Allowed redirect URIs, compared by exact string match.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes this client may request. Empty list means any scope the
    /// server offers.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether this is a confidential client.
    pub confidential: bool,

    /// Whether this client is currently active.
    pub active: bool,

    /// Access token lifetime override in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<i64>,

    /// Refresh token lifetime override in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime: Option<i64>,

    /// Whether PKCE is required for the authorization-code flow.
    /// Public clients always require PKCE regardless of this setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkce_required: Option<bool>,

    /// Inline JWKS holding the public keys that verify `private_key_jwt`
    /// assertions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,
}

impl Client {
    /// Validates the registration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first rule the registration violates.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.grant_types.is_empty() && self.response_types.is_empty() {
            return Err(ClientValidationError::NoFlows);
        }

        // Public clients hold no secret and register no secret-based method
        if !self.confidential {
            if self.auth_method != ClientAuthMethod::None {
                return Err(ClientValidationError::PublicClientWithCredentialMethod);
            }
            if self.grant_types.iter().any(|g| g == "client_credentials") {
                return Err(ClientValidationError::PublicClientCredentials);
            }
        }

        if self.auth_method.uses_secret() && self.client_secret.is_none() {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.auth_method == ClientAuthMethod::PrivateKeyJwt && self.jwks.is_none() {
            return Err(ClientValidationError::MissingJwks);
        }

        if self.grant_types.iter().any(|g| g == "authorization_code")
            && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        Ok(())
    }

    /// Checks if the given redirect URI is registered, by exact match.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the given grant type name is registered for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Checks if tokens of the given type may be issued to this client.
    /// An empty registration allows the server default, Bearer.
    #[must_use]
    pub fn is_token_type_allowed(&self, token_type: TokenType) -> bool {
        if self.token_types.is_empty() {
            token_type == TokenType::Bearer
        } else {
            self.token_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(token_type.as_str()))
        }
    }

    /// Returns `true` if the registered secret has expired.
    #[must_use]
    pub fn secret_expired(&self) -> bool {
        self.secret_expires_at
            .is_some_and(|at| OffsetDateTime::now_utc() >= at)
    }

    /// Checks if the given response type name is registered for this
    /// client.
    #[must_use]
    pub fn is_response_type_allowed(&self, response_type: &str) -> bool {
        self.response_types.iter().any(|r| r == response_type)
    }

    /// Returns the client's scope restriction, or `None` when the client
    /// may request any server scope.
    #[must_use]
    pub fn scope_restriction(&self) -> Option<&[String]> {
        if self.scopes.is_empty() {
            None
        } else {
            Some(&self.scopes)
        }
    }

    /// Returns whether PKCE is required for this client.
    ///
    /// Always required for public clients; confidential clients follow
    /// their `pkce_required` setting (default false).
    #[must_use]
    pub fn requires_pkce(&self) -> bool {
        if self.confidential {
            self.pkce_required.unwrap_or(false)
        } else {
            true
        }
    }

    /// Access token lifetime in seconds, defaulting to 3600.
    #[must_use]
    pub fn access_token_lifetime_secs(&self) -> i64 {
        self.access_token_lifetime.unwrap_or(3600)
    }

    /// Refresh token lifetime in seconds, defaulting to 30 days.
    #[must_use]
    pub fn refresh_token_lifetime_secs(&self) -> i64 {
        self.refresh_token_lifetime.unwrap_or(2_592_000)
    }
}

/// Client registration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// The client_id is empty.
    #[error("client_id must not be empty")]
    EmptyClientId,

    /// The client registers neither grant types nor response types.
    #[error("client must register at least one grant type or response type")]
    NoFlows,

    /// A public client registered a credential-based auth method.
    #[error("public clients must use the 'none' authentication method")]
    PublicClientWithCredentialMethod,

    /// A public client registered the client_credentials grant.
    #[error("public clients cannot use the client_credentials grant")]
    PublicClientCredentials,

    /// A secret-based auth method is registered without a secret.
    #[error("secret-based authentication methods require a client_secret")]
    MissingSecret,

    /// private_key_jwt is registered without a JWKS.
    #[error("private_key_jwt requires a registered JWKS")]
    MissingJwks,

    /// The authorization_code grant is registered without redirect URIs.
    #[error("authorization_code clients must register at least one redirect URI")]
    NoRedirectUris,
}
