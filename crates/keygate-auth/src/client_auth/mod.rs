//! Client authentication at the token endpoint.
//!
//! Supported methods per RFC 6749 and OpenID Connect Core Section 9:
//!
//! - `none` - public clients, `client_id` only
//! - `client_secret_basic` - HTTP Basic Authorization header
//! - `client_secret_post` - secret in the request body
//! - `client_secret_jwt` - HMAC-signed assertion (RFC 7523)
//! - `private_key_jwt` - asymmetrically signed assertion (RFC 7523)
//!
//! Resolution is fail-closed: every mechanism present in the request is
//! extracted as a candidate first, and more than one candidate is an
//! `invalid_request` before any credential is verified. A client that
//! authenticates with a mechanism other than its registered method is
//! rejected even if the credential itself is correct.

mod assertion;

pub use assertion::{
    AssertionClaims, AssertionValidator, JWT_BEARER_ASSERTION_TYPE, StringOrArray,
    extract_algorithm, extract_client_id_unverified, extract_key_id, is_hmac,
};

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::{ClientStorage, JtiStorage};
use crate::types::{Client, ClientAuthMethod};

// =============================================================================
// Request Credentials
// =============================================================================

/// Raw credential material carried by a token-endpoint request.
#[derive(Debug, Clone, Default)]
pub struct ClientCredentials {
    /// Decoded HTTP Basic credentials, if the header was present.
    pub basic: Option<(String, String)>,

    /// `client_id` body parameter.
    pub client_id: Option<String>,

    /// `client_secret` body parameter.
    pub client_secret: Option<String>,

    /// `client_assertion_type` body parameter.
    pub client_assertion_type: Option<String>,

    /// `client_assertion` body parameter.
    pub client_assertion: Option<String>,
}

/// Parses an HTTP Basic Authorization header value into
/// `(client_id, client_secret)`.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (id, secret) = credentials.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client registration.
    pub client: Client,

    /// The method that authenticated it.
    pub auth_method: ClientAuthMethod,
}

// =============================================================================
// Candidate Extraction
// =============================================================================

/// One authentication mechanism found in the request.
#[derive(Debug)]
enum Candidate {
    Basic { client_id: String, secret: String },
    Post { client_id: String, secret: String },
    Assertion { assertion: String },
}

impl Candidate {
    fn mechanism(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "client_secret_basic",
            Self::Post { .. } => "client_secret_post",
            Self::Assertion { .. } => "client_assertion",
        }
    }
}

fn extract_candidates(credentials: &ClientCredentials) -> AuthResult<Vec<Candidate>> {
    let mut candidates = Vec::new();

    if let Some((client_id, secret)) = &credentials.basic {
        // A body client_id that contradicts the header is malformed
        if let Some(body_id) = &credentials.client_id {
            if body_id != client_id {
                return Err(AuthError::invalid_request(
                    "client_id in body does not match Basic credentials",
                ));
            }
        }
        candidates.push(Candidate::Basic {
            client_id: client_id.clone(),
            secret: secret.clone(),
        });
    }

    if let Some(secret) = &credentials.client_secret {
        let client_id = credentials.client_id.clone().ok_or_else(|| {
            AuthError::invalid_request("client_secret provided without client_id")
        })?;
        candidates.push(Candidate::Post {
            client_id,
            secret: secret.clone(),
        });
    }

    match (
        &credentials.client_assertion_type,
        &credentials.client_assertion,
    ) {
        (Some(assertion_type), Some(assertion)) => {
            if assertion_type != JWT_BEARER_ASSERTION_TYPE {
                return Err(AuthError::invalid_request(format!(
                    "Unsupported client_assertion_type: {assertion_type}"
                )));
            }
            candidates.push(Candidate::Assertion {
                assertion: assertion.clone(),
            });
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(AuthError::invalid_request(
                "client_assertion and client_assertion_type must be provided together",
            ));
        }
        (None, None) => {}
    }

    Ok(candidates)
}

// =============================================================================
// Authenticator
// =============================================================================

/// Resolves and verifies client authentication for token-endpoint
/// requests.
pub struct ClientAuthenticator {
    client_storage: Arc<dyn ClientStorage>,
    assertion_validator: AssertionValidator,
}

impl ClientAuthenticator {
    /// Creates an authenticator for the given token endpoint URL.
    pub fn new(
        token_endpoint: impl Into<String>,
        assertion_max_lifetime_secs: i64,
        client_storage: Arc<dyn ClientStorage>,
        jti_storage: Arc<dyn JtiStorage>,
    ) -> Self {
        Self {
            client_storage,
            assertion_validator: AssertionValidator::new(
                token_endpoint,
                assertion_max_lifetime_secs,
                jti_storage,
            ),
        }
    }

    /// Resolves the client behind a token-endpoint request.
    ///
    /// `Ok(None)` means the request carried no credential material at
    /// all, not even a bare `client_id`; the caller decides whether the
    /// grant type tolerates that.
    ///
    /// # Errors
    ///
    /// - `invalid_request` when more than one mechanism is present or a
    ///   mechanism is malformed
    /// - `invalid_client` for unknown, inactive, or misauthenticated
    ///   clients
    pub async fn resolve(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<Option<AuthenticatedClient>> {
        let mut candidates = extract_candidates(credentials)?;

        if candidates.len() > 1 {
            let mechanisms: Vec<&str> = candidates.iter().map(Candidate::mechanism).collect();
            return Err(AuthError::invalid_request(format!(
                "Multiple client authentication mechanisms present: {}",
                mechanisms.join(", ")
            )));
        }

        match candidates.pop() {
            Some(Candidate::Basic { client_id, secret }) => self
                .authenticate_secret(&client_id, &secret, ClientAuthMethod::ClientSecretBasic)
                .await
                .map(Some),
            Some(Candidate::Post { client_id, secret }) => self
                .authenticate_secret(&client_id, &secret, ClientAuthMethod::ClientSecretPost)
                .await
                .map(Some),
            Some(Candidate::Assertion { assertion }) => {
                self.authenticate_assertion(&assertion).await.map(Some)
            }
            None => match &credentials.client_id {
                Some(client_id) => self.authenticate_public(client_id).await.map(Some),
                None => Ok(None),
            },
        }
    }

    /// Authenticates the client, treating absent credentials as an
    /// error.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve`], plus `invalid_client` when the request
    /// carried no credentials.
    pub async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<AuthenticatedClient> {
        self.resolve(credentials)
            .await?
            .ok_or_else(|| AuthError::invalid_client("No client credentials provided"))
    }

    async fn load_active_client(&self, client_id: &str) -> AuthResult<Client> {
        let client = self
            .client_storage
            .find_by_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;

        if !client.active {
            return Err(AuthError::invalid_client("Client is inactive"));
        }

        Ok(client)
    }

    async fn authenticate_secret(
        &self,
        client_id: &str,
        secret: &str,
        method: ClientAuthMethod,
    ) -> AuthResult<AuthenticatedClient> {
        let client = self.load_active_client(client_id).await?;

        if client.auth_method != method {
            return Err(AuthError::invalid_client(format!(
                "Client is not registered for {method} authentication"
            )));
        }

        if client.secret_expired() {
            return Err(AuthError::invalid_client("Client secret has expired"));
        }

        if !self.client_storage.verify_secret(client_id, secret).await? {
            return Err(AuthError::invalid_client("Invalid client secret"));
        }

        Ok(AuthenticatedClient {
            client,
            auth_method: method,
        })
    }

    async fn authenticate_assertion(&self, assertion: &str) -> AuthResult<AuthenticatedClient> {
        // 1. Identify the client from the unverified payload
        let client_id = extract_client_id_unverified(assertion)?;
        let client = self.load_active_client(&client_id).await?;

        // 2. The algorithm family decides which method this assertion
        // claims; the registration must agree
        let algorithm = extract_algorithm(assertion)?;
        let method = if is_hmac(algorithm) {
            ClientAuthMethod::ClientSecretJwt
        } else {
            ClientAuthMethod::PrivateKeyJwt
        };
        if client.auth_method != method {
            return Err(AuthError::invalid_client(format!(
                "Client is not registered for {method} authentication"
            )));
        }

        // An HMAC assertion is keyed on the client secret; an expired
        // secret cannot sign anything
        if method == ClientAuthMethod::ClientSecretJwt && client.secret_expired() {
            return Err(AuthError::invalid_client("Client secret has expired"));
        }

        // 3. Verify signature and claims
        let kid = extract_key_id(assertion)?;
        let key = self
            .assertion_validator
            .decoding_key(&client, algorithm, kid.as_deref())?;
        self.assertion_validator
            .validate(assertion, &client_id, &key, algorithm)
            .await?;

        Ok(AuthenticatedClient {
            client,
            auth_method: method,
        })
    }

    async fn authenticate_public(&self, client_id: &str) -> AuthResult<AuthenticatedClient> {
        let client = self.load_active_client(client_id).await?;

        if client.confidential || client.auth_method != ClientAuthMethod::None {
            return Err(AuthError::invalid_client(
                "Confidential clients must provide credentials",
            ));
        }

        Ok(AuthenticatedClient {
            client,
            auth_method: ClientAuthMethod::None,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
