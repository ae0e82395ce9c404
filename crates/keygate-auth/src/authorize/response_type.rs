//! Response-type handlers and redirect construction.
//!
//! Each supported `response_type` token is one handler in a registry
//! keyed by wire name. A combined request such as `code id_token` runs
//! every component handler and merges the parameters each contributes;
//! the delivery mode is the fragment whenever any component demands it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::signer::TokenSigner;
use crate::storage::{AccessTokenStorage, AuthCodeStorage};
use crate::types::{
    AccessToken, AuthorizationCode, Client, TokenType, generate_token, hash_token,
};

use super::{AuthenticatedUser, AuthorizeParams};

// =============================================================================
// Delivery Mode
// =============================================================================

/// How redirect parameters are delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Parameters in the query string.
    Query,
    /// Parameters in the URI fragment.
    Fragment,
}

impl ResponseMode {
    /// Parses a wire value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown modes.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        match value {
            "query" => Ok(Self::Query),
            "fragment" => Ok(Self::Fragment),
            other => Err(AuthError::invalid_request(format!(
                "Unknown response_mode: {other}"
            ))),
        }
    }
}

// =============================================================================
// Handler Contract
// =============================================================================

/// Everything a response-type handler may need to issue its artifact.
pub struct ResponseTypeRequest<'a> {
    /// Validated and normalized request parameters.
    pub params: &'a AuthorizeParams,

    /// The requesting client.
    pub client: &'a Client,

    /// The authenticated end user.
    pub user: &'a AuthenticatedUser,

    /// The resolved scope list, in request order.
    pub scope: &'a [String],
}

impl ResponseTypeRequest<'_> {
    fn scope_string(&self) -> String {
        crate::scope::join_scope(self.scope)
    }
}

/// One component of a `response_type` value.
#[async_trait]
pub trait ResponseTypeHandler: Send + Sync {
    /// The wire name this handler serves (`code`, `token`, ...).
    fn response_type(&self) -> &'static str;

    /// Delivery mode this component demands when no explicit mode is
    /// given. Fragment wins over query in combinations.
    fn default_mode(&self) -> ResponseMode;

    /// Issues this component's artifact and returns the redirect
    /// parameters it contributes.
    async fn issue(&self, request: &ResponseTypeRequest<'_>)
    -> AuthResult<Vec<(String, String)>>;
}

impl std::fmt::Debug for dyn ResponseTypeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseTypeHandler")
            .field("response_type", &self.response_type())
            .finish()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of response-type handlers keyed by wire name.
pub struct ResponseTypeRegistry {
    handlers: HashMap<&'static str, Arc<dyn ResponseTypeHandler>>,
}

impl ResponseTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under its own wire name.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ResponseTypeHandler>) -> Self {
        self.handlers.insert(handler.response_type(), handler);
        self
    }

    /// Resolves a space-separated `response_type` value into its
    /// component handlers, in request order.
    ///
    /// # Errors
    ///
    /// Returns `unsupported_response_type` if any component has no
    /// handler.
    pub fn resolve(&self, tokens: &[&str]) -> AuthResult<Vec<Arc<dyn ResponseTypeHandler>>> {
        tokens
            .iter()
            .map(|token| {
                self.handlers
                    .get(token)
                    .cloned()
                    .ok_or_else(|| AuthError::unsupported_response_type(*token))
            })
            .collect()
    }

    /// The delivery mode for a set of resolved handlers: the explicit
    /// client choice when present, otherwise fragment if any component
    /// requires it.
    #[must_use]
    pub fn response_mode(
        handlers: &[Arc<dyn ResponseTypeHandler>],
        explicit: Option<ResponseMode>,
    ) -> ResponseMode {
        if let Some(mode) = explicit {
            return mode;
        }
        if handlers
            .iter()
            .any(|h| h.default_mode() == ResponseMode::Fragment)
        {
            ResponseMode::Fragment
        } else {
            ResponseMode::Query
        }
    }

    /// Registered wire names, for metadata documents.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ResponseTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `response_type=code`: mints a single-use authorization code.
pub struct CodeResponseType {
    auth_codes: Arc<dyn AuthCodeStorage>,
    config: AuthConfig,
}

impl CodeResponseType {
    /// Creates the handler over the code store.
    pub fn new(auth_codes: Arc<dyn AuthCodeStorage>, config: AuthConfig) -> Self {
        Self { auth_codes, config }
    }
}

#[async_trait]
impl ResponseTypeHandler for CodeResponseType {
    fn response_type(&self) -> &'static str {
        "code"
    }

    fn default_mode(&self) -> ResponseMode {
        ResponseMode::Query
    }

    async fn issue(
        &self,
        request: &ResponseTypeRequest<'_>,
    ) -> AuthResult<Vec<(String, String)>> {
        let code = generate_token(self.config.code_length);
        let now = OffsetDateTime::now_utc();

        let redirect_uri = request.params.redirect_uri.clone().ok_or_else(|| {
            AuthError::internal("Issuing a code without a resolved redirect URI")
        })?;

        let record = AuthorizationCode {
            id: Uuid::new_v4(),
            code_hash: hash_token(&code),
            client_id: request.client.client_id.clone(),
            user_id: request.user.subject.clone(),
            redirect_uri,
            scope: request.scope_string(),
            code_challenge: request.params.code_challenge.clone(),
            code_challenge_method: request
                .params
                .code_challenge
                .is_some()
                .then(|| {
                    request
                        .params
                        .code_challenge_method
                        .clone()
                        .unwrap_or_else(|| "plain".to_string())
                }),
            nonce: request.params.nonce.clone(),
            auth_time: request.user.auth_time,
            created_at: now,
            expires_at: now + self.config.code_lifetime,
            issue_refresh_token: request
                .client
                .is_grant_type_allowed(crate::grant::REFRESH_TOKEN),
            used: false,
        };
        self.auth_codes.create(&record).await?;

        Ok(vec![("code".to_string(), code)])
    }
}

/// `response_type=token`: mints an access token delivered in the
/// fragment (the implicit flow).
pub struct TokenResponseType {
    access_tokens: Arc<dyn AccessTokenStorage>,
    config: AuthConfig,
}

impl TokenResponseType {
    /// Creates the handler over the access-token store.
    pub fn new(access_tokens: Arc<dyn AccessTokenStorage>, config: AuthConfig) -> Self {
        Self {
            access_tokens,
            config,
        }
    }
}

#[async_trait]
impl ResponseTypeHandler for TokenResponseType {
    fn response_type(&self) -> &'static str {
        "token"
    }

    fn default_mode(&self) -> ResponseMode {
        ResponseMode::Fragment
    }

    async fn issue(
        &self,
        request: &ResponseTypeRequest<'_>,
    ) -> AuthResult<Vec<(String, String)>> {
        let token = generate_token(32);
        let now = OffsetDateTime::now_utc();
        let lifetime = request
            .client
            .access_token_lifetime
            .map_or(self.config.access_token_lifetime, time::Duration::seconds);

        let record = AccessToken {
            id: Uuid::new_v4(),
            token_hash: hash_token(&token),
            client_id: request.client.client_id.clone(),
            user_id: Some(request.user.subject.clone()),
            scope: request.scope_string(),
            token_type: TokenType::Bearer,
            refresh_token_id: None,
            metadata: HashMap::new(),
            created_at: now,
            expires_at: now + lifetime,
            revoked_at: None,
        };
        self.access_tokens.create(&record).await?;

        Ok(vec![
            ("access_token".to_string(), token),
            ("token_type".to_string(), TokenType::Bearer.as_str().to_string()),
            (
                "expires_in".to_string(),
                lifetime.whole_seconds().to_string(),
            ),
        ])
    }
}

/// `response_type=id_token`: signs an ID token for the fragment.
pub struct IdTokenResponseType {
    signer: Arc<dyn TokenSigner>,
    config: AuthConfig,
}

impl IdTokenResponseType {
    /// Creates the handler over the ID-token signer.
    pub fn new(signer: Arc<dyn TokenSigner>, config: AuthConfig) -> Self {
        Self { signer, config }
    }
}

#[async_trait]
impl ResponseTypeHandler for IdTokenResponseType {
    fn response_type(&self) -> &'static str {
        "id_token"
    }

    fn default_mode(&self) -> ResponseMode {
        ResponseMode::Fragment
    }

    async fn issue(
        &self,
        request: &ResponseTypeRequest<'_>,
    ) -> AuthResult<Vec<(String, String)>> {
        let now = OffsetDateTime::now_utc();
        // Nonce presence is enforced by the checker pipeline
        let nonce = request.params.nonce.as_deref().ok_or_else(|| {
            AuthError::internal("Issuing an id_token without a nonce")
        })?;

        let claims = serde_json::json!({
            "iss": self.config.issuer,
            "sub": request.user.subject,
            "aud": request.client.client_id,
            "iat": now.unix_timestamp(),
            "exp": (now + self.config.access_token_lifetime).unix_timestamp(),
            "auth_time": request.user.auth_time.unix_timestamp(),
            "nonce": nonce,
        });
        let id_token = self.signer.sign(&claims).await?;

        Ok(vec![("id_token".to_string(), id_token)])
    }
}

/// `response_type=none`: the user is sent back with no artifact.
pub struct NoneResponseType;

#[async_trait]
impl ResponseTypeHandler for NoneResponseType {
    fn response_type(&self) -> &'static str {
        "none"
    }

    fn default_mode(&self) -> ResponseMode {
        ResponseMode::Query
    }

    async fn issue(
        &self,
        _request: &ResponseTypeRequest<'_>,
    ) -> AuthResult<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Redirect Construction
// =============================================================================

/// Builds the final redirect URI, placing `params` (plus the echoed
/// `state`) into the query string or fragment per `mode`.
///
/// # Errors
///
/// Returns an internal error if the base URI does not parse; callers
/// only reach this with a validated URI.
pub fn build_redirect_uri(
    base: &str,
    mode: ResponseMode,
    params: &[(String, String)],
    state: Option<&str>,
) -> AuthResult<String> {
    let mut url = Url::parse(base)
        .map_err(|_| AuthError::internal(format!("Unparseable redirect URI: {base}")))?;

    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if let Some(state) = state {
        pairs.push(("state", state));
    }

    match mode {
        ResponseMode::Query => {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        ResponseMode::Fragment => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            url.set_fragment(Some(&encoded));
        }
    }
    Ok(url.to_string())
}
