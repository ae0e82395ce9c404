//! Engine configuration.
//!
//! [`AuthConfig`] holds every server-wide knob the engine consults:
//! issuer identity, token lifetimes, scope policy, and the validation
//! switches of the authorization endpoint. Per-client overrides on
//! [`crate::types::Client`] take precedence over the values here.

use serde::{Deserialize, Serialize};
use time::Duration;

/// Policy applied when an authorization or token request carries no
/// `scope` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyScopePolicy {
    /// Reject the request with `invalid_scope`.
    Reject,
    /// Substitute the configured default scope set.
    UseDefault(Vec<String>),
}

/// Server-wide configuration for the authorization engine.
///
/// Deserializes from host configuration files; absent fields fall back
/// to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL, used as `iss` in signed tokens.
    pub issuer: String,

    /// Token endpoint URL. Client assertions must name it in `aud`.
    pub token_endpoint: String,

    /// Authorization-code lifetime. Default: 10 minutes.
    pub code_lifetime: Duration,

    /// Length in bytes of the random authorization-code value before
    /// base64url encoding. Default: 32 (256 bits).
    pub code_length: usize,

    /// Default access-token lifetime. Default: 1 hour.
    pub access_token_lifetime: Duration,

    /// Default refresh-token lifetime. Default: 30 days.
    pub refresh_token_lifetime: Duration,

    /// Maximum accepted client-assertion lifetime in seconds.
    /// Default: 300 (5 minutes per RFC 7523 practice).
    pub assertion_max_lifetime_secs: i64,

    /// Scopes the server knows about. A client's allowed set is this
    /// list intersected with its own restriction.
    pub available_scopes: Vec<String>,

    /// What to do when no scope is requested.
    pub empty_scope_policy: EmptyScopePolicy,

    /// Whether the `state` parameter is mandatory on authorization
    /// requests. Default: false.
    pub require_state: bool,

    /// Whether clients may supply an explicit `response_mode`.
    /// Default: false (the response type's default mode applies).
    pub allow_client_response_mode: bool,

    /// Whether refresh tokens are rotated on use. Default: true.
    pub rotate_refresh_tokens: bool,

    /// Whether revoking an access token also revokes its linked refresh
    /// token. Default: true.
    pub cascade_revocation: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost".to_string(),
            token_endpoint: "http://localhost/token".to_string(),
            code_lifetime: Duration::minutes(10),
            code_length: 32,
            access_token_lifetime: Duration::hours(1),
            refresh_token_lifetime: Duration::days(30),
            assertion_max_lifetime_secs: 300,
            available_scopes: Vec::new(),
            empty_scope_policy: EmptyScopePolicy::Reject,
            require_state: false,
            allow_client_response_mode: false,
            rotate_refresh_tokens: true,
            cascade_revocation: true,
        }
    }
}

impl AuthConfig {
    /// Creates a configuration for the given issuer and token endpoint.
    #[must_use]
    pub fn new(issuer: impl Into<String>, token_endpoint: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            token_endpoint: token_endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets the authorization-code lifetime.
    #[must_use]
    pub fn with_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.code_lifetime = lifetime;
        self
    }

    /// Sets the default access-token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the default refresh-token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    /// Sets the server-wide scope set.
    #[must_use]
    pub fn with_available_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the empty-scope policy.
    #[must_use]
    pub fn with_empty_scope_policy(mut self, policy: EmptyScopePolicy) -> Self {
        self.empty_scope_policy = policy;
        self
    }

    /// Requires the `state` parameter on authorization requests.
    #[must_use]
    pub fn with_required_state(mut self) -> Self {
        self.require_state = true;
        self
    }

    /// Allows clients to supply an explicit `response_mode`.
    #[must_use]
    pub fn with_client_response_mode(mut self) -> Self {
        self.allow_client_response_mode = true;
        self
    }

    /// Sets whether refresh tokens rotate on use.
    #[must_use]
    pub fn with_rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    /// Sets whether access-token revocation cascades to the linked
    /// refresh token.
    #[must_use]
    pub fn with_cascade_revocation(mut self, cascade: bool) -> Self {
        self.cascade_revocation = cascade;
        self
    }
}
