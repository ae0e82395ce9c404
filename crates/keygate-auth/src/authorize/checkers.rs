//! Ordered, fail-fast parameter checkers for authorization requests.
//!
//! Each checker inspects one concern of `(client, parameters)` and may
//! normalize the parameters (filling a sole registered redirect URI,
//! writing back the resolved scope). The first failure aborts the
//! pipeline.

use url::Url;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::pkce::{PkceChallenge, PkceChallengeMethod};
use crate::scope::{ScopePolicy, join_scope};
use crate::types::Client;

use super::{AuthorizeParams, Display};

/// Mutable validation context threaded through the checker pipeline.
pub struct CheckContext<'a> {
    /// The requesting client.
    pub client: &'a Client,

    /// The request parameters; checkers may normalize them.
    pub params: &'a mut AuthorizeParams,

    /// Server configuration.
    pub config: &'a AuthConfig,

    /// Server scope policy.
    pub scope_policy: &'a ScopePolicy,

    /// Scope list resolved by the scope checker, in request order.
    pub resolved_scope: Vec<String>,
}

/// One validation concern in the pipeline.
pub trait ParameterChecker: Send + Sync {
    /// Name of the checker, for logging.
    fn name(&self) -> &'static str;

    /// Runs the check, possibly normalizing the parameters.
    ///
    /// # Errors
    ///
    /// Returns the OAuth error this request dies with.
    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()>;
}

/// The standard checker pipeline, in validation order.
#[must_use]
pub fn default_checkers() -> Vec<Box<dyn ParameterChecker>> {
    vec![
        Box::new(ResponseTypeChecker),
        Box::new(RedirectUriChecker),
        Box::new(ScopeChecker),
        Box::new(StateChecker),
        Box::new(NonceChecker),
        Box::new(PromptDisplayChecker),
        Box::new(ResponseModeChecker),
        Box::new(PkceChecker),
    ]
}

// =============================================================================
// Individual Checkers
// =============================================================================

/// `response_type` is mandatory.
struct ResponseTypeChecker;

impl ParameterChecker for ResponseTypeChecker {
    fn name(&self) -> &'static str {
        "response_type"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        if ctx.params.response_types().is_empty() {
            return Err(AuthError::invalid_request("Missing response_type parameter"));
        }
        Ok(())
    }
}

/// Validates and normalizes the redirect URI.
struct RedirectUriChecker;

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]" | "::1"))
}

impl ParameterChecker for RedirectUriChecker {
    fn name(&self) -> &'static str {
        "redirect_uri"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        let registered = &ctx.client.redirect_uris;

        let uri = match ctx.params.redirect_uri.clone() {
            Some(uri) => uri,
            // Omitted is fine only with exactly one registration
            None if registered.len() == 1 => {
                let sole = registered[0].clone();
                ctx.params.redirect_uri = Some(sole.clone());
                sole
            }
            None => {
                return Err(AuthError::invalid_request(
                    "Missing redirect_uri and client has no unique registered URI",
                ));
            }
        };

        // URNs skip URL-shape validation entirely
        if !uri.starts_with("urn:") {
            let parsed = Url::parse(&uri)
                .map_err(|_| AuthError::invalid_request("Malformed redirect_uri"))?;
            if parsed.fragment().is_some() {
                return Err(AuthError::invalid_request(
                    "redirect_uri must not contain a fragment",
                ));
            }
            if parsed.scheme() != "https" && !is_loopback(&parsed) {
                return Err(AuthError::invalid_request(
                    "redirect_uri must use https unless it is a loopback address",
                ));
            }
        }

        if registered.is_empty() {
            // A confidential client with no registration cannot receive
            // tokens on an unvetted URI
            if ctx.client.confidential && ctx.params.response_types().contains(&"token") {
                return Err(AuthError::invalid_request(
                    "Confidential client has no registered redirect URI for token response",
                ));
            }
            return Ok(());
        }

        if !registered.iter().any(|allowed| uri.starts_with(allowed)) {
            return Err(AuthError::invalid_request(
                "redirect_uri does not match any registered URI",
            ));
        }
        Ok(())
    }
}

/// Delegates scope resolution to the scope policy engine.
struct ScopeChecker;

impl ParameterChecker for ScopeChecker {
    fn name(&self) -> &'static str {
        "scope"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        let resolved = ctx.scope_policy.resolve(
            ctx.params.scope.as_deref(),
            ctx.client.scope_restriction(),
        )?;
        ctx.params.scope = Some(join_scope(&resolved));
        ctx.resolved_scope = resolved;
        Ok(())
    }
}

/// `state` is mandatory only when the server enforces it.
struct StateChecker;

impl ParameterChecker for StateChecker {
    fn name(&self) -> &'static str {
        "state"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        if ctx.config.require_state && ctx.params.state.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::invalid_request("Missing state parameter"));
        }
        Ok(())
    }
}

/// `nonce` is mandatory whenever an ID token is requested.
struct NonceChecker;

impl ParameterChecker for NonceChecker {
    fn name(&self) -> &'static str {
        "nonce"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        if ctx.params.response_types().contains(&"id_token")
            && ctx.params.nonce.as_deref().is_none_or(str::is_empty)
        {
            return Err(AuthError::invalid_request(
                "Missing nonce parameter for id_token response",
            ));
        }
        Ok(())
    }
}

/// `prompt` and `display` values must come from their fixed enums.
struct PromptDisplayChecker;

impl ParameterChecker for PromptDisplayChecker {
    fn name(&self) -> &'static str {
        "prompt_display"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        ctx.params.prompts()?;
        if let Some(display) = ctx.params.display.as_deref() {
            Display::parse(display)?;
        }
        Ok(())
    }
}

/// An explicit `response_mode` is accepted only when configured.
struct ResponseModeChecker;

impl ParameterChecker for ResponseModeChecker {
    fn name(&self) -> &'static str {
        "response_mode"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        let Some(mode) = ctx.params.response_mode.as_deref() else {
            return Ok(());
        };
        if !ctx.config.allow_client_response_mode {
            return Err(AuthError::invalid_request(
                "Client-supplied response_mode is not allowed",
            ));
        }
        if !matches!(mode, "query" | "fragment") {
            return Err(AuthError::invalid_request(format!(
                "Unknown response_mode: {mode}"
            )));
        }
        Ok(())
    }
}

/// PKCE parameters: required for clients that must use it, and
/// well-formed whenever present.
struct PkceChecker;

impl ParameterChecker for PkceChecker {
    fn name(&self) -> &'static str {
        "pkce"
    }

    fn check(&self, ctx: &mut CheckContext<'_>) -> AuthResult<()> {
        let wants_code = ctx.params.response_types().contains(&"code");

        match ctx.params.code_challenge.as_deref() {
            Some(challenge) => {
                let method = match ctx.params.code_challenge_method.as_deref() {
                    Some(m) => PkceChallengeMethod::parse(m)
                        .map_err(|e| AuthError::invalid_request(e.to_string()))?,
                    None => PkceChallengeMethod::default(),
                };
                PkceChallenge::new(challenge.to_string(), method)
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
            }
            None if wants_code && ctx.client.requires_pkce() => {
                return Err(AuthError::invalid_request(
                    "Missing code_challenge: this client requires PKCE",
                ));
            }
            None => {}
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmptyScopePolicy;
    use crate::types::ClientAuthMethod;

    fn test_client() -> Client {
        Client {
            client_id: "web".to_string(),
            client_secret: Some("s3cret".to_string()),
            secret_expires_at: None,
            name: "Web App".to_string(),
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            token_types: vec![],
            auth_method: ClientAuthMethod::ClientSecretBasic,
            redirect_uris: vec!["https://app.example.com/cb".to_string()],
            scopes: vec![],
            confidential: true,
            active: true,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            pkce_required: None,
            jwks: None,
        }
    }

    fn run(
        client: &Client,
        params: &mut AuthorizeParams,
        config: &AuthConfig,
    ) -> AuthResult<Vec<String>> {
        let scope_policy = ScopePolicy::new(
            ["openid", "profile", "email"],
            EmptyScopePolicy::Reject,
        );
        let mut ctx = CheckContext {
            client,
            params,
            config,
            scope_policy: &scope_policy,
            resolved_scope: Vec::new(),
        };
        for checker in default_checkers() {
            checker.check(&mut ctx)?;
        }
        Ok(ctx.resolved_scope)
    }

    fn valid_params() -> AuthorizeParams {
        AuthorizeParams {
            response_type: Some("code".to_string()),
            client_id: Some("web".to_string()),
            redirect_uri: Some("https://app.example.com/cb".to_string()),
            scope: Some("openid profile".to_string()),
            state: Some("xyz".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let client = test_client();
        let mut params = valid_params();
        let scope = run(&client, &mut params, &AuthConfig::default()).unwrap();
        assert_eq!(scope, vec!["openid".to_string(), "profile".to_string()]);
    }

    #[test]
    fn test_scope_resolution_keeps_request_order() {
        let client = test_client();
        let mut params = valid_params();
        params.scope = Some("profile openid".to_string());
        let scope = run(&client, &mut params, &AuthConfig::default()).unwrap();
        assert_eq!(scope, vec!["profile".to_string(), "openid".to_string()]);
        assert_eq!(params.scope.as_deref(), Some("profile openid"));
    }

    #[test]
    fn test_response_type_mandatory() {
        let client = test_client();
        let mut params = valid_params();
        params.response_type = None;
        let err = run(&client, &mut params, &AuthConfig::default()).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[test]
    fn test_sole_registered_uri_is_filled_in() {
        let client = test_client();
        let mut params = valid_params();
        params.redirect_uri = None;
        run(&client, &mut params, &AuthConfig::default()).unwrap();
        assert_eq!(
            params.redirect_uri.as_deref(),
            Some("https://app.example.com/cb")
        );
    }

    #[test]
    fn test_redirect_uri_rules() {
        let client = test_client();
        let config = AuthConfig::default();

        // Fragment
        let mut params = valid_params();
        params.redirect_uri = Some("https://app.example.com/cb#frag".to_string());
        assert!(run(&client, &mut params, &config).is_err());

        // Plain http to a non-loopback host
        let mut params = valid_params();
        params.redirect_uri = Some("http://app.example.com/cb".to_string());
        assert!(run(&client, &mut params, &config).is_err());

        // Unregistered
        let mut params = valid_params();
        params.redirect_uri = Some("https://evil.example.com/cb".to_string());
        assert!(run(&client, &mut params, &config).is_err());

        // Prefix match: a longer path under the registered URI passes
        let mut params = valid_params();
        params.redirect_uri = Some("https://app.example.com/cb/step2".to_string());
        assert!(run(&client, &mut params, &config).is_ok());
    }

    #[test]
    fn test_loopback_http_allowed() {
        let mut client = test_client();
        client.redirect_uris = vec!["http://127.0.0.1".to_string()];
        let mut params = valid_params();
        params.redirect_uri = Some("http://127.0.0.1:9292/cb".to_string());
        // Port differs but the prefix matches the registered base
        assert!(run(&client, &mut params, &AuthConfig::default()).is_err());

        client.redirect_uris = vec!["http://127.0.0.1:9292/cb".to_string()];
        let mut params = valid_params();
        params.redirect_uri = Some("http://127.0.0.1:9292/cb".to_string());
        assert!(run(&client, &mut params, &AuthConfig::default()).is_ok());
    }

    #[test]
    fn test_scope_violation_fails() {
        let client = test_client();
        let mut params = valid_params();
        params.scope = Some("openid admin".to_string());
        let err = run(&client, &mut params, &AuthConfig::default()).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
    }

    #[test]
    fn test_state_enforcement() {
        let client = test_client();
        let config = AuthConfig::default().with_required_state();

        let mut params = valid_params();
        params.state = None;
        assert!(run(&client, &mut params, &config).is_err());

        let mut params = valid_params();
        assert!(run(&client, &mut params, &config).is_ok());
    }

    #[test]
    fn test_nonce_required_for_id_token() {
        let client = test_client();
        let mut params = valid_params();
        params.response_type = Some("code id_token".to_string());
        assert!(run(&client, &mut params, &AuthConfig::default()).is_err());

        params.nonce = Some("n-1".to_string());
        assert!(run(&client, &mut params, &AuthConfig::default()).is_ok());
    }

    #[test]
    fn test_response_mode_gating() {
        let client = test_client();

        let mut params = valid_params();
        params.response_mode = Some("fragment".to_string());
        assert!(run(&client, &mut params, &AuthConfig::default()).is_err());

        let config = AuthConfig::default().with_client_response_mode();
        let mut params = valid_params();
        params.response_mode = Some("fragment".to_string());
        assert!(run(&client, &mut params, &config).is_ok());

        let mut params = valid_params();
        params.response_mode = Some("form_post".to_string());
        assert!(run(&client, &mut params, &config).is_err());
    }

    #[test]
    fn test_pkce_required_client() {
        // Public clients require PKCE regardless of the registration flag
        let mut client = test_client();
        client.client_secret = None;
        client.auth_method = ClientAuthMethod::None;
        client.confidential = false;

        let mut params = valid_params();
        assert!(run(&client, &mut params, &AuthConfig::default()).is_err());

        let mut params = valid_params();
        params.code_challenge = Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string());
        params.code_challenge_method = Some("S256".to_string());
        assert!(run(&client, &mut params, &AuthConfig::default()).is_ok());
    }
}
