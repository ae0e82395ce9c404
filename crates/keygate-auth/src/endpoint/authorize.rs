//! Authorization endpoint orchestrator.
//!
//! Validates the request through the checker pipeline, runs the
//! interaction stages around the resolved end user, then lets the
//! response-type handlers produce the redirect parameters.
//!
//! Error delivery follows RFC 6749 Section 4.1.2.1: once the redirect
//! URI has been validated, errors travel on it; before that they are
//! returned directly so an attacker-controlled URI never receives
//! anything.

use std::sync::Arc;

use crate::AuthResult;
use crate::authorize::{
    AuthenticatedUser, AuthorizeParams, CheckContext, ParameterChecker, Prompt, ResponseMode,
    ResponseTypeRegistry, ResponseTypeRequest, build_redirect_uri,
};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::scope::ScopePolicy;
use crate::storage::ClientStorage;
use crate::types::Client;

/// Outcome of an authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// Success: redirect the user agent here.
    Redirect(String),

    /// Protocol error delivered on the validated redirect URI.
    ErrorRedirect(String),
}

/// Interaction stages evaluated between validation and issuance.
///
/// Each stage inspects the request and the resolved user and either
/// lets processing continue or aborts with an interaction error
/// (`login_required`, `consent_required`, ...) that the host turns
/// into its login or consent UI.
pub trait InteractionStage: Send + Sync {
    /// Name of the stage, for logging.
    fn name(&self) -> &'static str;

    /// Checks the stage's condition.
    ///
    /// # Errors
    ///
    /// Returns the interaction error that aborts the request.
    fn check(&self, ctx: &InteractionContext<'_>) -> AuthResult<()>;
}

/// Context seen by interaction stages.
pub struct InteractionContext<'a> {
    /// Validated request parameters.
    pub params: &'a AuthorizeParams,

    /// Parsed prompt values.
    pub prompts: &'a [Prompt],

    /// The resolved end user, if the host has a session.
    pub user: Option<&'a AuthenticatedUser>,

    /// The resolved scope list, in request order.
    pub scope: &'a [String],
}

/// The standard interaction stages, in evaluation order.
#[must_use]
pub fn default_interaction_stages() -> Vec<Box<dyn InteractionStage>> {
    vec![
        Box::new(AuthenticationStage),
        Box::new(MaxAgeStage),
        Box::new(ConsentStage),
    ]
}

/// Requires a session, honoring `prompt=login` and `prompt=none`.
struct AuthenticationStage;

impl InteractionStage for AuthenticationStage {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn check(&self, ctx: &InteractionContext<'_>) -> AuthResult<()> {
        if ctx.user.is_none() {
            return Err(AuthError::LoginRequired);
        }
        // prompt=login forces re-authentication; the host re-invokes
        // without the prompt once the user has logged in again
        if ctx.prompts.contains(&Prompt::Login) {
            return Err(AuthError::LoginRequired);
        }
        Ok(())
    }
}

/// Rejects sessions older than the requested `max_age`.
struct MaxAgeStage;

impl InteractionStage for MaxAgeStage {
    fn name(&self) -> &'static str {
        "max_age"
    }

    fn check(&self, ctx: &InteractionContext<'_>) -> AuthResult<()> {
        let (Some(max_age), Some(user)) = (ctx.params.max_age, ctx.user) else {
            return Ok(());
        };
        let age = (time::OffsetDateTime::now_utc() - user.auth_time).whole_seconds();
        if age > max_age {
            return Err(AuthError::LoginRequired);
        }
        Ok(())
    }
}

/// Requires consent to cover every requested scope.
struct ConsentStage;

impl InteractionStage for ConsentStage {
    fn name(&self) -> &'static str {
        "consent"
    }

    fn check(&self, ctx: &InteractionContext<'_>) -> AuthResult<()> {
        if ctx.prompts.contains(&Prompt::Consent) {
            return Err(AuthError::ConsentRequired);
        }
        let Some(user) = ctx.user else {
            return Ok(());
        };
        let missing = ctx
            .scope
            .iter()
            .any(|s| !user.consented_scopes.iter().any(|c| c == s));
        if missing {
            return Err(AuthError::ConsentRequired);
        }
        Ok(())
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// The authorization endpoint.
pub struct AuthorizeEndpoint {
    config: AuthConfig,
    scope_policy: ScopePolicy,
    client_storage: Arc<dyn ClientStorage>,
    checkers: Vec<Box<dyn ParameterChecker>>,
    interaction_stages: Vec<Box<dyn InteractionStage>>,
    response_types: ResponseTypeRegistry,
}

impl AuthorizeEndpoint {
    /// Wires the endpoint with the default checker pipeline and
    /// interaction stages.
    pub fn new(
        config: AuthConfig,
        client_storage: Arc<dyn ClientStorage>,
        response_types: ResponseTypeRegistry,
    ) -> Self {
        let scope_policy = ScopePolicy::new(
            config.available_scopes.clone(),
            config.empty_scope_policy.clone(),
        );
        Self {
            config,
            scope_policy,
            client_storage,
            checkers: crate::authorize::default_checkers(),
            interaction_stages: default_interaction_stages(),
            response_types,
        }
    }

    /// Replaces the checker pipeline.
    #[must_use]
    pub fn with_checkers(mut self, checkers: Vec<Box<dyn ParameterChecker>>) -> Self {
        self.checkers = checkers;
        self
    }

    /// Appends an interaction stage after the defaults.
    #[must_use]
    pub fn with_interaction_stage(mut self, stage: Box<dyn InteractionStage>) -> Self {
        self.interaction_stages.push(stage);
        self
    }

    /// Handles one authorization request.
    ///
    /// `user` is the end user the host's session layer resolved, if
    /// any; interaction errors tell the host which UI to show.
    ///
    /// # Errors
    ///
    /// A direct error means the redirect URI could not be trusted
    /// (unknown client, invalid URI); everything else arrives as an
    /// [`AuthorizeOutcome::ErrorRedirect`].
    pub async fn handle(
        &self,
        mut params: AuthorizeParams,
        user: Option<&AuthenticatedUser>,
    ) -> AuthResult<AuthorizeOutcome> {
        let client_id = params
            .client_id
            .clone()
            .ok_or_else(|| AuthError::invalid_request("Missing client_id parameter"))?;
        let client = self
            .client_storage
            .find_by_id(&client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;
        if !client.active {
            return Err(AuthError::invalid_client("Client is inactive"));
        }

        match self.process(&client, &mut params, user).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => self.deliver_error(&client, &params, err),
        }
    }

    /// Whether `prompt=none` was requested. Malformed prompt lists are
    /// rejected by `process` before any interaction stage runs.
    fn prompt_none(params: &AuthorizeParams) -> bool {
        params
            .prompts()
            .is_ok_and(|prompts| prompts.contains(&Prompt::None))
    }

    async fn process(
        &self,
        client: &Client,
        params: &mut AuthorizeParams,
        user: Option<&AuthenticatedUser>,
    ) -> AuthResult<AuthorizeOutcome> {
        let mut ctx = CheckContext {
            client,
            params,
            config: &self.config,
            scope_policy: &self.scope_policy,
            resolved_scope: Vec::new(),
        };
        for checker in &self.checkers {
            checker.check(&mut ctx).map_err(|err| {
                tracing::debug!(
                    checker = checker.name(),
                    client_id = %client.client_id,
                    error = %err,
                    "authorization request rejected"
                );
                err
            })?;
        }
        let scope = ctx.resolved_scope;

        // Every component of the response type must be registered for
        // the client and known to the server
        let tokens = params.response_types();
        for token in &tokens {
            if !client.is_response_type_allowed(token) {
                return Err(AuthError::unauthorized_client(format!(
                    "Client is not authorized for response type {token}"
                )));
            }
        }
        let handlers = self.response_types.resolve(&tokens)?;

        let prompts = params.prompts()?;
        let interaction_ctx = InteractionContext {
            params,
            prompts: &prompts,
            user,
            scope: &scope,
        };
        for stage in &self.interaction_stages {
            stage.check(&interaction_ctx)?;
        }
        let user = user.ok_or(AuthError::LoginRequired)?;

        let explicit_mode = match params.response_mode.as_deref() {
            Some(mode) if self.config.allow_client_response_mode => {
                Some(ResponseMode::parse(mode)?)
            }
            _ => None,
        };
        let mode = ResponseTypeRegistry::response_mode(&handlers, explicit_mode);

        let request = ResponseTypeRequest {
            params,
            client,
            user,
            scope: &scope,
        };
        let mut redirect_params = Vec::new();
        for handler in &handlers {
            redirect_params.extend(handler.issue(&request).await?);
        }

        let redirect_uri = params
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::internal("Redirect URI lost after validation"))?;
        let location = build_redirect_uri(
            redirect_uri,
            mode,
            &redirect_params,
            params.state.as_deref(),
        )?;

        tracing::info!(
            client_id = %client.client_id,
            response_type = ?tokens,
            "authorization request granted"
        );
        Ok(AuthorizeOutcome::Redirect(location))
    }

    /// Routes a processing error: onto the redirect URI when it has
    /// been validated, directly otherwise.
    fn deliver_error(
        &self,
        client: &Client,
        params: &AuthorizeParams,
        err: AuthError,
    ) -> AuthResult<AuthorizeOutcome> {
        let Some(redirect_uri) = params.redirect_uri.as_deref() else {
            return Err(err);
        };
        if !client.redirect_uris.is_empty()
            && !client.redirect_uris.iter().any(|r| redirect_uri.starts_with(r))
        {
            return Err(err);
        }
        // Server faults stay direct: a 500 has no business on a redirect
        if err.is_server_error() {
            return Err(err);
        }
        // Interaction errors reach the client only under prompt=none;
        // otherwise the host handles them with its login or consent UI
        if err.is_interaction_error() && !Self::prompt_none(params) {
            return Err(err);
        }

        let error_params = vec![
            ("error".to_string(), err.oauth_error_code().to_string()),
            ("error_description".to_string(), err.to_string()),
        ];
        let location = build_redirect_uri(
            redirect_uri,
            ResponseMode::Query,
            &error_params,
            params.state.as_deref(),
        )?;
        Ok(AuthorizeOutcome::ErrorRedirect(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn user_with(consented: &[&str], auth_age_secs: i64) -> AuthenticatedUser {
        AuthenticatedUser {
            subject: "user-1".to_string(),
            auth_time: OffsetDateTime::now_utc() - time::Duration::seconds(auth_age_secs),
            consented_scopes: consented.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn run_stages(
        params: &AuthorizeParams,
        prompts: &[Prompt],
        user: Option<&AuthenticatedUser>,
        scope: &[&str],
    ) -> AuthResult<()> {
        let scope: Vec<String> = scope.iter().map(|s| s.to_string()).collect();
        let ctx = InteractionContext {
            params,
            prompts,
            user,
            scope: &scope,
        };
        for stage in default_interaction_stages() {
            stage.check(&ctx)?;
        }
        Ok(())
    }

    #[test]
    fn test_no_session_requires_login() {
        let params = AuthorizeParams::default();
        let err = run_stages(&params, &[], None, &["openid"]).unwrap_err();
        assert_eq!(err.oauth_error_code(), "login_required");
    }

    #[test]
    fn test_prompt_login_forces_reauthentication() {
        let params = AuthorizeParams::default();
        let user = user_with(&["openid"], 10);
        let err = run_stages(&params, &[Prompt::Login], Some(&user), &["openid"]).unwrap_err();
        assert_eq!(err.oauth_error_code(), "login_required");
    }

    #[test]
    fn test_stale_session_fails_max_age() {
        let params = AuthorizeParams {
            max_age: Some(60),
            ..Default::default()
        };
        let user = user_with(&["openid"], 3600);
        let err = run_stages(&params, &[], Some(&user), &["openid"]).unwrap_err();
        assert_eq!(err.oauth_error_code(), "login_required");

        let fresh = user_with(&["openid"], 10);
        assert!(run_stages(&params, &[], Some(&fresh), &["openid"]).is_ok());
    }

    #[test]
    fn test_missing_consent() {
        let params = AuthorizeParams::default();
        let user = user_with(&["openid"], 10);
        let err = run_stages(&params, &[], Some(&user), &["openid", "email"]).unwrap_err();
        assert_eq!(err.oauth_error_code(), "consent_required");
    }

    #[test]
    fn test_prompt_consent_forces_dialog() {
        let params = AuthorizeParams::default();
        let user = user_with(&["openid"], 10);
        let err =
            run_stages(&params, &[Prompt::Consent], Some(&user), &["openid"]).unwrap_err();
        assert_eq!(err.oauth_error_code(), "consent_required");
    }
}
