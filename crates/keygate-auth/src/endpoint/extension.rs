//! Token-endpoint extension chain.
//!
//! After a grant handler has validated its grant, the accumulated
//! [`GrantData`] flows through an ordered list of stages. Each stage
//! may transform the accumulator, short-circuit with an error, or
//! produce the final [`TokenResponse`]; the built-in issuance stage is
//! always the terminal link.

use async_trait::async_trait;
use serde::Serialize;

use crate::AuthResult;
use crate::client_auth::AuthenticatedClient;
use crate::error::AuthError;
use crate::grant::{GrantData, TokenRequest};

/// Successful token-endpoint response body.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// The issued access token.
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Access-token lifetime in seconds.
    pub expires_in: i64,

    /// Granted scope, space-separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Refresh token, when the grant issues one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OpenID Connect ID token, for `openid` requests with a subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// What a stage did with the request.
pub enum StageOutcome {
    /// Pass the (possibly transformed) accumulator to the next stage.
    Continue(GrantData),

    /// Stop the chain with a finished response.
    Respond(TokenResponse),
}

/// Read-only request context visible to every stage.
pub struct StageContext<'a> {
    /// The original token request.
    pub request: &'a TokenRequest,

    /// The authenticated client.
    pub client: &'a AuthenticatedClient,
}

/// One link of the token-endpoint extension chain.
#[async_trait]
pub trait TokenEndpointStage: Send + Sync {
    /// Name of the stage, for logging.
    fn name(&self) -> &'static str;

    /// Processes the accumulator.
    ///
    /// # Errors
    ///
    /// Returns the OAuth error this request dies with.
    async fn process(
        &self,
        ctx: &StageContext<'_>,
        data: GrantData,
    ) -> AuthResult<StageOutcome>;
}

/// Runs the stages in order until one responds.
///
/// # Errors
///
/// Propagates the first stage error; a chain that runs out of stages
/// without responding is a wiring bug reported as an internal error.
pub async fn run_stages(
    stages: &[Box<dyn TokenEndpointStage>],
    ctx: &StageContext<'_>,
    mut data: GrantData,
) -> AuthResult<TokenResponse> {
    for stage in stages {
        tracing::trace!(stage = stage.name(), "running token endpoint stage");
        match stage.process(ctx, data).await? {
            StageOutcome::Continue(next) => data = next,
            StageOutcome::Respond(response) => return Ok(response),
        }
    }
    Err(AuthError::internal(
        "Token endpoint stage chain ended without a terminal stage",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Client, ClientAuthMethod};

    struct ScopeTag;

    #[async_trait]
    impl TokenEndpointStage for ScopeTag {
        fn name(&self) -> &'static str {
            "scope_tag"
        }

        async fn process(
            &self,
            _ctx: &StageContext<'_>,
            mut data: GrantData,
        ) -> AuthResult<StageOutcome> {
            data.scope.push("tagged".to_string());
            Ok(StageOutcome::Continue(data))
        }
    }

    struct Terminal;

    #[async_trait]
    impl TokenEndpointStage for Terminal {
        fn name(&self) -> &'static str {
            "terminal"
        }

        async fn process(
            &self,
            _ctx: &StageContext<'_>,
            data: GrantData,
        ) -> AuthResult<StageOutcome> {
            Ok(StageOutcome::Respond(TokenResponse {
                access_token: "tok".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 60,
                scope: Some(crate::scope::join_scope(&data.scope)),
                refresh_token: None,
                id_token: None,
            }))
        }
    }

    fn test_context() -> (TokenRequest, AuthenticatedClient) {
        let request = TokenRequest {
            grant_type: "client_credentials".to_string(),
            ..Default::default()
        };
        let client = AuthenticatedClient {
            client: Client {
                client_id: "svc".to_string(),
                client_secret: None,
                secret_expires_at: None,
                name: "Service".to_string(),
                grant_types: vec!["client_credentials".to_string()],
                response_types: vec![],
                token_types: vec![],
                auth_method: ClientAuthMethod::ClientSecretBasic,
                redirect_uris: vec![],
                scopes: vec![],
                confidential: true,
                active: true,
                access_token_lifetime: None,
                refresh_token_lifetime: None,
                pkce_required: None,
                jwks: None,
            },
            auth_method: ClientAuthMethod::ClientSecretBasic,
        };
        (request, client)
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let stages: Vec<Box<dyn TokenEndpointStage>> =
            vec![Box::new(ScopeTag), Box::new(Terminal)];
        let (request, client) = test_context();
        let ctx = StageContext {
            request: &request,
            client: &client,
        };

        let response = run_stages(&stages, &ctx, GrantData::for_client("svc"))
            .await
            .unwrap();
        assert_eq!(response.scope.as_deref(), Some("tagged"));
    }

    #[tokio::test]
    async fn test_missing_terminal_is_internal_error() {
        let stages: Vec<Box<dyn TokenEndpointStage>> = vec![Box::new(ScopeTag)];
        let (request, client) = test_context();
        let ctx = StageContext {
            request: &request,
            client: &client,
        };

        let err = run_stages(&stages, &ctx, GrantData::for_client("svc"))
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }
}
