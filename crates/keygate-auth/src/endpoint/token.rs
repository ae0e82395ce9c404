//! Token endpoint orchestrator.
//!
//! Runs the fixed sequence: authenticate the client, resolve the grant
//! handler, check the client is registered for that grant, let the
//! handler validate, then run the extension chain whose terminal stage
//! persists and serializes the tokens. Every step short-circuits with
//! an OAuth error; no partial issuance is observable on failure.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::client_auth::{
    AuthenticatedClient, ClientAuthenticator, ClientCredentials, extract_client_id_unverified,
};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::grant::{GrantData, GrantRegistry, JWT_BEARER, TokenRequest};
use crate::signer::TokenSigner;
use crate::storage::{AccessTokenStorage, ClientStorage, RefreshTokenStorage};
use crate::types::{
    AccessToken, RefreshToken, TokenType, generate_token, hash_token,
};

use super::extension::{
    StageContext, StageOutcome, TokenEndpointStage, TokenResponse, run_stages,
};

/// The token endpoint.
pub struct TokenEndpoint {
    config: AuthConfig,
    registry: GrantRegistry,
    authenticator: ClientAuthenticator,
    client_storage: Arc<dyn ClientStorage>,
    stages: Vec<Box<dyn TokenEndpointStage>>,
}

impl TokenEndpoint {
    /// Wires the endpoint with the built-in issuance stage as the
    /// terminal link of the extension chain.
    pub fn new(
        config: AuthConfig,
        registry: GrantRegistry,
        authenticator: ClientAuthenticator,
        client_storage: Arc<dyn ClientStorage>,
        access_tokens: Arc<dyn AccessTokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        signer: Option<Arc<dyn TokenSigner>>,
    ) -> Self {
        let issuance = IssuanceStage {
            config: config.clone(),
            access_tokens,
            refresh_tokens,
            signer,
        };
        Self {
            config,
            registry,
            authenticator,
            client_storage,
            stages: vec![Box::new(issuance)],
        }
    }

    /// Inserts an extension stage before the terminal issuance stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Box<dyn TokenEndpointStage>) -> Self {
        let terminal = self.stages.len() - 1;
        self.stages.insert(terminal, stage);
        self
    }

    /// Handles one token request.
    ///
    /// # Errors
    ///
    /// Returns the OAuth error to serialize; the HTTP layer maps it via
    /// [`AuthError::http_status`] and [`AuthError::oauth_error_code`].
    pub async fn handle(
        &self,
        credentials: &ClientCredentials,
        request: &TokenRequest,
    ) -> AuthResult<TokenResponse> {
        // The grant type must exist before anything else is decided
        let handler = self.registry.get(&request.grant_type)?;

        let client = self.resolve_client(credentials, request).await?;

        if !client.client.is_grant_type_allowed(&request.grant_type) {
            tracing::debug!(
                client_id = %client.client.client_id,
                grant_type = %request.grant_type,
                "grant type not registered for client"
            );
            return Err(AuthError::unauthorized_client(format!(
                "Client is not authorized for grant type {}",
                request.grant_type
            )));
        }

        // Bearer is the only token type this server issues; a client
        // registered away from it cannot be served
        if !client.client.is_token_type_allowed(TokenType::Bearer) {
            return Err(AuthError::invalid_request(
                "Client does not accept the Bearer token type",
            ));
        }

        let data = handler
            .validate(request, &client, GrantData::for_client(&client.client.client_id))
            .await?;

        let ctx = StageContext {
            request,
            client: &client,
        };
        let response = run_stages(&self.stages, &ctx, data).await?;

        tracing::info!(
            client_id = %client.client.client_id,
            grant_type = %request.grant_type,
            "issued access token"
        );
        Ok(response)
    }

    /// Resolves the requesting client.
    ///
    /// A request with no credentials at all is still valid for grant
    /// types that carry their own client identity: the jwt-bearer
    /// assertion names its client in `iss`, and the grant handler's
    /// signature check is what authenticates it.
    async fn resolve_client(
        &self,
        credentials: &ClientCredentials,
        request: &TokenRequest,
    ) -> AuthResult<AuthenticatedClient> {
        if let Some(client) = self.authenticator.resolve(credentials).await? {
            return Ok(client);
        }

        if request.grant_type != JWT_BEARER {
            return Err(AuthError::invalid_client("No client credentials provided"));
        }

        let assertion = request
            .assertion
            .as_deref()
            .ok_or_else(|| AuthError::invalid_client("No client credentials provided"))?;
        let client_id = extract_client_id_unverified(assertion)?;
        let client = self
            .client_storage
            .find_by_id(&client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Unknown client"))?;
        if !client.active {
            return Err(AuthError::invalid_client("Client is inactive"));
        }
        let auth_method = client.auth_method;
        Ok(AuthenticatedClient {
            client,
            auth_method,
        })
    }

    /// Server configuration, for metadata documents.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Registered grant type names, for metadata documents.
    #[must_use]
    pub fn grant_types(&self) -> Vec<&'static str> {
        self.registry.names()
    }
}

// =============================================================================
// Issuance Stage
// =============================================================================

/// Terminal stage: persists the tokens and builds the response body.
struct IssuanceStage {
    config: AuthConfig,
    access_tokens: Arc<dyn AccessTokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    signer: Option<Arc<dyn TokenSigner>>,
}

impl IssuanceStage {
    async fn issue_refresh_token(
        &self,
        ctx: &StageContext<'_>,
        data: &GrantData,
        now: OffsetDateTime,
    ) -> AuthResult<(String, Uuid)> {
        let token = generate_token(32);
        let lifetime = ctx
            .client
            .client
            .refresh_token_lifetime
            .map_or(self.config.refresh_token_lifetime, time::Duration::seconds);

        let mut record = RefreshToken {
            id: Uuid::new_v4(),
            token_hash: hash_token(&token),
            client_id: data.client_id.clone(),
            user_id: data.subject.clone(),
            scope: crate::scope::join_scope(&data.scope),
            created_at: now,
            expires_at: Some(now + lifetime),
            revoked_at: None,
            replaced_by: None,
        };

        match &data.refresh_rotation {
            Some(rotation) => {
                // The replacement inherits the original expiry: rotation
                // never extends a session
                record.expires_at = rotation.expires_at;
                if !self.refresh_tokens.rotate(&rotation.old_hash, &record).await? {
                    // A concurrent redemption won the rotation
                    return Err(AuthError::invalid_grant("Refresh token is no longer valid"));
                }
            }
            None => self.refresh_tokens.create(&record).await?,
        }

        Ok((token, record.id))
    }

    async fn sign_id_token(
        &self,
        ctx: &StageContext<'_>,
        data: &GrantData,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> AuthResult<String> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            AuthError::configuration("OpenID request but no token signer is configured")
        })?;
        let subject = data
            .subject
            .as_deref()
            .ok_or_else(|| AuthError::internal("ID token requested without a subject"))?;

        let mut claims = serde_json::json!({
            "iss": self.config.issuer,
            "sub": subject,
            "aud": ctx.client.client.client_id,
            "iat": now.unix_timestamp(),
            "exp": expires_at.unix_timestamp(),
        });
        if let Some(nonce) = &data.nonce {
            claims["nonce"] = serde_json::Value::String(nonce.clone());
        }
        if let Some(auth_time) = data.auth_time {
            claims["auth_time"] = serde_json::Value::from(auth_time.unix_timestamp());
        }

        signer.sign(&claims).await
    }
}

#[async_trait]
impl TokenEndpointStage for IssuanceStage {
    fn name(&self) -> &'static str {
        "issuance"
    }

    async fn process(
        &self,
        ctx: &StageContext<'_>,
        data: GrantData,
    ) -> AuthResult<StageOutcome> {
        let now = OffsetDateTime::now_utc();

        // Rotation happens before anything new is handed out, so a lost
        // race surfaces as invalid_grant with no tokens minted
        let refresh = if data.issue_refresh_token {
            Some(self.issue_refresh_token(ctx, &data, now).await?)
        } else {
            None
        };

        let access_lifetime = ctx
            .client
            .client
            .access_token_lifetime
            .map_or(self.config.access_token_lifetime, time::Duration::seconds);
        let expires_at = now + access_lifetime;

        let access_token = generate_token(32);
        let record = AccessToken {
            id: Uuid::new_v4(),
            token_hash: hash_token(&access_token),
            client_id: data.client_id.clone(),
            user_id: data.subject.clone(),
            scope: crate::scope::join_scope(&data.scope),
            token_type: TokenType::Bearer,
            refresh_token_id: refresh.as_ref().map(|(_, id)| *id),
            metadata: data.metadata.clone(),
            created_at: now,
            expires_at,
            revoked_at: None,
        };
        self.access_tokens.create(&record).await?;

        let id_token = if data.wants_id_token() {
            Some(self.sign_id_token(ctx, &data, now, expires_at).await?)
        } else {
            None
        };

        Ok(StageOutcome::Respond(TokenResponse {
            access_token,
            token_type: TokenType::Bearer.as_str().to_string(),
            expires_in: access_lifetime.whole_seconds(),
            scope: (!data.scope.is_empty()).then(|| crate::scope::join_scope(&data.scope)),
            refresh_token: refresh.map(|(token, _)| token),
            id_token,
        }))
    }
}
