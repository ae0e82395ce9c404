//! Client-credentials grant (RFC 6749 Section 4.4).
//!
//! Machine-to-machine issuance: no subject, no refresh token. The
//! requested scope is resolved against server policy and the client's
//! restriction.

use async_trait::async_trait;

use crate::AuthResult;
use crate::client_auth::AuthenticatedClient;
use crate::error::AuthError;
use crate::scope::ScopePolicy;
use crate::types::ClientAuthMethod;

use super::{CLIENT_CREDENTIALS, GrantData, GrantHandler, TokenRequest};

/// Handler for `grant_type=client_credentials`.
pub struct ClientCredentialsGrant {
    scope_policy: ScopePolicy,
}

impl ClientCredentialsGrant {
    /// Creates the handler over the server's scope policy.
    pub fn new(scope_policy: ScopePolicy) -> Self {
        Self { scope_policy }
    }
}

#[async_trait]
impl GrantHandler for ClientCredentialsGrant {
    fn grant_type(&self) -> &'static str {
        CLIENT_CREDENTIALS
    }

    async fn validate(
        &self,
        request: &TokenRequest,
        client: &AuthenticatedClient,
        data: GrantData,
    ) -> AuthResult<GrantData> {
        // Authentication with an actual credential is mandatory here
        if client.auth_method == ClientAuthMethod::None {
            return Err(AuthError::unauthorized_client(
                "client_credentials requires an authenticated confidential client",
            ));
        }

        let scope = self.scope_policy.resolve(
            request.scope.as_deref(),
            client.client.scope_restriction(),
        )?;

        // No subject and no refresh token for machine grants
        Ok(data.with_scope(scope))
    }
}
