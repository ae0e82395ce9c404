//! JWT-bearer authorization grant (RFC 7523 Section 2.1).
//!
//! An authenticated client presents a signed assertion naming the
//! subject it was authorized for. The assertion is verified against
//! the client's own registered key material; the trust model is the
//! client vouching for its users, not third-party issuers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::client_auth::{
    AssertionValidator, AuthenticatedClient, extract_algorithm, extract_key_id,
};
use crate::error::AuthError;
use crate::scope::ScopePolicy;

use super::{GrantData, GrantHandler, JWT_BEARER, TokenRequest};

/// Handler for `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer`.
pub struct JwtBearerGrant {
    assertion_validator: Arc<AssertionValidator>,
    scope_policy: ScopePolicy,
}

impl JwtBearerGrant {
    /// Creates the handler over the shared assertion validator.
    pub fn new(assertion_validator: Arc<AssertionValidator>, scope_policy: ScopePolicy) -> Self {
        Self {
            assertion_validator,
            scope_policy,
        }
    }
}

#[async_trait]
impl GrantHandler for JwtBearerGrant {
    fn grant_type(&self) -> &'static str {
        JWT_BEARER
    }

    async fn validate(
        &self,
        request: &TokenRequest,
        client: &AuthenticatedClient,
        data: GrantData,
    ) -> AuthResult<GrantData> {
        let assertion = request
            .assertion
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing assertion parameter"))?;

        let algorithm = extract_algorithm(assertion)?;
        let kid = extract_key_id(assertion)?;
        let key = self
            .assertion_validator
            .decoding_key(&client.client, algorithm, kid.as_deref())?;

        let claims = self
            .assertion_validator
            .validate_grant(assertion, &client.client.client_id, &key, algorithm)
            .await?;

        let scope = self.scope_policy.resolve(
            request.scope.as_deref(),
            client.client.scope_restriction(),
        )?;

        // Assertions stand in for a fresh authorization; no refresh token
        Ok(data.with_subject(claims.sub).with_scope(scope))
    }
}
