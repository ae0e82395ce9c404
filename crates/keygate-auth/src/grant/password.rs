//! Resource-owner password grant (RFC 6749 Section 4.3).
//!
//! Legacy grant kept for trusted first-party clients and migrations.
//! Unknown users and wrong passwords produce the same `invalid_grant`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::client_auth::AuthenticatedClient;
use crate::error::AuthError;
use crate::scope::ScopePolicy;
use crate::storage::UserStorage;

use super::{GrantData, GrantHandler, PASSWORD, REFRESH_TOKEN, TokenRequest};

/// Handler for `grant_type=password`.
pub struct PasswordGrant {
    user_storage: Arc<dyn UserStorage>,
    scope_policy: ScopePolicy,
}

impl PasswordGrant {
    /// Creates the handler over the user store and scope policy.
    pub fn new(user_storage: Arc<dyn UserStorage>, scope_policy: ScopePolicy) -> Self {
        Self {
            user_storage,
            scope_policy,
        }
    }
}

#[async_trait]
impl GrantHandler for PasswordGrant {
    fn grant_type(&self) -> &'static str {
        PASSWORD
    }

    async fn validate(
        &self,
        request: &TokenRequest,
        client: &AuthenticatedClient,
        data: GrantData,
    ) -> AuthResult<GrantData> {
        let username = request
            .username
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing username parameter"))?;
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing password parameter"))?;

        let subject = self
            .user_storage
            .verify_credentials(username, password)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Invalid resource owner credentials"))?;

        let scope = self.scope_policy.resolve(
            request.scope.as_deref(),
            client.client.scope_restriction(),
        )?;

        let mut data = data.with_subject(subject).with_scope(scope);
        if client.client.is_grant_type_allowed(REFRESH_TOKEN) {
            data = data.with_refresh_token();
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmptyScopePolicy;
    use crate::types::{Client, ClientAuthMethod};

    struct MockUserStorage;

    #[async_trait]
    impl UserStorage for MockUserStorage {
        async fn verify_credentials(
            &self,
            username: &str,
            password: &str,
        ) -> AuthResult<Option<String>> {
            if username == "alice" && password == "correct-horse" {
                Ok(Some("user-alice".to_string()))
            } else {
                Ok(None)
            }
        }
    }

    fn first_party_client() -> AuthenticatedClient {
        AuthenticatedClient {
            client: Client {
                client_id: "cli".to_string(),
                client_secret: Some("s3cret".to_string()),
                secret_expires_at: None,
                name: "CLI".to_string(),
                grant_types: vec![PASSWORD.to_string(), REFRESH_TOKEN.to_string()],
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
        }
    }

    fn handler() -> PasswordGrant {
        PasswordGrant::new(
            Arc::new(MockUserStorage),
            ScopePolicy::new(["openid", "profile"], EmptyScopePolicy::Reject),
        )
    }

    fn password_request(username: &str, password: &str) -> TokenRequest {
        TokenRequest {
            grant_type: PASSWORD.to_string(),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            scope: Some("openid".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let data = handler()
            .validate(
                &password_request("alice", "correct-horse"),
                &first_party_client(),
                GrantData::for_client("cli"),
            )
            .await
            .unwrap();
        assert_eq!(data.subject.as_deref(), Some("user-alice"));
        assert!(data.issue_refresh_token);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_identical() {
        let wrong = handler()
            .validate(
                &password_request("alice", "wrong"),
                &first_party_client(),
                GrantData::for_client("cli"),
            )
            .await
            .unwrap_err();
        let unknown = handler()
            .validate(
                &password_request("mallory", "whatever"),
                &first_party_client(),
                GrantData::for_client("cli"),
            )
            .await
            .unwrap_err();

        assert_eq!(wrong.oauth_error_code(), "invalid_grant");
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let mut request = password_request("alice", "correct-horse");
        request.password = None;

        let err = handler()
            .validate(
                &request,
                &first_party_client(),
                GrantData::for_client("cli"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }
}
