//! Token introspection per RFC 7662.
//!
//! Opaque tokens carry no claims, so introspection is a lookup against
//! the token stores. The caller must be an authenticated client; a
//! token owned by anyone else reports `active: false` and nothing
//! more, exactly like an unknown or expired token.

use std::sync::Arc;

use serde::Serialize;

use crate::AuthResult;
use crate::revocation::TokenTypeHint;
use crate::storage::{AccessTokenStorage, RefreshTokenStorage};
use crate::types::{Client, hash_token};

/// RFC 7662 introspection response body.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active.
    pub active: bool,

    /// Granted scope, space-separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Subject of the authorizing user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Token type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiry as a Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issuance time as a Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl IntrospectionResponse {
    /// The response for an unknown, foreign, or inactive token.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            sub: None,
            token_type: None,
            exp: None,
            iat: None,
        }
    }
}

/// Answers introspection queries against the token stores.
pub struct IntrospectionEngine {
    access_tokens: Arc<dyn AccessTokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
}

impl IntrospectionEngine {
    /// Creates the engine over the token stores.
    pub fn new(
        access_tokens: Arc<dyn AccessTokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
    ) -> Self {
        Self {
            access_tokens,
            refresh_tokens,
        }
    }

    /// Introspects a token on behalf of an authenticated client.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures.
    pub async fn introspect(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        caller: &Client,
    ) -> AuthResult<IntrospectionResponse> {
        let token_hash = hash_token(token);

        if hint != Some(TokenTypeHint::RefreshToken) {
            if let Some(token) = self.access_tokens.find_by_hash(&token_hash).await? {
                if token.client_id != caller.client_id || !token.is_active() {
                    return Ok(IntrospectionResponse::inactive());
                }
                return Ok(IntrospectionResponse {
                    active: true,
                    scope: Some(token.scope.clone()),
                    client_id: Some(token.client_id.clone()),
                    sub: token.user_id.clone(),
                    token_type: Some(token.token_type.as_str().to_string()),
                    exp: Some(token.expires_at.unix_timestamp()),
                    iat: Some(token.created_at.unix_timestamp()),
                });
            }
        }

        if hint != Some(TokenTypeHint::AccessToken) {
            if let Some(token) = self.refresh_tokens.find_by_hash(&token_hash).await? {
                if token.client_id != caller.client_id || !token.is_valid() {
                    return Ok(IntrospectionResponse::inactive());
                }
                return Ok(IntrospectionResponse {
                    active: true,
                    scope: Some(token.scope.clone()),
                    client_id: Some(token.client_id.clone()),
                    sub: token.user_id.clone(),
                    token_type: Some("refresh_token".to_string()),
                    exp: token.expires_at.map(|t| t.unix_timestamp()),
                    iat: Some(token.created_at.unix_timestamp()),
                });
            }
        }

        Ok(IntrospectionResponse::inactive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use crate::types::{AccessToken, ClientAuthMethod, RefreshToken, TokenType};

    #[derive(Default)]
    struct MockAccessTokens {
        tokens: Mutex<Vec<AccessToken>>,
    }

    #[async_trait]
    impl AccessTokenStorage for MockAccessTokens {
        async fn create(&self, token: &AccessToken) -> AuthResult<()> {
            self.tokens.lock().unwrap().push(token.clone());
            Ok(())
        }

        async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<AccessToken>> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.token_hash == token_hash)
                .cloned())
        }

        async fn revoke(&self, _token_hash: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn revoke_by_refresh_token(&self, _refresh_token_id: Uuid) -> AuthResult<u64> {
            Ok(0)
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct MockRefreshTokens {
        tokens: Mutex<Vec<RefreshToken>>,
    }

    #[async_trait]
    impl RefreshTokenStorage for MockRefreshTokens {
        async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
            self.tokens.lock().unwrap().push(token.clone());
            Ok(())
        }

        async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.token_hash == token_hash)
                .cloned())
        }

        async fn find_by_id(&self, _id: Uuid) -> AuthResult<Option<RefreshToken>> {
            Ok(None)
        }

        async fn rotate(&self, _old_hash: &str, _replacement: &RefreshToken) -> AuthResult<bool> {
            Ok(false)
        }

        async fn revoke(&self, _token_hash: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn revoke_by_id(&self, _id: Uuid) -> AuthResult<()> {
            Ok(())
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    fn caller(id: &str) -> Client {
        Client {
            client_id: id.to_string(),
            client_secret: None,
            secret_expires_at: None,
            name: id.to_string(),
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
        }
    }

    async fn engine_with_tokens() -> (IntrospectionEngine, String, String) {
        let access_tokens = Arc::new(MockAccessTokens::default());
        let refresh_tokens = Arc::new(MockRefreshTokens::default());
        let now = OffsetDateTime::now_utc();

        let access_value = "access-value".to_string();
        access_tokens
            .create(&AccessToken {
                id: Uuid::new_v4(),
                token_hash: hash_token(&access_value),
                client_id: "web".to_string(),
                user_id: Some("user-1".to_string()),
                scope: "openid profile".to_string(),
                token_type: TokenType::Bearer,
                refresh_token_id: None,
                metadata: HashMap::new(),
                created_at: now,
                expires_at: now + Duration::hours(1),
                revoked_at: None,
            })
            .await
            .unwrap();

        let refresh_value = "refresh-value".to_string();
        refresh_tokens
            .create(&RefreshToken {
                id: Uuid::new_v4(),
                token_hash: hash_token(&refresh_value),
                client_id: "web".to_string(),
                user_id: Some("user-1".to_string()),
                scope: "openid profile".to_string(),
                created_at: now,
                expires_at: Some(now + Duration::days(30)),
                revoked_at: None,
                replaced_by: None,
            })
            .await
            .unwrap();

        (
            IntrospectionEngine::new(access_tokens, refresh_tokens),
            access_value,
            refresh_value,
        )
    }

    #[tokio::test]
    async fn test_active_access_token() {
        let (engine, access, _) = engine_with_tokens().await;
        let response = engine.introspect(&access, None, &caller("web")).await.unwrap();
        assert!(response.active);
        assert_eq!(response.scope.as_deref(), Some("openid profile"));
        assert_eq!(response.sub.as_deref(), Some("user-1"));
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn test_refresh_token_lookup() {
        let (engine, _, refresh) = engine_with_tokens().await;
        let response = engine
            .introspect(&refresh, Some(TokenTypeHint::RefreshToken), &caller("web"))
            .await
            .unwrap();
        assert!(response.active);
        assert_eq!(response.token_type.as_deref(), Some("refresh_token"));
    }

    #[tokio::test]
    async fn test_foreign_caller_sees_inactive() {
        let (engine, access, _) = engine_with_tokens().await;
        let response = engine
            .introspect(&access, None, &caller("intruder"))
            .await
            .unwrap();
        assert!(!response.active);
        assert!(response.scope.is_none());
        assert!(response.sub.is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_is_inactive() {
        let (engine, _, _) = engine_with_tokens().await;
        let response = engine
            .introspect("no-such-token", None, &caller("web"))
            .await
            .unwrap();
        assert!(!response.active);
    }
}
