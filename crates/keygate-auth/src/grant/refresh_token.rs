//! Refresh-token grant (RFC 6749 Section 6).
//!
//! The presented token must be valid and owned by the authenticated
//! client. Scope may narrow but never widen. With rotation enabled the
//! handler records a pending rotation; the atomic swap happens at
//! issuance so concurrent redemptions cannot both succeed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::client_auth::AuthenticatedClient;
use crate::error::AuthError;
use crate::scope::{ScopePolicy, parse_scope};
use crate::storage::RefreshTokenStorage;
use crate::types::hash_token;

use super::{GrantData, GrantHandler, REFRESH_TOKEN, RefreshRotation, TokenRequest};

/// Handler for `grant_type=refresh_token`.
pub struct RefreshTokenGrant {
    refresh_storage: Arc<dyn RefreshTokenStorage>,
    rotate: bool,
}

impl RefreshTokenGrant {
    /// Creates the handler. `rotate` mirrors the server's rotation
    /// setting.
    pub fn new(refresh_storage: Arc<dyn RefreshTokenStorage>, rotate: bool) -> Self {
        Self {
            refresh_storage,
            rotate,
        }
    }
}

#[async_trait]
impl GrantHandler for RefreshTokenGrant {
    fn grant_type(&self) -> &'static str {
        REFRESH_TOKEN
    }

    async fn validate(
        &self,
        request: &TokenRequest,
        client: &AuthenticatedClient,
        data: GrantData,
    ) -> AuthResult<GrantData> {
        let token_value = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing refresh_token parameter"))?;

        let token_hash = hash_token(token_value);
        let token = self
            .refresh_storage
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Unknown refresh token"))?;

        if token.client_id != client.client.client_id {
            tracing::warn!(
                token_client = %token.client_id,
                presenting_client = %client.client.client_id,
                "refresh token presented by a different client"
            );
            return Err(AuthError::invalid_grant(
                "Refresh token was issued to another client",
            ));
        }

        if !token.is_valid() {
            return Err(AuthError::invalid_grant(
                "Refresh token is expired, revoked, or already rotated",
            ));
        }

        // Scope narrowing: absent scope keeps the original grant
        let original = parse_scope(&token.scope)?;
        let scope = match request.scope.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let requested = parse_scope(raw)?;
                ScopePolicy::check_narrowing(&requested, &original)?;
                requested
            }
            _ => original,
        };

        let mut data = data.with_scope(scope);
        if let Some(subject) = &token.user_id {
            data = data.with_subject(subject.clone());
        }

        if self.rotate {
            data = data.with_refresh_rotation(RefreshRotation {
                old_hash: token_hash,
                expires_at: token.expires_at,
            });
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Client, ClientAuthMethod, RefreshToken};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    struct MockRefreshStorage {
        tokens: Mutex<HashMap<String, RefreshToken>>,
    }

    impl MockRefreshStorage {
        fn with(tokens: Vec<RefreshToken>) -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(
                    tokens
                        .into_iter()
                        .map(|t| (t.token_hash.clone(), t))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl RefreshTokenStorage for MockRefreshStorage {
        async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
            self.tokens
                .lock()
                .unwrap()
                .insert(token.token_hash.clone(), token.clone());
            Ok(())
        }

        async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
            Ok(self.tokens.lock().unwrap().get(token_hash).cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<RefreshToken>> {
            Ok(self
                .tokens
                .lock()
                .unwrap()
                .values()
                .find(|t| t.id == id)
                .cloned())
        }

        async fn rotate(&self, old_hash: &str, replacement: &RefreshToken) -> AuthResult<bool> {
            let mut tokens = self.tokens.lock().unwrap();
            match tokens.get_mut(old_hash) {
                Some(old) if old.is_valid() => {
                    old.replaced_by = Some(replacement.id);
                    tokens.insert(replacement.token_hash.clone(), replacement.clone());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn revoke(&self, token_hash: &str) -> AuthResult<()> {
            if let Some(token) = self.tokens.lock().unwrap().get_mut(token_hash) {
                token.revoked_at = Some(OffsetDateTime::now_utc());
            }
            Ok(())
        }

        async fn revoke_by_id(&self, id: Uuid) -> AuthResult<()> {
            for token in self.tokens.lock().unwrap().values_mut() {
                if token.id == id {
                    token.revoked_at = Some(OffsetDateTime::now_utc());
                }
            }
            Ok(())
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    fn test_client(id: &str) -> AuthenticatedClient {
        AuthenticatedClient {
            client: Client {
                client_id: id.to_string(),
                client_secret: Some("s3cret".to_string()),
                secret_expires_at: None,
                name: id.to_string(),
                grant_types: vec![REFRESH_TOKEN.to_string()],
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

    fn stored_token(value: &str, client_id: &str, scope: &str) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            token_hash: hash_token(value),
            client_id: client_id.to_string(),
            user_id: Some("user-1".to_string()),
            scope: scope.to_string(),
            created_at: OffsetDateTime::now_utc(),
            expires_at: Some(OffsetDateTime::now_utc() + Duration::days(30)),
            revoked_at: None,
            replaced_by: None,
        }
    }

    fn refresh_request(token: &str, scope: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: REFRESH_TOKEN.to_string(),
            refresh_token: Some(token.to_string()),
            scope: scope.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_successful_refresh_records_rotation() {
        let grant = RefreshTokenGrant::new(
            MockRefreshStorage::with(vec![stored_token("rt-1", "web", "openid profile")]),
            true,
        );
        let client = test_client("web");

        let data = grant
            .validate(
                &refresh_request("rt-1", None),
                &client,
                GrantData::for_client("web"),
            )
            .await
            .unwrap();

        assert_eq!(data.subject.as_deref(), Some("user-1"));
        assert_eq!(data.scope.len(), 2);
        assert!(data.issue_refresh_token);
        let rotation = data.refresh_rotation.expect("rotation recorded");
        assert_eq!(rotation.old_hash, hash_token("rt-1"));
        assert!(rotation.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_rotation_disabled() {
        let grant = RefreshTokenGrant::new(
            MockRefreshStorage::with(vec![stored_token("rt-1", "web", "openid")]),
            false,
        );
        let client = test_client("web");

        let data = grant
            .validate(
                &refresh_request("rt-1", None),
                &client,
                GrantData::for_client("web"),
            )
            .await
            .unwrap();
        assert!(!data.issue_refresh_token);
        assert!(data.refresh_rotation.is_none());
    }

    #[tokio::test]
    async fn test_scope_can_narrow_but_not_widen() {
        let storage = MockRefreshStorage::with(vec![stored_token("rt-1", "web", "a b")]);
        let grant = RefreshTokenGrant::new(storage, true);
        let client = test_client("web");

        let data = grant
            .validate(
                &refresh_request("rt-1", Some("a")),
                &client,
                GrantData::for_client("web"),
            )
            .await
            .unwrap();
        assert_eq!(data.scope.len(), 1);

        let err = grant
            .validate(
                &refresh_request("rt-1", Some("a c")),
                &client,
                GrantData::for_client("web"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
    }

    #[tokio::test]
    async fn test_cross_client_token_rejected() {
        let grant = RefreshTokenGrant::new(
            MockRefreshStorage::with(vec![stored_token("rt-1", "web", "openid")]),
            true,
        );
        let attacker = test_client("other");

        let err = grant
            .validate(
                &refresh_request("rt-1", None),
                &attacker,
                GrantData::for_client("other"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_rotated_token_rejected() {
        let mut token = stored_token("rt-1", "web", "openid");
        token.replaced_by = Some(Uuid::new_v4());
        let grant = RefreshTokenGrant::new(MockRefreshStorage::with(vec![token]), true);
        let client = test_client("web");

        let err = grant
            .validate(
                &refresh_request("rt-1", None),
                &client,
                GrantData::for_client("web"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let grant = RefreshTokenGrant::new(MockRefreshStorage::with(vec![]), true);
        let client = test_client("web");

        let err = grant
            .validate(
                &refresh_request("rt-404", None),
                &client,
                GrantData::for_client("web"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }
}
