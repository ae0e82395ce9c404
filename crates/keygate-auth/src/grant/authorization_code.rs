//! Authorization-code grant (RFC 6749 Section 4.1.3).
//!
//! The code is consumed atomically before anything else is checked, so
//! even a request that ultimately fails burns the code. Binding checks
//! then run in a fixed order: owning client, redirect URI, expiry,
//! PKCE.

use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::client_auth::AuthenticatedClient;
use crate::error::AuthError;
use crate::pkce::{PkceChallenge, PkceVerifier};
use crate::scope::parse_scope;
use crate::storage::AuthCodeStorage;
use crate::types::hash_token;

use super::{AUTHORIZATION_CODE, GrantData, GrantHandler, TokenRequest};

/// Handler for `grant_type=authorization_code`.
pub struct AuthorizationCodeGrant {
    code_storage: Arc<dyn AuthCodeStorage>,
}

impl AuthorizationCodeGrant {
    /// Creates the handler over the code storage.
    pub fn new(code_storage: Arc<dyn AuthCodeStorage>) -> Self {
        Self { code_storage }
    }
}

#[async_trait]
impl GrantHandler for AuthorizationCodeGrant {
    fn grant_type(&self) -> &'static str {
        AUTHORIZATION_CODE
    }

    async fn validate(
        &self,
        request: &TokenRequest,
        client: &AuthenticatedClient,
        data: GrantData,
    ) -> AuthResult<GrantData> {
        // 1. Required parameters
        let code_value = request
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing code parameter"))?;

        // 2. Consume the code. A missing or already-used code is the
        // same invalid_grant to the client.
        let code = self
            .code_storage
            .consume(&hash_token(code_value))
            .await?
            .ok_or_else(|| {
                AuthError::invalid_grant("Authorization code is invalid or already used")
            })?;

        // 3. Binding checks, in order
        if code.client_id != client.client.client_id {
            tracing::warn!(
                code_client = %code.client_id,
                presenting_client = %client.client.client_id,
                "authorization code presented by a different client"
            );
            return Err(AuthError::invalid_grant(
                "Authorization code was issued to another client",
            ));
        }

        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing redirect_uri parameter"))?;
        if redirect_uri != code.redirect_uri {
            return Err(AuthError::invalid_request(
                "redirect_uri does not match the authorization request",
            ));
        }

        if code.is_expired() {
            return Err(AuthError::invalid_grant("Authorization code has expired"));
        }

        // 4. PKCE: the stored challenge is authoritative
        match (&code.code_challenge, &request.code_verifier) {
            (Some(challenge), Some(verifier)) => {
                let method = code.challenge_method().ok_or_else(|| {
                    AuthError::invalid_grant("Stored code challenge method is unusable")
                })?;
                let challenge = PkceChallenge::new(challenge.clone(), method)
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
                let verifier = PkceVerifier::new(verifier.clone())
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
                challenge
                    .verify(&verifier)
                    .map_err(|e| AuthError::invalid_request(e.to_string()))?;
            }
            (Some(_), None) => {
                return Err(AuthError::invalid_request(
                    "Missing code_verifier for PKCE-protected code",
                ));
            }
            (None, Some(_)) => {
                return Err(AuthError::invalid_request(
                    "code_verifier provided but no challenge was recorded",
                ));
            }
            (None, None) => {}
        }

        // 5. Scope comes from the code, never from the token request
        let scope = parse_scope(&code.scope)?;

        let mut data = data
            .with_subject(code.user_id.clone())
            .with_scope(scope)
            .with_auth_time(code.auth_time)
            .with_metadata(
                "redirect_uri",
                serde_json::Value::String(code.redirect_uri.clone()),
            );
        if let Some(nonce) = &code.nonce {
            data = data.with_nonce(nonce.clone());
        }
        // The refresh decision was made at authorization time and
        // travels with the code
        if code.issue_refresh_token {
            data = data.with_refresh_token();
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::REFRESH_TOKEN;
    use crate::pkce::{PkceChallenge, PkceChallengeMethod, PkceVerifier};
    use crate::types::{AuthorizationCode, Client, ClientAuthMethod};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    struct MockCodeStorage {
        codes: Mutex<HashMap<String, AuthorizationCode>>,
    }

    impl MockCodeStorage {
        fn with(codes: Vec<AuthorizationCode>) -> Arc<Self> {
            Arc::new(Self {
                codes: Mutex::new(
                    codes
                        .into_iter()
                        .map(|c| (c.code_hash.clone(), c))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl AuthCodeStorage for MockCodeStorage {
        async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
            self.codes
                .lock()
                .unwrap()
                .insert(code.code_hash.clone(), code.clone());
            Ok(())
        }

        async fn consume(&self, code_hash: &str) -> AuthResult<Option<AuthorizationCode>> {
            let mut codes = self.codes.lock().unwrap();
            match codes.get_mut(code_hash) {
                Some(code) if !code.used => {
                    code.used = true;
                    Ok(Some(code.clone()))
                }
                _ => Ok(None),
            }
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    fn test_client(id: &str) -> AuthenticatedClient {
        AuthenticatedClient {
            client: Client {
                client_id: id.to_string(),
                client_secret: None,
                secret_expires_at: None,
                name: id.to_string(),
                grant_types: vec![
                    AUTHORIZATION_CODE.to_string(),
                    REFRESH_TOKEN.to_string(),
                ],
                response_types: vec!["code".to_string()],
                token_types: vec![],
                auth_method: ClientAuthMethod::None,
                redirect_uris: vec!["https://app.example.com/cb".to_string()],
                scopes: vec![],
                confidential: false,
                active: true,
                access_token_lifetime: None,
                refresh_token_lifetime: None,
                pkce_required: None,
                jwks: None,
            },
            auth_method: ClientAuthMethod::None,
        }
    }

    fn stored_code(value: &str, client_id: &str) -> AuthorizationCode {
        AuthorizationCode {
            id: Uuid::new_v4(),
            code_hash: hash_token(value),
            client_id: client_id.to_string(),
            user_id: "user-1".to_string(),
            redirect_uri: "https://app.example.com/cb".to_string(),
            scope: "openid profile".to_string(),
            code_challenge: None,
            code_challenge_method: None,
            nonce: Some("n-1".to_string()),
            auth_time: OffsetDateTime::now_utc(),
            created_at: OffsetDateTime::now_utc(),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(10),
            issue_refresh_token: true,
            used: false,
        }
    }

    fn exchange_request(code: &str) -> TokenRequest {
        TokenRequest {
            grant_type: AUTHORIZATION_CODE.to_string(),
            code: Some(code.to_string()),
            redirect_uri: Some("https://app.example.com/cb".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![stored_code(
            "code-1", "spa",
        )]));
        let client = test_client("spa");

        let data = grant
            .validate(
                &exchange_request("code-1"),
                &client,
                GrantData::for_client("spa"),
            )
            .await
            .unwrap();

        assert_eq!(data.subject.as_deref(), Some("user-1"));
        assert_eq!(data.scope, vec!["openid".to_string(), "profile".to_string()]);
        assert_eq!(data.nonce.as_deref(), Some("n-1"));
        assert!(data.issue_refresh_token);
        assert_eq!(
            data.metadata.get("redirect_uri").and_then(|v| v.as_str()),
            Some("https://app.example.com/cb")
        );
    }

    #[tokio::test]
    async fn test_refresh_intent_comes_from_the_code() {
        // The client registers refresh_token, but this code was minted
        // without refresh intent; the exchange must honor the code
        let mut code = stored_code("code-1", "spa");
        code.issue_refresh_token = false;
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![code]));
        let client = test_client("spa");

        let data = grant
            .validate(
                &exchange_request("code-1"),
                &client,
                GrantData::for_client("spa"),
            )
            .await
            .unwrap();
        assert!(!data.issue_refresh_token);
    }

    #[tokio::test]
    async fn test_code_cannot_be_used_twice() {
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![stored_code(
            "code-1", "spa",
        )]));
        let client = test_client("spa");
        let request = exchange_request("code-1");

        assert!(
            grant
                .validate(&request, &client, GrantData::for_client("spa"))
                .await
                .is_ok()
        );
        let err = grant
            .validate(&request, &client, GrantData::for_client("spa"))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_cross_client_code_rejected() {
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![stored_code(
            "code-1", "spa",
        )]));
        let attacker = test_client("other");

        let err = grant
            .validate(
                &exchange_request("code-1"),
                &attacker,
                GrantData::for_client("other"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_redirect_uri_must_match() {
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![stored_code(
            "code-1", "spa",
        )]));
        let client = test_client("spa");

        let mut request = exchange_request("code-1");
        request.redirect_uri = Some("https://evil.example.com/cb".to_string());

        let err = grant
            .validate(&request, &client, GrantData::for_client("spa"))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let mut code = stored_code("code-1", "spa");
        code.expires_at = OffsetDateTime::now_utc() - Duration::minutes(1);
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![code]));
        let client = test_client("spa");

        let err = grant
            .validate(
                &exchange_request("code-1"),
                &client,
                GrantData::for_client("spa"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_pkce_verification() {
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier, PkceChallengeMethod::S256);

        let mut code = stored_code("code-1", "spa");
        code.code_challenge = Some(challenge.as_str().to_string());
        code.code_challenge_method = Some("S256".to_string());
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![code]));
        let client = test_client("spa");

        // Missing verifier
        let err = grant
            .validate(
                &exchange_request("code-1"),
                &client,
                GrantData::for_client("spa"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");

        // The code is burnt; store it again for the success case
        let verifier2 = PkceVerifier::generate();
        let challenge2 = PkceChallenge::from_verifier(&verifier2, PkceChallengeMethod::S256);
        let mut code = stored_code("code-2", "spa");
        code.code_challenge = Some(challenge2.as_str().to_string());
        code.code_challenge_method = Some("S256".to_string());
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![code]));

        let mut request = exchange_request("code-2");
        request.code_verifier = Some(verifier2.as_str().to_string());
        assert!(
            grant
                .validate(&request, &client, GrantData::for_client("spa"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_wrong_verifier_rejected() {
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier, PkceChallengeMethod::S256);

        let mut code = stored_code("code-1", "spa");
        code.code_challenge = Some(challenge.as_str().to_string());
        code.code_challenge_method = Some("S256".to_string());
        let grant = AuthorizationCodeGrant::new(MockCodeStorage::with(vec![code]));
        let client = test_client("spa");

        let mut request = exchange_request("code-1");
        request.code_verifier = Some(PkceVerifier::generate().as_str().to_string());

        let err = grant
            .validate(&request, &client, GrantData::for_client("spa"))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }
}
