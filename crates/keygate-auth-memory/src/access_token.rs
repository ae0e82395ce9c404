//! In-memory access tokens.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use keygate_auth::AuthResult;
use keygate_auth::error::AuthError;
use keygate_auth::storage::AccessTokenStorage;
use keygate_auth::types::AccessToken;

/// Access-token storage keyed by token hash.
#[derive(Default)]
pub struct MemoryAccessTokenStorage {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl MemoryAccessTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessTokenStorage for MemoryAccessTokenStorage {
    async fn create(&self, token: &AccessToken) -> AuthResult<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("access token store lock poisoned"))?;
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<AccessToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| AuthError::storage("access token store lock poisoned"))?;
        Ok(tokens.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("access token store lock poisoned"))?;
        if let Some(token) = tokens.get_mut(token_hash) {
            if token.revoked_at.is_none() {
                token.revoked_at = Some(OffsetDateTime::now_utc());
            }
        }
        Ok(())
    }

    async fn revoke_by_refresh_token(&self, refresh_token_id: Uuid) -> AuthResult<u64> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("access token store lock poisoned"))?;
        let now = OffsetDateTime::now_utc();
        let mut revoked = 0;
        for token in tokens.values_mut() {
            if token.refresh_token_id == Some(refresh_token_id) && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("access token store lock poisoned"))?;
        let now = OffsetDateTime::now_utc();
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at > now && token.revoked_at.is_none());
        let removed = (before - tokens.len()) as u64;
        if removed > 0 {
            tracing::debug!(removed, "dropped expired access tokens");
        }
        Ok(removed)
    }
}
