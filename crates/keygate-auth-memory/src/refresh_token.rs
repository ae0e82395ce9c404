//! In-memory refresh tokens.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use keygate_auth::AuthResult;
use keygate_auth::error::AuthError;
use keygate_auth::storage::RefreshTokenStorage;
use keygate_auth::types::RefreshToken;

/// Refresh-token storage keyed by token hash.
#[derive(Default)]
pub struct MemoryRefreshTokenStorage {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl MemoryRefreshTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStorage for MemoryRefreshTokenStorage {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        Ok(tokens.get(token_hash).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<RefreshToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        Ok(tokens.values().find(|t| t.id == id).cloned())
    }

    async fn rotate(&self, old_hash: &str, replacement: &RefreshToken) -> AuthResult<bool> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        // Mark-replaced and insert-replacement happen under one write
        // lock; a concurrent rotation of the same hash sees replaced_by
        // set and backs off
        let Some(old) = tokens.get_mut(old_hash) else {
            return Ok(false);
        };
        if old.replaced_by.is_some() || old.revoked_at.is_some() {
            tracing::warn!(
                client_id = %old.client_id,
                "refresh token rotation lost to a prior redemption"
            );
            return Ok(false);
        }
        old.replaced_by = Some(replacement.id);
        tokens.insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        if let Some(token) = tokens.get_mut(token_hash) {
            if token.revoked_at.is_none() {
                token.revoked_at = Some(OffsetDateTime::now_utc());
            }
        }
        Ok(())
    }

    async fn revoke_by_id(&self, id: Uuid) -> AuthResult<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        let now = OffsetDateTime::now_utc();
        for token in tokens.values_mut() {
            if token.id == id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
            }
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| AuthError::storage("refresh token store lock poisoned"))?;
        let now = OffsetDateTime::now_utc();
        let before = tokens.len();
        tokens.retain(|_, token| {
            token.revoked_at.is_none() && token.expires_at.is_none_or(|exp| exp > now)
        });
        let removed = (before - tokens.len()) as u64;
        if removed > 0 {
            tracing::debug!(removed, "dropped expired refresh tokens");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_auth::types::hash_token;
    use time::Duration;

    fn token(value: &str) -> RefreshToken {
        let now = OffsetDateTime::now_utc();
        RefreshToken {
            id: Uuid::new_v4(),
            token_hash: hash_token(value),
            client_id: "web".to_string(),
            user_id: Some("user-1".to_string()),
            scope: "openid".to_string(),
            created_at: now,
            expires_at: Some(now + Duration::days(30)),
            revoked_at: None,
            replaced_by: None,
        }
    }

    #[tokio::test]
    async fn test_rotation_is_at_most_once() {
        let store = MemoryRefreshTokenStorage::new();
        store.create(&token("old")).await.unwrap();

        let old_hash = hash_token("old");
        let first = token("new-1");
        let second = token("new-2");

        assert!(store.rotate(&old_hash, &first).await.unwrap());
        // The losing rotation stores nothing
        assert!(!store.rotate(&old_hash, &second).await.unwrap());
        assert!(store.find_by_hash(&first.token_hash).await.unwrap().is_some());
        assert!(store.find_by_hash(&second.token_hash).await.unwrap().is_none());

        let old = store.find_by_hash(&old_hash).await.unwrap().unwrap();
        assert_eq!(old.replaced_by, Some(first.id));
    }

    #[tokio::test]
    async fn test_rotate_rejects_revoked_and_unknown() {
        let store = MemoryRefreshTokenStorage::new();
        store.create(&token("revoked")).await.unwrap();
        store.revoke(&hash_token("revoked")).await.unwrap();

        assert!(!store.rotate(&hash_token("revoked"), &token("r1")).await.unwrap());
        assert!(!store.rotate(&hash_token("ghost"), &token("r2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_by_id() {
        let store = MemoryRefreshTokenStorage::new();
        let t = token("victim");
        store.create(&t).await.unwrap();

        store.revoke_by_id(t.id).await.unwrap();
        let stored = store.find_by_hash(&t.token_hash).await.unwrap().unwrap();
        assert!(stored.revoked_at.is_some());
    }
}
