//! In-memory jti replay tracking.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use keygate_auth::AuthResult;
use keygate_auth::error::AuthError;
use keygate_auth::storage::JtiStorage;

/// Jti store keyed by `(client_id, jti)`.
#[derive(Default)]
pub struct MemoryJtiStorage {
    seen: RwLock<HashMap<(String, String), OffsetDateTime>>,
}

impl MemoryJtiStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JtiStorage for MemoryJtiStorage {
    async fn try_register(
        &self,
        client_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> AuthResult<bool> {
        let mut seen = self
            .seen
            .write()
            .map_err(|_| AuthError::storage("jti store lock poisoned"))?;
        let key = (client_id.to_string(), jti.to_string());
        if seen.contains_key(&key) {
            return Ok(false);
        }
        seen.insert(key, expires_at);
        Ok(true)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut seen = self
            .seen
            .write()
            .map_err(|_| AuthError::storage("jti store lock poisoned"))?;
        let now = OffsetDateTime::now_utc();
        let before = seen.len();
        seen.retain(|_, expires_at| *expires_at > now);
        Ok((before - seen.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn test_replay_detection_is_client_scoped() {
        let store = MemoryJtiStorage::new();
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);

        assert!(store.try_register("web", "jti-1", exp).await.unwrap());
        assert!(!store.try_register("web", "jti-1", exp).await.unwrap());
        // A different client may reuse the same jti value
        assert!(store.try_register("other", "jti-1", exp).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup() {
        let store = MemoryJtiStorage::new();
        let now = OffsetDateTime::now_utc();
        store.try_register("web", "old", now - Duration::minutes(1)).await.unwrap();
        store.try_register("web", "new", now + Duration::minutes(5)).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        // The expired jti may be registered again
        assert!(store.try_register("web", "old", now + Duration::minutes(5)).await.unwrap());
    }
}
