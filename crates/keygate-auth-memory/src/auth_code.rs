//! In-memory authorization codes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use keygate_auth::AuthResult;
use keygate_auth::error::AuthError;
use keygate_auth::storage::AuthCodeStorage;
use keygate_auth::types::AuthorizationCode;

/// Authorization-code storage keyed by code hash.
#[derive(Default)]
pub struct MemoryAuthCodeStorage {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
}

impl MemoryAuthCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthCodeStorage for MemoryAuthCodeStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        let mut codes = self
            .codes
            .write()
            .map_err(|_| AuthError::storage("code store lock poisoned"))?;
        codes.insert(code.code_hash.clone(), code.clone());
        Ok(())
    }

    async fn consume(&self, code_hash: &str) -> AuthResult<Option<AuthorizationCode>> {
        let mut codes = self
            .codes
            .write()
            .map_err(|_| AuthError::storage("code store lock poisoned"))?;
        // Mark-used and read happen under one write lock, so a second
        // consumer always observes used == true
        match codes.get_mut(code_hash) {
            Some(code) if !code.used => {
                code.used = true;
                Ok(Some(code.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut codes = self
            .codes
            .write()
            .map_err(|_| AuthError::storage("code store lock poisoned"))?;
        let now = OffsetDateTime::now_utc();
        let before = codes.len();
        codes.retain(|_, code| code.expires_at > now && !code.used);
        let removed = (before - codes.len()) as u64;
        if removed > 0 {
            tracing::debug!(removed, "dropped expired authorization codes");
        }
        Ok(removed)
    }
}
