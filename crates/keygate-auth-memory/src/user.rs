//! In-memory resource-owner credentials.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use keygate_auth::AuthResult;
use keygate_auth::error::AuthError;
use keygate_auth::storage::UserStorage;

struct UserRecord {
    subject: String,
    password_digest: [u8; 32],
}

/// User storage for the password grant, keyed by username.
#[derive(Default)]
pub struct MemoryUserStorage {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user. Replaces any previous credentials for the
    /// same username.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        subject: impl Into<String>,
    ) -> AuthResult<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::storage("user store lock poisoned"))?;
        users.insert(
            username.into(),
            UserRecord {
                subject: subject.into(),
                password_digest: Sha256::digest(password.as_bytes()).into(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<Option<String>> {
        let users = self
            .users
            .read()
            .map_err(|_| AuthError::storage("user store lock poisoned"))?;
        let Some(record) = users.get(username) else {
            return Ok(None);
        };
        let presented: [u8; 32] = Sha256::digest(password.as_bytes()).into();
        let mut diff = 0u8;
        for (a, b) in record.password_digest.iter().zip(presented.iter()) {
            diff |= a ^ b;
        }
        if diff == 0 {
            Ok(Some(record.subject.clone()))
        } else {
            Ok(None)
        }
    }
}
