//! In-memory client registrations.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use keygate_auth::AuthResult;
use keygate_auth::error::AuthError;
use keygate_auth::storage::ClientStorage;
use keygate_auth::types::Client;

/// Client storage over a `RwLock<HashMap>` keyed by client_id.
#[derive(Default)]
pub struct MemoryClientStorage {
    clients: RwLock<HashMap<String, Client>>,
}

impl MemoryClientStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compares two digests without short-circuiting on the first
/// mismatching byte.
fn digests_equal(a: &[u8], b: &[u8]) -> bool {
    // Digests are fixed-length, so only the byte comparison needs care
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0 && a.len() == b.len()
}

#[async_trait]
impl ClientStorage for MemoryClientStorage {
    async fn create(&self, client: &Client) -> AuthResult<()> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| AuthError::storage("client store lock poisoned"))?;
        if clients.contains_key(&client.client_id) {
            return Err(AuthError::storage(format!(
                "Client already exists: {}",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn find_by_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        let clients = self
            .clients
            .read()
            .map_err(|_| AuthError::storage("client store lock poisoned"))?;
        Ok(clients.get(client_id).cloned())
    }

    async fn verify_secret(&self, client_id: &str, secret: &str) -> AuthResult<bool> {
        let clients = self
            .clients
            .read()
            .map_err(|_| AuthError::storage("client store lock poisoned"))?;
        let Some(stored) = clients.get(client_id).and_then(|c| c.client_secret.as_deref())
        else {
            return Ok(false);
        };
        let stored_digest = Sha256::digest(stored.as_bytes());
        let presented_digest = Sha256::digest(secret.as_bytes());
        Ok(digests_equal(&stored_digest, &presented_digest))
    }
}
