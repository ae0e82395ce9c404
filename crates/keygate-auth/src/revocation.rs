//! Token revocation per RFC 7009.
//!
//! The endpoint never reveals whether a token exists: unknown tokens,
//! ownership mismatches, and successful revocations all produce the
//! same HTTP 200 with an empty body. Only storage failures surface.

use std::sync::Arc;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::storage::{AccessTokenStorage, ClientStorage, RefreshTokenStorage};
use crate::types::{Client, hash_token};

/// `token_type_hint` values the endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    /// Look only at access tokens.
    AccessToken,
    /// Look only at refresh tokens.
    RefreshToken,
}

impl TokenTypeHint {
    /// Parses a wire value. Unknown hints are `None`: RFC 7009 says to
    /// extend the search rather than error.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// Looks up and invalidates tokens, enforcing ownership.
pub struct RevocationEngine {
    config: AuthConfig,
    client_storage: Arc<dyn ClientStorage>,
    access_tokens: Arc<dyn AccessTokenStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
}

impl RevocationEngine {
    /// Creates the engine over the token stores.
    pub fn new(
        config: AuthConfig,
        client_storage: Arc<dyn ClientStorage>,
        access_tokens: Arc<dyn AccessTokenStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
    ) -> Self {
        Self {
            config,
            client_storage,
            access_tokens,
            refresh_tokens,
        }
    }

    /// Revokes a token.
    ///
    /// `client` is the authenticated caller, when client authentication
    /// succeeded. `Ok(())` means HTTP 200 regardless of whether anything
    /// was actually revoked.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures.
    pub async fn revoke(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        client: Option<&Client>,
    ) -> AuthResult<()> {
        let token_hash = hash_token(token);

        match hint {
            Some(TokenTypeHint::AccessToken) => {
                self.revoke_access_token(&token_hash, client).await?;
            }
            Some(TokenTypeHint::RefreshToken) => {
                self.revoke_refresh_token(&token_hash, client).await?;
            }
            None => {
                if !self.revoke_access_token(&token_hash, client).await? {
                    self.revoke_refresh_token(&token_hash, client).await?;
                }
            }
        }
        Ok(())
    }

    /// Whether the caller may revoke a token owned by `owner_id`.
    ///
    /// An authenticated client may only touch its own tokens. An
    /// unauthenticated call is honored only for tokens owned by a
    /// public client, whose possession cannot be proven anyway.
    async fn ownership_allows(&self, owner_id: &str, client: Option<&Client>) -> AuthResult<bool> {
        match client {
            Some(client) => Ok(client.client_id == owner_id),
            None => {
                let owner = self.client_storage.find_by_id(owner_id).await?;
                Ok(owner.is_some_and(|c| !c.confidential))
            }
        }
    }

    async fn revoke_access_token(
        &self,
        token_hash: &str,
        client: Option<&Client>,
    ) -> AuthResult<bool> {
        let Some(token) = self.access_tokens.find_by_hash(token_hash).await? else {
            return Ok(false);
        };
        if !self.ownership_allows(&token.client_id, client).await? {
            tracing::debug!(
                owner = %token.client_id,
                "revocation ownership check failed, reporting success"
            );
            return Ok(true);
        }

        self.access_tokens.revoke(token_hash).await?;
        if self.config.cascade_revocation {
            if let Some(refresh_id) = token.refresh_token_id {
                self.refresh_tokens.revoke_by_id(refresh_id).await?;
            }
        }
        tracing::info!(client_id = %token.client_id, "access token revoked");
        Ok(true)
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        client: Option<&Client>,
    ) -> AuthResult<bool> {
        let Some(token) = self.refresh_tokens.find_by_hash(token_hash).await? else {
            return Ok(false);
        };
        if !self.ownership_allows(&token.client_id, client).await? {
            tracing::debug!(
                owner = %token.client_id,
                "revocation ownership check failed, reporting success"
            );
            return Ok(true);
        }

        self.refresh_tokens.revoke(token_hash).await?;
        if self.config.cascade_revocation {
            let revoked = self.access_tokens.revoke_by_refresh_token(token.id).await?;
            tracing::debug!(count = revoked, "cascade-revoked linked access tokens");
        }
        tracing::info!(client_id = %token.client_id, "refresh token revoked");
        Ok(true)
    }
}
