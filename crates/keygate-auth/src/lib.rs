//! # keygate-auth
//!
//! OAuth 2.0 / OpenID Connect authorization-server engine.
//!
//! This crate provides:
//! - Grant-type dispatch and token issuance (RFC 6749, RFC 7523)
//! - Client authentication resolution with fail-closed method exclusion
//! - Authorization-request validation and response-type dispatch
//! - Token lifecycle invariants: single-use codes, refresh rotation,
//!   PKCE verification (RFC 7636), scope policy enforcement
//! - Token revocation (RFC 7009) and introspection (RFC 7662)
//!
//! ## Overview
//!
//! The engine is transport- and storage-agnostic: persistence sits
//! behind the async traits in [`storage`], JWT signing behind
//! [`signer::TokenSigner`], and the [`http`] module is a thin axum skin
//! over the orchestrators in [`endpoint`]. Grant types, response types,
//! and parameter checkers are name-keyed strategy registries, so hosts
//! can extend any of them without forking the protocol core.
//!
//! ## Modules
//!
//! - [`config`] - Server-wide configuration
//! - [`error`] - The single error taxonomy every stage reports through
//! - [`types`] - Client, code, and token domain types
//! - [`storage`] - Persistence traits
//! - [`scope`] - Scope grammar and policy engine
//! - [`pkce`] - PKCE challenges and verifiers
//! - [`client_auth`] - Client authentication resolution
//! - [`grant`] - Grant-type handlers and registry
//! - [`authorize`] - Authorization-request validation and response types
//! - [`endpoint`] - Token and authorization orchestrators
//! - [`revocation`] - RFC 7009 revocation engine
//! - [`introspection`] - RFC 7662 introspection engine
//! - [`http`] - Axum HTTP handlers

pub mod authorize;
pub mod client_auth;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod grant;
pub mod http;
pub mod introspection;
pub mod pkce;
pub mod revocation;
pub mod scope;
pub mod signer;
pub mod storage;
pub mod types;

pub use config::{AuthConfig, EmptyScopePolicy};
pub use error::{AuthError, ErrorCategory};

/// Type alias for authorization-engine results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use keygate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authorize::{
        AuthenticatedUser, AuthorizeParams, CheckContext, ParameterChecker, ResponseMode,
        ResponseTypeHandler, ResponseTypeRegistry, default_checkers,
    };
    pub use crate::client_auth::{
        AuthenticatedClient, ClientAuthenticator, ClientCredentials, parse_basic_auth,
    };
    pub use crate::config::{AuthConfig, EmptyScopePolicy};
    pub use crate::endpoint::{
        AuthorizeEndpoint, AuthorizeOutcome, TokenEndpoint, TokenEndpointStage, TokenResponse,
    };
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::grant::{GrantData, GrantHandler, GrantRegistry, TokenRequest};
    pub use crate::http::{
        AuthState, authorize_handler, introspect_handler, revoke_handler, router, token_handler,
    };
    pub use crate::introspection::{IntrospectionEngine, IntrospectionResponse};
    pub use crate::pkce::{PkceChallenge, PkceChallengeMethod, PkceVerifier};
    pub use crate::revocation::{RevocationEngine, TokenTypeHint};
    pub use crate::scope::ScopePolicy;
    pub use crate::signer::TokenSigner;
    pub use crate::storage::{
        AccessTokenStorage, AuthCodeStorage, ClientStorage, JtiStorage, RefreshTokenStorage,
        UserStorage,
    };
    pub use crate::types::{
        AccessToken, AuthorizationCode, Client, ClientAuthMethod, RefreshToken, TokenType,
    };
}
