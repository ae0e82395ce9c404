//! Axum handlers for the OAuth 2.0 endpoints.
//!
//! The engine itself is transport-agnostic; this module is the thin
//! HTTP skin: form/query extraction, client-credential header parsing,
//! the single error-to-response mapping, and the RFC-mandated cache
//! headers on token responses.

pub mod authorize;
pub mod introspect;
pub mod revoke;
pub mod token;

pub use authorize::authorize_handler;
pub use introspect::introspect_handler;
pub use revoke::revoke_handler;
pub use token::token_handler;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::client_auth::ClientAuthenticator;
use crate::endpoint::{AuthorizeEndpoint, TokenEndpoint};
use crate::error::AuthError;
use crate::introspection::IntrospectionEngine;
use crate::revocation::RevocationEngine;

/// Shared state for all endpoint handlers.
#[derive(Clone)]
pub struct AuthState {
    /// The token endpoint orchestrator.
    pub token_endpoint: Arc<TokenEndpoint>,

    /// The authorization endpoint orchestrator.
    pub authorize_endpoint: Arc<AuthorizeEndpoint>,

    /// The revocation engine.
    pub revocation: Arc<RevocationEngine>,

    /// The introspection engine.
    pub introspection: Arc<IntrospectionEngine>,

    /// Client authentication, shared by revocation and introspection.
    pub authenticator: Arc<ClientAuthenticator>,
}

/// Builds a router exposing the four endpoints under the given state.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/authorize", get(authorize_handler))
        .route("/token", post(token_handler))
        .route("/revoke", post(revoke_handler))
        .route("/introspect", post(introspect_handler))
        .with_state(state)
}

/// RFC 6749 error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// OAuth 2.0 error code.
    pub error: String,

    /// Human-readable description.
    pub error_description: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "request failed");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "request rejected");
        }

        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.oauth_error_code().to_string(),
            error_description: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
