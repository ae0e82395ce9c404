//! Token introspection endpoint handler (RFC 7662).
//!
//! Unlike revocation, introspection strictly requires an authenticated
//! client; anonymous queries would turn the endpoint into a token
//! validity oracle.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::client_auth::{ClientCredentials, parse_basic_auth};
use crate::revocation::TokenTypeHint;

use super::AuthState;

/// Form parameters of an introspection request.
#[derive(Debug, Deserialize)]
pub struct IntrospectionForm {
    /// The token to introspect.
    pub token: String,

    /// Optional hint about the token type.
    #[serde(default)]
    pub token_type_hint: Option<String>,

    /// Client ID, for body authentication.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret, for `client_secret_post`.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Client assertion, for JWT authentication.
    #[serde(default)]
    pub client_assertion: Option<String>,

    /// Client assertion type.
    #[serde(default)]
    pub client_assertion_type: Option<String>,
}

/// OAuth 2.0 token introspection endpoint.
pub async fn introspect_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(form): Form<IntrospectionForm>,
) -> Response {
    let credentials = ClientCredentials {
        basic: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_basic_auth),
        client_id: form.client_id.clone(),
        client_secret: form.client_secret.clone(),
        client_assertion_type: form.client_assertion_type.clone(),
        client_assertion: form.client_assertion.clone(),
    };

    let caller = match state.authenticator.authenticate(&credentials).await {
        Ok(authenticated) => authenticated.client,
        Err(err) => return err.into_response(),
    };
    let hint = form.token_type_hint.as_deref().and_then(TokenTypeHint::parse);

    match state
        .introspection
        .introspect(&form.token, hint, &caller)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}
