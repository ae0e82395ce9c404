//! Token revocation endpoint handler (RFC 7009).
//!
//! Always returns 200 with an empty body once the request itself is
//! well-formed: unknown tokens and ownership mismatches are
//! indistinguishable from success. Bad client credentials still fail
//! with 401, and a malformed request with 400.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::client_auth::{ClientCredentials, parse_basic_auth};
use crate::revocation::TokenTypeHint;
use crate::types::Client;

use super::AuthState;

/// Form parameters of a revocation request.
#[derive(Debug, Deserialize)]
pub struct RevocationForm {
    /// The token to revoke.
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

/// Resolves the caller: authenticated client, anonymous, or an error.
async fn resolve_caller(
    state: &AuthState,
    headers: &HeaderMap,
    form: &RevocationForm,
) -> Result<Option<Client>, Response> {
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

    match state.authenticator.resolve(&credentials).await {
        Ok(resolved) => Ok(resolved.map(|authenticated| authenticated.client)),
        Err(err) => Err(err.into_response()),
    }
}

/// OAuth 2.0 token revocation endpoint.
pub async fn revoke_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(form): Form<RevocationForm>,
) -> Response {
    let caller = match resolve_caller(&state, &headers, &form).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let hint = form.token_type_hint.as_deref().and_then(TokenTypeHint::parse);

    match state
        .revocation
        .revoke(&form.token, hint, caller.as_ref())
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}
