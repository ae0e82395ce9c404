//! Token endpoint handler.
//!
//! POST with `application/x-www-form-urlencoded`; clients authenticate
//! with HTTP Basic, body credentials, or a client assertion. Successful
//! responses carry `Cache-Control: no-store` and `Pragma: no-cache`
//! per RFC 6749 Section 5.1.

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};

use crate::client_auth::{ClientCredentials, parse_basic_auth};
use crate::grant::TokenRequest;

use super::AuthState;

/// Builds the engine's credential view from the header and body.
pub(crate) fn extract_credentials(headers: &HeaderMap, request: &TokenRequest) -> ClientCredentials {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth);

    ClientCredentials {
        basic,
        client_id: request.client_id.clone(),
        client_secret: request.client_secret.clone(),
        client_assertion_type: request.client_assertion_type.clone(),
        client_assertion: request.client_assertion.clone(),
    }
}

/// OAuth 2.0 token endpoint.
pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let credentials = extract_credentials(&headers, &request);

    match state.token_endpoint.handle(&credentials, &request).await {
        Ok(response) => (
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
