//! Authorization endpoint handler.
//!
//! The engine does not own end-user sessions; the host resolves the
//! user (via its session middleware) and attaches an
//! [`AuthenticatedUser`] extension to the request. Interaction errors
//! (`login_required`, `consent_required`) surface as direct errors
//! unless `prompt=none` was requested, so a host wanting login and
//! consent UI wraps this handler and intercepts them.

use axum::{
    Extension,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::authorize::{AuthenticatedUser, AuthorizeParams};
use crate::endpoint::AuthorizeOutcome;

use super::AuthState;

fn found(location: &str) -> Response {
    // RFC 6749 examples use 302; axum's Redirect would send 303
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// OAuth 2.0 / OIDC authorization endpoint.
pub async fn authorize_handler(
    State(state): State<AuthState>,
    user: Option<Extension<AuthenticatedUser>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let user = user.map(|Extension(user)| user);

    match state
        .authorize_endpoint
        .handle(params, user.as_ref())
        .await
    {
        Ok(AuthorizeOutcome::Redirect(location))
        | Ok(AuthorizeOutcome::ErrorRedirect(location)) => found(&location),
        Err(err) => err.into_response(),
    }
}
