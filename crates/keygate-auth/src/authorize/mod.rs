//! Authorization-endpoint request model and validation.
//!
//! An [`AuthorizeParams`] value is built from the query string, run
//! through the ordered [`checkers`] pipeline, and then handed to the
//! resolved response type(s), which produce the redirect parameters.

pub mod checkers;
mod response_type;

pub use checkers::{CheckContext, ParameterChecker, default_checkers};
pub use response_type::{
    CodeResponseType, IdTokenResponseType, NoneResponseType, ResponseMode, ResponseTypeHandler,
    ResponseTypeRegistry, ResponseTypeRequest, TokenResponseType, build_redirect_uri,
};

use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::AuthError;

// =============================================================================
// Enumerated Parameters
// =============================================================================

/// OIDC `prompt` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// No interaction permitted at all.
    None,
    /// Force re-authentication.
    Login,
    /// Force the consent dialog.
    Consent,
    /// Force the account chooser.
    SelectAccount,
}

impl Prompt {
    /// Parses a single prompt token.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown values.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        match value {
            "none" => Ok(Self::None),
            "login" => Ok(Self::Login),
            "consent" => Ok(Self::Consent),
            "select_account" => Ok(Self::SelectAccount),
            other => Err(AuthError::invalid_request(format!(
                "Unknown prompt value: {other}"
            ))),
        }
    }
}

/// OIDC `display` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    /// Full-page view (the default).
    Page,
    /// Popup window.
    Popup,
    /// Touch-optimized view.
    Touch,
    /// Feature-phone view.
    Wap,
}

impl Display {
    /// Parses a display value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown values.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        match value {
            "page" => Ok(Self::Page),
            "popup" => Ok(Self::Popup),
            "touch" => Ok(Self::Touch),
            "wap" => Ok(Self::Wap),
            other => Err(AuthError::invalid_request(format!(
                "Unknown display value: {other}"
            ))),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters of an authorization request, as received.
///
/// The checker pipeline may normalize fields in place (for example
/// filling the redirect URI from a sole registration).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    /// Requested response type(s), space-separated.
    pub response_type: Option<String>,

    /// Requesting client.
    pub client_id: Option<String>,

    /// Redirect target.
    pub redirect_uri: Option<String>,

    /// Requested scope.
    pub scope: Option<String>,

    /// Opaque client state echoed back on the redirect.
    pub state: Option<String>,

    /// OpenID Connect nonce.
    pub nonce: Option<String>,

    /// Space-separated prompt values.
    pub prompt: Option<String>,

    /// Display hint.
    pub display: Option<String>,

    /// Explicit response mode.
    pub response_mode: Option<String>,

    /// PKCE code challenge.
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    pub code_challenge_method: Option<String>,

    /// Maximum acceptable authentication age in seconds.
    pub max_age: Option<i64>,
}

impl AuthorizeParams {
    /// Parsed prompt values.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` on unknown values or `none` combined
    /// with any other prompt.
    pub fn prompts(&self) -> Result<Vec<Prompt>, AuthError> {
        let Some(raw) = self.prompt.as_deref() else {
            return Ok(Vec::new());
        };
        let prompts: Vec<Prompt> = raw
            .split(' ')
            .filter(|p| !p.is_empty())
            .map(Prompt::parse)
            .collect::<Result<_, _>>()?;
        if prompts.contains(&Prompt::None) && prompts.len() > 1 {
            return Err(AuthError::invalid_request(
                "prompt=none cannot be combined with other prompts",
            ));
        }
        Ok(prompts)
    }

    /// Individual response-type tokens in request order.
    #[must_use]
    pub fn response_types(&self) -> Vec<&str> {
        self.response_type
            .as_deref()
            .map(|rt| rt.split(' ').filter(|t| !t.is_empty()).collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// End User
// =============================================================================

/// The authenticated end user behind an authorization request, as
/// resolved by the host's session layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Subject identifier.
    pub subject: String,

    /// When this user last authenticated.
    pub auth_time: OffsetDateTime,

    /// Scopes the user has previously consented to for this client.
    pub consented_scopes: Vec<String>,
}
