//! Authorization-server error types.
//!
//! Every failure in the engine is expressed as a single [`AuthError`] value
//! carrying an OAuth 2.0 error code and an HTTP status. One top-level
//! handler maps the error to a wire response; no stage performs partial
//! recovery.

use std::fmt;

/// Errors that can occur while processing authorization, token,
/// revocation, or introspection requests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a required parameter, repeats a parameter,
    /// or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the malformation.
        message: String,
    },

    /// Client authentication failed (unknown client, bad credentials,
    /// ambiguous authentication method, unverifiable assertion).
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization grant (code, refresh token, assertion, or
    /// resource-owner credentials) is invalid, expired, used, or was
    /// issued to another client.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The authenticated client is not allowed to use this grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of the policy violation.
        message: String,
    },

    /// The grant type is not registered with the server.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type name.
        grant_type: String,
    },

    /// The response type is not registered or not allowed.
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType {
        /// The unsupported response type name.
        response_type: String,
    },

    /// The requested scope is malformed, unknown, or exceeds what the
    /// client may request.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of the scope violation.
        message: String,
    },

    /// The resource owner or the server denied the authorization request.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of the denial.
        message: String,
    },

    /// End-user authentication is required but not present, and the
    /// request forbids interaction.
    #[error("Login required")]
    LoginRequired,

    /// End-user interaction is required but the request forbids it.
    #[error("Interaction required")]
    InteractionRequired,

    /// End-user consent is required but the request forbids obtaining it.
    #[error("Consent required")]
    ConsentRequired,

    /// A storage collaborator failed. Fatal for the request.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// The server configuration is missing or inconsistent. Fatal, not
    /// client-retryable.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `UnsupportedResponseType` error.
    #[must_use]
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            response_type: response_type.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client-fixable error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server-side failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if this error should redirect back to the client
    /// rather than being rendered directly (authorization-endpoint family).
    #[must_use]
    pub fn is_interaction_error(&self) -> bool {
        matches!(
            self,
            Self::AccessDenied { .. }
                | Self::LoginRequired
                | Self::InteractionRequired
                | Self::ConsentRequired
        )
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::AccessDenied { .. } => "access_denied",
            Self::LoginRequired => "login_required",
            Self::InteractionRequired => "interaction_required",
            Self::ConsentRequired => "consent_required",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "internal_server_error"
            }
        }
    }

    /// Returns the HTTP status code for this error when rendered directly.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient { .. } => 401,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => 500,
            _ => 400,
        }
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::UnsupportedResponseType { .. } => ErrorCategory::Validation,
            Self::InvalidClient { .. } | Self::InvalidGrant { .. } => ErrorCategory::Authentication,
            Self::UnauthorizedClient { .. }
            | Self::InvalidScope { .. }
            | Self::AccessDenied { .. } => ErrorCategory::Policy,
            Self::LoginRequired | Self::InteractionRequired | Self::ConsentRequired => {
                ErrorCategory::Interaction
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of engine errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request-shape validation errors.
    Validation,
    /// Client or grant authentication errors.
    Authentication,
    /// Policy violations (grant, scope, consent).
    Policy,
    /// End-user interaction requirements.
    Interaction,
    /// Storage failures.
    Infrastructure,
    /// Internal or configuration failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Policy => write!(f, "policy"),
            Self::Interaction => write!(f, "interaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_client("client not found");
        assert_eq!(err.to_string(), "Invalid client: client not found");

        let err = AuthError::invalid_grant("authorization code expired");
        assert_eq!(
            err.to_string(),
            "Invalid grant: authorization code expired"
        );

        let err = AuthError::LoginRequired;
        assert_eq!(err.to_string(), "Login required");
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::invalid_grant("used code");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert!(!err.is_interaction_error());

        let err = AuthError::storage("database down");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());

        let err = AuthError::ConsentRequired;
        assert!(err.is_interaction_error());
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(
            AuthError::invalid_client("x").oauth_error_code(),
            "invalid_client"
        );
        assert_eq!(
            AuthError::unauthorized_client("x").oauth_error_code(),
            "unauthorized_client"
        );
        assert_eq!(
            AuthError::unsupported_grant_type("saml").oauth_error_code(),
            "unsupported_grant_type"
        );
        assert_eq!(
            AuthError::configuration("no key").oauth_error_code(),
            "internal_server_error"
        );
        assert_eq!(AuthError::LoginRequired.oauth_error_code(), "login_required");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(AuthError::invalid_request("x").http_status(), 400);
        assert_eq!(AuthError::invalid_client("x").http_status(), 401);
        assert_eq!(AuthError::invalid_grant("x").http_status(), 400);
        assert_eq!(AuthError::internal("x").http_status(), 500);
    }

    #[test]
    fn test_category() {
        assert_eq!(
            AuthError::invalid_request("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            AuthError::invalid_scope("x").category(),
            ErrorCategory::Policy
        );
        assert_eq!(AuthError::storage("x").category(), ErrorCategory::Infrastructure);
        assert_eq!(ErrorCategory::Policy.to_string(), "policy");
    }
}
