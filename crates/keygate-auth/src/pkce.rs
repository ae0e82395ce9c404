//! PKCE (Proof Key for Code Exchange) implementation.
//!
//! Implements RFC 7636 with both registered methods: `plain` and `S256`.
//! The challenge method is recorded with the authorization code and the
//! same method drives verification at the token endpoint.
//!
//! # Example
//!
//! ```
//! use keygate_auth::pkce::{PkceVerifier, PkceChallenge, PkceChallengeMethod};
//!
//! // Client generates a verifier and derives the S256 challenge
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::from_verifier(&verifier, PkceChallengeMethod::S256);
//!
//! // Server stores the challenge string + method, later verifies the
//! // verifier presented at the token endpoint
//! let stored = PkceChallenge::new(
//!     challenge.as_str().to_string(),
//!     PkceChallengeMethod::S256,
//! ).unwrap();
//! assert!(stored.verify(&verifier).is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains invalid characters.
    #[error("Invalid verifier characters: must be unreserved ([A-Za-z0-9-._~])")]
    InvalidVerifierCharacters,

    /// Challenge length or charset is invalid.
    #[error("Invalid challenge format: must be 43-128 unreserved characters")]
    InvalidChallengeFormat,

    /// Unrecognized challenge method.
    #[error("Unsupported challenge method: {0}")]
    UnsupportedMethod(String),

    /// The verifier does not match the stored challenge.
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

impl PkceError {
    /// Create an `InvalidVerifierLength` error.
    #[must_use]
    pub fn invalid_verifier_length(len: usize) -> Self {
        Self::InvalidVerifierLength(len)
    }

    /// Create an `InvalidVerifierCharacters` error.
    #[must_use]
    pub fn invalid_verifier_characters() -> Self {
        Self::InvalidVerifierCharacters
    }

    /// Create an `InvalidChallengeFormat` error.
    #[must_use]
    pub fn invalid_challenge_format() -> Self {
        Self::InvalidChallengeFormat
    }

    /// Create an `UnsupportedMethod` error.
    #[must_use]
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod(method.into())
    }

    /// Create a `VerificationFailed` error.
    #[must_use]
    pub fn verification_failed() -> Self {
        Self::VerificationFailed
    }

    /// Get the OAuth 2.0 error code for this error.
    ///
    /// Everything here, a mismatch included, is a request-shape error
    /// at the token endpoint.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidVerifierLength(_)
            | Self::InvalidVerifierCharacters
            | Self::InvalidChallengeFormat
            | Self::UnsupportedMethod(_)
            | Self::VerificationFailed => "invalid_request",
        }
    }
}

// =============================================================================
// PKCE Challenge Method
// =============================================================================

/// PKCE challenge method (RFC 7636 Section 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkceChallengeMethod {
    /// The challenge is the verifier itself.
    Plain,
    /// The challenge is `BASE64URL(SHA256(ASCII(code_verifier)))`.
    S256,
}

impl PkceChallengeMethod {
    /// Parse a challenge method from its wire name.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything other than
    /// `plain` or `S256`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::unsupported_method(other)),
        }
    }

    /// Get the method's wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl std::fmt::Display for PkceChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for PkceChallengeMethod {
    /// RFC 7636 Section 4.3: the method defaults to `plain` when the
    /// authorization request omits `code_challenge_method`.
    fn default() -> Self {
        Self::Plain
    }
}

// =============================================================================
// PKCE Verifier
// =============================================================================

/// PKCE code verifier.
///
/// A high-entropy random string of 43-128 characters drawn from the
/// unreserved set `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`
/// (RFC 7636 Section 4.1).
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Create a verifier from a string received at the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is outside 43-128 or any character
    /// is outside the unreserved set.
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();
        if !(43..=128).contains(&len) {
            return Err(PkceError::invalid_verifier_length(len));
        }
        if !verifier.chars().all(is_unreserved) {
            return Err(PkceError::invalid_verifier_characters());
        }
        Ok(Self(verifier))
    }

    /// Generate a cryptographically random verifier.
    ///
    /// Encodes 32 random bytes as base64url (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        // `gen` is a reserved keyword in Rust 2024, so we use r#gen
        let bytes: [u8; 32] = rng.r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the verifier and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for PkceVerifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// PKCE Challenge
// =============================================================================

/// PKCE code challenge paired with the method that produced it.
///
/// The server stores both with the authorization code; verification at
/// the token endpoint uses the stored method, never one supplied by the
/// client at exchange time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    challenge: String,
    method: PkceChallengeMethod,
}

impl PkceChallenge {
    /// Derive a challenge from a verifier with the given method.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier, method: PkceChallengeMethod) -> Self {
        let challenge = match method {
            PkceChallengeMethod::Plain => verifier.0.clone(),
            PkceChallengeMethod::S256 => {
                let mut hasher = Sha256::new();
                hasher.update(verifier.0.as_bytes());
                URL_SAFE_NO_PAD.encode(hasher.finalize())
            }
        };
        Self { challenge, method }
    }

    /// Create a challenge from the raw string received in an
    /// authorization request.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::InvalidChallengeFormat` if the string is not
    /// 43-128 unreserved characters.
    pub fn new(challenge: String, method: PkceChallengeMethod) -> Result<Self, PkceError> {
        let len = challenge.len();
        if !(43..=128).contains(&len) || !challenge.chars().all(is_unreserved) {
            return Err(PkceError::invalid_challenge_format());
        }
        Ok(Self { challenge, method })
    }

    /// Verify that a verifier matches this challenge under its method.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::VerificationFailed` on mismatch.
    pub fn verify(&self, verifier: &PkceVerifier) -> Result<(), PkceError> {
        let expected = Self::from_verifier(verifier, self.method);
        if self.challenge == expected.challenge {
            Ok(())
        } else {
            Err(PkceError::verification_failed())
        }
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.challenge
    }

    /// Get the method that produced this challenge.
    #[must_use]
    pub fn method(&self) -> PkceChallengeMethod {
        self.method
    }

    /// Consume the challenge and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.challenge
    }
}

impl AsRef<str> for PkceChallenge {
    fn as_ref(&self) -> &str {
        &self.challenge
    }
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~'
}

// =============================================================================
// Tests
// =============================================================================
