//! Scope parsing and policy.
//!
//! A scope string is a space-delimited list of scope tokens
//! (RFC 6749 Section 3.3). [`ScopePolicy`] resolves a raw request scope
//! against the server's available set and a client's restriction:
//! grammar first, then the empty-request policy, then membership, with
//! rejections that name every offending token and the allowed set.

use std::collections::BTreeSet;

use crate::config::EmptyScopePolicy;
use crate::error::AuthError;

// =============================================================================
// Scope Grammar
// =============================================================================

/// Returns `true` if the string is a valid scope token.
///
/// RFC 6749 Section 3.3: `scope-token = 1*( %x21 / %x23-5B / %x5D-7E )`
/// (printable ASCII except space, double quote, and backslash).
#[must_use]
pub fn is_valid_scope_token(token: &str) -> bool {
    !token.is_empty()
        && token.bytes().all(|b| {
            b == 0x21 || (0x23..=0x5B).contains(&b) || (0x5D..=0x7E).contains(&b)
        })
}

/// Split a raw scope string into tokens, validating the grammar.
///
/// Runs of multiple spaces are treated as a single delimiter. Duplicate
/// tokens collapse to their first occurrence; request order is
/// preserved, so the granted scope echoes back in the order it was
/// asked for.
///
/// # Errors
///
/// Returns `invalid_scope` if any token violates the grammar.
pub fn parse_scope(raw: &str) -> Result<Vec<String>, AuthError> {
    let mut scopes = Vec::new();
    let mut seen = BTreeSet::new();
    for token in raw.split(' ').filter(|t| !t.is_empty()) {
        if !is_valid_scope_token(token) {
            return Err(AuthError::invalid_scope(format!(
                "Malformed scope token: {token:?}"
            )));
        }
        if seen.insert(token) {
            scopes.push(token.to_string());
        }
    }
    Ok(scopes)
}

/// Join a scope set back into the wire form.
#[must_use]
pub fn join_scope<'a, I>(scopes: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    scopes
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Scope Policy
// =============================================================================

/// Resolves requested scopes against server and client policy.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    available: BTreeSet<String>,
    empty_policy: EmptyScopePolicy,
}

impl ScopePolicy {
    /// Create a policy from the server's available scope list and
    /// empty-request policy.
    #[must_use]
    pub fn new<I, S>(available: I, empty_policy: EmptyScopePolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: available.into_iter().map(Into::into).collect(),
            empty_policy,
        }
    }

    /// The scope set a client may be granted: the server's available set
    /// intersected with the client's own restriction. A client with no
    /// restriction may request anything the server offers.
    #[must_use]
    pub fn allowed_for(&self, client_scopes: Option<&[String]>) -> BTreeSet<String> {
        match client_scopes {
            Some(restriction) => restriction
                .iter()
                .filter(|s| self.available.contains(*s))
                .cloned()
                .collect(),
            None => self.available.clone(),
        }
    }

    /// Resolve a raw request scope into the granted list, preserving the
    /// order the client asked for.
    ///
    /// 1. `None` or blank: apply the empty-request policy.
    /// 2. Validate the grammar of every token.
    /// 3. Every token must be in the allowed set for this client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` naming every offending token and listing
    /// the allowed set.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        client_scopes: Option<&[String]>,
    ) -> Result<Vec<String>, AuthError> {
        let allowed = self.allowed_for(client_scopes);

        let raw = match requested {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => {
                return match &self.empty_policy {
                    EmptyScopePolicy::Reject => Err(AuthError::invalid_scope(
                        "No scope requested and no default scope is configured",
                    )),
                    EmptyScopePolicy::UseDefault(defaults) => {
                        // Defaults still go through the membership check
                        self.check_membership(defaults.clone(), &allowed)
                    }
                };
            }
        };

        let requested = parse_scope(raw)?;
        self.check_membership(requested, &allowed)
    }

    fn check_membership(
        &self,
        requested: Vec<String>,
        allowed: &BTreeSet<String>,
    ) -> Result<Vec<String>, AuthError> {
        let rejected: Vec<&str> = requested
            .iter()
            .filter(|s| !allowed.contains(*s))
            .map(String::as_str)
            .collect();

        if rejected.is_empty() {
            Ok(requested)
        } else {
            Err(AuthError::invalid_scope(format!(
                "Scope(s) not allowed: {}. Allowed scopes: {}",
                rejected.join(", "),
                allowed
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    /// Check that a narrowed scope set is a subset of an originally
    /// granted set (refresh-token narrowing, RFC 6749 Section 6).
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` naming every token that exceeds the
    /// original grant.
    pub fn check_narrowing(
        requested: &[String],
        original: &[String],
    ) -> Result<(), AuthError> {
        let exceeded: Vec<&str> = requested
            .iter()
            .filter(|s| !original.contains(*s))
            .map(String::as_str)
            .collect();

        if exceeded.is_empty() {
            Ok(())
        } else {
            Err(AuthError::invalid_scope(format!(
                "Scope(s) exceed the original grant: {}",
                exceeded.join(", ")
            )))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(available: &[&str], empty: EmptyScopePolicy) -> ScopePolicy {
        ScopePolicy::new(available.iter().copied(), empty)
    }

    #[test]
    fn test_scope_token_grammar() {
        assert!(is_valid_scope_token("openid"));
        assert!(is_valid_scope_token("read:documents"));
        assert!(is_valid_scope_token("https://api.example.com/data"));
        assert!(!is_valid_scope_token(""));
        assert!(!is_valid_scope_token("has space"));
        assert!(!is_valid_scope_token("quo\"te"));
        assert!(!is_valid_scope_token("back\\slash"));
        assert!(!is_valid_scope_token("non-ascii-é"));
    }

    #[test]
    fn test_parse_scope_collapses_duplicates_and_spaces() {
        let scopes = parse_scope("openid  profile openid").unwrap();
        assert_eq!(scopes, vec!["openid".to_string(), "profile".to_string()]);
    }

    #[test]
    fn test_parse_scope_rejects_malformed_token() {
        let err = parse_scope("openid bad\\token").unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
    }

    #[test]
    fn test_resolve_within_allowed_set() {
        let policy = policy(&["a", "b", "c"], EmptyScopePolicy::Reject);
        let granted = policy.resolve(Some("a b"), None).unwrap();
        assert_eq!(granted, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_resolve_preserves_request_order() {
        let policy = policy(&["a", "b", "c"], EmptyScopePolicy::Reject);
        let granted = policy.resolve(Some("b a"), None).unwrap();
        assert_eq!(join_scope(&granted), "b a");
    }

    #[test]
    fn test_resolve_names_offending_scope() {
        let policy = policy(&["a", "b"], EmptyScopePolicy::Reject);
        let err = policy.resolve(Some("a b c"), None).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
        let message = err.to_string();
        assert!(message.contains("c"), "offender must be named: {message}");
        assert!(message.contains("Allowed scopes"), "{message}");
    }

    #[test]
    fn test_resolve_respects_client_restriction() {
        let policy = policy(&["a", "b", "c"], EmptyScopePolicy::Reject);
        let restriction = vec!["a".to_string()];

        assert!(policy.resolve(Some("a"), Some(&restriction)).is_ok());
        let err = policy.resolve(Some("a b"), Some(&restriction)).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
    }

    #[test]
    fn test_empty_scope_rejected() {
        let policy = policy(&["a"], EmptyScopePolicy::Reject);
        assert!(policy.resolve(None, None).is_err());
        assert!(policy.resolve(Some("   "), None).is_err());
    }

    #[test]
    fn test_empty_scope_uses_default() {
        let policy = policy(
            &["openid", "profile"],
            EmptyScopePolicy::UseDefault(vec!["openid".to_string()]),
        );
        let granted = policy.resolve(None, None).unwrap();
        assert_eq!(granted, vec!["openid".to_string()]);
    }

    #[test]
    fn test_default_scope_still_checked_against_client() {
        // Default set contains a scope this client may not have
        let policy = policy(
            &["openid", "admin"],
            EmptyScopePolicy::UseDefault(vec!["admin".to_string()]),
        );
        let restriction = vec!["openid".to_string()];
        assert!(policy.resolve(None, Some(&restriction)).is_err());
    }

    #[test]
    fn test_narrowing() {
        let original = vec!["a".to_string(), "b".to_string()];
        let narrower = vec!["a".to_string()];
        let wider = vec!["a".to_string(), "c".to_string()];

        assert!(ScopePolicy::check_narrowing(&narrower, &original).is_ok());
        let err = ScopePolicy::check_narrowing(&wider, &original).unwrap_err();
        assert!(err.to_string().contains("c"));
    }

    #[test]
    fn test_join_scope_keeps_order() {
        let scopes = vec!["b".to_string(), "a".to_string()];
        assert_eq!(join_scope(&scopes), "b a");
    }
}
