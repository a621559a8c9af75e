//! Validated caller identity.
//!
//! `AuthClaims` is produced by a successful token validation and consumed by
//! the authorization evaluator. It is never cached or persisted. The subject
//! and email are redacted in Debug output to keep them out of logs.

use std::collections::BTreeSet;
use std::fmt;

/// Identity and grants of an authenticated caller.
///
/// Immutable once built. Scope and role checks are case-sensitive exact
/// matches.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthClaims {
    subject: String,
    username: String,
    email: String,
    scopes: BTreeSet<String>,
    roles: BTreeSet<String>,
}

/// Custom Debug implementation that redacts `subject` and `email`.
impl fmt::Debug for AuthClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthClaims")
            .field("subject", &"[REDACTED]")
            .field("username", &self.username)
            .field("email", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("roles", &self.roles)
            .finish()
    }
}

impl AuthClaims {
    /// Build claims from a space-delimited scope string.
    ///
    /// Empty fragments are dropped and duplicates collapse. Roles start
    /// empty; see [`AuthClaims::with_roles`].
    pub fn new(
        subject: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        scope: &str,
    ) -> Self {
        Self {
            subject: subject.into(),
            username: username.into(),
            email: email.into(),
            scopes: scope.split_whitespace().map(ToString::to_string).collect(),
            roles: BTreeSet::new(),
        }
    }

    /// Attach roles. Empty role names are dropped.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles
            .into_iter()
            .map(Into::into)
            .filter(|r: &String| !r.is_empty())
            .collect();
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Check if the token has a specific scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// True when at least one of `scopes` is held, or `scopes` is empty.
    pub fn has_any_scope<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
        scopes.is_empty() || scopes.iter().any(|s| self.has_scope(s.as_ref()))
    }

    /// True when every one of `scopes` is held.
    pub fn has_all_scopes<S: AsRef<str>>(&self, scopes: &[S]) -> bool {
        scopes.iter().all(|s| self.has_scope(s.as_ref()))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True when at least one of `roles` is held, or `roles` is empty.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.is_empty() || roles.iter().any(|r| self.has_role(r.as_ref()))
    }

    /// True when every one of `roles` is held.
    pub fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().all(|r| self.has_role(r.as_ref()))
    }
}
