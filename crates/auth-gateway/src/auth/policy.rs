//! Scope and role authorization.
//!
//! A route declares an [`AuthorizationPolicy`] once; [`authorize`] evaluates
//! it against the claims of each request. The evaluation is a pure function
//! of the claims and the policy.

use crate::auth::claims::AuthClaims;
use crate::errors::AuthzError;
use crate::observability::metrics;

/// Scopes and roles a route requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    required_scopes: Vec<String>,
    required_roles: Vec<String>,
    require_all: bool,
}

impl AuthorizationPolicy {
    /// Every listed scope and every listed role must be held.
    pub fn all() -> Self {
        Self {
            required_scopes: Vec::new(),
            required_roles: Vec::new(),
            require_all: true,
        }
    }

    /// At least one listed scope or one listed role must be held.
    pub fn any() -> Self {
        Self {
            require_all: false,
            ..Self::all()
        }
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }

    pub fn required_roles(&self) -> &[String] {
        &self.required_roles
    }

    pub fn require_all(&self) -> bool {
        self.require_all
    }
}

/// Outcome of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(AuthzError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Convert into a `Result`, for use with `?`.
    ///
    /// # Errors
    ///
    /// Returns the deny reason when the decision is `Denied`.
    pub fn into_result(self) -> Result<(), AuthzError> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => Err(reason),
        }
    }
}

/// Evaluate `policy` against `claims`.
///
/// - Nothing required: allowed.
/// - ALL: every required scope and every required role is held.
/// - ANY: some required scope is held, or some required role is held.
///
/// Missing claims are always denied.
pub fn authorize(claims: Option<&AuthClaims>, policy: &AuthorizationPolicy) -> Decision {
    let decision = evaluate(claims, policy);

    match decision {
        Decision::Allowed => metrics::record_authorization_decision("allowed", "none"),
        Decision::Denied(reason) => {
            tracing::debug!(target: "auth.policy", reason = reason.kind(), "Authorization denied");
            metrics::record_authorization_decision("denied", reason.kind());
        }
    }

    decision
}

fn evaluate(claims: Option<&AuthClaims>, policy: &AuthorizationPolicy) -> Decision {
    let Some(claims) = claims else {
        tracing::error!(
            target: "auth.policy",
            "Authorization evaluated without claims; authentication must run first"
        );
        return Decision::Denied(AuthzError::NoClaimsPresent);
    };

    let scopes = &policy.required_scopes;
    let roles = &policy.required_roles;

    if scopes.is_empty() && roles.is_empty() {
        return Decision::Allowed;
    }

    if policy.require_all {
        if !claims.has_all_scopes(scopes) {
            return Decision::Denied(AuthzError::InsufficientScope);
        }
        if !claims.has_all_roles(roles) {
            return Decision::Denied(AuthzError::InsufficientRole);
        }
        return Decision::Allowed;
    }

    // An empty list must not satisfy ANY on its own
    let scope_match = !scopes.is_empty() && claims.has_any_scope(scopes);
    let role_match = !roles.is_empty() && claims.has_any_role(roles);
    if scope_match || role_match {
        Decision::Allowed
    } else if !scopes.is_empty() {
        Decision::Denied(AuthzError::InsufficientScope)
    } else {
        Decision::Denied(AuthzError::InsufficientRole)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn claims(scope: &str, roles: &[&str]) -> AuthClaims {
        AuthClaims::new("sub", "user", "", scope).with_roles(roles.iter().copied())
    }

    // -------------------------------------------------------------------------
    // Reference semantics
    // -------------------------------------------------------------------------

    #[test]
    fn test_no_requirements_allows() {
        let empty = claims("", &[]);
        assert!(authorize(Some(&empty), &AuthorizationPolicy::all()).is_allowed());
        assert!(authorize(Some(&empty), &AuthorizationPolicy::any()).is_allowed());
    }

    #[test]
    fn test_missing_claims_denied() {
        for policy in [
            AuthorizationPolicy::all(),
            AuthorizationPolicy::any().with_scopes(["a"]),
        ] {
            assert_eq!(
                authorize(None, &policy),
                Decision::Denied(AuthzError::NoClaimsPresent)
            );
        }
    }

    #[test]
    fn test_all_mode_requires_every_scope_and_role() {
        let policy = AuthorizationPolicy::all()
            .with_scopes(["read", "write"])
            .with_roles(["editor"]);

        assert!(authorize(Some(&claims("read write", &["editor"])), &policy).is_allowed());
        assert_eq!(
            authorize(Some(&claims("read", &["editor"])), &policy),
            Decision::Denied(AuthzError::InsufficientScope)
        );
        assert_eq!(
            authorize(Some(&claims("read write", &["viewer"])), &policy),
            Decision::Denied(AuthzError::InsufficientRole)
        );
        // Both fail: scopes are reported first
        assert_eq!(
            authorize(Some(&claims("", &[])), &policy),
            Decision::Denied(AuthzError::InsufficientScope)
        );
    }

    #[test]
    fn test_all_mode_with_only_roles() {
        let policy = AuthorizationPolicy::all().with_roles(["admin"]);
        assert!(authorize(Some(&claims("", &["admin"])), &policy).is_allowed());
        assert_eq!(
            authorize(Some(&claims("admin", &[])), &policy),
            Decision::Denied(AuthzError::InsufficientRole)
        );
    }

    #[test]
    fn test_any_mode_scope_or_role() {
        let policy = AuthorizationPolicy::any()
            .with_scopes(["read", "write"])
            .with_roles(["admin"]);

        assert!(authorize(Some(&claims("write", &[])), &policy).is_allowed());
        assert!(authorize(Some(&claims("", &["admin"])), &policy).is_allowed());
        assert_eq!(
            authorize(Some(&claims("other", &["viewer"])), &policy),
            Decision::Denied(AuthzError::InsufficientScope)
        );
    }

    #[test]
    fn test_any_mode_roles_only_does_not_pass_on_empty_scopes() {
        let policy = AuthorizationPolicy::any().with_roles(["admin"]);
        assert_eq!(
            authorize(Some(&claims("read", &["viewer"])), &policy),
            Decision::Denied(AuthzError::InsufficientRole)
        );
    }

    #[test]
    fn test_any_mode_scopes_only_does_not_pass_on_empty_roles() {
        let policy = AuthorizationPolicy::any().with_scopes(["read"]);
        assert_eq!(
            authorize(Some(&claims("", &["admin"])), &policy),
            Decision::Denied(AuthzError::InsufficientScope)
        );
    }

    // -------------------------------------------------------------------------
    // Exhaustive truth table
    // -------------------------------------------------------------------------

    /// Boolean reference the evaluator must agree with.
    fn reference(
        require_all: bool,
        scopes_required: bool,
        scopes_held: bool,
        roles_required: bool,
        roles_held: bool,
    ) -> bool {
        if !scopes_required && !roles_required {
            return true;
        }
        if require_all {
            (!scopes_required || scopes_held) && (!roles_required || roles_held)
        } else {
            (scopes_required && scopes_held) || (roles_required && roles_held)
        }
    }

    #[test]
    fn test_truth_table_matches_reference() {
        for bits in 0u8..32 {
            let require_all = bits & 1 != 0;
            let scopes_required = bits & 2 != 0;
            let scopes_held = bits & 4 != 0;
            let roles_required = bits & 8 != 0;
            let roles_held = bits & 16 != 0;

            let base = if require_all {
                AuthorizationPolicy::all()
            } else {
                AuthorizationPolicy::any()
            };
            let policy = base
                .with_scopes(if scopes_required { vec!["s"] } else { vec![] })
                .with_roles(if roles_required { vec!["r"] } else { vec![] });
            let subject = claims(
                if scopes_held { "s" } else { "x" },
                if roles_held { &["r"] } else { &["y"] },
            );

            assert_eq!(
                authorize(Some(&subject), &policy).is_allowed(),
                reference(
                    require_all,
                    scopes_required,
                    scopes_held,
                    roles_required,
                    roles_held
                ),
                "bits={bits:05b}"
            );
        }
    }

    #[test]
    fn test_decision_into_result() {
        assert_eq!(Decision::Allowed.into_result(), Ok(()));
        assert_eq!(
            Decision::Denied(AuthzError::InsufficientRole).into_result(),
            Err(AuthzError::InsufficientRole)
        );
    }
}
