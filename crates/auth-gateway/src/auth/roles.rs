//! Role extraction from verified token claims.
//!
//! Where roles live is identity-provider specific. Keycloak puts realm roles
//! under `realm_access.roles`; other providers use a flat `roles` or
//! `groups` claim. The location is configured as a dotted path so the rest
//! of the gateway only ever sees the resulting set.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Default Keycloak location of realm roles.
pub const DEFAULT_ROLE_CLAIM_PATH: &str = "realm_access.roles";

/// Dotted path to the roles claim. An empty path disables extraction.
#[derive(Clone, PartialEq, Eq)]
pub struct RoleClaimPath(Vec<String>);

impl RoleClaimPath {
    /// Parse a dotted path such as `realm_access.roles`.
    ///
    /// Blank input disables role extraction. Empty segments are ignored.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    /// A path that never yields roles.
    pub fn disabled() -> Self {
        Self(Vec::new())
    }

    pub fn is_disabled(&self) -> bool {
        self.0.is_empty()
    }

    /// Collect roles at this path.
    ///
    /// The terminal value may be an array of strings or a space-delimited
    /// string. Any other shape, or a missing path, yields no roles.
    pub fn extract(&self, claims: &Map<String, Value>) -> BTreeSet<String> {
        let Some((first, rest)) = self.0.split_first() else {
            return BTreeSet::new();
        };

        let mut current = claims.get(first);
        for segment in rest {
            current = current.and_then(|v| v.get(segment));
        }

        match current {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
            Some(Value::String(s)) => s.split_whitespace().map(ToString::to_string).collect(),
            Some(_) => {
                tracing::debug!(target: "auth.roles", path = %self, "Role claim has unexpected shape");
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        }
    }
}

impl Default for RoleClaimPath {
    fn default() -> Self {
        Self::parse(DEFAULT_ROLE_CLAIM_PATH)
    }
}

impl fmt::Display for RoleClaimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl fmt::Debug for RoleClaimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleClaimPath({self})")
    }
}
