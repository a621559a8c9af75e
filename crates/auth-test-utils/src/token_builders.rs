//! Builder patterns for test data construction
//!
//! Provides fluent APIs for creating Keycloak-shaped token claims and
//! introspection responses.

use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;
use serde_json::{json, Map, Value};

use crate::crypto_fixtures::TestRsaKey;
use crate::test_ids::{TEST_CLIENT_ID, TEST_SUBJECT_ALICE, TEST_USERNAME_ALICE};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .issued_by("http://localhost:8081/realms/events")
///     .with_scope("events-api-access events:read")
///     .with_realm_roles(&["organizer"])
///     .sign(&TestRsaKey::primary());
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    iss: Option<String>,
    aud: Option<String>,
    scope: String,
    preferred_username: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
    iat: i64,
    nbf: Option<i64>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some(TEST_SUBJECT_ALICE.to_string()),
            iss: None,
            aud: None,
            scope: String::new(),
            preferred_username: Some(TEST_USERNAME_ALICE.to_string()),
            email: None,
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: now.timestamp(),
            nbf: None,
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Remove the `sub` claim
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Set the issuer
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    /// Set the audience
    pub fn for_audience(mut self, audience: &str) -> Self {
        self.aud = Some(audience.to_string());
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// Set `preferred_username`
    pub fn with_username(mut self, username: &str) -> Self {
        self.preferred_username = Some(username.to_string());
        self
    }

    /// Remove `preferred_username`
    pub fn without_username(mut self) -> Self {
        self.preferred_username = None;
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Set Keycloak realm roles (`realm_access.roles`)
    pub fn with_realm_roles(self, roles: &[&str]) -> Self {
        self.with_claim("realm_access", json!({ "roles": roles }))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Remove the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("iat".to_string(), json!(self.iat));
        claims.insert("scope".to_string(), json!(self.scope));
        claims.insert("azp".to_string(), json!(TEST_CLIENT_ID));

        let optional = [
            ("sub", self.sub.map(Value::from)),
            ("iss", self.iss.map(Value::from)),
            ("aud", self.aud.map(Value::from)),
            ("preferred_username", self.preferred_username.map(Value::from)),
            ("email", self.email.map(Value::from)),
            ("exp", self.exp.map(Value::from)),
            ("nbf", self.nbf.map(Value::from)),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                claims.insert(name.to_string(), value);
            }
        }

        Value::Object(claims)
    }

    /// Build and sign with RS256
    pub fn sign(self, key: &TestRsaKey) -> String {
        key.sign(&self.build())
    }

    /// Build and sign with the given algorithm
    pub fn sign_with(self, key: &TestRsaKey, alg: Algorithm) -> String {
        key.sign_with(&self.build(), alg)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An RFC 7662 response for an active token.
pub fn active_introspection(sub: &str, username: &str, scope: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "active": true,
        "sub": sub,
        "username": username,
        "scope": scope,
        "client_id": TEST_CLIENT_ID,
        "token_type": "Bearer",
        "exp": now + 300,
        "iat": now,
    })
}

/// An RFC 7662 response for an inactive token.
pub fn inactive_introspection() -> Value {
    json!({ "active": false })
}
