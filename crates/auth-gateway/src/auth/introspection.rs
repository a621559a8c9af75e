//! Remote token validation via OAuth 2.0 Token Introspection (RFC 7662).
//!
//! Every call goes to the identity provider, so revocation takes effect
//! immediately and opaque tokens are supported. Nothing is cached.
//!
//! # Security
//!
//! - The client secret is held as `SecretString` and redacted in Debug output
//! - The raw token and the provider's response body are never logged

use crate::auth::claims::AuthClaims;
use crate::errors::AuthError;
use crate::http_client::{guarded, FetchError, HttpFetch, DEFAULT_HTTP_TIMEOUT_SECS};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Token introspection response per RFC 7662 Section 2.2.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active (REQUIRED).
    pub active: bool,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub sub: Option<String>,

    /// Audience, either a string or an array of strings.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,

    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub jti: Option<String>,

    /// Keycloak includes the user's email for user tokens.
    #[serde(default)]
    pub email: Option<String>,
}

/// Validates tokens by asking the identity provider.
pub struct IntrospectionValidator {
    /// Introspection endpoint URL.
    endpoint: String,

    client_id: String,

    client_secret: SecretString,

    fetcher: Arc<dyn HttpFetch>,

    timeout: Duration,
}

// Manual Debug impl to keep the client secret out of logs
impl fmt::Debug for IntrospectionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrospectionValidator")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl IntrospectionValidator {
    /// Create an introspection validator.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - The provider's token introspection URL
    /// * `client_id` / `client_secret` - Credentials of this resource server
    /// * `fetcher` - HTTP capability used for the call
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        fetcher: Arc<dyn HttpFetch>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret,
            fetcher,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Introspect `token` and return the caller's claims.
    ///
    /// # Errors
    ///
    /// - `RemoteValidationFailure` - transport error, timeout, cancellation, or non-200 status
    /// - `ClaimsDecodeFailure` - response is not a valid introspection document or has no subject
    /// - `TokenInactive` - the provider reports `active: false`
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthClaims, AuthError> {
        let form = [
            ("token", token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let response = guarded(
            self.fetcher.post_form(&self.endpoint, &form),
            self.timeout,
            cancel,
        )
        .await
        .map_err(|e| {
            tracing::warn!(target: "auth.introspection", error = %e, "Introspection request failed");
            AuthError::RemoteValidationFailure(e)
        })?;

        if response.status != 200 {
            tracing::warn!(
                target: "auth.introspection",
                status = response.status,
                "Introspection endpoint returned unexpected status"
            );
            return Err(AuthError::RemoteValidationFailure(
                FetchError::UnexpectedStatus(response.status),
            ));
        }

        let introspection: IntrospectionResponse = serde_json::from_slice(&response.body)
            .map_err(|e| {
                tracing::warn!(target: "auth.introspection", error = %e, "Failed to parse introspection response");
                AuthError::ClaimsDecodeFailure("invalid introspection response".to_string())
            })?;

        if !introspection.active {
            tracing::debug!(target: "auth.introspection", "Token reported inactive");
            return Err(AuthError::TokenInactive);
        }

        build_claims(introspection)
    }
}

fn build_claims(response: IntrospectionResponse) -> Result<AuthClaims, AuthError> {
    let subject = response
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::ClaimsDecodeFailure("missing sub".to_string()))?;

    Ok(AuthClaims::new(
        subject,
        response.username.unwrap_or_default(),
        response.email.unwrap_or_default(),
        response.scope.as_deref().unwrap_or(""),
    ))
}
