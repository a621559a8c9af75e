//! Token validator selection.
//!
//! The gateway validates tokens either by introspection or locally against
//! the JWKS. The choice is made once at startup from configuration and the
//! rest of the gateway only sees [`TokenValidator`].

use crate::auth::claims::AuthClaims;
use crate::auth::introspection::IntrospectionValidator;
use crate::auth::jwks::KeySetCache;
use crate::auth::jwt::JwksValidator;
use crate::config::Config;
use crate::errors::AuthError;
use crate::http_client::HttpFetch;
use crate::observability::metrics;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Configured validation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidatorSelection {
    /// RFC 7662 introspection against the identity provider.
    #[default]
    Introspection,

    /// Local signature verification against the cached JWKS.
    Jwks,
}

impl ValidatorSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorSelection::Introspection => "introspection",
            ValidatorSelection::Jwks => "jwks",
        }
    }
}

impl fmt::Display for ValidatorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorSelection {
    type Err = String;

    /// Unset or empty selects introspection.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "introspection" => Ok(ValidatorSelection::Introspection),
            "jwks" => Ok(ValidatorSelection::Jwks),
            other => Err(other.to_string()),
        }
    }
}

/// The configured token validator.
pub enum TokenValidator {
    Introspection(IntrospectionValidator),
    Jwks(JwksValidator),
}

impl TokenValidator {
    /// Build the validator selected by `config`, sharing `fetcher` for all
    /// identity-provider calls.
    pub fn from_config(config: &Config, fetcher: Arc<dyn HttpFetch>) -> Self {
        match config.validation_method {
            ValidatorSelection::Introspection => TokenValidator::Introspection(
                IntrospectionValidator::new(
                    config.introspection_url(),
                    config.client_id.clone(),
                    config.client_secret.clone(),
                    fetcher,
                )
                .with_timeout(config.http_timeout),
            ),
            ValidatorSelection::Jwks => {
                let key_cache = KeySetCache::new(config.jwks_url(), fetcher)
                    .with_ttl(config.jwks_cache_ttl)
                    .with_min_refresh_interval(config.jwks_min_refresh_interval)
                    .with_fetch_timeout(config.http_timeout);

                TokenValidator::Jwks(
                    JwksValidator::new(Arc::new(key_cache), config.issuer())
                        .with_audience(config.expected_audience.clone())
                        .with_clock_skew(Duration::from_secs(config.jwt_clock_skew_seconds))
                        .with_role_claim(config.roles_claim.clone()),
                )
            }
        }
    }

    pub fn selection(&self) -> ValidatorSelection {
        match self {
            TokenValidator::Introspection(_) => ValidatorSelection::Introspection,
            TokenValidator::Jwks(_) => ValidatorSelection::Jwks,
        }
    }

    /// Validate a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoToken` for an empty token, otherwise whatever the
    /// selected strategy reports.
    pub async fn validate(&self, token: &str) -> Result<AuthClaims, AuthError> {
        self.validate_with_cancel(token, &CancellationToken::new()).await
    }

    /// Validate a bearer token, abandoning any identity-provider call once
    /// `cancel` fires.
    #[instrument(skip_all, fields(method = %self.selection()))]
    pub async fn validate_with_cancel(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::NoToken);
        }

        let start = Instant::now();
        let result = match self {
            TokenValidator::Introspection(validator) => validator.validate(token, cancel).await,
            TokenValidator::Jwks(validator) => validator.validate(token, cancel).await,
        };

        let method = self.selection().as_str();
        match &result {
            Ok(_) => metrics::record_token_validation(method, None, start.elapsed()),
            Err(e) => {
                tracing::debug!(
                    target: "auth.validator",
                    method = method,
                    error_type = e.kind(),
                    "Token validation failed"
                );
                metrics::record_token_validation(method, Some(e.kind()), start.elapsed());
            }
        }

        result
    }
}
