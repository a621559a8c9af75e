//! Gateway configuration.
//!
//! Configuration is loaded from environment variables. The client secret
//! is redacted in Debug output.

use crate::auth::roles::{RoleClaimPath, DEFAULT_ROLE_CLAIM_PATH};
use crate::auth::validator::ValidatorSelection;
use crate::http_client::DEFAULT_HTTP_TIMEOUT_SECS;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default identity provider base URL.
pub const DEFAULT_KEYCLOAK_URL: &str = "http://localhost:8081";

/// Default realm name.
pub const DEFAULT_REALM: &str = "events";

/// Default client ID of this resource server.
pub const DEFAULT_CLIENT_ID: &str = "events-api";

/// Default scope required by `/v1/me`.
pub const DEFAULT_REQUIRED_SCOPE: &str = "events-api-access";

/// Default JWKS freshness window in seconds.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum seconds between unknown-kid JWKS refreshes.
pub const DEFAULT_JWKS_MIN_REFRESH_SECONDS: u64 = 5;

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity provider base URL without trailing slash.
    pub keycloak_url: String,

    /// Realm tokens are issued by.
    pub realm: String,

    /// Client ID used for introspection.
    pub client_id: String,

    /// Client secret used for introspection. Empty when unused.
    pub client_secret: SecretString,

    /// Which token validation strategy to use.
    pub validation_method: ValidatorSelection,

    /// How long a fetched JWKS is served before re-fetching.
    pub jwks_cache_ttl: Duration,

    /// Minimum spacing between refreshes caused by unknown key IDs.
    pub jwks_min_refresh_interval: Duration,

    /// Timeout for each identity-provider call.
    pub http_timeout: Duration,

    /// JWT clock skew tolerance in seconds.
    pub jwt_clock_skew_seconds: u64,

    /// Audience JWTs must carry. `None` disables the audience check.
    pub expected_audience: Option<String>,

    /// Where roles live in JWT claims.
    pub roles_claim: RoleClaimPath,

    /// Scope required to call `/v1/me`.
    pub required_scope: String,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("keycloak_url", &self.keycloak_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("validation_method", &self.validation_method)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_min_refresh_interval", &self.jwks_min_refresh_interval)
            .field("http_timeout", &self.http_timeout)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("expected_audience", &self.expected_audience)
            .field("roles_claim", &self.roles_claim)
            .field("required_scope", &self.required_scope)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid token validation method: {0}")]
    InvalidValidationMethod(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = string_or(vars, "BIND_ADDRESS", DEFAULT_BIND_ADDRESS);

        let keycloak_url = string_or(vars, "KEYCLOAK_URL", DEFAULT_KEYCLOAK_URL)
            .trim_end_matches('/')
            .to_string();

        let realm = string_or(vars, "REALM_NAME", DEFAULT_REALM);
        let client_id = string_or(vars, "CLIENT_ID", DEFAULT_CLIENT_ID);

        let validation_method = vars
            .get("TOKEN_VALIDATION_METHOD")
            .map(String::as_str)
            .unwrap_or("")
            .parse::<ValidatorSelection>()
            .map_err(ConfigError::InvalidValidationMethod)?;

        let client_secret = vars
            .get("CLIENT_SECRET")
            .cloned()
            .unwrap_or_default();
        if validation_method == ValidatorSelection::Introspection && client_secret.is_empty() {
            return Err(ConfigError::MissingEnvVar("CLIENT_SECRET".to_string()));
        }

        let jwks_cache_ttl_secs = parse_u64(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            ConfigError::InvalidJwksCache,
        )?;
        if jwks_cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidJwksCache(
                "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let jwks_min_refresh_secs = parse_u64(
            vars,
            "JWKS_MIN_REFRESH_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_SECONDS,
            ConfigError::InvalidJwksCache,
        )?;
        if jwks_min_refresh_secs > jwks_cache_ttl_secs {
            return Err(ConfigError::InvalidJwksCache(format!(
                "JWKS_MIN_REFRESH_SECONDS ({jwks_min_refresh_secs}) must not exceed JWKS_CACHE_TTL_SECONDS ({jwks_cache_ttl_secs})"
            )));
        }

        let http_timeout_secs = parse_u64(
            vars,
            "IDP_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECS,
            ConfigError::InvalidHttpTimeout,
        )?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::InvalidHttpTimeout(
                "IDP_HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{value_str}': {e}"
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {value}"
                )));
            }

            let value = value.unsigned_abs();
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {value}",
                    MAX_CLOCK_SKEW.as_secs()
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let expected_audience = vars
            .get("JWT_AUDIENCE")
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let roles_claim = RoleClaimPath::parse(
            vars.get("ROLES_CLAIM")
                .map_or(DEFAULT_ROLE_CLAIM_PATH, String::as_str),
        );

        let required_scope = string_or(vars, "REQUIRED_SCOPE", DEFAULT_REQUIRED_SCOPE);

        Ok(Config {
            bind_address,
            keycloak_url,
            realm,
            client_id,
            client_secret: SecretString::from(client_secret),
            validation_method,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            jwks_min_refresh_interval: Duration::from_secs(jwks_min_refresh_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            jwt_clock_skew_seconds,
            expected_audience,
            roles_claim,
            required_scope,
        })
    }

    /// Issuer tokens must carry: `{keycloak_url}/realms/{realm}`.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.keycloak_url, self.realm)
    }

    /// JWKS endpoint of the realm.
    pub fn jwks_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }

    /// Token introspection endpoint of the realm.
    pub fn introspection_url(&self) -> String {
        format!("{}/protocol/openid-connect/token/introspect", self.issuer())
    }

    /// Whether a client secret was configured.
    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.expose_secret().is_empty()
    }
}

fn string_or(vars: &HashMap<String, String>, name: &str, default: &str) -> String {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn parse_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    to_error: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.parse().map_err(|e| {
            to_error(format!(
                "{name} must be a valid non-negative integer, got '{value_str}': {e}"
            ))
        }),
        None => Ok(default),
    }
}
