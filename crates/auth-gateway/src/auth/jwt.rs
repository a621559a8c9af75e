//! Local JWT validation against the identity provider's published RSA keys.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256, RS384 and RS512 are accepted; HMAC, `none`, EC and EdDSA are rejected
//!   before any key lookup
//! - `exp` is required; `nbf` and `iat` are honoured with clock skew tolerance
//! - The issuer must match exactly; audience is checked when configured

use crate::auth::claims::AuthClaims;
use crate::auth::jwks::{KeySetCache, VerificationKey};
use crate::auth::roles::RoleClaimPath;
use crate::errors::AuthError;
use common::jwt::{extract_header, validate_iat, JwtValidationError, DEFAULT_CLOCK_SKEW};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Claims decoded from a verified access token.
///
/// Anything not modelled here is kept in `extra` for role extraction.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,

    #[serde(default)]
    iat: Option<i64>,

    #[serde(default)]
    scope: String,

    #[serde(default)]
    preferred_username: Option<String>,

    /// Authorized party (the client the token was issued to).
    #[serde(default)]
    azp: Option<String>,

    #[serde(default)]
    email: Option<String>,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Validates RSA-signed JWTs using keys from a [`KeySetCache`].
pub struct JwksValidator {
    key_cache: Arc<KeySetCache>,

    /// Exact `iss` value tokens must carry.
    expected_issuer: String,

    /// Required `aud` member, if audience checking is enabled.
    expected_audience: Option<String>,

    /// Leeway for `exp`/`nbf` and tolerance for future `iat`.
    clock_skew: Duration,

    role_claim: RoleClaimPath,
}

impl JwksValidator {
    /// Create a validator with default clock skew, no audience check and
    /// Keycloak realm roles.
    pub fn new(key_cache: Arc<KeySetCache>, expected_issuer: impl Into<String>) -> Self {
        Self {
            key_cache,
            expected_issuer: expected_issuer.into(),
            expected_audience: None,
            clock_skew: DEFAULT_CLOCK_SKEW,
            role_claim: RoleClaimPath::default(),
        }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.expected_audience = audience;
        self
    }

    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    #[must_use]
    pub fn with_role_claim(mut self, role_claim: RoleClaimPath) -> Self {
        self.role_claim = role_claim;
        self
    }

    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.key_cache
    }

    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Validate a JWT and return the caller's claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header parse without verification
    /// 2. Algorithm allow-list (RS256/RS384/RS512)
    /// 3. Key lookup by `kid`, refreshing the key set if needed
    /// 4. Signature verification
    /// 5. `exp`, `nbf`, `iss`, optional `aud`, then `iat` with clock skew tolerance
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` variant naming the first failed check.
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthClaims, AuthError> {
        // 1. Parse header (includes size check via common::jwt)
        let header = extract_header(token).map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = ?e, "Token header extraction failed");
            AuthError::MalformedToken
        })?;

        // 2. Algorithm allow-list, before any key lookup
        let algorithm = match Algorithm::from_str(&header.alg) {
            Ok(alg @ (Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512)) => alg,
            _ => {
                tracing::debug!(target: "auth.jwt", alg = %header.alg, "Token uses unsupported algorithm");
                return Err(AuthError::UnsupportedAlgorithm(header.alg));
            }
        };

        let kid = header.kid.ok_or_else(|| {
            tracing::debug!(target: "auth.jwt", "Token header has no kid");
            AuthError::MissingKeyId
        })?;

        // 3. Fetch public key
        let key = self.key_cache.get_key(&kid, cancel).await?;
        if let Some(key_alg) = key.alg() {
            if key_alg != algorithm {
                tracing::warn!(
                    target: "auth.jwt",
                    kid = %kid,
                    token_alg = ?algorithm,
                    key_alg = ?key_alg,
                    "Token algorithm does not match JWK algorithm"
                );
                return Err(AuthError::UnsupportedAlgorithm(header.alg));
            }
        }

        // 4-5. Verify signature and registered claims
        let claims = self.verify_token(token, &key, algorithm)?;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e: JwtValidationError| {
                tracing::debug!(target: "auth.jwt", error = ?e, "Token iat validation failed");
                AuthError::TokenNotYetValid
            })?;
        }

        if claims.sub.is_empty() {
            tracing::debug!(target: "auth.jwt", "Token has an empty sub claim");
            return Err(AuthError::ClaimsDecodeFailure("empty sub claim".to_string()));
        }

        tracing::debug!(target: "auth.jwt", "Token validated successfully");
        Ok(self.build_claims(claims))
    }

    fn verify_token(
        &self,
        token: &str,
        key: &VerificationKey,
        algorithm: Algorithm,
    ) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        match &self.expected_audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        let token_data =
            decode::<TokenClaims>(token, key.decoding_key(), &validation).map_err(|e| {
                let error = map_jwt_error(e.kind());
                tracing::debug!(
                    target: "auth.jwt",
                    error = %e,
                    error_type = error.kind(),
                    "Token verification failed"
                );
                error
            })?;

        Ok(token_data.claims)
    }

    fn build_claims(&self, claims: TokenClaims) -> AuthClaims {
        let roles = self.role_claim.extract(&claims.extra);
        let username = claims
            .preferred_username
            .filter(|u| !u.is_empty())
            .or(claims.azp)
            .unwrap_or_default();

        AuthClaims::new(
            claims.sub,
            username,
            claims.email.unwrap_or_default(),
            &claims.scope,
        )
        .with_roles(roles)
    }
}

/// Classify a `jsonwebtoken` failure.
fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm("mismatch".to_string()),
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::MalformedToken,
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::ClaimsDecodeFailure(format!("missing claim {claim}"))
        }
        other => AuthError::ClaimsDecodeFailure(format!("{other:?}")),
    }
}
