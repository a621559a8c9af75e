//! JWT utilities shared by the gateway crates.
//!
//! This module provides the pre-verification pieces of JWT handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal claim validation
//! - Header parsing (`alg`, `kid`) without signature verification
//! - `iat` validation logic
//! - RSA public key component decoding from JWK `n`/`e` fields
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header values are untrusted until the signature has been verified;
//!   they may only be used to select a key from a trusted key set
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = extract_header(token)?;
//! let key = key_cache.get_key(header.kid.as_deref().ok_or(...)?).await?;
//!
//! // After signature verification, validate iat
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations. Identity-provider access tokens carrying realm and client role
/// claims are typically 1-2KB, so 8KB leaves generous headroom.
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Applied as leeway to `exp`/`nbf` checks and as the maximum distance
/// an `iat` timestamp may lie in the future.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// This prevents misconfiguration that could weaken security by allowing
/// excessively large clock skew tolerance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Minimum RSA modulus size accepted from a JWKS document.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Largest RSA public exponent we will decode (in bytes).
const MAX_RSA_EXPONENT_BYTES: usize = 8;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

/// Errors that can occur while decoding RSA key material from a JWK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwkDecodeError {
    /// A required component (`n` or `e`) is absent or empty.
    #[error("JWK is missing the '{0}' component")]
    MissingComponent(&'static str),

    /// A component is not valid unpadded base64url.
    #[error("JWK component '{0}' is not valid base64url")]
    InvalidEncoding(&'static str),

    /// The modulus is shorter than [`MIN_RSA_MODULUS_BITS`].
    #[error("RSA modulus too small: {0} bits")]
    ModulusTooSmall(usize),

    /// The exponent is zero, one, or implausibly large.
    #[error("RSA exponent is invalid")]
    InvalidExponent,
}

// =============================================================================
// Header Types
// =============================================================================

/// The subset of a JWT's JOSE header needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Signing algorithm name exactly as it appears in the token (`RS256`, `HS256`, ...).
    pub alg: String,

    /// Key ID, if present as a non-empty string.
    pub kid: Option<String>,
}

/// Big-endian RSA public key components decoded from a JWK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicComponents {
    /// Modulus `n`.
    pub modulus: Vec<u8>,

    /// Public exponent `e`.
    pub exponent: Vec<u8>,
}

// =============================================================================
// Functions
// =============================================================================

/// Parse the JOSE header of a JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - `alg` must still be checked against an allow-list by the caller
/// - `kid` should only be used for key lookup in a trusted JWKS
///
/// A `kid` that is missing, not a string, or empty is reported as `None`
/// so the caller can classify it separately from a malformed token.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, or no string `alg`
pub fn extract_header(token: &str) -> Result<JwtHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "Token rejected: header has no alg");
            JwtValidationError::MalformedToken
        })?;

    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Ok(JwtHeader { alg, kid })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate
/// token pre-generation, clock synchronization issues, or manipulation.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode the RSA modulus and exponent from JWK `n` and `e` fields.
///
/// Both fields are unsigned big-endian integers in base64url encoding
/// without padding (RFC 7518 Section 6.3.1).
///
/// # Errors
///
/// Returns `JwkDecodeError` when a component is missing or not base64url,
/// the modulus is below [`MIN_RSA_MODULUS_BITS`], or the exponent is not a
/// plausible public exponent.
pub fn decode_rsa_public_key_jwk(
    n_b64url: &str,
    e_b64url: &str,
) -> Result<RsaPublicComponents, JwkDecodeError> {
    if n_b64url.is_empty() {
        return Err(JwkDecodeError::MissingComponent("n"));
    }
    if e_b64url.is_empty() {
        return Err(JwkDecodeError::MissingComponent("e"));
    }

    let modulus = URL_SAFE_NO_PAD
        .decode(n_b64url)
        .map_err(|_| JwkDecodeError::InvalidEncoding("n"))?;
    let exponent = URL_SAFE_NO_PAD
        .decode(e_b64url)
        .map_err(|_| JwkDecodeError::InvalidEncoding("e"))?;

    let bits = significant_bits(&modulus);
    if bits < MIN_RSA_MODULUS_BITS {
        return Err(JwkDecodeError::ModulusTooSmall(bits));
    }

    if exponent.is_empty() || exponent.len() > MAX_RSA_EXPONENT_BYTES {
        return Err(JwkDecodeError::InvalidExponent);
    }
    let exponent_value = exponent
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    if exponent_value < 3 {
        return Err(JwkDecodeError::InvalidExponent);
    }

    Ok(RsaPublicComponents { modulus, exponent })
}

/// Number of significant bits in a big-endian unsigned integer.
fn significant_bits(bytes: &[u8]) -> usize {
    let mut iter = bytes.iter().skip_while(|b| **b == 0);
    match iter.next() {
        Some(first) => (iter.count() + 1) * 8 - first.leading_zeros() as usize,
        None => 0,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_clock_skew_bounds() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
    }

    // -------------------------------------------------------------------------
    // extract_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_header_valid_token() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"test-key-01"}"#);

        let header = extract_header(&token).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("test-key-01"));
    }

    #[test]
    fn test_extract_header_missing_kid_is_none() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT"}"#);

        let header = extract_header(&token).unwrap();
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_extract_header_non_string_or_empty_kid_is_none() {
        for header in [
            r#"{"alg":"RS256","kid":12345}"#,
            r#"{"alg":"RS256","kid":null}"#,
            r#"{"alg":"RS256","kid":""}"#,
        ] {
            let token = token_with_header(header);
            assert_eq!(extract_header(&token).unwrap().kid, None, "{header}");
        }
    }

    #[test]
    fn test_extract_header_preserves_hmac_alg() {
        // Allow-listing happens in the validator, not here
        let token = token_with_header(r#"{"alg":"HS256","kid":"k"}"#);
        assert_eq!(extract_header(&token).unwrap().alg, "HS256");
    }

    #[test]
    fn test_extract_header_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"k"}"#);
        assert_eq!(
            extract_header(&token),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_header_malformed_token() {
        assert_eq!(
            extract_header("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            extract_header("only.two"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            extract_header("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(extract_header(""), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_extract_header_invalid_base64() {
        assert_eq!(
            extract_header("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_header_invalid_json() {
        let token = token_with_header("not-json");
        assert_eq!(
            extract_header(&token),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            extract_header(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_extract_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(remaining - payload_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        let header = extract_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key"));
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_in_past_is_ok() {
        let now = 1_700_000_000;
        assert!(validate_iat_at(now - 3600, DEFAULT_CLOCK_SKEW, now).is_ok());
    }

    #[test]
    fn test_validate_iat_within_skew_is_ok() {
        let now = 1_700_000_000;
        let iat = now + DEFAULT_CLOCK_SKEW.as_secs() as i64;
        assert!(validate_iat_at(iat, DEFAULT_CLOCK_SKEW, now).is_ok());
    }

    #[test]
    fn test_validate_iat_beyond_skew_is_rejected() {
        let now = 1_700_000_000;
        let iat = now + DEFAULT_CLOCK_SKEW.as_secs() as i64 + 1;
        assert_eq!(
            validate_iat_at(iat, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now + 7200, DEFAULT_CLOCK_SKEW).is_err());
    }

    // -------------------------------------------------------------------------
    // decode_rsa_public_key_jwk Tests
    // -------------------------------------------------------------------------

    fn modulus_b64(bytes: usize) -> String {
        URL_SAFE_NO_PAD.encode(vec![0xC5u8; bytes])
    }

    #[test]
    fn test_decode_rsa_components_valid() {
        let components = decode_rsa_public_key_jwk(&modulus_b64(256), "AQAB").unwrap();
        assert_eq!(components.modulus.len(), 256);
        assert_eq!(components.exponent, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_decode_rsa_components_leading_zero_is_not_counted() {
        let mut modulus = vec![0x00u8];
        modulus.extend(vec![0xC5u8; 255]);
        let n = URL_SAFE_NO_PAD.encode(&modulus);

        assert_eq!(
            decode_rsa_public_key_jwk(&n, "AQAB"),
            Err(JwkDecodeError::ModulusTooSmall(2040))
        );
    }

    #[test]
    fn test_decode_rsa_components_small_modulus_rejected() {
        assert_eq!(
            decode_rsa_public_key_jwk(&modulus_b64(128), "AQAB"),
            Err(JwkDecodeError::ModulusTooSmall(1024))
        );
    }

    #[test]
    fn test_decode_rsa_components_missing_fields() {
        assert_eq!(
            decode_rsa_public_key_jwk("", "AQAB"),
            Err(JwkDecodeError::MissingComponent("n"))
        );
        assert_eq!(
            decode_rsa_public_key_jwk(&modulus_b64(256), ""),
            Err(JwkDecodeError::MissingComponent("e"))
        );
    }

    #[test]
    fn test_decode_rsa_components_padded_or_invalid_base64_rejected() {
        assert_eq!(
            decode_rsa_public_key_jwk("!!!not-base64!!!", "AQAB"),
            Err(JwkDecodeError::InvalidEncoding("n"))
        );
        assert_eq!(
            decode_rsa_public_key_jwk(&modulus_b64(256), "AQAB=="),
            Err(JwkDecodeError::InvalidEncoding("e"))
        );
    }

    #[test]
    fn test_decode_rsa_components_bad_exponent() {
        // e = 1
        assert_eq!(
            decode_rsa_public_key_jwk(&modulus_b64(256), "AQ"),
            Err(JwkDecodeError::InvalidExponent)
        );
        // 9-byte exponent
        let big = URL_SAFE_NO_PAD.encode([0x01u8; 9]);
        assert_eq!(
            decode_rsa_public_key_jwk(&modulus_b64(256), &big),
            Err(JwkDecodeError::InvalidExponent)
        );
    }
}
