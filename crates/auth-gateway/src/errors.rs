//! Gateway error types.
//!
//! `AuthError` and `AuthzError` are the library-level outcomes of token
//! validation and authorization. `ApiError` maps them onto HTTP responses.
//! Messages returned to clients are intentionally generic to avoid leaking
//! which check failed. The specific kind is logged server-side.

use crate::http_client::FetchError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic message for every authentication failure.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Why a bearer token was not accepted.
///
/// Every variant surfaces to the client as 401.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token presented")]
    NoToken,

    #[error("authorization header is not a bearer credential")]
    MalformedHeader,

    #[error("token is not a well-formed JWT")]
    MalformedToken,

    #[error("introspection call failed: {0}")]
    RemoteValidationFailure(FetchError),

    #[error("token is not active")]
    TokenInactive,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token header has no key id")]
    MissingKeyId,

    #[error("no verification key for kid {0}")]
    KeyNotFound(String),

    #[error("key set fetch failed: {0}")]
    KeyFetchFailure(FetchError),

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,

    #[error("token issuer does not match")]
    InvalidIssuer,

    #[error("token audience does not match")]
    InvalidAudience,

    #[error("token claims could not be decoded: {0}")]
    ClaimsDecodeFailure(String),
}

impl AuthError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::NoToken => "no_token",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::RemoteValidationFailure(_) => "remote_validation_failure",
            AuthError::TokenInactive => "token_inactive",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::KeyFetchFailure(_) => "key_fetch_failure",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::ClaimsDecodeFailure(_) => "claims_decode_failure",
        }
    }
}

/// Why validated claims were not authorized.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("insufficient scope")]
    InsufficientScope,

    #[error("insufficient role")]
    InsufficientRole,

    #[error("no claims present")]
    NoClaimsPresent,
}

impl AuthzError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthzError::InsufficientScope => "insufficient_scope",
            AuthzError::InsufficientRole => "insufficient_role",
            AuthzError::NoClaimsPresent => "no_claims_present",
        }
    }
}

/// HTTP-facing error.
///
/// Maps to:
/// - Unauthorized: 401 with a `WWW-Authenticate: Bearer` challenge
/// - Forbidden: 403
/// - Internal: 500
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {source}")]
    Unauthorized { source: AuthError, realm: String },

    #[error("Forbidden: {0}")]
    Forbidden(#[from] AuthzError),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Wrap an authentication failure for the given protection realm.
    pub fn unauthorized(source: AuthError, realm: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            source,
            realm: realm.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized { .. } => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized { source, .. } => {
                tracing::debug!(target: "auth.errors", error_type = source.kind(), "Request unauthorized");
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", INVALID_TOKEN_MESSAGE)
            }
            ApiError::Forbidden(reason) => {
                tracing::debug!(target: "auth.errors", reason = reason.kind(), "Request forbidden");
                (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "The access token does not grant access to this resource",
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred",
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if let ApiError::Unauthorized { realm, .. } = &self {
            let challenge = format!("Bearer realm=\"{realm}\", error=\"invalid_token\"");
            if let Ok(header_value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_response_is_generic() {
        let error = ApiError::unauthorized(AuthError::KeyNotFound("kid-9".into()), "events");
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"events\", error=\"invalid_token\""
        );

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
        assert_eq!(body["error"]["message"], INVALID_TOKEN_MESSAGE);
        assert!(!body.to_string().contains("kid-9"));
    }

    #[tokio::test]
    async fn test_forbidden_response() {
        let response = ApiError::from(AuthzError::InsufficientRole).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        assert!(!body.to_string().contains("role"));
    }

    #[tokio::test]
    async fn test_internal_response() {
        let response = ApiError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"]["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::unauthorized(AuthError::NoToken, "r").status_code(), 401);
        assert_eq!(ApiError::Forbidden(AuthzError::InsufficientScope).status_code(), 403);
        assert_eq!(ApiError::Internal.status_code(), 500);
    }

    #[test]
    fn test_auth_error_kinds_are_distinct() {
        let errors = [
            AuthError::NoToken,
            AuthError::MalformedHeader,
            AuthError::MalformedToken,
            AuthError::RemoteValidationFailure(FetchError::TimedOut),
            AuthError::TokenInactive,
            AuthError::UnsupportedAlgorithm("HS256".into()),
            AuthError::MissingKeyId,
            AuthError::KeyNotFound("k".into()),
            AuthError::KeyFetchFailure(FetchError::UnexpectedStatus(500)),
            AuthError::InvalidSignature,
            AuthError::TokenExpired,
            AuthError::TokenNotYetValid,
            AuthError::InvalidIssuer,
            AuthError::InvalidAudience,
            AuthError::ClaimsDecodeFailure("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(AuthError::kind).collect();
        assert_eq!(kinds.len(), errors.len());
    }
}
