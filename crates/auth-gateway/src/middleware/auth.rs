//! Authentication and authorization middleware for protected routes.
//!
//! `require_auth` extracts the bearer token, validates it with the configured
//! [`TokenValidator`], and injects [`AuthClaims`] into request extensions.
//! `require_policy` then evaluates the route's [`AuthorizationPolicy`]
//! against those claims.

use crate::auth::{authorize, AuthClaims, AuthorizationPolicy, TokenValidator};
use crate::errors::{ApiError, AuthError};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Validator selected at startup.
    pub validator: Arc<TokenValidator>,

    /// Protection realm advertised in `WWW-Authenticate`.
    pub realm: String,
}

/// Extract the bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively. The token itself must be
/// non-empty and contain no whitespace.
///
/// # Errors
///
/// - `AuthError::NoToken` if there is no `Authorization` header
/// - `AuthError::MalformedHeader` if the header is not `Bearer <token>`
pub fn extract_bearer_token<B>(req: &axum::http::Request<B>) -> Result<&str, AuthError> {
    let header = req.headers().get(AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "auth.middleware", "Missing Authorization header");
        AuthError::NoToken
    })?;

    let value = header.to_str().map_err(|_| {
        tracing::debug!(target: "auth.middleware", "Authorization header is not visible ASCII");
        AuthError::MalformedHeader
    })?;

    let (scheme, token) = value.trim().split_once(' ').ok_or_else(|| {
        tracing::debug!(target: "auth.middleware", "Invalid Authorization header format");
        AuthError::MalformedHeader
    })?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer")
        || token.is_empty()
        || token.contains(char::is_whitespace)
    {
        tracing::debug!(target: "auth.middleware", "Invalid Authorization header format");
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Returns 401 Unauthorized with WWW-Authenticate header if token is missing or invalid
/// - Continues to next handler with claims in extensions if token is valid
#[instrument(skip_all, name = "auth.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = extract_bearer_token(&req)
            .map_err(|e| ApiError::unauthorized(e, state.realm.as_str()))?;

        state
            .validator
            .validate(token)
            .await
            .map_err(|e| ApiError::unauthorized(e, state.realm.as_str()))?
    };

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Authorization middleware. Must run inside `require_auth`.
///
/// Returns 403 Forbidden when the claims do not satisfy the policy.
#[instrument(skip_all, name = "auth.middleware.policy")]
pub async fn require_policy(
    State(policy): State<Arc<AuthorizationPolicy>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(req.claims(), &policy).into_result()?;
    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&AuthClaims>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&AuthClaims> {
        self.extensions().get::<AuthClaims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // End-to-end middleware behaviour against a mock identity provider
    // lives in tests/middleware_tests.rs.

    use super::*;
    use axum::http::Request as HttpRequest;

    fn request_with(header: Option<&str>) -> HttpRequest<()> {
        let mut builder = HttpRequest::builder().uri("/v1/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_extract_bearer_token_valid() {
        let req = request_with(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&req), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_extract_bearer_token_scheme_is_case_insensitive() {
        for header in ["bearer tok", "BEARER tok", "BeArEr tok", "Bearer   tok  "] {
            let req = request_with(Some(header));
            assert_eq!(extract_bearer_token(&req), Ok("tok"), "{header}");
        }
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let req = request_with(None);
        assert_eq!(extract_bearer_token(&req), Err(AuthError::NoToken));
    }

    #[test]
    fn test_extract_bearer_token_malformed() {
        for header in [
            "Bearer",
            "Bearer ",
            "Basic dXNlcjpwYXNz",
            "Token abc",
            "Bearer two parts",
            "abc.def.ghi",
            "",
        ] {
            let req = request_with(Some(header));
            assert_eq!(
                extract_bearer_token(&req),
                Err(AuthError::MalformedHeader),
                "{header:?}"
            );
        }
    }

    #[test]
    fn test_claims_ext_reads_extension() {
        let mut req = request_with(None);
        assert!(req.claims().is_none());

        req.extensions_mut()
            .insert(AuthClaims::new("sub", "alice", "", "read"));
        assert_eq!(req.claims().unwrap().username(), "alice");
    }
}
