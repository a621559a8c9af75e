//! Current caller handler.
//!
//! Returns the identity established by the auth middleware.

use crate::auth::AuthClaims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject (user or client ID).
    pub sub: String,

    pub username: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,

    /// Granted scopes, sorted.
    pub scopes: Vec<String>,

    /// Roles, sorted. Always empty under introspection.
    pub roles: Vec<String>,
}

impl From<&AuthClaims> for MeResponse {
    fn from(claims: &AuthClaims) -> Self {
        Self {
            sub: claims.subject().to_string(),
            username: claims.username().to_string(),
            email: claims.email().to_string(),
            scopes: claims.scopes().iter().cloned().collect(),
            roles: claims.roles().iter().cloned().collect(),
        }
    }
}

/// Handler for GET /v1/me
///
/// Requires valid authentication via the auth middleware.
///
/// ```json
/// {
///   "sub": "6f1c...",
///   "username": "alice",
///   "email": "alice@example.com",
///   "scopes": ["events-api-access", "openid"],
///   "roles": ["event-manager"]
/// }
/// ```
#[instrument(skip_all, name = "auth.handlers.me")]
pub async fn get_me(Extension(claims): Extension<AuthClaims>) -> Json<MeResponse> {
    tracing::debug!(target: "auth.handlers.me", "Returning caller claims");
    Json(MeResponse::from(&claims))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_me_response_from_claims() {
        let claims = AuthClaims::new("user123", "alice", "alice@example.com", "write read")
            .with_roles(["viewer"]);

        let json = serde_json::to_string(&MeResponse::from(&claims)).unwrap();

        assert!(json.contains("\"sub\":\"user123\""));
        assert!(json.contains("\"username\":\"alice\""));
        assert!(json.contains("\"scopes\":[\"read\",\"write\"]"));
        assert!(json.contains("\"roles\":[\"viewer\"]"));
    }

    #[test]
    fn test_me_response_omits_empty_email() {
        let claims = AuthClaims::new("svc", "", "", "read");
        let json = serde_json::to_string(&MeResponse::from(&claims)).unwrap();

        assert!(!json.contains("email"), "email should be omitted when empty");
    }
}
