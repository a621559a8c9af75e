//! End-to-end tests for the protected route table.
//!
//! Spawns the real gateway against a mocked identity provider and drives it
//! over HTTP.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use auth_test_utils::{
    active_introspection, inactive_introspection, MockIdp, TestGatewayServer, TestRsaKey,
    TestTokenBuilder, ROLE_ORGANIZER, SCOPE_EVENTS_API_ACCESS, SCOPE_EVENTS_READ,
    TEST_SUBJECT_ALICE, TEST_SUBJECT_BOB, TEST_USERNAME_ALICE, TEST_USERNAME_BOB,
};
use reqwest::StatusCode;
use serde_json::Value;

const EXPECTED_CHALLENGE: &str = "Bearer realm=\"events\", error=\"invalid_token\"";

/// Gateway in JWKS mode with the primary key published.
async fn jwks_gateway() -> Result<(MockIdp, TestGatewayServer, TestRsaKey)> {
    let idp = MockIdp::start().await;
    let key = TestRsaKey::primary();
    idp.mount_jwks(&[&key]).await;
    let server = TestGatewayServer::spawn_jwks(&idp).await?;
    Ok((idp, server, key))
}

async fn get_me(
    server: &TestGatewayServer,
    authorization: Option<&str>,
) -> Result<reqwest::Response> {
    let mut request = reqwest::Client::new().get(format!("{}/v1/me", server.url()));
    if let Some(value) = authorization {
        request = request.header("Authorization", value);
    }
    Ok(request.send().await?)
}

async fn assert_unauthorized(response: reqwest::Response) -> Result<()> {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        EXPECTED_CHALLENGE
    );
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(())
}

// =============================================================================
// Authentication failures
// =============================================================================

#[tokio::test]
async fn test_me_requires_authorization_header() -> Result<()> {
    let (_idp, server, _key) = jwks_gateway().await?;
    assert_unauthorized(get_me(&server, None).await?).await
}

#[tokio::test]
async fn test_me_rejects_non_bearer_schemes() -> Result<()> {
    let (_idp, server, _key) = jwks_gateway().await?;

    for header in ["Basic dXNlcjpwYXNz", "Bearer", "Token abc"] {
        assert_unauthorized(get_me(&server, Some(header)).await?).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_me_rejects_invalid_tokens_with_generic_message() -> Result<()> {
    let (idp, server, key) = jwks_gateway().await?;

    let expired = TestTokenBuilder::new()
        .issued_by(&idp.issuer())
        .with_scope(SCOPE_EVENTS_API_ACCESS)
        .expires_in(-3600)
        .sign(&key);
    let wrong_issuer = TestTokenBuilder::new()
        .issued_by("http://evil.test/realms/events")
        .with_scope(SCOPE_EVENTS_API_ACCESS)
        .sign(&key);

    let mut messages = Vec::new();
    for token in [expired.as_str(), wrong_issuer.as_str(), "not-a-jwt"] {
        let response = get_me(&server, Some(format!("Bearer {token}").as_str())).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await?;
        messages.push(body["error"]["message"].as_str().unwrap().to_string());
    }

    // Clients cannot tell failure causes apart
    messages.dedup();
    assert_eq!(messages.len(), 1);
    Ok(())
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn test_me_forbidden_without_required_scope() -> Result<()> {
    let (idp, server, key) = jwks_gateway().await?;

    let token = TestTokenBuilder::new()
        .issued_by(&idp.issuer())
        .with_scope(SCOPE_EVENTS_READ)
        .sign(&key);
    let response = get_me(&server, Some(format!("Bearer {token}").as_str())).await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn test_required_scope_is_configurable() -> Result<()> {
    let idp = MockIdp::start().await;
    let key = TestRsaKey::primary();
    idp.mount_jwks(&[&key]).await;
    let server = TestGatewayServer::spawn_with(
        &idp,
        &[
            ("TOKEN_VALIDATION_METHOD", "jwks"),
            ("REQUIRED_SCOPE", SCOPE_EVENTS_READ),
        ],
    )
    .await?;

    let token = TestTokenBuilder::new()
        .issued_by(&idp.issuer())
        .with_scope(SCOPE_EVENTS_READ)
        .sign(&key);
    let response = get_me(&server, Some(format!("Bearer {token}").as_str())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

// =============================================================================
// Success
// =============================================================================

#[tokio::test]
async fn test_me_returns_claims_for_valid_jwt() -> Result<()> {
    let (idp, server, key) = jwks_gateway().await?;

    let token = TestTokenBuilder::new()
        .issued_by(&idp.issuer())
        .with_scope(&format!("openid {SCOPE_EVENTS_API_ACCESS}"))
        .with_email("alice@example.com")
        .with_realm_roles(&[ROLE_ORGANIZER])
        .sign(&key);
    let response = get_me(&server, Some(format!("bearer {token}").as_str())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["sub"], TEST_SUBJECT_ALICE);
    assert_eq!(body["username"], TEST_USERNAME_ALICE);
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(
        body["scopes"],
        serde_json::json!([SCOPE_EVENTS_API_ACCESS, "openid"])
    );
    assert_eq!(body["roles"], serde_json::json!([ROLE_ORGANIZER]));
    Ok(())
}

#[tokio::test]
async fn test_jwks_fetched_once_across_requests() -> Result<()> {
    let (idp, server, key) = jwks_gateway().await?;

    let token = TestTokenBuilder::new()
        .issued_by(&idp.issuer())
        .with_scope(SCOPE_EVENTS_API_ACCESS)
        .sign(&key);
    for _ in 0..5 {
        let response = get_me(&server, Some(format!("Bearer {token}").as_str())).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let jwks_requests = idp
        .received_requests()
        .await
        .iter()
        .filter(|r| r.url.path() == idp.jwks_path())
        .count();
    assert_eq!(jwks_requests, 1);
    Ok(())
}

#[tokio::test]
async fn test_me_via_introspection() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_introspection(&active_introspection(
        TEST_SUBJECT_BOB,
        TEST_USERNAME_BOB,
        SCOPE_EVENTS_API_ACCESS,
    ))
    .await;
    let server = TestGatewayServer::spawn_introspection(&idp).await?;

    let response = get_me(&server, Some("Bearer opaque-access-token")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["sub"], TEST_SUBJECT_BOB);
    assert_eq!(body["username"], TEST_USERNAME_BOB);
    assert!(body.get("email").is_none());
    assert_eq!(body["roles"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn test_inactive_introspection_is_unauthorized() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_introspection(&inactive_introspection()).await;
    let server = TestGatewayServer::spawn_introspection(&idp).await?;

    assert_unauthorized(get_me(&server, Some("Bearer revoked-token")).await?).await
}

#[tokio::test]
async fn test_idp_outage_is_unauthorized_not_server_error() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_introspection_status(503).await;
    let server = TestGatewayServer::spawn_introspection(&idp).await?;

    assert_unauthorized(get_me(&server, Some("Bearer some-token")).await?).await
}

// =============================================================================
// Public routes
// =============================================================================

#[tokio::test]
async fn test_health_and_metrics_are_public() -> Result<()> {
    let (_idp, server, _key) = jwks_gateway().await?;

    let health = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(health.status(), StatusCode::OK);

    let metrics = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(metrics.status(), StatusCode::OK);
    Ok(())
}
