//! Mock Keycloak endpoints on a wiremock server.
//!
//! Serves the realm's JWKS and introspection paths so end-to-end tests can
//! run the real `reqwest` fetcher against them.

use crate::crypto_fixtures::{jwks_json, TestRsaKey};
use crate::test_ids::TEST_REALM;
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock identity provider for one realm.
pub struct MockIdp {
    server: MockServer,
    realm: String,
}

impl MockIdp {
    /// Start a mock provider for [`TEST_REALM`].
    pub async fn start() -> Self {
        Self::start_for_realm(TEST_REALM).await
    }

    pub async fn start_for_realm(realm: &str) -> Self {
        Self {
            server: MockServer::start().await,
            realm: realm.to_string(),
        }
    }

    /// Base URL, used as `KEYCLOAK_URL`.
    pub fn keycloak_url(&self) -> String {
        self.server.uri()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Issuer the realm stamps into tokens.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server.uri(), self.realm)
    }

    pub fn jwks_path(&self) -> String {
        format!("/realms/{}/protocol/openid-connect/certs", self.realm)
    }

    pub fn introspection_path(&self) -> String {
        format!(
            "/realms/{}/protocol/openid-connect/token/introspect",
            self.realm
        )
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.jwks_path())
    }

    pub fn introspection_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.introspection_path())
    }

    /// Serve the given keys from the JWKS endpoint.
    pub async fn mount_jwks(&self, keys: &[&TestRsaKey]) {
        self.mount_jwks_document(&jwks_json(keys)).await;
    }

    /// Serve an arbitrary JWKS document.
    pub async fn mount_jwks_document(&self, document: &Value) {
        Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Answer introspection requests with `body`.
    pub async fn mount_introspection(&self, body: &Value) {
        self.mount_introspection_response(ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Answer introspection requests with `status` and no body.
    pub async fn mount_introspection_status(&self, status: u16) {
        self.mount_introspection_response(ResponseTemplate::new(status))
            .await;
    }

    /// Answer introspection requests after `delay`.
    pub async fn mount_slow_introspection(&self, body: &Value, delay: Duration) {
        self.mount_introspection_response(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(delay),
        )
        .await;
    }

    async fn mount_introspection_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(self.introspection_path()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Drop every mounted mock and recorded request.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Requests received so far.
    pub async fn received_requests(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }
}
