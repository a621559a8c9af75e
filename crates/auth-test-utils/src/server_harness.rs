//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.

use crate::mock_idp::MockIdp;
use crate::test_ids::{TEST_CLIENT_ID, TEST_CLIENT_SECRET};
use auth_gateway::auth::TokenValidator;
use auth_gateway::config::Config;
use auth_gateway::http_client::{HttpFetch, ReqwestFetcher};
use auth_gateway::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let idp = MockIdp::start().await;
///     let server = TestGatewayServer::spawn_jwks(&idp).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a gateway validating locally against `idp`'s JWKS.
    pub async fn spawn_jwks(idp: &MockIdp) -> Result<Self, anyhow::Error> {
        Self::spawn_with(idp, &[("TOKEN_VALIDATION_METHOD", "jwks")]).await
    }

    /// Spawn a gateway validating through `idp`'s introspection endpoint.
    pub async fn spawn_introspection(idp: &MockIdp) -> Result<Self, anyhow::Error> {
        Self::spawn_with(idp, &[("TOKEN_VALIDATION_METHOD", "introspection")]).await
    }

    /// Spawn a gateway pointed at `idp`, with extra environment overrides.
    pub async fn spawn_with(
        idp: &MockIdp,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("KEYCLOAK_URL".to_string(), idp.keycloak_url()),
            ("REALM_NAME".to_string(), idp.realm().to_string()),
            ("CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("CLIENT_SECRET".to_string(), TEST_CLIENT_SECRET.to_string()),
            ("IDP_HTTP_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        for (name, value) in overrides {
            vars.insert((*name).to_string(), (*value).to_string());
        }

        Self::spawn(&vars).await
    }

    /// Spawn a gateway from raw environment variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let fetcher: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(config.http_timeout));
        let validator = Arc::new(TokenValidator::from_config(&config, fetcher));
        let state = Arc::new(AppState {
            config: config.clone(),
            validator,
        });

        // A handle without a global recorder keeps parallel tests independent
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task when the test completes
        self._handle.abort();
    }
}
