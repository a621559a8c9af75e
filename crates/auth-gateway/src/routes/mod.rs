//! HTTP routes for the gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::{AuthorizationPolicy, TokenValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, require_policy, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Validator selected at startup.
    pub validator: Arc<TokenValidator>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/v1/me` - Current caller - requires authentication and `REQUIRED_SCOPE`
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        validator: state.validator.clone(),
        realm: state.config.realm.clone(),
    });
    let me_policy = Arc::new(
        AuthorizationPolicy::all().with_scopes([state.config.required_scope.clone()]),
    );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes. The last route_layer added runs first, so
    // authentication wraps authorization.
    let protected_routes = Router::new()
        .route("/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(me_policy, require_policy))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    // Merge routes and apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
