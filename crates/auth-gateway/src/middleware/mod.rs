//! Middleware for the gateway.
//!
//! # Components
//!
//! - `auth` - Bearer authentication and per-route authorization
//! - `http_metrics` - Request/response metrics for every route

pub mod auth;
pub mod http_metrics;

pub use auth::{extract_bearer_token, require_auth, require_policy, AuthState, ClaimsExt};
pub use http_metrics::http_metrics_middleware;
