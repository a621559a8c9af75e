//! Bearer-token authentication gateway.
//!
//! Validates bearer tokens issued by an OpenID Connect identity provider
//! (Keycloak) and authorizes callers by scope and role.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth::TokenValidator -> { introspection, jwt -> jwks }
//!                                     -> auth::policy::authorize
//! ```
//!
//! Validators reach the identity provider only through the injected
//! [`http_client::HttpFetch`] capability.
//!
//! # Modules
//!
//! - `auth` - Claims, validators, key cache and authorization
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `http_client` - Outbound HTTP capability
//! - `middleware` - Authentication, authorization and metrics middleware
//! - `observability` - Metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod http_client;
pub mod middleware;
pub mod observability;
pub mod routes;
