//! # Auth Test Utilities
//!
//! Shared test utilities for the auth gateway.
//!
//! This crate provides:
//! - Deterministic RSA fixtures (fixed keys for reproducible tests)
//! - Test data builders (TestTokenBuilder)
//! - A scripted `HttpFetch` implementation (MockFetcher)
//! - Mock identity provider endpoints on wiremock (MockIdp)
//! - Server test harness (TestGatewayServer for E2E tests)
//! - Fixed test IDs and constants
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestRsaKey::primary();
//!     let idp = MockIdp::start().await;
//!     idp.mount_jwks(&[&key]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .issued_by(&idp.issuer())
//!         .with_scope("events-api-access")
//!         .sign(&key);
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_fetcher;
pub mod mock_idp;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_fetcher::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
