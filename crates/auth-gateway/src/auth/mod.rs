//! Token validation and authorization.
//!
//! - `claims` - Validated caller identity
//! - `introspection` - Remote validation (RFC 7662)
//! - `jwks` - Cached identity-provider signing keys
//! - `jwt` - Local RSA JWT validation
//! - `roles` - Provider-specific role extraction
//! - `validator` - Strategy selection
//! - `policy` - Scope/role authorization

pub mod claims;
pub mod introspection;
pub mod jwks;
pub mod jwt;
pub mod policy;
pub mod roles;
pub mod validator;

pub use claims::AuthClaims;
pub use introspection::{IntrospectionResponse, IntrospectionValidator};
pub use jwks::{KeySetCache, VerificationKey};
pub use jwt::JwksValidator;
pub use policy::{authorize, AuthorizationPolicy, Decision};
pub use roles::RoleClaimPath;
pub use validator::{TokenValidator, ValidatorSelection};
