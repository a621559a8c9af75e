//! Shared building blocks for the authentication gateway crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (header parsing, size limits, clock skew, RSA JWK decoding)
pub mod jwt;
