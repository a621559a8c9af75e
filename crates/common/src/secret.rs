//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] so every gateway crate wraps sensitive material
//! the same way. `SecretString` has a redacting `Debug`, so a struct that
//! derives `Debug` stays safe to trace even when it holds the introspection
//! client secret. The inner value is zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct IntrospectionCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = IntrospectionCredentials {
//!     client_id: "events-api".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```
//!
//! Raw bearer tokens are short-lived request data and are passed as `&str`;
//! they are never stored, so they do not need wrapping. Anything that is
//! configured once and kept for the process lifetime does.

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_client_secret_debug_is_redacted() {
        let secret = SecretString::from("introspection-secret");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("introspection-secret"));
    }

    #[test]
    fn test_credentials_deserialize_without_leaking() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct ClientCredentials {
            client_id: String,
            client_secret: SecretString,
        }

        let json = r#"{"client_id": "events-api", "client_secret": "from-vault"}"#;
        let creds: ClientCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.client_secret.expose_secret(), "from-vault");

        let debug = format!("{creds:?}");
        assert!(debug.contains("events-api"));
        assert!(!debug.contains("from-vault"));
    }

    #[test]
    fn test_clone_preserves_value() {
        let secret = SecretString::from("cloneable");
        assert_eq!(secret.clone().expose_secret(), "cloneable");
    }
}
