//! Fixed test IDs for deterministic tests
//!
//! All identifiers are constants so failures reproduce exactly.

// Realm and clients
pub const TEST_REALM: &str = "events";
pub const TEST_CLIENT_ID: &str = "events-api";
pub const TEST_CLIENT_SECRET: &str = "test-secret-do-not-use-in-production";

// Signing key IDs
pub const TEST_KEY_ID_1: &str = "test-rsa-key-01";
pub const TEST_KEY_ID_2: &str = "test-rsa-key-02";

// Subjects
pub const TEST_SUBJECT_ALICE: &str = "6f1c2a9e-0000-4000-8000-000000000100";
pub const TEST_SUBJECT_BOB: &str = "6f1c2a9e-0000-4000-8000-000000000101";
pub const TEST_USERNAME_ALICE: &str = "alice";
pub const TEST_USERNAME_BOB: &str = "bob";

// Scopes
pub const SCOPE_EVENTS_API_ACCESS: &str = "events-api-access";
pub const SCOPE_EVENTS_READ: &str = "events:read";
pub const SCOPE_EVENTS_WRITE: &str = "events:write";

// Roles
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_ORGANIZER: &str = "organizer";
