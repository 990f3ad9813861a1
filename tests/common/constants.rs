//! Constants shared by the end-to-end tests.

pub const TEST_CLIENT_ID: &str = "c1";
pub const TEST_REDIRECT_URI: &str = "https://rp/cb";
pub const TEST_RESOURCE_INDICATOR: &str = "https://api.rp";

pub const TEST_EMAIL: &str = "alice@x.com";
pub const TEST_PASSWORD: &str = "p@ss";
pub const SUSPENDED_EMAIL: &str = "mallory@x.com";

/// Verifier/challenge pair from RFC 7636 appendix B.
pub const TEST_CODE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const TEST_CODE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

pub const TEST_KID: &str = "test-kid-1";

// base64("integration-test-envelope-secret")
pub const TEST_HMAC_SECRET: &str = "aW50ZWdyYXRpb24tdGVzdC1lbnZlbG9wZS1zZWNyZXQ=";

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
