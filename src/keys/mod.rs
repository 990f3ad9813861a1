//! Signing-key lifecycle: persisted RSA private keys, their store contract,
//! and the manager that signs JWTs and publishes the JWKS.

mod manager;
mod store;

pub use manager::{Jwk, JwkSet, KeyManager};
pub use store::{KeyStore, MemoryKeyStore, SqliteKeyStore};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;

/// A persisted RSA signing key. PKCS#1 PEM, 4096 bits.
/// Keys are append-only and never expire; `created_at` is recorded so a
/// future rotation scheme can pick the newest key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateKey {
    pub kid: String,
    pub private_key_pem: String,
    pub created_at: DateTime<Utc>,
}

pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Claims carried by both the access token and the ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub iat: i64,
    pub auth_time: i64,
    pub nbf: i64,
    pub exp: i64,
    pub email: String,
    pub email_verified: bool,
    pub name: String,
    pub picture: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    pub fn for_account(
        issuer: &str,
        audience: &str,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Self {
        let now_ts = now.timestamp();
        Self {
            iss: issuer.to_string(),
            aud: audience.to_string(),
            sub: account.id.clone(),
            iat: now_ts,
            auth_time: now_ts,
            nbf: now_ts,
            exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
            email: account.email.clone(),
            email_verified: true,
            name: account.name.clone(),
            picture: account.picture.clone(),
            roles: account.roles.clone(),
        }
    }
}
