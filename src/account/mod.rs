//! Accounts and the directory contract over pluggable backends.

mod memory;
mod sqlite;
mod store;

pub use memory::MemoryAccountStore;
pub use sqlite::SqliteAccountStore;
pub use store::AccountStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Created but email not yet verified.
    Pending,
    /// Active, may log in and redeem codes.
    Active,
    /// Cannot log in or perform actions.
    Suspended,
}

/// Link between a local account and an upstream identity.
/// A `(connector_id, subject)` pair is unique across all accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub connector_id: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<ExternalRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Verifies a password attempt against the stored bcrypt digest.
    /// An account without a digest rejects every attempt.
    pub fn check_password(&self, password: &str) -> bool {
        match &self.password_hash {
            None => false,
            Some(hash) => bcrypt::verify(password, hash).unwrap_or(false),
        }
    }

    pub fn external_ref(&self, connector_id: &str, subject: &str) -> Option<&ExternalRef> {
        self.external_refs
            .iter()
            .find(|r| r.connector_id == connector_id && r.subject == subject)
    }
}

#[cfg(not(feature = "test-fast-hasher"))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(feature = "test-fast-hasher")]
const BCRYPT_COST: u32 = 4;

/// Hashes a plaintext password for out-of-band provisioning.
pub fn hash_password(plain: &str) -> Result<String> {
    Ok(bcrypt::hash(plain, BCRYPT_COST)?)
}
