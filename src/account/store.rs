use anyhow::Result;

use super::Account;

/// Uniform directory contract over a pluggable backend.
///
/// Missing rows are `Ok(None)`, never errors, in every implementation.
/// `put` is an upsert by id with last-writer-wins semantics; no optimistic
/// concurrency is required.
pub trait AccountStore: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Account>>;

    fn get_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Looks up the account holding the `(connector_id, subject)` link.
    fn get_by_external_ref(&self, connector_id: &str, subject: &str)
        -> Result<Option<Account>>;

    fn put(&self, account: &Account) -> Result<()>;

    fn delete(&self, id: &str) -> Result<()>;
}
