//! In-memory account directory, used by tests and as the fallback backend
//! when no database path is configured. All data is lost on restart.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use super::{Account, AccountStore};

#[derive(Default)]
pub struct MemoryAccountStore {
    data: Mutex<HashMap<String, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.data.lock().unwrap().get(id).cloned())
    }

    fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    fn get_by_external_ref(
        &self,
        connector_id: &str,
        subject: &str,
    ) -> Result<Option<Account>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .values()
            .find(|a| a.external_ref(connector_id, subject).is_some())
            .cloned())
    }

    fn put(&self, account: &Account) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.data.lock().unwrap().remove(id);
        Ok(())
    }
}
