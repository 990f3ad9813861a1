//! SQLite-backed account directory.
//!
//! Document-style layout: each row carries the full account JSON keyed by
//! id, with the email and external refs broken out into columns so lookups
//! stay indexed.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{Account, AccountStore};

const SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA: &str = "
CREATE TABLE account (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    doc TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE account_external_ref (
    connector_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    account_id TEXT NOT NULL REFERENCES account(id) ON DELETE CASCADE,
    UNIQUE (connector_id, subject)
);
CREATE INDEX idx_external_ref_account ON account_external_ref(account_id);
";

#[derive(Clone)]
pub struct SqliteAccountStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAccountStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let exists = db_path.as_ref().exists();
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open {:?}", db_path.as_ref()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if exists {
            let version: i64 = conn
                .query_row("PRAGMA user_version;", [], |row| row.get(0))
                .context("Failed to read database version")?;
            if version != SCHEMA_VERSION {
                bail!(
                    "Account database version {} does not match expected {}",
                    version,
                    SCHEMA_VERSION
                );
            }
        } else {
            info!("Creating account database at {:?}", db_path.as_ref());
            conn.execute_batch(CREATE_SCHEMA)?;
            conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn parse_doc(doc: String) -> Result<Account> {
        serde_json::from_str(&doc).context("Corrupt account document")
    }
}

impl AccountStore for SqliteAccountStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM account WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(Self::parse_doc).transpose()
    }

    fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM account WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(Self::parse_doc).transpose()
    }

    fn get_by_external_ref(
        &self,
        connector_id: &str,
        subject: &str,
    ) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let doc: Option<String> = conn
            .query_row(
                "SELECT a.doc FROM account a
                 JOIN account_external_ref r ON r.account_id = a.id
                 WHERE r.connector_id = ?1 AND r.subject = ?2",
                params![connector_id, subject],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(Self::parse_doc).transpose()
    }

    fn put(&self, account: &Account) -> Result<()> {
        let doc = serde_json::to_string(account)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO account (id, email, doc, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET email = ?2, doc = ?3, updated_at = ?4",
            params![
                account.id,
                account.email,
                doc,
                account.updated_at.timestamp()
            ],
        )?;

        tx.execute(
            "DELETE FROM account_external_ref WHERE account_id = ?1",
            params![account.id],
        )?;
        for r in &account.external_refs {
            tx.execute(
                "INSERT INTO account_external_ref (connector_id, subject, account_id)
                 VALUES (?1, ?2, ?3)",
                params![r.connector_id, r.subject, account.id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM account WHERE id = ?1", params![id])?;
        Ok(())
    }
}
