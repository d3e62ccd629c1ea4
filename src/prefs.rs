// Remembered client-side preferences in a small SQLite table

use rusqlite::{Connection, OptionalExtension};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;

/// Key-value preferences scoped to a namespace.
///
/// Values are stored as JSON text. Reads never fail: a missing or
/// undecodable value yields the caller's fallback.
pub struct Prefs {
    db: Connection,
    namespace: String,
}

impl Prefs {
    /// Open or create the preferences database at `path`
    pub fn open<P: AsRef<Path>>(path: P, namespace: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let db = Connection::open(path)?;
        debug!(path = %path.display(), namespace, "Opened preferences");
        Self::init(db, namespace)
    }

    /// Preferences that live only as long as this value
    pub fn in_memory(namespace: &str) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, namespace)
    }

    fn init(db: Connection, namespace: &str) -> Result<Self> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS prefs (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value_json TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )?;

        Ok(Self {
            db,
            namespace: namespace.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Stored value for `key`, or `fallback`
    pub fn get<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.load(key) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => value,
                Err(e) => {
                    warn!(key, error = %e, "Undecodable preference, using fallback");
                    fallback
                }
            },
            Ok(None) => fallback,
            Err(e) => {
                warn!(key, error = %e, "Failed to read preference, using fallback");
                fallback
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.db.execute(
            "INSERT OR REPLACE INTO prefs (namespace, key, value_json) VALUES (?1, ?2, ?3)",
            rusqlite::params![self.namespace, key, json],
        )?;
        debug!(key, "Preference saved");
        Ok(())
    }

    /// Forget `key`; returns whether it was stored
    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.db.execute(
            "DELETE FROM prefs WHERE namespace = ?1 AND key = ?2",
            rusqlite::params![self.namespace, key],
        )?;
        Ok(removed > 0)
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        let json = self
            .db
            .query_row(
                "SELECT value_json FROM prefs WHERE namespace = ?1 AND key = ?2",
                rusqlite::params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json)
    }
}
