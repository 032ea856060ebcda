//! Persistent settings store for sos-beacon.
//!
//! This module provides `SQLite`-backed key-value storage for the state the
//! contact book keeps between runs: the contact list, the user profile and the
//! two first-run flags.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Key holding the contact list as a JSON array.
pub const CONTACTS_KEY: &str = "emergencyContacts";

/// Key set once the default contacts have been seeded.
pub const CONTACTS_INITIALIZED_KEY: &str = "contactsInitialized";

/// Key holding the user profile as a JSON object.
pub const PROFILE_KEY: &str = "userProfile";

/// Key set once the default profile has been seeded.
pub const PROFILE_INITIALIZED_KEY: &str = "profileInitialized";

/// Value stored for a set flag.
const FLAG_SET: &str = "true";

/// Durable key-value store backed by `SQLite`.
#[derive(Debug)]
pub struct Store {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Store {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening settings store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        info!("Settings store opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a raw value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
            ",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a JSON value.
    ///
    /// A value that does not deserialize is reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring corrupt stored value");
                Ok(None)
            }
        }
    }

    /// Write a value as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Check whether a flag has been set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flag(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.as_deref() == Some(FLAG_SET))
    }

    /// Set a flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_flag(&self, key: &str) -> Result<()> {
        self.set(key, FLAG_SET)
    }
}
