//! Core ContactStore implementation

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Source tag applied to contacts added without an explicit source
pub const DEFAULT_SOURCE: &str = "local";

/// Errors from contact store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single contact record
///
/// Contacts are uniquely identified by `(identifier, source)`. Two contacts
/// from different sources with the same identifier remain distinct records;
/// reconciliation happens in the roster, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Canonical identifier value (e.g. an email-like handle)
    pub identifier: String,

    /// Originating source tag
    pub source: String,

    /// Additional attributes (display name, avatar URL, ...)
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Contact {
    /// Create a contact with the default source and no extra attributes
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: DEFAULT_SOURCE.to_string(),
            attributes: serde_json::Map::new(),
        }
    }

    /// Create a contact tagged with an explicit source
    pub fn from_source(identifier: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            source: source.into(),
            attributes: serde_json::Map::new(),
        }
    }
}

/// SQLite-backed contact store
///
/// The handle survives `close`: the connection is dropped, and any later
/// operation reopens it on demand. A close while other work is in flight can
/// therefore never wedge subsequent reads.
pub struct ContactStore {
    path: PathBuf,
    conn: Option<Connection>,
}

impl ContactStore {
    /// Open or create a contact store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self { path, conn: None };
        store.conn()?;
        debug!(path = %store.path.display(), "Opened contact store");
        Ok(store)
    }

    /// Get the live connection, reopening it if the store was closed
    fn conn(&mut self) -> Result<&mut Connection, StoreError> {
        if self.conn.is_none() {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(&self.path)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS contacts (
                    id          INTEGER PRIMARY KEY,
                    identifier  TEXT NOT NULL,
                    source      TEXT NOT NULL,
                    attributes  TEXT NOT NULL DEFAULT '{}',
                    created_at  TEXT NOT NULL,
                    UNIQUE(identifier, source)
                );",
            )?;
            self.conn = Some(conn);
        }
        Ok(self.conn.as_mut().expect("connection just opened"))
    }

    /// Whether the underlying connection is currently open
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// All stored contacts, in insertion order
    pub fn all(&mut self) -> Result<Vec<Contact>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT identifier, source, attributes FROM contacts ORDER BY id")?;
        let rows = stmt.query_map([], row_to_contact)?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row??);
        }
        Ok(contacts)
    }

    /// All stored contacts tagged with the given source, in insertion order
    pub fn by_source(&mut self, source: &str) -> Result<Vec<Contact>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT identifier, source, attributes FROM contacts WHERE source = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![source], row_to_contact)?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row??);
        }
        Ok(contacts)
    }

    /// Add a single contact (upsert on `(identifier, source)`)
    ///
    /// An existing record keeps its position; only its attributes are updated.
    pub fn add(&mut self, contact: &Contact) -> Result<(), StoreError> {
        debug!(identifier = %contact.identifier, source = %contact.source, "ContactStore::add");
        let attributes = serde_json::to_string(&contact.attributes)?;
        let created_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO contacts (identifier, source, attributes, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(identifier, source) DO UPDATE SET attributes = excluded.attributes",
            params![contact.identifier, contact.source, attributes, created_at],
        )?;
        Ok(())
    }

    /// Replace every contact tagged `source` with the given list
    ///
    /// Not an incremental merge: previously stored contacts from that source
    /// that are absent from `contacts` are dropped. Runs in a transaction, so
    /// a failed insert leaves the previous records intact.
    pub fn replace_source_contacts(&mut self, contacts: &[Contact], source: &str) -> Result<(), StoreError> {
        debug!(source, count = contacts.len(), "ContactStore::replace_source_contacts");
        let created_at = chrono::Utc::now().to_rfc3339();

        let mut encoded = Vec::with_capacity(contacts.len());
        for contact in contacts {
            encoded.push(serde_json::to_string(&contact.attributes)?);
        }

        let conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM contacts WHERE source = ?1", params![source])?;
        for (contact, attributes) in contacts.iter().zip(&encoded) {
            tx.execute(
                "INSERT INTO contacts (identifier, source, attributes, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(identifier, source) DO UPDATE SET attributes = excluded.attributes",
                params![contact.identifier, source, attributes, created_at],
            )?;
        }
        tx.commit()?;

        info!(source, count = contacts.len(), "Replaced source contacts");
        Ok(())
    }

    /// Remove every contact tagged `source`, returning how many were dropped
    pub fn remove_source(&mut self, source: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let dropped = conn.execute("DELETE FROM contacts WHERE source = ?1", params![source])?;
        info!(source, dropped, "Removed source contacts");
        Ok(dropped)
    }

    /// Close the underlying connection
    ///
    /// The handle stays usable: the next operation reopens the database.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!(path = %self.path.display(), "Closed contact store");
        }
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Contact, serde_json::Error>> {
    let identifier: String = row.get(0)?;
    let source: String = row.get(1)?;
    let attributes: String = row.get(2)?;
    Ok(serde_json::from_str(&attributes).map(|attributes| Contact {
        identifier,
        source,
        attributes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> ContactStore {
        ContactStore::open(temp.path().join("contacts.db")).unwrap()
    }

    #[test]
    fn test_add_and_all() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        store.add(&Contact::new("foo")).unwrap();
        store.add(&Contact::new("bar")).unwrap();

        let contacts = store.all().unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].identifier, "foo");
        assert_eq!(contacts[0].source, DEFAULT_SOURCE);
        assert_eq!(contacts[1].identifier, "bar");
    }

    #[test]
    fn test_add_is_upsert() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        let mut contact = Contact::new("foo");
        store.add(&contact).unwrap();

        contact
            .attributes
            .insert("fullName".to_string(), serde_json::json!("Foo Bar"));
        store.add(&contact).unwrap();

        let contacts = store.all().unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].attributes["fullName"], "Foo Bar");
    }

    #[test]
    fn test_same_identifier_distinct_sources() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        store.add(&Contact::from_source("foo", "google")).unwrap();
        store.add(&Contact::from_source("foo", "talkie")).unwrap();

        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn test_replace_source_contacts_drops_stale() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        store.add(&Contact::from_source("old1", "google")).unwrap();
        store.add(&Contact::from_source("old2", "google")).unwrap();
        store.add(&Contact::from_source("keep", "other")).unwrap();

        let fresh = vec![
            Contact::from_source("new1", "google"),
            Contact::from_source("old2", "google"),
        ];
        store.replace_source_contacts(&fresh, "google").unwrap();

        let google: Vec<String> = store
            .by_source("google")
            .unwrap()
            .into_iter()
            .map(|c| c.identifier)
            .collect();
        assert_eq!(google, vec!["new1", "old2"]);

        // Other sources untouched
        assert_eq!(store.by_source("other").unwrap().len(), 1);
    }

    #[test]
    fn test_close_then_reopen_on_demand() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        store.add(&Contact::new("foo")).unwrap();
        store.close();
        assert!(!store.is_open());

        // Next operation reopens the database
        let contacts = store.all().unwrap();
        assert_eq!(contacts.len(), 1);
        assert!(store.is_open());
    }

    #[test]
    fn test_attributes_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        let mut contact = Contact::from_source("foo", "google");
        contact
            .attributes
            .insert("fullName".to_string(), serde_json::json!("Foo Bar"));
        contact.attributes.insert("phone".to_string(), serde_json::json!(1234));
        store.add(&contact).unwrap();

        let stored = store.all().unwrap();
        assert_eq!(stored[0], contact);
    }

    #[test]
    fn test_remove_source() {
        let temp = TempDir::new().unwrap();
        let mut store = open_store(&temp);

        store.add(&Contact::from_source("a", "google")).unwrap();
        store.add(&Contact::from_source("b", "google")).unwrap();
        store.add(&Contact::new("c")).unwrap();

        assert_eq!(store.remove_source("google").unwrap(), 2);
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_open_fails_on_directory_path() {
        let temp = TempDir::new().unwrap();
        // Opening a path that is an existing directory must fail, not panic
        assert!(ContactStore::open(temp.path()).is_err());
    }
}
