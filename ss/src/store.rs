//! Core SpaStore implementation

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from SPA store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A stored service provider adapter configuration
///
/// Immutable once stored; the worker reads these at load time and never
/// writes them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaSpec {
    /// Human-readable adapter name (unique within the store)
    pub name: String,

    /// Locator the adapter instance is constructed from
    pub source_locator: String,

    /// Opaque credentials handed to the adapter's connect
    #[serde(default)]
    pub credentials: serde_json::Value,
}

impl SpaSpec {
    pub fn new(name: impl Into<String>, source_locator: impl Into<String>, credentials: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            source_locator: source_locator.into(),
            credentials,
        }
    }
}

/// JSONL-file-backed store of enabled SPA configurations
///
/// One spec per line. Writes rewrite the whole file under an exclusive
/// advisory lock; the file is small (a handful of adapters at most).
pub struct SpaStore {
    path: PathBuf,
}

impl SpaStore {
    /// Open or create a SPA store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "Opened SPA store");
        Ok(Self { path })
    }

    /// All stored configurations, in stored order
    pub fn all(&self) -> Result<Vec<SpaSpec>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut specs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            specs.push(serde_json::from_str(&line)?);
        }
        Ok(specs)
    }

    /// Look up a configuration by name
    pub fn get(&self, name: &str) -> Result<Option<SpaSpec>, StoreError> {
        Ok(self.all()?.into_iter().find(|spec| spec.name == name))
    }

    /// Store a configuration, replacing any existing spec with the same name
    pub fn store(&self, spec: &SpaSpec) -> Result<(), StoreError> {
        debug!(name = %spec.name, source_locator = %spec.source_locator, "SpaStore::store");
        let mut specs = self.all()?;
        specs.retain(|existing| existing.name != spec.name);
        specs.push(spec.clone());
        self.rewrite(&specs)?;
        info!(name = %spec.name, "Stored SPA configuration");
        Ok(())
    }

    /// Remove a configuration by name, returning whether it existed
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let mut specs = self.all()?;
        let before = specs.len();
        specs.retain(|existing| existing.name != name);
        if specs.len() == before {
            return Ok(false);
        }
        self.rewrite(&specs)?;
        info!(name, "Removed SPA configuration");
        Ok(true)
    }

    fn rewrite(&self, specs: &[SpaSpec]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut lines = String::new();
        for spec in specs {
            lines.push_str(&serde_json::to_string(spec)?);
            lines.push('\n');
        }

        let result = (|| {
            file.set_len(0)?;
            let mut file = &file;
            file.write_all(lines.as_bytes())?;
            file.flush()
        })();

        fs2::FileExt::unlock(&file)?;
        result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> SpaStore {
        SpaStore::open(temp.path().join("spa.jsonl")).unwrap()
    }

    #[test]
    fn test_all_on_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_store_and_all_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let spec = SpaSpec::new("Random SPA", "/path/to/spa", json!({"creds": true}));
        store.store(&spec).unwrap();

        let specs = store.all().unwrap();
        assert_eq!(specs, vec![spec]);
    }

    #[test]
    fn test_store_replaces_by_name() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store
            .store(&SpaSpec::new("talkie", "http://one.example", json!({})))
            .unwrap();
        store
            .store(&SpaSpec::new("talkie", "http://two.example", json!({})))
            .unwrap();

        let specs = store.all().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].source_locator, "http://two.example");
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("spa.jsonl");

        let store = SpaStore::open(&path).unwrap();
        store
            .store(&SpaSpec::new("talkie", "http://spa.example", json!({"token": "t"})))
            .unwrap();
        drop(store);

        let reopened = SpaStore::open(&path).unwrap();
        let specs = reopened.all().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].credentials, json!({"token": "t"}));
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.store(&SpaSpec::new("a", "http://a.example", json!({}))).unwrap();
        store.store(&SpaSpec::new("b", "http://b.example", json!({}))).unwrap();

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn test_get_by_name() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.store(&SpaSpec::new("a", "http://a.example", json!({}))).unwrap();

        assert!(store.get("a").unwrap().is_some());
        assert!(store.get("missing").unwrap().is_none());
    }
}
