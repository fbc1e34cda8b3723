//! Core Store implementation

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::StoreError;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A record that can be persisted in the store
pub trait Record: Serialize + DeserializeOwned {
    /// Unique id within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection (directory) name for this record type
    fn collection_name() -> &'static str;
}

/// The main record store
#[derive(Debug, Clone)]
pub struct Store {
    /// Base path for storage
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| StoreError::io(&base_path, e))?;
        info!(?base_path, "Opened trip store");
        Ok(Self { base_path })
    }

    /// Base directory of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Insert or replace a record
    pub fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let id = record.id();
        debug!(%id, collection = R::collection_name(), "Store::put: called");
        let path = self.record_path::<R>(id)?;
        let dir = self.collection_dir::<R>();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let content = serde_json::to_vec_pretty(record)?;

        // Unique temp name so concurrent writers of the same id never share a temp file
        let tmp = dir.join(format!(".{}.{}.tmp", id, Uuid::now_v7()));
        fs::write(&tmp, content).map_err(|e| StoreError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(&path, e));
        }
        Ok(())
    }

    /// Get a record by id
    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>, StoreError> {
        debug!(%id, collection = R::collection_name(), "Store::get: called");
        let path = self.record_path::<R>(id)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let record = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(record))
    }

    /// List all records in a collection, most recently updated first
    ///
    /// Corrupt documents are skipped with a warning rather than failing the listing.
    pub fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        let dir = self.collection_dir::<R>();
        debug!(?dir, "Store::list: called");
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut records: Vec<R> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
            match serde_json::from_slice::<R>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupt record"),
            }
        }

        records.sort_by_key(|r| std::cmp::Reverse(r.updated_at()));
        Ok(records)
    }

    /// Delete a record, returning whether it existed
    pub fn delete<R: Record>(&self, id: &str) -> Result<bool, StoreError> {
        debug!(%id, collection = R::collection_name(), "Store::delete: called");
        let path = self.record_path::<R>(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn collection_dir<R: Record>(&self) -> PathBuf {
        self.base_path.join(R::collection_name())
    }

    fn record_path<R: Record>(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.collection_dir::<R>().join(format!("{}.json", id)))
    }
}

/// Ids become file names, so keep them to a safe alphabet
fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}
