//! Generic record persistence used by the persisted session table and the
//! user repository.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// A flat row of string fields keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Field lookup. `"id"` resolves to the record id.
    pub fn get(&self, key: &str) -> Option<&str> {
        if key == "id" {
            return Some(&self.id);
        }
        self.fields.get(key).map(String::as_str)
    }
}

/// Conjunction of `field == value` constraints. Empty criteria match
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    constraints: Vec<(String, String)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.constraints
            .iter()
            .all(|(field, value)| record.get(field) == Some(value.as_str()))
    }
}

/// Raw record persistence. Implementations must make each call atomic;
/// callers add no locking of their own.
pub trait RecordStore: Send + Sync {
    /// All records matching `criteria`, in storage order.
    fn search(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError>;

    /// Insert, or replace the record with the same id.
    fn save(&self, record: &Record) -> Result<(), StoreError>;

    /// Remove the record with this id. Deleting a missing record is a no-op.
    fn delete(&self, record: &Record) -> Result<(), StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn search(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        (**self).search(criteria)
    }

    fn save(&self, record: &Record) -> Result<(), StoreError> {
        (**self).save(record)
    }

    fn delete(&self, record: &Record) -> Result<(), StoreError> {
        (**self).delete(record)
    }
}

fn upsert(records: &mut Vec<Record>, record: &Record) {
    match records.iter_mut().find(|r| r.id == record.id) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
}

// ============================================================================
// In-memory table
// ============================================================================

/// Insertion-ordered table held in process memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn search(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| criteria.matches(r))
            .cloned()
            .collect())
    }

    fn save(&self, record: &Record) -> Result<(), StoreError> {
        upsert(&mut self.records.write(), record);
        Ok(())
    }

    fn delete(&self, record: &Record) -> Result<(), StoreError> {
        self.records.write().retain(|r| r.id != record.id);
        Ok(())
    }
}

// ============================================================================
// JSON file table
// ============================================================================

/// One table per JSON file, rewritten in full on every change.
/// A missing file is an empty table.
pub struct JsonFileRecordStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileRecordStore {
    /// Open (or lazily create) `<dir>/<table>.json`.
    pub fn open(dir: impl Into<PathBuf>, table: &str) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(format!("{}.json", table)),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Record>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, records: &[Record]) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), count = records.len(), "Wrote record table");
        Ok(())
    }
}

impl RecordStore for JsonFileRecordStore {
    fn search(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        let _guard = self.lock.lock();
        let mut records = self.load()?;
        records.retain(|r| criteria.matches(r));
        Ok(records)
    }

    fn save(&self, record: &Record) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut records = self.load()?;
        upsert(&mut records, record);
        self.write(&records)
    }

    fn delete(&self, record: &Record) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.id != record.id);
        if records.len() == before {
            return Ok(());
        }
        self.write(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, email: &str) -> Record {
        Record::new(id).with("email", email).with("role", "member")
    }

    #[test]
    fn test_criteria_matches_fields_and_id() {
        let record = sample("r1", "bob@example.com");
        assert!(Criteria::new().matches(&record));
        assert!(Criteria::new().field_eq("email", "bob@example.com").matches(&record));
        assert!(Criteria::new().field_eq("id", "r1").field_eq("role", "member").matches(&record));
        assert!(!Criteria::new()
            .field_eq("email", "bob@example.com")
            .field_eq("role", "admin")
            .matches(&record));
        assert!(!Criteria::new().field_eq("missing", "x").matches(&record));
    }

    #[test]
    fn test_memory_store_upsert_and_delete() {
        let store = MemoryRecordStore::new();
        store.save(&sample("r1", "a@example.com")).unwrap();
        store.save(&sample("r2", "b@example.com")).unwrap();
        store.save(&sample("r1", "c@example.com")).unwrap();
        assert_eq!(store.len(), 2);

        let found = store.search(&Criteria::new().field_eq("id", "r1")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("email"), Some("c@example.com"));

        store.delete(&found[0]).unwrap();
        store.delete(&found[0]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_search_preserves_insertion_order() {
        let store = MemoryRecordStore::new();
        store.save(&sample("z", "same@example.com")).unwrap();
        store.save(&sample("a", "same@example.com")).unwrap();
        let ids: Vec<_> = store
            .search(&Criteria::new().field_eq("email", "same@example.com"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path(), "sessions").unwrap();
        assert!(store.search(&Criteria::new()).unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileRecordStore::open(dir.path(), "users").unwrap();
            store.save(&sample("r1", "a@example.com")).unwrap();
            store.save(&sample("r2", "b@example.com")).unwrap();
            store.delete(&Record::new("r1")).unwrap();
        }

        let store = JsonFileRecordStore::open(dir.path(), "users").unwrap();
        let all = store.search(&Criteria::new()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "r2");
        assert_eq!(all[0].get("role"), Some("member"));
    }

    #[test]
    fn test_json_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path(), "sessions").unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        let result = store.search(&Criteria::new());
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
