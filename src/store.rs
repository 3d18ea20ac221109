use thiserror::Error;

use crate::record::{ChangeSet, Record};

/// Host convention: record deletions go in batches of at most 50.
pub const HOST_BATCH_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(String),
    #[error("batch of {got} records exceeds the limit of {limit}")]
    BatchTooLarge { got: usize, limit: usize },
    /// The host refused the operation.
    #[error("rejected by store: {0}")]
    Rejected(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid field data for record {id}: {source}")]
    FieldData {
        id: String,
        source: serde_json::Error,
    },
}

/// The narrow slice of the host record API the resolver consumes.
/// Single-cell reads go through `Record::value`.
pub trait RecordStore {
    /// All records with values for every field, in the store's
    /// enumeration order. "First" in a duplicate group means first
    /// in this sequence.
    fn fetch_all(&self) -> Result<Vec<Record>, StoreError>;

    /// Apply a change map to one record. May fail per call.
    fn update(&mut self, id: &str, changes: &ChangeSet) -> Result<(), StoreError>;

    /// Remove at most `batch_limit()` records in one call.
    fn delete_many(&mut self, ids: &[String]) -> Result<(), StoreError>;

    fn batch_limit(&self) -> usize {
        HOST_BATCH_LIMIT
    }
}

/// In-memory store for exercising the resolver without a database.
/// Keeps insertion order and journals every write so tests can assert
/// on exactly what was applied; failures are injectable per record.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<Record>,
    limit: usize,
    pub updates: Vec<(String, ChangeSet)>,
    pub delete_batches: Vec<Vec<String>>,
    pub fail_update_ids: std::collections::HashSet<String>,
    pub fail_deletes: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new(records: Vec<Record>) -> Self {
        MemoryStore {
            records,
            limit: HOST_BATCH_LIMIT,
            ..Default::default()
        }
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn fail_updates_on(mut self, ids: &[&str]) -> Self {
        self.fail_update_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
impl RecordStore for MemoryStore {
    fn fetch_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.records.clone())
    }

    fn update(&mut self, id: &str, changes: &ChangeSet) -> Result<(), StoreError> {
        if self.fail_update_ids.contains(id) {
            return Err(StoreError::Rejected(format!("injected update failure for {id}")));
        }
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        for (name, value) in changes {
            record.fields.insert(name.clone(), value.clone());
        }
        self.updates.push((id.to_string(), changes.clone()));
        Ok(())
    }

    fn delete_many(&mut self, ids: &[String]) -> Result<(), StoreError> {
        if ids.len() > self.limit {
            return Err(StoreError::BatchTooLarge {
                got: ids.len(),
                limit: self.limit,
            });
        }
        if self.fail_deletes {
            return Err(StoreError::Rejected("injected delete failure".into()));
        }
        self.records.retain(|r| !ids.contains(&r.id));
        self.delete_batches.push(ids.to_vec());
        Ok(())
    }

    fn batch_limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    #[test]
    fn memory_store_applies_updates() {
        let mut store = MemoryStore::new(vec![Record::new("rec1")]);
        let mut changes = ChangeSet::new();
        changes.insert("Name".into(), FieldValue::Text("Acme".into()));
        store.update("rec1", &changes).unwrap();
        assert_eq!(
            store.record("rec1").unwrap().value("Name").unwrap().as_text(),
            Some("Acme")
        );
        assert_eq!(store.updates.len(), 1);
    }

    #[test]
    fn memory_store_rejects_unknown_record() {
        let mut store = MemoryStore::new(vec![]);
        let err = store.update("rec9", &ChangeSet::new()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn memory_store_enforces_batch_limit() {
        let mut store = MemoryStore::new(vec![]).with_batch_limit(2);
        let ids: Vec<String> = (0..3).map(|i| format!("rec{i}")).collect();
        let err = store.delete_many(&ids).unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { got: 3, limit: 2 }));
    }
}
