//! In-memory implementation of StateStore for tests and local runs

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{StateDataError, StateRecord, StateStore};

type RecordKey = (String, String, u64);

/// In-memory state store
///
/// Backed by `RwLock<HashMap>`; provides the same addressing semantics as a
/// real keyed backend so client tests exercise the full read/write paths,
/// including blob offload.
#[derive(Default)]
pub struct InMemoryStateStore {
    records: RwLock<HashMap<RecordKey, StateRecord>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Number of offloaded blobs currently held
    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }

    /// Drop all data (for tests)
    pub fn clear(&self) {
        self.records.write().clear();
        self.blobs.write().clear();
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put_record(&self, record: StateRecord) -> Result<(), StateDataError> {
        let key = (
            record.store.clone(),
            record.partition_key.clone(),
            record.sort_key,
        );
        self.records.write().insert(key, record);
        Ok(())
    }

    async fn get_record(
        &self,
        store: &str,
        partition_key: &str,
        sort_key: u64,
    ) -> Result<Option<StateRecord>, StateDataError> {
        let key = (store.to_string(), partition_key.to_string(), sort_key);
        Ok(self.records.read().get(&key).cloned())
    }

    async fn list_records(
        &self,
        store: &str,
        partition_key: &str,
    ) -> Result<Vec<StateRecord>, StateDataError> {
        let records = self.records.read();
        let mut matching: Vec<StateRecord> = records
            .values()
            .filter(|record| record.store == store && record.partition_key == partition_key)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.sort_key);
        Ok(matching)
    }

    async fn put_blob(&self, blob_key: &str, bytes: Vec<u8>) -> Result<(), StateDataError> {
        self.blobs.write().insert(blob_key.to_string(), bytes);
        Ok(())
    }

    async fn get_blob(&self, blob_key: &str) -> Result<Option<Vec<u8>>, StateDataError> {
        Ok(self.blobs.read().get(blob_key).cloned())
    }
}
