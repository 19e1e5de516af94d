//! # State Data Client
//!
//! Cross-step payload exchange for tasks whose data is too large or too
//! awkward to flow through the orchestrator's step-input/step-output channel.
//! Writes are namespaced by workflow run, so parallel runs never see each
//! other's items; `global` variants take an explicit partition key for data
//! shared across runs.
//!
//! List storage exists for fan-out steps: `put_items` writes one record per
//! element and returns a metadata marker whose `items` field has one `1` per
//! element, which the orchestrator can iterate to spawn branches without
//! loading the data. Each branch then calls the `*_for_map_iteration`
//! helpers with its step payload (`items_result_key` and `context_index`)
//! to read or write its own element.
//!
//! Payloads whose serialized size exceeds [`ITEM_SIZE_THRESHOLD_BYTES`] are
//! offloaded to blob storage and rehydrated transparently on read.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::store::{RecordPayload, StateDataError, StateRecord, StateStore};

/// Serialized payloads above this size are offloaded to blob storage
///
/// Keeps records comfortably under keyed-store item limits.
pub const ITEM_SIZE_THRESHOLD_BYTES: usize = 262_144;

/// Default item lifetime
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Where a stored item lives, returned by every `put_*` operation
///
/// Small enough to pass downstream through the orchestrator's payload
/// channel; the receiving task hands it back to its own client to read the
/// data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateItemMeta {
    /// Logical store the item was written to
    pub store: String,

    /// Full partition key, including any namespace prefix
    pub partition_key: String,

    /// Caller-supplied key for namespaced single items and lists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// One marker per stored list element, for fan-out iteration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<u8>>,
}

/// Namespaced put/get of structured items keyed by workflow run
pub struct StateDataClient {
    store: Arc<dyn StateStore>,
    store_name: String,
    namespace: String,
    ttl_days: i64,
}

impl StateDataClient {
    /// Create a client writing to `store_name` under the given namespace
    ///
    /// The namespace is the workflow-run identifier; every non-global
    /// operation prefixes partition keys with it.
    pub fn new(
        store: Arc<dyn StateStore>,
        store_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            store_name: store_name.into(),
            namespace: namespace.into(),
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    /// Set the item lifetime in days
    pub fn with_ttl_days(mut self, ttl_days: i64) -> Self {
        self.ttl_days = ttl_days;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Store one item under this run's namespace
    pub async fn put_item(&self, key: &str, data: &Value) -> Result<StateItemMeta, StateDataError> {
        let partition_key = self.namespaced(key);
        self.write(&self.store_name, &partition_key, 0, data).await?;
        Ok(StateItemMeta {
            store: self.store_name.clone(),
            partition_key,
            key: Some(key.to_string()),
            items: None,
        })
    }

    /// Read one item stored under this run's namespace
    pub async fn get_item(&self, key: &str) -> Result<Value, StateDataError> {
        self.read(&self.store_name, &self.namespaced(key), 0).await
    }

    /// Store one item under an explicit partition key, visible across runs
    pub async fn put_global_item(
        &self,
        store: &str,
        partition_key: &str,
        index: u64,
        data: &Value,
    ) -> Result<StateItemMeta, StateDataError> {
        self.write(store, partition_key, index, data).await?;
        Ok(StateItemMeta {
            store: store.to_string(),
            partition_key: partition_key.to_string(),
            key: None,
            items: None,
        })
    }

    /// Read an item stored under an explicit partition key
    pub async fn get_global_item(
        &self,
        store: &str,
        partition_key: &str,
        index: u64,
    ) -> Result<Value, StateDataError> {
        self.read(store, partition_key, index).await
    }

    /// Store a list under this run's namespace, one record per element
    pub async fn put_items(
        &self,
        key: &str,
        items: &[Value],
    ) -> Result<StateItemMeta, StateDataError> {
        let partition_key = self.namespaced(key);
        self.write_list(&self.store_name, &partition_key, items)
            .await?;
        Ok(StateItemMeta {
            store: self.store_name.clone(),
            partition_key,
            key: Some(key.to_string()),
            items: Some(vec![1; items.len()]),
        })
    }

    /// Read back a list stored under this run's namespace
    pub async fn get_items(&self, key: &str) -> Result<Vec<Value>, StateDataError> {
        self.read_list(&self.store_name, &self.namespaced(key)).await
    }

    /// Store a list under an explicit partition key, visible across runs
    pub async fn put_global_items(
        &self,
        store: &str,
        partition_key: &str,
        items: &[Value],
    ) -> Result<StateItemMeta, StateDataError> {
        self.write_list(store, partition_key, items).await?;
        Ok(StateItemMeta {
            store: store.to_string(),
            partition_key: partition_key.to_string(),
            key: None,
            items: Some(vec![1; items.len()]),
        })
    }

    /// Read a list stored under an explicit partition key
    pub async fn get_global_items(
        &self,
        store: &str,
        partition_key: &str,
    ) -> Result<Vec<Value>, StateDataError> {
        self.read_list(store, partition_key).await
    }

    /// Store this branch's element during a fan-out step
    ///
    /// The step payload must carry `items_result_key` (the list key) and
    /// `context_index` (this branch's position).
    pub async fn put_item_for_map_iteration(
        &self,
        event: &Value,
        data: &Value,
    ) -> Result<StateItemMeta, StateDataError> {
        let key = event_str(event, "items_result_key")?;
        let index = event_index(event)?;
        let partition_key = self.namespaced(key);
        self.write(&self.store_name, &partition_key, index, data)
            .await?;
        Ok(StateItemMeta {
            store: self.store_name.clone(),
            partition_key,
            key: Some(key.to_string()),
            items: None,
        })
    }

    /// Read this branch's element during a fan-out step
    pub async fn get_item_for_map_iteration(
        &self,
        event: &Value,
    ) -> Result<Value, StateDataError> {
        let key = event_str(event, "items_result_key")?;
        let index = event_index(event)?;
        self.read(&self.store_name, &self.namespaced(key), index)
            .await
    }

    /// Store this branch's element under an explicit partition key
    ///
    /// The step payload must carry `items_result_store`,
    /// `items_result_partition_key`, and `context_index`.
    pub async fn put_global_item_for_map_iteration(
        &self,
        event: &Value,
        data: &Value,
    ) -> Result<StateItemMeta, StateDataError> {
        let store = event_str(event, "items_result_store")?;
        let partition_key = event_str(event, "items_result_partition_key")?;
        let index = event_index(event)?;
        self.write(store, partition_key, index, data).await?;
        Ok(StateItemMeta {
            store: store.to_string(),
            partition_key: partition_key.to_string(),
            key: None,
            items: None,
        })
    }

    /// Read this branch's element from an explicit partition key
    pub async fn get_global_item_for_map_iteration(
        &self,
        event: &Value,
    ) -> Result<Value, StateDataError> {
        let store = event_str(event, "items_result_store")?;
        let partition_key = event_str(event, "items_result_partition_key")?;
        let index = event_index(event)?;
        self.read(store, partition_key, index).await
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Some(Utc::now() + Duration::days(self.ttl_days))
    }

    fn blob_key(store: &str, partition_key: &str, sort_key: u64) -> String {
        format!("{store}/{partition_key}/{sort_key}")
    }

    async fn write(
        &self,
        store: &str,
        partition_key: &str,
        sort_key: u64,
        data: &Value,
    ) -> Result<(), StateDataError> {
        let serialized = serde_json::to_vec(data)?;
        let payload = if serialized.len() > ITEM_SIZE_THRESHOLD_BYTES {
            let blob_key = Self::blob_key(store, partition_key, sort_key);
            debug!(
                blob_key = %blob_key,
                size = serialized.len(),
                "payload over threshold, offloading to blob storage"
            );
            self.store.put_blob(&blob_key, serialized).await?;
            RecordPayload::Blob { blob_key }
        } else {
            RecordPayload::Inline { data: data.clone() }
        };

        self.store
            .put_record(StateRecord {
                store: store.to_string(),
                partition_key: partition_key.to_string(),
                sort_key,
                payload,
                expires_at: self.expires_at(),
            })
            .await
    }

    async fn write_list(
        &self,
        store: &str,
        partition_key: &str,
        items: &[Value],
    ) -> Result<(), StateDataError> {
        for (index, item) in items.iter().enumerate() {
            self.write(store, partition_key, index as u64, item).await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        store: &str,
        partition_key: &str,
        sort_key: u64,
    ) -> Result<Value, StateDataError> {
        let record = self
            .store
            .get_record(store, partition_key, sort_key)
            .await?
            .filter(|record| record.is_live_at(Utc::now()))
            .ok_or_else(|| StateDataError::NotFound {
                store: store.to_string(),
                partition_key: partition_key.to_string(),
                sort_key,
            })?;
        self.rehydrate(record).await
    }

    async fn read_list(
        &self,
        store: &str,
        partition_key: &str,
    ) -> Result<Vec<Value>, StateDataError> {
        let now = Utc::now();
        let records = self.store.list_records(store, partition_key).await?;
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            if record.is_live_at(now) {
                items.push(self.rehydrate(record).await?);
            }
        }
        Ok(items)
    }

    async fn rehydrate(&self, record: StateRecord) -> Result<Value, StateDataError> {
        match record.payload {
            RecordPayload::Inline { data } => Ok(data),
            RecordPayload::Blob { blob_key } => {
                let bytes =
                    self.store
                        .get_blob(&blob_key)
                        .await?
                        .ok_or_else(|| StateDataError::Backend {
                            message: format!("blob missing for offloaded item: {blob_key}"),
                        })?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }
}

impl std::fmt::Debug for StateDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDataClient")
            .field("store_name", &self.store_name)
            .field("namespace", &self.namespace)
            .field("ttl_days", &self.ttl_days)
            .finish_non_exhaustive()
    }
}

fn event_str<'a>(event: &'a Value, field: &str) -> Result<&'a str, StateDataError> {
    event
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| StateDataError::MalformedEvent {
            message: format!("missing string field '{field}'"),
        })
}

fn event_index(event: &Value) -> Result<u64, StateDataError> {
    event
        .get("context_index")
        .and_then(Value::as_u64)
        .ok_or_else(|| StateDataError::MalformedEvent {
            message: "missing integer field 'context_index'".to_string(),
        })
}
