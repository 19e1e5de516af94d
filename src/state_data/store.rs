//! StateStore trait definition and record model

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error type for state-data operations
#[derive(Debug, Error)]
pub enum StateDataError {
    /// No live record at the requested coordinates
    #[error("state item not found: {store}/{partition_key}[{sort_key}]")]
    NotFound {
        store: String,
        partition_key: String,
        sort_key: u64,
    },

    /// The fan-out event payload is missing a required field
    #[error("malformed map-iteration event: {message}")]
    MalformedEvent { message: String },

    /// The storage backend failed
    #[error("state store backend error: {message}")]
    Backend { message: String },

    /// Payload could not be serialized or deserialized
    #[error("state item serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Payload of one stored record
///
/// Oversized payloads live in blob storage; the record then carries only the
/// blob key and readers rehydrate transparently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum RecordPayload {
    Inline { data: Value },
    Blob { blob_key: String },
}

/// One state-data record addressed by (store, partition key, sort key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Logical store name (one orchestrator deployment may use several)
    pub store: String,

    /// Hash key; namespaced writes use `{namespace}:{key}`
    pub partition_key: String,

    /// Range key; list elements use their element index, single items 0
    pub sort_key: u64,

    pub payload: RecordPayload,

    /// Past this instant the record reads as absent
    pub expires_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    /// Whether the record is still readable at the given instant
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Keyed storage for cross-step state data
///
/// Implementations must be thread-safe; one store is shared by every
/// invocation in the process. Expiry filtering is the client's job so all
/// backends behave alike.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Write one record, replacing any record at the same coordinates
    async fn put_record(&self, record: StateRecord) -> Result<(), StateDataError>;

    /// Read one record
    async fn get_record(
        &self,
        store: &str,
        partition_key: &str,
        sort_key: u64,
    ) -> Result<Option<StateRecord>, StateDataError>;

    /// Read all records under a partition, ordered by sort key
    async fn list_records(
        &self,
        store: &str,
        partition_key: &str,
    ) -> Result<Vec<StateRecord>, StateDataError>;

    /// Write an oversized payload to blob storage
    async fn put_blob(&self, blob_key: &str, bytes: Vec<u8>) -> Result<(), StateDataError>;

    /// Read an oversized payload back
    async fn get_blob(&self, blob_key: &str) -> Result<Option<Vec<u8>>, StateDataError>;
}
