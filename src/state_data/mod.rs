//! # State Data
//!
//! Shared-state storage for payloads that should not ride through the
//! orchestrator's status channel. Tasks write structured items through
//! [`StateDataClient`] and pass the returned [`StateItemMeta`] downstream;
//! the next task reads the data back by key.
//!
//! Storage itself sits behind the [`StateStore`] trait so deployments can
//! plug in whatever keyed store and blob store they run against.
//! [`InMemoryStateStore`] backs tests and local development.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use taskkit::{InMemoryStateStore, StateDataClient};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), taskkit::StateDataError> {
//! let store = Arc::new(InMemoryStateStore::new());
//! let client = StateDataClient::new(store, "results", "run-42");
//!
//! let meta = client.put_item("extract", &json!({"rows": 10})).await?;
//! assert_eq!(meta.partition_key, "run-42:extract");
//!
//! let data = client.get_item("extract").await?;
//! assert_eq!(data["rows"], 10);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod memory;
pub mod store;

pub use client::{StateDataClient, StateItemMeta, DEFAULT_TTL_DAYS, ITEM_SIZE_THRESHOLD_BYTES};
pub use memory::InMemoryStateStore;
pub use store::{RecordPayload, StateDataError, StateRecord, StateStore};
