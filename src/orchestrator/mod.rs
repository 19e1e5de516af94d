//! # Orchestrator Reporting
//!
//! Everything that talks to the workflow orchestration service: the client
//! trait implementations plug into, the status-update message model, and the
//! retrying reporter that enforces per-invocation update ordering.
//!
//! ## Architecture
//!
//! ```text
//! TaskRunner ──> StatusReporter ──> OrchestratorClient (trait)
//!                    │                     │
//!                    │ classifies         │ raises
//!                    ▼                     ▼
//!              ErrorClassifier       TransportError
//! ```
//!
//! The reporter never invents updates; it delivers what the runner (or a
//! task's heartbeat handle) produces, in order, retrying only what the
//! classifier says is transient.

pub mod client;
pub mod reporter;
pub mod update;

pub use client::{OrchestratorClient, TransportError};
pub use reporter::{ReportError, SendReceipt, StatusReporter};
pub use update::StatusUpdate;
