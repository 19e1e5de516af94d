#![allow(clippy::doc_markdown)] // Allow technical terms in docs without backticks
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # TaskKit
//!
//! Task-side lifecycle toolkit for state-machine workflows.
//!
//! ## Overview
//!
//! TaskKit wraps a task's business function in the reporting lifecycle an
//! external orchestrator expects: confirm the start, stream heartbeats, and
//! deliver exactly one terminal status, with transient reporting failures
//! retried under exponential backoff and terminal ones surfaced instead of
//! papered over. The business function runs exactly once per invocation and
//! never before the orchestrator has confirmed the start report.
//!
//! ## Architecture
//!
//! Every invocation moves through one state path:
//!
//! ```text
//! created → started → running → succeeded | failed → reported
//! ```
//!
//! [`TaskRunner`] drives that path. It leans on three pure, independently
//! usable pieces: [`RetryPolicy`] (exponential backoff with a cap and
//! optional jitter), [`ErrorClassifier`] (ordered first-match rules mapping
//! errors to retryable/terminal/unknown), and [`StatusReporter`] (delivery
//! with retry, ordering enforcement, and heartbeat supersession). Tasks that
//! exchange payloads too large for the status channel use
//! [`StateDataClient`].
//!
//! ## Key Features
//!
//! - **Exactly-once business execution**: a failed start report means the
//!   business function never runs
//! - **Single terminal status**: duplicate or out-of-order reports are
//!   rejected at the source
//! - **Honest failure surfacing**: when a terminal report cannot be
//!   delivered, the caller learns both the task outcome and the delivery
//!   failure
//! - **Pluggable transport**: orchestrators and state stores sit behind
//!   async traits with in-memory implementations for tests
//!
//! ## Module Organization
//!
//! - [`retry`] - Backoff policy for reporting retries
//! - [`classifier`] - Ordered failure classification rules
//! - [`orchestrator`] - Client trait, status updates, and the reporter
//! - [`task`] - Handler trait, invocation state, and the runner
//! - [`state_data`] - Cross-step payload storage
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Crate-level error handling
//! - [`logging`] - Structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use taskkit::{ErrorClassifier, ErrorVerdict, RetryPolicy};
//!
//! let policy = RetryPolicy::new(Duration::from_millis(100))
//!     .with_max_attempts(5)
//!     .with_jitter(false);
//! assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
//!
//! let classifier = ErrorClassifier::new();
//! let error = std::io::Error::new(std::io::ErrorKind::TimedOut, "connection timed out");
//! assert_eq!(classifier.classify(&error), ErrorVerdict::Retryable);
//! ```
//!
//! Wrapping a business function end to end is shown on [`TaskRunner`].

pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod retry;
pub mod state_data;
pub mod task;

pub use classifier::{ClassificationRule, ErrorClassifier, ErrorVerdict};
pub use config::TaskKitConfig;
pub use error::{Result, TaskKitError};
pub use logging::init_structured_logging;
pub use orchestrator::{
    OrchestratorClient, ReportError, SendReceipt, StatusReporter, StatusUpdate, TransportError,
};
pub use retry::RetryPolicy;
pub use state_data::{
    InMemoryStateStore, RecordPayload, StateDataClient, StateDataError, StateItemMeta, StateRecord,
    StateStore, ITEM_SIZE_THRESHOLD_BYTES,
};
pub use task::{
    BusinessOutcome, InvocationState, RunContext, RunError, TaskContext, TaskHandler,
    TaskInvocation, TaskRunner,
};
