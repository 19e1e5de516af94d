//! # Orchestration Client Trait
//!
//! The outbound seam to the workflow orchestration service. The crate depends
//! only on the four reporting operations and their success/transient-failure
//! contract; wire protocol, serialization, and credentials belong to the
//! implementation. Implementations must tolerate concurrent calls, so the
//! trait requires `Send + Sync` and is shared via `Arc`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure raised by an orchestration client
///
/// The variants make the retryable-vs-terminal mapping explicit: throttling,
/// timeouts, connection drops, and service unavailability are transient;
/// malformed requests and authorization denials are not. Anything a client
/// cannot name goes in `Other` and is classified as unknown.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The orchestrator rejected the call due to rate limiting
    #[error("throttled by the orchestrator")]
    Throttled {
        /// Server-suggested wait, when the response carried one
        retry_after: Option<Duration>,
    },

    /// The call did not complete within the client's deadline
    #[error("request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The connection failed mid-flight
    #[error("connection error: {message}")]
    Connection { message: String },

    /// The orchestrator reported itself temporarily unavailable
    #[error("orchestrator unavailable: {message}")]
    Unavailable { message: String },

    /// The orchestrator rejected the request as malformed
    #[error("malformed request: {message}")]
    BadRequest { message: String },

    /// The caller is not authorized for this operation
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// Anything the client could not map onto a known variant
    #[error("transport error: {message}")]
    Other { message: String },
}

impl TransportError {
    /// Short label for structured logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Throttled { .. } => "throttled",
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection",
            Self::Unavailable { .. } => "unavailable",
            Self::BadRequest { .. } => "bad_request",
            Self::AccessDenied { .. } => "access_denied",
            Self::Other { .. } => "other",
        }
    }

    /// Server-suggested retry delay, if the failure carried one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Client for reporting task lifecycle updates to the orchestrator
///
/// Passed into the reporter and runner as an explicit dependency
/// (`Arc<dyn OrchestratorClient>`), never reached through process-wide
/// state, so tests can substitute a recording fake.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Announce that a task invocation has started
    async fn report_start(&self, run_id: &str, task_id: &str) -> Result<(), TransportError>;

    /// Report liveness for a long-running task, with optional progress data
    async fn report_heartbeat(
        &self,
        run_id: &str,
        task_id: &str,
        progress: Option<&Value>,
    ) -> Result<(), TransportError>;

    /// Report successful completion with the task's output
    async fn report_success(
        &self,
        run_id: &str,
        task_id: &str,
        output: &Value,
    ) -> Result<(), TransportError>;

    /// Report failure with the classified kind label and message
    async fn report_failure(
        &self,
        run_id: &str,
        task_id: &str,
        error_kind: &str,
        message: &str,
    ) -> Result<(), TransportError>;

    /// Name used in logs to identify the client implementation
    fn client_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}
