//! # Task Context
//!
//! Execution context handed to a task's business function: invocation
//! identity and input, host metadata, a heartbeat handle into the status
//! reporter, the cancellation token, and the optional state-data client.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::orchestrator::{ReportError, SendReceipt, StatusReporter};
use crate::state_data::StateDataClient;
use crate::task::invocation::TaskInvocation;

/// Host-supplied invocation context for [`TaskRunner::run`]
///
/// Carries the identifiers the orchestrator assigned to this step plus any
/// opaque metadata the host wants visible to the business function.
///
/// [`TaskRunner::run`]: crate::task::TaskRunner::run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier of the workflow run
    pub run_id: String,

    /// Identifier of the task/step within the workflow
    pub task_id: String,

    /// Opaque host metadata, passed through to the business function
    pub metadata: Value,

    /// Token the host may cancel on deadline or shutdown
    pub cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            task_id: task_id.into(),
            metadata: Value::Null,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach opaque host metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Use the given token for deadline/shutdown cancellation
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Context visible to the business function for one invocation
///
/// Built by the runner; the reporter inside is the same one driving the
/// lifecycle updates, so heartbeats emitted here respect the invocation's
/// update ordering.
pub struct TaskContext {
    reporter: Arc<StatusReporter>,
    metadata: Value,
    cancellation: CancellationToken,
    state_data: Option<Arc<StateDataClient>>,
}

impl TaskContext {
    pub(crate) fn new(
        reporter: Arc<StatusReporter>,
        metadata: Value,
        cancellation: CancellationToken,
        state_data: Option<Arc<StateDataClient>>,
    ) -> Self {
        Self {
            reporter,
            metadata,
            cancellation,
            state_data,
        }
    }

    pub fn invocation(&self) -> &TaskInvocation {
        self.reporter.invocation()
    }

    pub fn run_id(&self) -> &str {
        &self.invocation().run_id
    }

    pub fn task_id(&self) -> &str {
        &self.invocation().task_id
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation().invocation_id
    }

    /// Input payload the orchestrator handed to this step
    pub fn input(&self) -> &Value {
        &self.invocation().input
    }

    /// Opaque host metadata
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Report liveness with optional progress data
    pub async fn heartbeat(&self, progress: Option<Value>) -> Result<SendReceipt, ReportError> {
        self.reporter.heartbeat(progress).await
    }

    /// Whether the host has requested cancellation
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Token long-running work can select against
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// State-data client for cross-step payload exchange, when configured
    pub fn state_data(&self) -> Option<&StateDataClient> {
        self.state_data.as_deref()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("run_id", &self.run_id())
            .field("task_id", &self.task_id())
            .field("invocation_id", &self.invocation_id())
            .field("has_state_data", &self.state_data.is_some())
            .finish_non_exhaustive()
    }
}
