//! # Task Invocation
//!
//! Identity and lifecycle state for one execution attempt of a task within a
//! workflow run. The invocation record is immutable after creation and owned
//! by the runner for the duration of one `run` call.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One execution attempt of a task within a specific workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInvocation {
    /// Identifier of the workflow run this task belongs to
    pub run_id: String,

    /// Identifier of the task/step within the workflow definition
    pub task_id: String,

    /// Unique identifier for this invocation attempt
    pub invocation_id: Uuid,

    /// Input payload handed over by the orchestrator, passed through opaquely
    pub input: Value,

    /// When the runner accepted the invocation
    pub started_at: DateTime<Utc>,
}

impl TaskInvocation {
    pub fn new(run_id: impl Into<String>, task_id: impl Into<String>, input: Value) -> Self {
        Self {
            run_id: run_id.into(),
            task_id: task_id.into(),
            invocation_id: Uuid::new_v4(),
            input,
            started_at: Utc::now(),
        }
    }
}

/// Lifecycle states of one invocation
///
/// `Created → Started → Running → {Succeeded | Failed} → Reported`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    /// Invocation built, start not yet confirmed by the orchestrator
    #[default]
    Created,

    /// Start confirmed; business function not yet running
    Started,

    /// Business function executing
    Running,

    /// Business function returned output
    Succeeded,

    /// Business function raised an error
    Failed,

    /// Terminal status delivered to the orchestrator
    Reported,
}

impl InvocationState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reported)
    }

    /// Whether the business outcome is known
    pub fn has_outcome(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Reported)
    }

    /// Valid transitions in the lifecycle
    pub fn can_transition_to(&self, next: InvocationState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Started)
                | (Self::Started, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Succeeded, Self::Reported)
                | (Self::Failed, Self::Reported)
        )
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Reported => "reported",
        };
        write!(f, "{s}")
    }
}

impl FromStr for InvocationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "started" => Ok(Self::Started),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "reported" => Ok(Self::Reported),
            _ => Err(format!("invalid invocation state: {s}")),
        }
    }
}
