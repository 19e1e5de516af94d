use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use taskkit::{OrchestratorClient, TransportError};

/// One observed reporting call
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Start,
    Heartbeat { progress: Option<Value> },
    Success { output: Value },
    Failure { error_kind: String, message: String },
}

impl RecordedCall {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
        }
    }
}

#[derive(Default)]
struct FailureScript {
    start: VecDeque<TransportError>,
    heartbeat: VecDeque<TransportError>,
    success: VecDeque<TransportError>,
    failure: VecDeque<TransportError>,
}

/// Recording orchestrator client with scripted per-operation failures
///
/// Every call is recorded, then the next scripted failure for that operation
/// (if any) is consumed and returned. Once a queue drains the operation
/// succeeds, so `fail_start_with(vec![err1, err2])` means two failures
/// followed by success.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<FailureScript>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_start_with(self, errors: Vec<TransportError>) -> Self {
        self.script.lock().start = errors.into();
        self
    }

    pub fn fail_heartbeat_with(self, errors: Vec<TransportError>) -> Self {
        self.script.lock().heartbeat = errors.into();
        self
    }

    pub fn fail_success_with(self, errors: Vec<TransportError>) -> Self {
        self.script.lock().success = errors.into();
        self
    }

    pub fn fail_failure_with(self, errors: Vec<TransportError>) -> Self {
        self.script.lock().failure = errors.into();
        self
    }

    /// Everything the client has been asked to deliver, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Kind labels of all observed calls, in order
    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(RecordedCall::kind).collect()
    }

    /// Number of observed calls with the given kind label
    pub fn call_count(&self, kind: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }
}

#[async_trait]
impl OrchestratorClient for RecordingClient {
    async fn report_start(&self, _run_id: &str, _task_id: &str) -> Result<(), TransportError> {
        self.calls.lock().push(RecordedCall::Start);
        match self.script.lock().start.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn report_heartbeat(
        &self,
        _run_id: &str,
        _task_id: &str,
        progress: Option<&Value>,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(RecordedCall::Heartbeat {
            progress: progress.cloned(),
        });
        match self.script.lock().heartbeat.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn report_success(
        &self,
        _run_id: &str,
        _task_id: &str,
        output: &Value,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(RecordedCall::Success {
            output: output.clone(),
        });
        match self.script.lock().success.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn report_failure(
        &self,
        _run_id: &str,
        _task_id: &str,
        error_kind: &str,
        message: &str,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(RecordedCall::Failure {
            error_kind: error_kind.to_string(),
            message: message.to_string(),
        });
        match self.script.lock().failure.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn throttled() -> TransportError {
    TransportError::Throttled { retry_after: None }
}

pub fn throttled_with_hint(retry_after: Duration) -> TransportError {
    TransportError::Throttled {
        retry_after: Some(retry_after),
    }
}

pub fn timeout() -> TransportError {
    TransportError::Timeout {
        elapsed: Duration::from_millis(50),
    }
}

pub fn unavailable() -> TransportError {
    TransportError::Unavailable {
        message: "scaling in progress".to_string(),
    }
}

pub fn access_denied() -> TransportError {
    TransportError::AccessDenied {
        message: "credentials expired".to_string(),
    }
}

pub fn mystery() -> TransportError {
    TransportError::Other {
        message: "unrecognized response shape".to_string(),
    }
}
