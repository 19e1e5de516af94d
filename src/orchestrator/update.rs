//! # Status Updates
//!
//! Messages a task sends the orchestrator over its lifecycle. Exactly one
//! `Started` and exactly one terminal update (`Succeeded` or `Failed`) are
//! produced per invocation, with zero or more `Heartbeat` updates in between;
//! the reporter enforces that ordering.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::ErrorVerdict;

/// One lifecycle message destined for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// The invocation has begun
    Started,

    /// The task is still running
    Heartbeat {
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<Value>,
    },

    /// The task finished and produced output
    Succeeded { output: Value },

    /// The task failed
    Failed {
        /// Classifier verdict on the business error, as a kind label
        error_kind: ErrorVerdict,
        message: String,
        /// Rendered source chain of the original error, when available
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl StatusUpdate {
    pub fn started() -> Self {
        Self::Started
    }

    pub fn heartbeat(progress: Option<Value>) -> Self {
        Self::Heartbeat { progress }
    }

    pub fn succeeded(output: Value) -> Self {
        Self::Succeeded { output }
    }

    pub fn failed(error_kind: ErrorVerdict, message: impl Into<String>, cause: Option<String>) -> Self {
        Self::Failed {
            error_kind,
            message: message.into(),
            cause,
        }
    }

    /// Whether this update concludes the invocation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Short label for logging and guard messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_updates() {
        assert!(!StatusUpdate::started().is_terminal());
        assert!(!StatusUpdate::heartbeat(None).is_terminal());
        assert!(StatusUpdate::succeeded(json!({"rows": 10})).is_terminal());
        assert!(StatusUpdate::failed(ErrorVerdict::Terminal, "boom", None).is_terminal());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(StatusUpdate::started().kind(), "started");
        assert_eq!(StatusUpdate::heartbeat(None).kind(), "heartbeat");
        assert_eq!(StatusUpdate::succeeded(Value::Null).kind(), "succeeded");
        assert_eq!(
            StatusUpdate::failed(ErrorVerdict::Unknown, "boom", None).kind(),
            "failed"
        );
    }

    #[test]
    fn test_serialized_shape() {
        let update = StatusUpdate::failed(
            ErrorVerdict::Terminal,
            "authorization denied",
            Some("expired credentials".to_string()),
        );
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "terminal");
        assert_eq!(json["message"], "authorization denied");
        assert_eq!(json["cause"], "expired credentials");
    }

    #[test]
    fn test_heartbeat_progress_omitted_when_absent() {
        let update = StatusUpdate::heartbeat(None);
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("progress").is_none());
    }
}
