//! # Task Handler Trait
//!
//! The seam a hosting runtime implements for its business logic. The runner
//! calls `process` exactly once per invocation; any error it returns is
//! classified for its failure-kind label, reported, and re-raised unchanged.

use async_trait::async_trait;
use serde_json::Value;

use crate::task::context::TaskContext;

/// Business function of one task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the task's business logic
    ///
    /// Runs at most once per invocation and never without a confirmed
    /// `Started` report. Returned errors are reported to the orchestrator
    /// and then propagated to the caller.
    async fn process(&self, context: &TaskContext) -> anyhow::Result<Value>;

    /// Validate the input payload before `process` runs
    ///
    /// A validation error follows the same path as a business error.
    fn validate_input(&self, _input: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    /// Name used in logs to identify the handler implementation
    fn handler_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}
