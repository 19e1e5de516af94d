//! # Task Runner
//!
//! The single entry point a hosting runtime calls. Drives one invocation
//! through `Created → Started → Running → {Succeeded | Failed} → Reported`:
//!
//! - `Started` is reported (with retries) before the business function runs;
//!   if that report cannot be delivered the business function is never
//!   invoked, so no execution goes unrecorded.
//! - The business function runs exactly once. It is never retried here;
//!   step-level retry belongs to the orchestrator.
//! - Business errors are classified for their kind label, reported as
//!   `Failed`, and re-raised unchanged.
//! - A terminal report that cannot be delivered surfaces a compound error
//!   naming both the business outcome and the reporting failure.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::classifier::{ErrorClassifier, ErrorVerdict};
use crate::orchestrator::{OrchestratorClient, ReportError, StatusReporter};
use crate::retry::RetryPolicy;
use crate::state_data::StateDataClient;
use crate::task::context::{RunContext, TaskContext};
use crate::task::handler::TaskHandler;
use crate::task::invocation::{InvocationState, TaskInvocation};

/// Business outcome carried inside compound reporting errors
#[derive(Debug)]
pub enum BusinessOutcome {
    /// The business function returned output that was never reported
    Succeeded { output: Value },

    /// The business function failed and the failure was never reported
    Failed {
        verdict: ErrorVerdict,
        source: anyhow::Error,
    },
}

impl BusinessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

impl fmt::Display for BusinessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { .. } => write!(f, "succeeded"),
            Self::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Failure surface of [`TaskRunner::run`]
#[derive(Debug, Error)]
pub enum RunError {
    /// The `Started` report failed; the business function never ran
    #[error("task start was never reported: {source}")]
    StartReportFailed {
        #[source]
        source: ReportError,
    },

    /// The business function failed; the failure was reported, then re-raised
    #[error("task failed ({verdict}): {source}")]
    Business {
        verdict: ErrorVerdict,
        #[source]
        source: anyhow::Error,
    },

    /// The business function finished but the terminal report never landed
    #[error("task {outcome} but the terminal report failed: {report_error}")]
    Unreported {
        outcome: BusinessOutcome,
        #[source]
        report_error: ReportError,
    },

    /// The host cancelled the invocation
    #[error("task invocation cancelled: {message}")]
    Cancelled { message: String },
}

/// Wraps business functions in the reporting lifecycle
///
/// Construction takes the orchestration client explicitly; policy,
/// classifier, and state-data client are optional refinements.
///
/// ## Usage
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use taskkit::{RunContext, TaskContext, TaskHandler, TaskRunner};
///
/// struct CountRows;
///
/// #[async_trait]
/// impl TaskHandler for CountRows {
///     async fn process(&self, context: &TaskContext) -> anyhow::Result<Value> {
///         let table = context.input()["table"].as_str().unwrap_or("events");
///         Ok(json!({ "table": table, "rows": 10 }))
///     }
/// }
///
/// # async fn example(client: Arc<dyn taskkit::OrchestratorClient>) -> Result<(), taskkit::RunError> {
/// let runner = TaskRunner::new(client);
/// let output = runner
///     .run(&CountRows, json!({"table": "events"}), RunContext::new("run-1", "count"))
///     .await?;
/// assert_eq!(output["rows"], 10);
/// # Ok(())
/// # }
/// ```
pub struct TaskRunner {
    client: Arc<dyn OrchestratorClient>,
    policy: RetryPolicy,
    classifier: Arc<ErrorClassifier>,
    state_data: Option<Arc<StateDataClient>>,
}

impl TaskRunner {
    pub fn new(client: Arc<dyn OrchestratorClient>) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            classifier: Arc::new(ErrorClassifier::new()),
            state_data: None,
        }
    }

    /// Set the retry policy applied around reporting calls
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the failure classifier
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Make a state-data client available to business functions
    pub fn with_state_data(mut self, state_data: Arc<StateDataClient>) -> Self {
        self.state_data = Some(state_data);
        self
    }

    /// Execute one task invocation end to end
    #[instrument(
        skip(self, handler, input, context),
        fields(run_id = %context.run_id, task_id = %context.task_id)
    )]
    pub async fn run(
        &self,
        handler: &dyn TaskHandler,
        input: Value,
        context: RunContext,
    ) -> Result<Value, RunError> {
        let run_started = Instant::now();
        let cancel = context.cancellation.clone();
        let invocation = TaskInvocation::new(context.run_id, context.task_id, input);
        let mut state = InvocationState::Created;

        let reporter = Arc::new(
            StatusReporter::new(
                self.client.clone(),
                self.policy.clone(),
                self.classifier.clone(),
                invocation.clone(),
            )
            .with_cancellation(cancel.clone()),
        );
        let task_context = TaskContext::new(
            reporter.clone(),
            context.metadata,
            cancel.clone(),
            self.state_data.clone(),
        );

        info!(
            invocation_id = %invocation.invocation_id,
            handler = %handler.handler_name(),
            "starting task invocation"
        );

        match reporter.start().await {
            Ok(receipt) => {
                advance(&mut state, InvocationState::Started, &invocation);
                debug!(attempts = receipt.attempts, "start report confirmed");
            }
            Err(ReportError::Interrupted { attempts_made }) => {
                warn!(attempts_made, "cancelled while reporting start");
                return Err(RunError::Cancelled {
                    message: "cancelled while reporting task start".to_string(),
                });
            }
            Err(err) => {
                error!(error = %err, "start report failed, business function will not run");
                return Err(RunError::StartReportFailed { source: err });
            }
        }

        advance(&mut state, InvocationState::Running, &invocation);
        let business_result = match handler.validate_input(task_context.input()) {
            Err(err) => Err(err),
            Ok(()) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!("cancelled during business function");
                        reporter
                            .failed_best_effort("task invocation cancelled by host runtime")
                            .await;
                        return Err(RunError::Cancelled {
                            message: "cancelled during business function".to_string(),
                        });
                    }
                    result = handler.process(&task_context) => result,
                }
            }
        };

        match business_result {
            Ok(output) => {
                advance(&mut state, InvocationState::Succeeded, &invocation);
                match reporter.succeeded(output.clone()).await {
                    Ok(receipt) => {
                        advance(&mut state, InvocationState::Reported, &invocation);
                        info!(
                            attempts = receipt.attempts,
                            duration_ms = run_started.elapsed().as_millis() as u64,
                            "task invocation succeeded"
                        );
                        Ok(output)
                    }
                    Err(report_error) => {
                        error!(error = %report_error, "task succeeded but the terminal report failed");
                        Err(RunError::Unreported {
                            outcome: BusinessOutcome::Succeeded { output },
                            report_error,
                        })
                    }
                }
            }
            Err(business_error) => {
                advance(&mut state, InvocationState::Failed, &invocation);
                let verdict = self.classifier.classify_any(&business_error);
                let message = business_error.to_string();
                let cause = render_cause(&business_error);
                warn!(verdict = %verdict, error = %business_error, "business function failed");

                match reporter.failed(verdict, message, cause).await {
                    Ok(_) => {
                        advance(&mut state, InvocationState::Reported, &invocation);
                        info!(
                            duration_ms = run_started.elapsed().as_millis() as u64,
                            "task failure reported"
                        );
                        Err(RunError::Business {
                            verdict,
                            source: business_error,
                        })
                    }
                    Err(report_error) => {
                        error!(error = %report_error, "task failed and the terminal report also failed");
                        Err(RunError::Unreported {
                            outcome: BusinessOutcome::Failed {
                                verdict,
                                source: business_error,
                            },
                            report_error,
                        })
                    }
                }
            }
        }
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("client", &self.client.client_name())
            .field("policy", &self.policy)
            .field("has_state_data", &self.state_data.is_some())
            .finish_non_exhaustive()
    }
}

fn advance(state: &mut InvocationState, next: InvocationState, invocation: &TaskInvocation) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid lifecycle transition {state} -> {next}"
    );
    trace!(
        invocation_id = %invocation.invocation_id,
        from = %state,
        to = %next,
        "lifecycle transition"
    );
    *state = next;
}

/// Source chain of a business error, rendered for the failure report
fn render_cause(error: &anyhow::Error) -> Option<String> {
    let mut chain = error.chain().skip(1).peekable();
    chain.peek()?;
    Some(
        chain
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join(": "),
    )
}
