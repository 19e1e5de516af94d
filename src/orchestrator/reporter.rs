//! # Status Reporter
//!
//! Delivers status updates for one task invocation, retrying transient
//! transport failures per the retry policy. The reporter owns the per-
//! invocation sequencing rules:
//!
//! - Exactly one `Started`, then zero or more `Heartbeat`s, then exactly one
//!   terminal update. Violations are programming errors and fail fast
//!   without touching the client.
//! - On a transport error the classifier decides: retryable verdicts wait
//!   per the policy and try again, terminal and unknown verdicts surface
//!   immediately.
//! - A throttled response carrying a server-suggested wait uses that wait
//!   (capped at the policy's max delay) instead of the computed backoff.
//! - Retries of a heartbeat are dropped once a newer heartbeat has been
//!   accepted for delivery; the receipt records the drop.
//!
//! Backoff waits are the only suspension points and are interruptible
//! through the reporter's cancellation token.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::classifier::{ErrorClassifier, ErrorVerdict};
use crate::orchestrator::client::{OrchestratorClient, TransportError};
use crate::orchestrator::update::StatusUpdate;
use crate::retry::RetryPolicy;
use crate::task::TaskInvocation;

/// Successful delivery record for one `send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    /// Attempts made, including the successful one
    pub attempts: u32,

    /// True when a stale heartbeat retry was dropped instead of delivered
    pub superseded: bool,
}

/// Failure surface of the reporter
#[derive(Debug, Error)]
pub enum ReportError {
    /// Retries exhausted, or the transport failure was not retryable
    #[error("reporting failed after {attempts_made} attempt(s) ({verdict}): {last_error}")]
    Failed {
        attempts_made: u32,
        /// Classifier verdict on the last transport error
        verdict: ErrorVerdict,
        #[source]
        last_error: TransportError,
    },

    /// Sequencing violation; the update was never handed to the client
    #[error("status update out of order: {details}")]
    OutOfOrder { details: String },

    /// A backoff wait was interrupted by cancellation
    #[error("reporting interrupted by cancellation after {attempts_made} attempt(s)")]
    Interrupted { attempts_made: u32 },
}

impl ReportError {
    /// Attempts made before the reporter gave up
    pub fn attempts_made(&self) -> u32 {
        match self {
            Self::Failed { attempts_made, .. } | Self::Interrupted { attempts_made } => {
                *attempts_made
            }
            Self::OutOfOrder { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SequenceState {
    Idle,
    Started,
    Terminal,
}

#[derive(Debug)]
struct ReporterState {
    sequence: SequenceState,
    heartbeat_seq: u64,
}

/// Retrying status-update sender bound to one [`TaskInvocation`]
///
/// Cheap to share (`Arc`) so a task context can emit heartbeats while the
/// runner drives the lifecycle updates.
pub struct StatusReporter {
    client: Arc<dyn OrchestratorClient>,
    policy: RetryPolicy,
    classifier: Arc<ErrorClassifier>,
    invocation: TaskInvocation,
    cancel: CancellationToken,
    state: Mutex<ReporterState>,
}

impl StatusReporter {
    pub fn new(
        client: Arc<dyn OrchestratorClient>,
        policy: RetryPolicy,
        classifier: Arc<ErrorClassifier>,
        invocation: TaskInvocation,
    ) -> Self {
        Self {
            client,
            policy,
            classifier,
            invocation,
            cancel: CancellationToken::new(),
            state: Mutex::new(ReporterState {
                sequence: SequenceState::Idle,
                heartbeat_seq: 0,
            }),
        }
    }

    /// Use the given token to interrupt backoff waits
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn invocation(&self) -> &TaskInvocation {
        &self.invocation
    }

    /// Send one status update, retrying transient transport failures
    #[instrument(
        skip(self, update),
        fields(
            run_id = %self.invocation.run_id,
            task_id = %self.invocation.task_id,
            update = update.kind(),
        )
    )]
    pub async fn send(&self, update: StatusUpdate) -> Result<SendReceipt, ReportError> {
        let heartbeat_seq = self.guard_sequence(&update)?;
        self.deliver(&update, heartbeat_seq).await
    }

    /// Send `Started`
    pub async fn start(&self) -> Result<SendReceipt, ReportError> {
        self.send(StatusUpdate::started()).await
    }

    /// Send a heartbeat with optional progress data
    pub async fn heartbeat(&self, progress: Option<Value>) -> Result<SendReceipt, ReportError> {
        self.send(StatusUpdate::heartbeat(progress)).await
    }

    /// Send the terminal `Succeeded` update
    pub async fn succeeded(&self, output: Value) -> Result<SendReceipt, ReportError> {
        self.send(StatusUpdate::succeeded(output)).await
    }

    /// Send the terminal `Failed` update
    pub async fn failed(
        &self,
        error_kind: ErrorVerdict,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Result<SendReceipt, ReportError> {
        self.send(StatusUpdate::failed(error_kind, message, cause))
            .await
    }

    /// Single-attempt `Failed` report used on cancellation paths
    ///
    /// Sequencing still applies, but delivery errors are logged and
    /// swallowed; the caller is already propagating a more important error.
    pub async fn failed_best_effort(&self, message: &str) {
        let update = StatusUpdate::failed(ErrorVerdict::Unknown, message, None);
        if let Err(err) = self.guard_sequence(&update) {
            debug!(error = %err, "skipping best-effort failure report");
            return;
        }
        if let Err(err) = self.dispatch(&update).await {
            warn!(error = %err, "best-effort failure report not delivered");
        }
    }

    /// Validate the update against the sequence and commit the transition.
    ///
    /// Commits before delivery: a terminal update that exhausts its retries
    /// still counts as the invocation's one terminal send.
    fn guard_sequence(&self, update: &StatusUpdate) -> Result<Option<u64>, ReportError> {
        let mut state = self.state.lock();
        match (state.sequence, update) {
            (SequenceState::Terminal, _) => Err(ReportError::OutOfOrder {
                details: format!("{} update after terminal update", update.kind()),
            }),
            (SequenceState::Idle, StatusUpdate::Started) => {
                state.sequence = SequenceState::Started;
                Ok(None)
            }
            (SequenceState::Idle, other) => Err(ReportError::OutOfOrder {
                details: format!("{} update before started", other.kind()),
            }),
            (SequenceState::Started, StatusUpdate::Started) => Err(ReportError::OutOfOrder {
                details: "duplicate started update".to_string(),
            }),
            (SequenceState::Started, StatusUpdate::Heartbeat { .. }) => {
                state.heartbeat_seq += 1;
                Ok(Some(state.heartbeat_seq))
            }
            (SequenceState::Started, _terminal) => {
                state.sequence = SequenceState::Terminal;
                Ok(None)
            }
        }
    }

    async fn deliver(
        &self,
        update: &StatusUpdate,
        heartbeat_seq: Option<u64>,
    ) -> Result<SendReceipt, ReportError> {
        let mut attempt: u32 = 1;
        loop {
            match self.dispatch(update).await {
                Ok(()) => {
                    debug!(attempt, "status update delivered");
                    return Ok(SendReceipt {
                        attempts: attempt,
                        superseded: false,
                    });
                }
                Err(err) => {
                    let verdict = self.classifier.classify(&err);
                    if !verdict.is_retryable() {
                        warn!(attempt, verdict = %verdict, error = %err, "status update failed, not retrying");
                        return Err(ReportError::Failed {
                            attempts_made: attempt,
                            verdict,
                            last_error: err,
                        });
                    }
                    if !self.policy.should_retry(attempt + 1) {
                        warn!(attempts = attempt, error = %err, "status update retries exhausted");
                        return Err(ReportError::Failed {
                            attempts_made: attempt,
                            verdict,
                            last_error: err,
                        });
                    }

                    let delay = err
                        .retry_after()
                        .map(|suggested| suggested.min(self.policy.max_delay))
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient transport failure, backing off"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(ReportError::Interrupted {
                                attempts_made: attempt,
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }

                    if let Some(seq) = heartbeat_seq {
                        if self.state.lock().heartbeat_seq > seq {
                            debug!(attempt, "heartbeat superseded, dropping retry");
                            return Ok(SendReceipt {
                                attempts: attempt,
                                superseded: true,
                            });
                        }
                    }

                    attempt += 1;
                }
            }
        }
    }

    async fn dispatch(&self, update: &StatusUpdate) -> Result<(), TransportError> {
        let run_id = &self.invocation.run_id;
        let task_id = &self.invocation.task_id;
        match update {
            StatusUpdate::Started => self.client.report_start(run_id, task_id).await,
            StatusUpdate::Heartbeat { progress } => {
                self.client
                    .report_heartbeat(run_id, task_id, progress.as_ref())
                    .await
            }
            StatusUpdate::Succeeded { output } => {
                self.client.report_success(run_id, task_id, output).await
            }
            StatusUpdate::Failed {
                error_kind,
                message,
                ..
            } => {
                self.client
                    .report_failure(run_id, task_id, error_kind.as_str(), message)
                    .await
            }
        }
    }
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter")
            .field("client", &self.client.client_name())
            .field("invocation_id", &self.invocation.invocation_id)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
