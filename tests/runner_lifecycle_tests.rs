//! End-to-end lifecycle tests for [`TaskRunner`]: one confirmed start, one
//! business execution, one terminal report, and honest compound errors when
//! reporting breaks down.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use common::{access_denied, throttled, timeout, RecordedCall, RecordingClient};
use taskkit::{
    ErrorVerdict, InMemoryStateStore, RetryPolicy, RunContext, RunError, StateDataClient,
    TaskContext, TaskHandler, TaskRunner,
};

struct FixedOutput(Value);

#[async_trait]
impl TaskHandler for FixedOutput {
    async fn process(&self, _context: &TaskContext) -> anyhow::Result<Value> {
        Ok(self.0.clone())
    }
}

struct FailsWith(&'static str);

#[async_trait]
impl TaskHandler for FailsWith {
    async fn process(&self, _context: &TaskContext) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!(self.0))
    }
}

struct FailsWithChain;

#[async_trait]
impl TaskHandler for FailsWithChain {
    async fn process(&self, _context: &TaskContext) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("db timeout").context("loading users"))
    }
}

/// Records whether the business function actually executed
#[derive(Clone)]
struct Probe {
    ran: Arc<AtomicBool>,
}

impl Probe {
    fn new() -> Self {
        Self {
            ran: Arc::new(AtomicBool::new(false)),
        }
    }

    fn did_run(&self) -> bool {
        self.ran.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for Probe {
    async fn process(&self, _context: &TaskContext) -> anyhow::Result<Value> {
        self.ran.store(true, Ordering::SeqCst);
        Ok(json!({"probe": true}))
    }
}

struct RequiresTable {
    probe: Probe,
}

#[async_trait]
impl TaskHandler for RequiresTable {
    async fn process(&self, context: &TaskContext) -> anyhow::Result<Value> {
        self.probe.process(context).await
    }

    fn validate_input(&self, input: &Value) -> anyhow::Result<()> {
        if input.get("table").is_none() {
            anyhow::bail!("invalid input: table is required");
        }
        Ok(())
    }
}

struct HeartbeatsOnce;

#[async_trait]
impl TaskHandler for HeartbeatsOnce {
    async fn process(&self, context: &TaskContext) -> anyhow::Result<Value> {
        context.heartbeat(Some(json!({"completed_rows": 5}))).await?;
        Ok(json!({"rows": 10}))
    }
}

struct SleepsForever;

#[async_trait]
impl TaskHandler for SleepsForever {
    async fn process(&self, _context: &TaskContext) -> anyhow::Result<Value> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!({}))
    }
}

struct PersistsExtract;

#[async_trait]
impl TaskHandler for PersistsExtract {
    async fn process(&self, context: &TaskContext) -> anyhow::Result<Value> {
        let Some(state) = context.state_data() else {
            anyhow::bail!("state data client not configured");
        };
        let meta = state.put_item("extract", &json!({"rows": 3})).await?;
        Ok(serde_json::to_value(meta)?)
    }
}

fn runner(client: &Arc<RecordingClient>) -> TaskRunner {
    TaskRunner::new(client.clone())
        .with_retry_policy(RetryPolicy::fixed(Duration::from_millis(1), 3))
}

#[tokio::test]
async fn test_successful_run_reports_start_then_success() {
    let client = Arc::new(RecordingClient::new());
    let handler = FixedOutput(json!({"rows": 10}));

    let output = runner(&client)
        .run(&handler, json!({"table": "events"}), RunContext::new("run-1", "extract"))
        .await
        .unwrap();

    assert_eq!(output, json!({"rows": 10}));
    assert_eq!(client.call_kinds(), vec!["start", "success"]);
    assert_eq!(
        client.calls()[1],
        RecordedCall::Success {
            output: json!({"rows": 10})
        }
    );
}

#[tokio::test]
async fn test_terminal_business_failure_reported_and_reraised() {
    let client = Arc::new(RecordingClient::new());
    let handler = FailsWith("authorization denied for this resource");

    let err = runner(&client)
        .run(&handler, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap_err();

    match err {
        RunError::Business { verdict, source } => {
            assert_eq!(verdict, ErrorVerdict::Terminal);
            assert!(source.to_string().contains("authorization denied"));
        }
        other => panic!("expected business error, got {other:?}"),
    }

    assert_eq!(client.call_kinds(), vec!["start", "failure"]);
    match &client.calls()[1] {
        RecordedCall::Failure { error_kind, message } => {
            assert_eq!(error_kind, "terminal");
            assert!(message.contains("authorization denied"));
        }
        other => panic!("expected failure call, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_report_failure_blocks_business_function() {
    let client =
        Arc::new(RecordingClient::new().fail_start_with(vec![access_denied()]));
    let handler = Probe::new();

    let err = runner(&client)
        .run(&handler, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::StartReportFailed { .. }));
    assert!(!handler.did_run());
    assert_eq!(client.call_kinds(), vec!["start"]);
}

#[tokio::test]
async fn test_throttled_start_retried_then_business_runs() {
    let client =
        Arc::new(RecordingClient::new().fail_start_with(vec![throttled(), throttled()]));
    let handler = Probe::new();

    let output = runner(&client)
        .run(&handler, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap();

    assert_eq!(output, json!({"probe": true}));
    assert!(handler.did_run());
    assert_eq!(client.call_count("start"), 3);
    assert_eq!(client.call_count("success"), 1);
}

#[tokio::test]
async fn test_unreported_success_surfaces_compound_error() {
    let client = Arc::new(
        RecordingClient::new().fail_success_with(vec![timeout(), timeout(), timeout()]),
    );
    let handler = FixedOutput(json!({"rows": 1}));

    let err = runner(&client)
        .run(&handler, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap_err();

    match &err {
        RunError::Unreported { outcome, report_error } => {
            assert!(outcome.is_success());
            assert_eq!(report_error.attempts_made(), 3);
        }
        other => panic!("expected unreported error, got {other:?}"),
    }
    assert!(err.to_string().contains("succeeded"));
    assert_eq!(client.call_count("success"), 3);
    assert_eq!(client.call_count("failure"), 0);
}

#[tokio::test]
async fn test_unreported_failure_keeps_business_error() {
    let client = Arc::new(
        RecordingClient::new().fail_failure_with(vec![timeout(), timeout(), timeout()]),
    );
    let handler = FailsWith("malformed input: missing column");

    let err = runner(&client)
        .run(&handler, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap_err();

    match err {
        RunError::Unreported { outcome, .. } => match outcome {
            taskkit::BusinessOutcome::Failed { verdict, source } => {
                assert_eq!(verdict, ErrorVerdict::Terminal);
                assert!(source.to_string().contains("malformed input"));
            }
            other => panic!("expected failed outcome, got {other:?}"),
        },
        other => panic!("expected unreported error, got {other:?}"),
    }
    assert_eq!(client.call_count("failure"), 3);
}

#[tokio::test]
async fn test_heartbeats_flow_between_start_and_terminal() {
    let client = Arc::new(RecordingClient::new());

    let output = runner(&client)
        .run(&HeartbeatsOnce, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap();

    assert_eq!(output, json!({"rows": 10}));
    assert_eq!(client.call_kinds(), vec!["start", "heartbeat", "success"]);
    assert_eq!(
        client.calls()[1],
        RecordedCall::Heartbeat {
            progress: Some(json!({"completed_rows": 5}))
        }
    );
}

#[tokio::test]
async fn test_validation_failure_skips_business_function() {
    let client = Arc::new(RecordingClient::new());
    let handler = RequiresTable { probe: Probe::new() };

    let err = runner(&client)
        .run(&handler, json!({"rows": 10}), RunContext::new("run-1", "extract"))
        .await
        .unwrap_err();

    match err {
        RunError::Business { verdict, source } => {
            assert_eq!(verdict, ErrorVerdict::Terminal);
            assert!(source.to_string().contains("table is required"));
        }
        other => panic!("expected business error, got {other:?}"),
    }
    assert!(!handler.probe.did_run());
    assert_eq!(client.call_kinds(), vec!["start", "failure"]);
}

#[tokio::test]
async fn test_cancelled_before_processing_sends_best_effort_failure() {
    let client = Arc::new(RecordingClient::new());
    let handler = Probe::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = runner(&client)
        .run(
            &handler,
            json!({}),
            RunContext::new("run-1", "extract").with_cancellation(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Cancelled { .. }));
    assert!(!handler.did_run());
    assert_eq!(client.call_kinds(), vec!["start", "failure"]);
    match &client.calls()[1] {
        RecordedCall::Failure { error_kind, .. } => assert_eq!(error_kind, "unknown"),
        other => panic!("expected failure call, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_mid_flight_interrupts_business_function() {
    let client = Arc::new(RecordingClient::new());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = runner(&client)
        .run(
            &SleepsForever,
            json!({}),
            RunContext::new("run-1", "extract").with_cancellation(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Cancelled { .. }));
    assert_eq!(client.call_kinds(), vec!["start", "failure"]);
}

#[tokio::test]
async fn test_business_error_chain_rendered_in_failure_report() {
    let client = Arc::new(RecordingClient::new());

    let err = runner(&client)
        .run(&FailsWithChain, json!({}), RunContext::new("run-1", "extract"))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Business { verdict: ErrorVerdict::Retryable, .. }));
    match &client.calls()[1] {
        RecordedCall::Failure { error_kind, message } => {
            assert_eq!(error_kind, "retryable");
            assert_eq!(message, "loading users");
        }
        other => panic!("expected failure call, got {other:?}"),
    }
}

#[tokio::test]
async fn test_state_data_reachable_from_business_function() {
    let store = Arc::new(InMemoryStateStore::new());
    let client = Arc::new(RecordingClient::new());
    let state = Arc::new(StateDataClient::new(store.clone(), "results", "run-9"));

    let output = runner(&client)
        .with_state_data(state)
        .run(&PersistsExtract, json!({}), RunContext::new("run-9", "extract"))
        .await
        .unwrap();

    assert_eq!(output["partition_key"], "run-9:extract");

    let reader = StateDataClient::new(store, "results", "run-9");
    assert_eq!(reader.get_item("extract").await.unwrap(), json!({"rows": 3}));
}

#[tokio::test]
async fn test_metadata_visible_to_business_function() {
    struct EchoesMetadata;

    #[async_trait]
    impl TaskHandler for EchoesMetadata {
        async fn process(&self, context: &TaskContext) -> anyhow::Result<Value> {
            Ok(context.metadata().clone())
        }
    }

    let client = Arc::new(RecordingClient::new());
    let output = runner(&client)
        .run(
            &EchoesMetadata,
            json!({}),
            RunContext::new("run-1", "extract").with_metadata(json!({"trace_id": "abc123"})),
        )
        .await
        .unwrap();

    assert_eq!(output, json!({"trace_id": "abc123"}));
}
