//! Test: Retry behaviour - transient model errors, backoff and budgets

use crate::helpers::*;
use async_trait::async_trait;
use github_agents::agent::{AgentError, AgentResponse, ModelClient, RetryPolicy, RetryingModel};
use github_agents::core::{FailureKind, Node, Pipeline, Settings, Step};
use github_agents::execution::ExecutionEngine;
use github_agents::tools::ToolRegistry;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Fails with `status` for the first `failures` calls, recording call times
struct Flaky {
    failures: usize,
    status: u16,
    calls: Mutex<Vec<Instant>>,
}

impl Flaky {
    fn new(failures: usize, status: u16) -> Arc<Self> {
        Arc::new(Self {
            failures,
            status,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for Flaky {
    async fn invoke(&self, _prompt: &str, _ctx: &str) -> Result<AgentResponse, AgentError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Instant::now());
        if calls.len() <= self.failures {
            Err(AgentError::Status {
                status: self.status,
                message: "upstream unavailable".to_string(),
            })
        } else {
            Ok(AgentResponse::new("finally"))
        }
    }
}

fn single_step(timeout_secs: Option<u64>) -> Pipeline {
    let mut step = Step::model("summary", "Summarise");
    if let Some(secs) = timeout_secs {
        step = step.timeout(secs);
    }
    Pipeline::build("one", Node::sequential("One", vec![step.into()]), "summary").unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhaust_after_five_attempts() {
    let flaky = Flaky::new(usize::MAX, 503);
    let model = Arc::new(RetryingModel::new(flaky.clone(), RetryPolicy::default()));

    let failure = run_pipeline(model, &single_step(None), inputs(&[]))
        .await
        .unwrap_err();

    assert_failed_at(&failure, "summary", &FailureKind::RetriesExhausted { attempts: 5 });

    let times = flaky.call_times();
    assert_eq!(times.len(), 5);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps.windows(2).all(|w| w[1] > w[0]), "gaps not increasing: {:?}", gaps);
    assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] < Duration::from_secs(2));
    assert!(gaps[3] >= Duration::from_secs(343));
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_recover() {
    let flaky = Flaky::new(2, 429);
    let model = Arc::new(RetryingModel::new(flaky.clone(), RetryPolicy::default()));

    let report = run_pipeline(model, &single_step(None), inputs(&[])).await.unwrap();

    assert_eq!(report.output_text().as_deref(), Some("finally"));
    assert_eq!(flaky.call_times().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_status_fails_at_once() {
    let flaky = Flaky::new(usize::MAX, 400);
    let model = Arc::new(RetryingModel::new(flaky.clone(), RetryPolicy::default()));

    let failure = run_pipeline(model, &single_step(None), inputs(&[])).await.unwrap_err();

    assert_failed_at(&failure, "summary", &FailureKind::Model);
    assert_eq!(flaky.call_times().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_settings_allow_every_attempt() {
    let settings = Settings::default();
    let flaky = Flaky::new(usize::MAX, 503);
    let model: Arc<dyn ModelClient> = Arc::new(RetryingModel::new(flaky.clone(), settings.retry.clone()));
    let engine = ExecutionEngine::new(
        model,
        Arc::new(ToolRegistry::with_mock_catalogue()),
        settings.step_timeout_secs,
    );

    let failure = engine.run(&single_step(None), inputs(&[])).await.unwrap_err();

    assert_failed_at(&failure, "summary", &FailureKind::RetriesExhausted { attempts: 5 });
    assert_eq!(flaky.call_times().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_short_step_timeout_cuts_the_retry_window() {
    // 1 + 7 + 49 + 343 seconds of backoff do not fit in 300 s
    let flaky = Flaky::new(usize::MAX, 503);
    let model = Arc::new(RetryingModel::new(flaky.clone(), RetryPolicy::default()));

    let failure = run_pipeline(model, &single_step(Some(300)), inputs(&[]))
        .await
        .unwrap_err();

    assert_failed_at(&failure, "summary", &FailureKind::Timeout { secs: 300 });
    assert_eq!(flaky.call_times().len(), 4);
}
