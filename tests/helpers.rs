//! Test utilities for github-agents
#![allow(dead_code)]

use async_trait::async_trait;
use github_agents::agent::{AgentError, AgentResponse, ModelClient};
use github_agents::core::config::PipelineConfig;
use github_agents::core::{FailureKind, Pipeline, Settings, SharedState, StepFailure, StepStatus};
use github_agents::execution::{ExecutionEngine, RunReport};
use github_agents::tools::ToolRegistry;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted rule answers with
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(AgentError),
    /// Answer after sleeping on the tokio clock
    Delayed(Duration, String),
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

struct Rule {
    needle: String,
    replies: Vec<Reply>,
    used: AtomicUsize,
}

/// One recorded model call
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub prior_context: String,
}

/// Model that answers by matching prompt text against scripted rules
///
/// The first rule whose needle occurs in the prompt answers. A rule with
/// several replies hands them out in order and then repeats the last one.
#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<Rule>,
    fallback: Option<String>,
    log: Mutex<Vec<Call>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, reply: impl Into<Reply>) -> Self {
        self.on_seq(needle, vec![reply.into()])
    }

    pub fn on_seq(mut self, needle: &str, replies: Vec<Reply>) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            replies,
            used: AtomicUsize::new(0),
        });
        self
    }

    /// Reply for prompts no rule matches (otherwise they fail)
    pub fn fallback(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    /// Number of calls whose prompt contained `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.prompt.contains(needle)).count()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(&self, prompt: &str, prior_context: &str) -> Result<AgentResponse, AgentError> {
        self.log.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            prior_context: prior_context.to_string(),
        });

        let Some(rule) = self.rules.iter().find(|r| prompt.contains(&r.needle)) else {
            return match &self.fallback {
                Some(text) => Ok(AgentResponse::new(text.clone())),
                None => Err(AgentError::Fatal(format!("no scripted reply for prompt: {}", prompt))),
            };
        };

        let index = rule.used.fetch_add(1, Ordering::SeqCst).min(rule.replies.len() - 1);
        match rule.replies[index].clone() {
            Reply::Text(text) => Ok(AgentResponse::new(text)),
            Reply::Fail(error) => Err(error),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(AgentResponse::new(text))
            }
        }
    }
}

/// Engine over the mock tool catalogue with the default step budget
pub fn engine(model: Arc<dyn ModelClient>) -> ExecutionEngine {
    ExecutionEngine::new(
        model,
        Arc::new(ToolRegistry::with_mock_catalogue()),
        Settings::default().step_timeout_secs,
    )
}

/// Parse and validate a pipeline from YAML
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse pipeline YAML: {:#}", e))
        .to_pipeline()
        .unwrap_or_else(|e| panic!("Invalid pipeline: {}", e))
}

pub fn inputs(pairs: &[(&str, Value)]) -> SharedState {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

/// Run `pipeline` against `model`
pub async fn run_pipeline(
    model: Arc<dyn ModelClient>,
    pipeline: &Pipeline,
    inputs: SharedState,
) -> Result<RunReport, StepFailure> {
    engine(model).run(pipeline, inputs).await
}

/// Steps that completed, in completion order
pub fn completed_steps(report: &RunReport) -> Vec<String> {
    report
        .steps
        .iter()
        .filter(|r| r.status == StepStatus::Completed)
        .map(|r| r.step.clone())
        .collect()
}

/// Assert `key` holds text containing `expected`
pub fn assert_state_contains(report: &RunReport, key: &str, expected: &str) {
    let text = report
        .state
        .get_text(key)
        .unwrap_or_else(|| panic!("'{}' not in final state: {:?}", key, report.state));
    assert!(
        text.contains(expected),
        "'{}' was:\n{}\n\ndoes not contain:\n{}",
        key,
        text,
        expected
    );
}

/// Assert a failure came from `step`, with the given kind
pub fn assert_failed_at(failure: &StepFailure, step: &str, kind: &FailureKind) {
    assert_eq!(failure.step, step, "unexpected failing step: {}", failure);
    assert_eq!(&failure.kind, kind, "unexpected failure kind: {}", failure);
}
