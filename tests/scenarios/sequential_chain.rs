//! Test: Sequential chain - each step sees the previous step's write

use crate::helpers::*;
use async_trait::async_trait;
use github_agents::agent::{AgentError, AgentResponse, ModelClient};
use github_agents::core::{Node, Pipeline, SharedState, Step};
use serde_json::json;
use std::sync::Arc;

/// Answers "append X to LOG" with "LOGX"
struct Appender;

#[async_trait]
impl ModelClient for Appender {
    async fn invoke(&self, prompt: &str, _ctx: &str) -> Result<AgentResponse, AgentError> {
        let (name, log) = prompt
            .strip_prefix("append ")
            .and_then(|rest| rest.split_once(" to "))
            .ok_or_else(|| AgentError::Fatal(format!("unexpected prompt: {}", prompt)))?;
        Ok(AgentResponse::new(format!("{}{}", log.trim(), name)))
    }
}

#[tokio::test]
async fn test_steps_append_in_order_once_each() {
    let names = ["a", "b", "c", "d", "e"];
    let children: Vec<Node> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let step = Step::model(format!("s{}", i + 1), format!("append {} to {{log}}", name))
                .inputs(["log"])
                .output("log");
            step.into()
        })
        .collect();
    let pipeline = Pipeline::build("chain", Node::sequential("Chain", children), "log").unwrap();

    let state: SharedState = [("log", json!(" "))].into_iter().collect();
    let report = run_pipeline(Arc::new(Appender), &pipeline, state).await.unwrap();

    assert_eq!(report.output_text().as_deref(), Some("abcde"));
    assert_eq!(completed_steps(&report), vec!["s1", "s2", "s3", "s4", "s5"]);
    for step in ["s1", "s2", "s3", "s4", "s5"] {
        assert_eq!(report.runs_of(step), 1, "{} should run exactly once", step);
    }
}

#[tokio::test]
async fn test_yaml_chain_threads_outputs() {
    let yaml = r#"
name: plan-build-check
output: check
root:
  type: sequential
  name: Chain
  children:
    - type: step
      name: plan
      inputs: [task]
      instruction: "PLAN the task: {task}"
    - type: step
      name: build
      inputs: [plan]
      instruction: "BUILD from plan: {plan}"
    - type: step
      name: check
      inputs: [build]
      instruction: "CHECK the build: {build}"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let model = ScriptedModel::new()
        .on("PLAN", "1. parse 2. emit")
        .on("BUILD", "built parser")
        .on("CHECK", "all good")
        .build();

    let report = run_pipeline(model.clone(), &pipeline, inputs(&[("task", json!("write a parser"))]))
        .await
        .unwrap();

    assert_state_contains(&report, "check", "all good");
    let calls = model.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].prompt, "PLAN the task: write a parser");
    assert_eq!(calls[1].prompt, "BUILD from plan: 1. parse 2. emit");
    assert_eq!(calls[2].prompt, "CHECK the build: built parser");
}

#[tokio::test]
async fn test_defaults_fill_missing_inputs() {
    let yaml = r#"
name: greet
output: greeting
variables:
  audience: world
root:
  type: sequential
  name: Greet
  children:
    - type: step
      name: greeting
      inputs: [audience]
      instruction: "GREET {audience}"
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let model = ScriptedModel::new().on("GREET world", "hello world").on("GREET team", "hi team").build();

    let report = run_pipeline(model.clone(), &pipeline, SharedState::new()).await.unwrap();
    assert_eq!(report.output_text().as_deref(), Some("hello world"));

    let report = run_pipeline(model, &pipeline, inputs(&[("audience", json!("team"))]))
        .await
        .unwrap();
    assert_eq!(report.output_text().as_deref(), Some("hi team"));
}
