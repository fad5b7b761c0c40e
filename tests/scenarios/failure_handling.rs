//! Test: Failure handling - short-circuit, composer paths, tool failures

use crate::helpers::*;
use github_agents::agent::AgentError;
use github_agents::core::{ExecutionStatus, FailureKind};
use github_agents::execution::ExecutionEvent;
use github_agents::tools::ToolFailureKind;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_failure_stops_the_chain() {
    let yaml = r#"
name: chain
output: third
root:
  type: sequential
  name: Chain
  children:
    - { type: step, name: first, instruction: "STEP1" }
    - { type: step, name: second, inputs: [first], instruction: "STEP2 after {first}" }
    - { type: step, name: third, inputs: [second], instruction: "STEP3 after {second}" }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let model = ScriptedModel::new()
        .on("STEP1", "one")
        .on("STEP2", Reply::Fail(AgentError::Fatal("bad request".to_string())))
        .on("STEP3", "three")
        .build();

    let engine = engine(model.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let failure = engine.run(&pipeline, inputs(&[])).await.unwrap_err();

    assert_failed_at(&failure, "second", &FailureKind::Model);
    assert_eq!(failure.location(), "Chain/second");
    assert_eq!(model.calls_matching("STEP3"), 0);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::PipelineCompleted { status: ExecutionStatus::Failed, .. }
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepStarted { step } if step == "third"
    )));
}

#[tokio::test]
async fn test_failure_inside_loop_names_the_iteration() {
    let yaml = r#"
name: refine
output: draft
root:
  type: sequential
  name: Outer
  children:
    - { type: step, name: draft, instruction: "DRAFT" }
    - type: loop
      name: Polish
      max_iterations: 3
      body:
        - { type: step, name: critic, inputs: [draft], output: critique, instruction: "CRITIC {draft}" }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let model = ScriptedModel::new()
        .on("DRAFT", "d0")
        .on_seq(
            "CRITIC",
            vec![
                "meh".into(),
                Reply::Fail(AgentError::Fatal("critic crashed".to_string())),
            ],
        )
        .build();

    let failure = run_pipeline(model, &pipeline, inputs(&[])).await.unwrap_err();
    assert_eq!(failure.step, "critic");
    assert_eq!(failure.path, vec!["Outer", "Polish#2"]);
}

#[tokio::test]
async fn test_missing_input_fails_before_model_call() {
    let yaml = r#"
name: review
output: summary
root:
  type: sequential
  name: Review
  children:
    - { type: step, name: summary, inputs: [repo, pr_number], instruction: "SUMMARISE {repo}#{pr_number}" }
"#;
    let pipeline = pipeline_from_yaml(yaml);
    let model = ScriptedModel::new().fallback("unused").build();

    let failure = run_pipeline(model.clone(), &pipeline, inputs(&[("repo", json!("a/b"))]))
        .await
        .unwrap_err();

    assert_failed_at(
        &failure,
        "summary",
        &FailureKind::MissingInput {
            key: "pr_number".to_string(),
        },
    );
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_tool_failures_become_step_failures() {
    let yaml = r#"
name: tools
output: analysis
root:
  type: sequential
  name: Tools
  children:
    - type: step
      name: analysis
      inputs: [repo]
      tools:
        - tool: get_pr_diff
          params: { repo: "{repo}" }
      instruction: "ANALYSE {repo}"
"#;
    let model = ScriptedModel::new().fallback("unused").build();

    let failure = run_pipeline(model.clone(), &pipeline_from_yaml(yaml), inputs(&[("repo", json!("a/b"))]))
        .await
        .unwrap_err();
    assert_failed_at(
        &failure,
        "analysis",
        &FailureKind::Tool {
            tool: "get_pr_diff".to_string(),
            kind: ToolFailureKind::InvalidParams,
        },
    );
    assert!(failure.message.contains("pr_number"));

    let unknown = yaml.replace("get_pr_diff", "deploy_to_production");
    let failure = run_pipeline(model.clone(), &pipeline_from_yaml(&unknown), inputs(&[("repo", json!("a/b"))]))
        .await
        .unwrap_err();
    assert_eq!(
        failure.kind,
        FailureKind::Tool {
            tool: "deploy_to_production".to_string(),
            kind: ToolFailureKind::NotFound,
        }
    );
    assert!(model.calls().is_empty());
}

#[test]
fn test_configuration_errors_are_caught_at_load() {
    let exit_outside_loop = r#"
name: bad
output: a
root:
  type: sequential
  name: Top
  children:
    - { type: step, name: a, inputs: [a], instruction: "A", exit_when: { key: a } }
"#;
    let err = github_agents::core::config::PipelineConfig::from_yaml(exit_outside_loop).unwrap_err();
    assert!(format!("{:#}", err).contains("not inside a loop"));

    let duplicate_names = r#"
name: bad
output: a
root:
  type: sequential
  name: Top
  children:
    - { type: step, name: a, instruction: "A" }
    - { type: step, name: a, output: b, instruction: "B" }
"#;
    let err = github_agents::core::config::PipelineConfig::from_yaml(duplicate_names).unwrap_err();
    assert!(format!("{:#}", err).contains("Duplicate step name: a"));

    let undeclared = r#"
name: bad
output: a
root:
  type: sequential
  name: Top
  children:
    - { type: step, name: a, instruction: "Use {missing}" }
"#;
    let err = github_agents::core::config::PipelineConfig::from_yaml(undeclared).unwrap_err();
    assert!(format!("{:#}", err).contains("'{missing}'"));
}
