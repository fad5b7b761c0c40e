//! Test: Parallel fan-out - shared snapshot, merged outputs, wait-for-all

use crate::helpers::*;
use github_agents::agent::AgentError;
use github_agents::core::config::PipelineConfig;
use github_agents::core::{BuildError, FailureKind, Node, Pipeline, Step};
use github_agents::execution::ExecutionEvent;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fan_pipeline(left: Step, right: Step) -> Pipeline {
    let root = Node::sequential(
        "Review",
        vec![
            Node::parallel("Fan", vec![left.into(), right.into()]),
            Step::model("join", "JOIN {left} + {right}").inputs(["left", "right"]).into(),
        ],
    );
    Pipeline::build("fan", root, "join").unwrap()
}

#[tokio::test]
async fn test_branches_share_one_snapshot() {
    let pipeline = fan_pipeline(
        Step::model("left", "LEFT sees {seed}").inputs(["seed"]),
        Step::model("right", "RIGHT sees {seed}").inputs(["seed"]),
    );
    let model = ScriptedModel::new()
        .on("LEFT", "L")
        .on("RIGHT", "R")
        .on("JOIN L + R", "merged")
        .build();

    let report = run_pipeline(model.clone(), &pipeline, inputs(&[("seed", json!("s0"))]))
        .await
        .unwrap();

    assert_eq!(report.output_text().as_deref(), Some("merged"));
    assert_eq!(report.state.get_text("left").as_deref(), Some("L"));
    assert_eq!(report.state.get_text("right").as_deref(), Some("R"));
    assert_eq!(model.calls_matching("sees s0"), 2);
}

#[tokio::test]
async fn test_branch_cannot_read_sibling_output() {
    let pipeline = fan_pipeline(
        Step::model("left", "LEFT"),
        Step::model("right", "RIGHT with {left}").inputs(["left"]),
    );
    let model = ScriptedModel::new().on("LEFT", "L").on("RIGHT", "R").build();

    let failure = run_pipeline(model.clone(), &pipeline, inputs(&[]))
        .await
        .unwrap_err();

    assert_failed_at(
        &failure,
        "right",
        &FailureKind::MissingInput {
            key: "left".to_string(),
        },
    );
    assert_eq!(failure.path, vec!["Review", "Fan"]);
    assert_eq!(model.calls_matching("RIGHT"), 0);
}

#[test]
fn test_duplicate_output_keys_rejected_at_build() {
    let root = Node::parallel(
        "Fan",
        vec![
            Step::model("a", "A").output("verdict").into(),
            Step::model("b", "B").output("verdict").into(),
        ],
    );
    assert_eq!(
        Pipeline::build("dup", root, "verdict").unwrap_err(),
        BuildError::DuplicateOutputKey {
            node: "Fan".to_string(),
            key: "verdict".to_string()
        }
    );

    let yaml = r#"
name: dup
output: verdict
root:
  type: parallel
  name: Fan
  children:
    - { type: step, name: a, output: verdict, instruction: "A" }
    - { type: step, name: b, output: verdict, instruction: "B" }
"#;
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("more than one branch writing 'verdict'"));
}

#[tokio::test(start_paused = true)]
async fn test_branches_overlap_in_time() {
    let pipeline = fan_pipeline(Step::model("left", "LEFT"), Step::model("right", "RIGHT"));
    let model = ScriptedModel::new()
        .on("LEFT", Reply::Delayed(Duration::from_secs(10), "L".to_string()))
        .on("RIGHT", Reply::Delayed(Duration::from_secs(10), "R".to_string()))
        .on("JOIN", "done")
        .build();

    let started = tokio::time::Instant::now();
    run_pipeline(model, &pipeline, inputs(&[])).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(15), "branches ran one after the other");
}

#[tokio::test(start_paused = true)]
async fn test_failure_waits_for_slow_sibling() {
    let pipeline = fan_pipeline(Step::model("left", "LEFT"), Step::model("right", "RIGHT"));
    let model = ScriptedModel::new()
        .on("LEFT", Reply::Fail(AgentError::Fatal("left broke".to_string())))
        .on("RIGHT", Reply::Delayed(Duration::from_secs(30), "R".to_string()))
        .build();

    let engine = engine(model.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;

    let failure = engine.run(&pipeline, inputs(&[])).await.unwrap_err();
    assert_failed_at(&failure, "left", &FailureKind::Model);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StepCompleted { step, .. } if step == "right"
    )));
    assert_eq!(model.calls_matching("JOIN"), 0);
}

#[tokio::test]
async fn test_first_failure_in_declaration_order() {
    let pipeline = fan_pipeline(Step::model("left", "LEFT"), Step::model("right", "RIGHT"));
    let model = ScriptedModel::new()
        .on("LEFT", Reply::Fail(AgentError::Fatal("left broke".to_string())))
        .on("RIGHT", Reply::Fail(AgentError::Fatal("right broke".to_string())))
        .build();

    let failure = run_pipeline(model, &pipeline, inputs(&[])).await.unwrap_err();
    assert_eq!(failure.step, "left");
    assert!(failure.message.contains("left broke"));
}
