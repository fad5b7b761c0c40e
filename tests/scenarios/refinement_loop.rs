//! Test: Refinement loop - critic/refiner until approval or the bound

use crate::helpers::*;
use github_agents::core::{LoopState, Pipeline, StepStatus};
use serde_json::json;

const DOCS_YAML: &str = r#"
name: docs
output: current_documentation
defaults:
  max_iterations: 3
root:
  type: sequential
  name: Docs
  children:
    - type: step
      name: writer
      inputs: [topic]
      output: current_documentation
      instruction: "WRITE about {topic}"
    - type: loop
      name: Refine
      body:
        - type: step
          name: critic
          inputs: [current_documentation]
          output: critique
          instruction: "CRITIQUE: {current_documentation}"
        - type: step
          name: refiner
          inputs: [current_documentation, critique]
          output: current_documentation
          exit_when: { key: critique }
          instruction: "REFINE {current_documentation} using {critique}"
"#;

fn docs_pipeline() -> Pipeline {
    pipeline_from_yaml(DOCS_YAML)
}

#[tokio::test]
async fn test_approval_on_second_iteration() {
    let model = ScriptedModel::new()
        .on("WRITE", "draft v0")
        .on_seq("CRITIQUE", vec!["add examples".into(), "APPROVED".into()])
        .on("REFINE", "draft v1")
        .build();

    let report = run_pipeline(model.clone(), &docs_pipeline(), inputs(&[("topic", json!("retries"))]))
        .await
        .unwrap();

    assert_eq!(report.loop_state("Refine"), Some(LoopState::Approved { iterations: 2 }));
    // The refiner's iteration-1 rewrite survives the approving iteration
    assert_eq!(report.output_text().as_deref(), Some("draft v1"));
    assert_eq!(report.state.get_text("critique").as_deref(), Some("APPROVED"));

    assert_eq!(report.runs_of("critic"), 2);
    assert_eq!(report.runs_of("refiner"), 2);
    assert_eq!(model.calls_matching("REFINE"), 1);

    let last = report.steps.last().unwrap();
    assert_eq!(last.step, "refiner");
    assert_eq!(last.status, StepStatus::ExitedLoop);
}

#[tokio::test]
async fn test_exhaustion_keeps_last_artifact() {
    let model = ScriptedModel::new()
        .on("WRITE", "draft v0")
        .on("CRITIQUE", "still unclear")
        .on_seq("REFINE", vec!["draft v1".into(), "draft v2".into(), "draft v3".into()])
        .build();

    let report = run_pipeline(model.clone(), &docs_pipeline(), inputs(&[("topic", json!("retries"))]))
        .await
        .unwrap();

    assert_eq!(report.loop_state("Refine"), Some(LoopState::Exhausted { iterations: 3 }));
    assert_eq!(report.output_text().as_deref(), Some("draft v3"));
    assert_eq!(model.calls_matching("CRITIQUE"), 3);
    assert_eq!(model.calls_matching("REFINE"), 3);
}

#[tokio::test]
async fn test_sentinel_is_trimmed_but_exact() {
    let model = ScriptedModel::new()
        .on("WRITE", "draft v0")
        .on("CRITIQUE", "  APPROVED\n")
        .build();
    let report = run_pipeline(model, &docs_pipeline(), inputs(&[("topic", json!("retries"))]))
        .await
        .unwrap();
    assert_eq!(report.loop_state("Refine"), Some(LoopState::Approved { iterations: 1 }));
    assert_eq!(report.output_text().as_deref(), Some("draft v0"));

    let model = ScriptedModel::new()
        .on("WRITE", "draft v0")
        .on("CRITIQUE", "APPROVED, mostly")
        .on("REFINE", "draft v1")
        .build();
    let report = run_pipeline(model, &docs_pipeline(), inputs(&[("topic", json!("retries"))]))
        .await
        .unwrap();
    assert_eq!(report.loop_state("Refine"), Some(LoopState::Exhausted { iterations: 3 }));
}

#[tokio::test]
async fn test_custom_sentinel_and_bound() {
    let yaml = DOCS_YAML
        .replace("exit_when: { key: critique }", "exit_when: { key: critique, equals: LGTM }")
        .replace("max_iterations: 3", "max_iterations: 5");
    let pipeline = pipeline_from_yaml(&yaml);

    let model = ScriptedModel::new()
        .on("WRITE", "draft v0")
        .on_seq(
            "CRITIQUE",
            vec!["APPROVED".into(), "nit".into(), "nit".into(), "LGTM".into()],
        )
        .on("REFINE", "draft v+")
        .build();

    let report = run_pipeline(model, &pipeline, inputs(&[("topic", json!("retries"))]))
        .await
        .unwrap();
    assert_eq!(report.loop_state("Refine"), Some(LoopState::Approved { iterations: 4 }));
}
