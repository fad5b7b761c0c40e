//! Test: Built-in GitHub workflows over the offline model and mock tools

use crate::helpers::*;
use github_agents::agent::OfflineModel;
use github_agents::core::config::PipelineConfig;
use github_agents::core::LoopState;
use github_agents::tools::ToolFailureKind;
use github_agents::workflows::{builtin, GitHubWorkflows, WorkflowError};
use std::path::Path;
use std::sync::Arc;

fn workflows(max_iterations: u32) -> GitHubWorkflows {
    let engine = Arc::new(engine(Arc::new(OfflineModel::new())));
    GitHubWorkflows::new(engine, builtin::registry(max_iterations).unwrap())
}

#[tokio::test]
async fn test_review_pull_request_posts_comment() {
    let result = workflows(3)
        .review_pull_request("octocat/hello-world", 42, true)
        .await
        .unwrap();

    assert!(result.code_analysis.starts_with("Code analysis:"));
    assert!(result.security_analysis.starts_with("Security analysis:"));
    assert!(result.review.contains("## Review summary"));
    assert!(result.comment_posted);

    let unposted = workflows(3)
        .review_pull_request("octocat/hello-world", 42, false)
        .await
        .unwrap();
    assert!(!unposted.comment_posted);
}

#[tokio::test]
async fn test_review_rejects_malformed_repo() {
    let err = workflows(3)
        .review_pull_request("not-a-repo", 42, false)
        .await
        .unwrap_err();
    let WorkflowError::Step(failure) = err else {
        panic!("expected a step failure, got {:?}", err);
    };
    assert_eq!(failure.step, "code_analysis");
}

#[tokio::test]
async fn test_triage_issue_applies_labels() {
    let result = workflows(3)
        .triage_issue("octocat/hello-world", 7, true)
        .await
        .unwrap();

    assert!(result.category.starts_with("Category: bug"));
    assert!(result.priority.starts_with("Priority: high"));
    assert_eq!(result.labels, vec!["bug", "priority:high", "needs-triage"]);
    assert!(result.labels_applied);
}

#[tokio::test]
async fn test_batch_triage_keeps_order() {
    let outcomes = workflows(3)
        .triage_issues("octocat/hello-world", &[1, 2, 3], false)
        .await;

    let numbers: Vec<u64> = outcomes.iter().map(|o| o.issue_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    for outcome in &outcomes {
        let triage = outcome.result.as_ref().unwrap();
        assert_eq!(triage.issue_number, outcome.issue_number);
        assert!(!triage.labels_applied);
    }

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0]["result"]["status"], "success");
}

#[tokio::test]
async fn test_documentation_is_approved_after_one_revision() {
    let result = workflows(3)
        .improve_documentation("Retry policy for model calls", None)
        .await
        .unwrap();

    assert_eq!(result.loop_state, LoopState::Approved { iterations: 2 });
    assert!(result.approved);
    assert_eq!(result.iterations, 2);
    assert!(result.documentation.contains("## Troubleshooting"));
    assert_eq!(result.critique.as_deref(), Some("APPROVED"));
}

#[tokio::test]
async fn test_documentation_bound_of_one_is_exhausted() {
    let result = workflows(1)
        .improve_documentation("Retry policy for model calls", Some("api"))
        .await
        .unwrap();

    assert_eq!(result.loop_state, LoopState::Exhausted { iterations: 1 });
    assert!(!result.approved);
    // The refiner still ran once, so the revision is kept
    assert!(result.documentation.contains("## Troubleshooting"));
}

#[tokio::test]
async fn test_document_from_pdf() {
    let docs = workflows(3);

    let result = docs.document_from_pdf("design.pdf").await.unwrap();
    assert!(result.approved);

    let err = docs.document_from_pdf("").await.unwrap_err();
    match err {
        WorkflowError::Tool { tool, kind, .. } => {
            assert_eq!(tool, "convert_pdf_to_markdown");
            assert_eq!(kind, ToolFailureKind::InvalidParams);
        }
        other => panic!("expected a tool failure, got {:?}", other),
    }
}

#[test]
fn test_shipped_pipeline_files_validate() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("pipelines");
    for name in ["pr_review", "issue_triage", "documentation"] {
        let config = PipelineConfig::from_file(dir.join(format!("{}.yaml", name)))
            .unwrap_or_else(|e| panic!("{}: {:#}", name, e));
        assert_eq!(config.name, name);
        config.to_pipeline().unwrap();
    }
}
