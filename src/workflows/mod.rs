//! GitHub workflows built on the pipeline engine
//!
//! Each workflow runs one built-in pipeline and then applies its side effect
//! (posting a review, applying labels) through the tool registry.

pub mod builtin;

use crate::{
    core::{LoopState, SharedState, StepFailure},
    execution::{ExecutionEngine, RunReport},
    orchestration::PipelineRegistry,
    tools::{ToolFailureKind, ToolResult},
};
use futures::future::join_all;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

const DOCS_LOOP: &str = "ImprovementLoop";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Step(#[from] StepFailure),

    #[error("Pipeline '{0}' is not registered")]
    UnknownPipeline(String),

    #[error("Tool '{tool}' failed ({kind}): {message}")]
    Tool {
        tool: String,
        kind: ToolFailureKind,
        message: String,
    },

    #[error("Pipeline '{pipeline}' produced no '{key}'")]
    MissingOutput { pipeline: String, key: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub repo: String,
    pub pr_number: u64,
    pub code_analysis: String,
    pub security_analysis: String,
    pub review: String,
    /// Whether the review was posted back to the pull request
    pub comment_posted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriageResult {
    pub repo: String,
    pub issue_number: u64,
    pub category: String,
    pub priority: String,
    pub triage: String,
    /// Labels parsed from the triage text
    pub labels: Vec<String>,
    pub labels_applied: bool,
}

/// One entry of a batch triage; failures are kept alongside successes
#[derive(Debug, Serialize)]
pub struct IssueOutcome {
    pub issue_number: u64,
    #[serde(serialize_with = "serialize_outcome")]
    pub result: Result<TriageResult, WorkflowError>,
}

fn serialize_outcome<S>(result: &Result<TriageResult, WorkflowError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match result {
        Ok(triage) => json!({ "status": "success", "triage": triage }).serialize(serializer),
        Err(e) => json!({ "status": "error", "error_message": e.to_string() }).serialize(serializer),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsResult {
    pub documentation: String,
    /// Last critique seen by the refinement loop
    pub critique: Option<String>,
    pub loop_state: LoopState,
    pub approved: bool,
    pub iterations: u32,
}

/// Runs the built-in GitHub pipelines
#[derive(Clone)]
pub struct GitHubWorkflows {
    engine: Arc<ExecutionEngine>,
    pipelines: PipelineRegistry,
}

impl GitHubWorkflows {
    pub fn new(engine: Arc<ExecutionEngine>, pipelines: PipelineRegistry) -> Self {
        Self { engine, pipelines }
    }

    async fn run(&self, route: &str, inputs: SharedState) -> Result<RunReport, WorkflowError> {
        let entry = self
            .pipelines
            .get(route)
            .ok_or_else(|| WorkflowError::UnknownPipeline(route.to_string()))?;
        Ok(self.engine.run(&entry.pipeline, inputs).await?)
    }

    async fn call_tool(&self, tool: &str, params: Value) -> Result<Value, WorkflowError> {
        match self.engine.tools().invoke(tool, &params).await {
            ToolResult::Success(payload) => Ok(payload),
            ToolResult::Failure { message, kind } => Err(WorkflowError::Tool {
                tool: tool.to_string(),
                kind,
                message,
            }),
        }
    }

    /// Review a pull request; with `post_comments` the review is posted back
    pub async fn review_pull_request(
        &self,
        repo: &str,
        pr_number: u64,
        post_comments: bool,
    ) -> Result<ReviewResult, WorkflowError> {
        info!(repo = %repo, pr_number, "Reviewing pull request");

        let inputs: SharedState = [("repo", json!(repo)), ("pr_number", json!(pr_number))]
            .into_iter()
            .collect();
        let report = self.run(builtin::PR_REVIEW, inputs).await?;
        let review = required_output(&report)?;

        let mut comment_posted = false;
        if post_comments {
            let params = json!({ "repo": repo, "pr_number": pr_number, "comment": review });
            match self.call_tool("add_review_comment", params).await {
                Ok(_) => comment_posted = true,
                Err(e) => warn!(repo = %repo, pr_number, "Review not posted: {}", e),
            }
        }

        Ok(ReviewResult {
            repo: repo.to_string(),
            pr_number,
            code_analysis: report.state.get_text("code_analysis").unwrap_or_default(),
            security_analysis: report.state.get_text("security_analysis").unwrap_or_default(),
            review,
            comment_posted,
        })
    }

    /// Triage one issue; with `apply_labels` the parsed labels are applied
    pub async fn triage_issue(
        &self,
        repo: &str,
        issue_number: u64,
        apply_labels: bool,
    ) -> Result<TriageResult, WorkflowError> {
        info!(repo = %repo, issue_number, "Triaging issue");

        let inputs: SharedState = [("repo", json!(repo)), ("issue_number", json!(issue_number))]
            .into_iter()
            .collect();
        let report = self.run(builtin::ISSUE_TRIAGE, inputs).await?;
        let triage = required_output(&report)?;
        let labels = extract_labels(&triage);

        let mut labels_applied = false;
        if apply_labels {
            if labels.is_empty() {
                warn!(repo = %repo, issue_number, "No labels found in triage result");
            } else {
                let params = json!({ "repo": repo, "issue_number": issue_number, "labels": labels });
                self.call_tool("update_issue_labels", params).await?;
                labels_applied = true;
            }
        }

        Ok(TriageResult {
            repo: repo.to_string(),
            issue_number,
            category: report.state.get_text("category_classification").unwrap_or_default(),
            priority: report.state.get_text("priority_assessment").unwrap_or_default(),
            triage,
            labels,
            labels_applied,
        })
    }

    /// Triage several issues concurrently; results keep the input order
    pub async fn triage_issues(&self, repo: &str, issue_numbers: &[u64], apply_labels: bool) -> Vec<IssueOutcome> {
        info!(repo = %repo, count = issue_numbers.len(), "Triaging issues");

        let outcomes: Vec<IssueOutcome> = join_all(issue_numbers.iter().map(|&issue_number| async move {
            IssueOutcome {
                issue_number,
                result: self.triage_issue(repo, issue_number, apply_labels).await,
            }
        }))
        .await;

        let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        info!(repo = %repo, succeeded, failed = outcomes.len() - succeeded, "Batch triage finished");
        outcomes
    }

    /// Draft documentation from `content` and refine it until approved or the
    /// loop bound is reached
    pub async fn improve_documentation(&self, content: &str, context: Option<&str>) -> Result<DocsResult, WorkflowError> {
        let mut inputs: SharedState = [("content", content)].into_iter().collect();
        if let Some(context) = context {
            inputs.insert("context", context);
        }

        let report = self.run(builtin::DOCUMENTATION, inputs).await?;
        let documentation = required_output(&report)?;
        let loop_state = report
            .loop_state(DOCS_LOOP)
            .unwrap_or(LoopState::Exhausted { iterations: 0 });

        info!(
            approved = loop_state.is_approved(),
            iterations = loop_state.iterations(),
            "Documentation finished"
        );

        Ok(DocsResult {
            documentation,
            critique: report.state.get_text("critique"),
            loop_state,
            approved: loop_state.is_approved(),
            iterations: loop_state.iterations(),
        })
    }

    /// Convert a PDF, pull out its key points and document it
    pub async fn document_from_pdf(&self, pdf_path: &str) -> Result<DocsResult, WorkflowError> {
        info!(pdf = %pdf_path, "Documenting PDF");

        let converted = self
            .call_tool("convert_pdf_to_markdown", json!({ "pdf_path": pdf_path }))
            .await?;
        let markdown = converted
            .get("markdown_content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let key_info = self
            .call_tool("extract_key_information", json!({ "markdown_content": markdown }))
            .await?;
        let context = format!(
            "Converted from {}. Key information:\n{}",
            pdf_path,
            serde_json::to_string_pretty(&key_info).unwrap_or_else(|_| key_info.to_string())
        );

        self.improve_documentation(&markdown, Some(&context)).await
    }
}

fn required_output(report: &RunReport) -> Result<String, WorkflowError> {
    report.output_text().ok_or_else(|| WorkflowError::MissingOutput {
        pipeline: report.pipeline.clone(),
        key: report.output_key.clone(),
    })
}

fn labels_regex() -> Option<&'static Regex> {
    static LABELS: OnceLock<Option<Regex>> = OnceLock::new();
    LABELS
        .get_or_init(|| Regex::new(r"(?im)^\s*\**labels?\**\s*:\s*(.+)$").ok())
        .as_ref()
}

/// Labels from a `Labels: a, b, c` line
pub fn extract_labels(text: &str) -> Vec<String> {
    let Some(line) = labels_regex()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
    else {
        return Vec::new();
    };

    let mut labels: Vec<String> = Vec::new();
    for label in line.as_str().split(',') {
        let label = label.trim().trim_matches(|c| matches!(c, '`' | '"' | '\'' | '*' | '[' | ']'));
        if !label.is_empty() && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}
