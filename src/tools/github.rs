//! Mock GitHub tools returning canned repository data

use super::{param_repo, param_str, param_u64, Tool, ToolFailureKind, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const APP_PATCH: &str = "@@ -10,7 +10,7 @@ def authenticate(username, password):
-    query = f\"SELECT * FROM users WHERE name = '{username}'\"
+    query = \"SELECT * FROM users WHERE name = ?\"
+    cursor.execute(query, (username,))";

const AUTH_PATCH: &str = "@@ -5,7 +5,7 @@ import os
-API_KEY = \"sk_live_12345\"
+API_KEY = os.getenv(\"API_KEY\")";

const VULNERABLE_SOURCE: &str = "def authenticate(username, password):
    query = f\"SELECT * FROM users WHERE name = '{username}'\"
    cursor.execute(query)
    return cursor.fetchone()";

/// Which GitHub operation a [`GitHubTool`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubOp {
    PrDetails,
    PrDiff,
    AddReviewComment,
    IssueDetails,
    UpdateIssueLabels,
    RepositoryInfo,
    SearchCode,
    FileContents,
    AnalyzeSecurity,
}

impl GitHubOp {
    pub const ALL: [GitHubOp; 9] = [
        GitHubOp::PrDetails,
        GitHubOp::PrDiff,
        GitHubOp::AddReviewComment,
        GitHubOp::IssueDetails,
        GitHubOp::UpdateIssueLabels,
        GitHubOp::RepositoryInfo,
        GitHubOp::SearchCode,
        GitHubOp::FileContents,
        GitHubOp::AnalyzeSecurity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GitHubOp::PrDetails => "get_pr_details",
            GitHubOp::PrDiff => "get_pr_diff",
            GitHubOp::AddReviewComment => "add_review_comment",
            GitHubOp::IssueDetails => "get_issue_details",
            GitHubOp::UpdateIssueLabels => "update_issue_labels",
            GitHubOp::RepositoryInfo => "get_repository_info",
            GitHubOp::SearchCode => "search_code",
            GitHubOp::FileContents => "get_file_contents",
            GitHubOp::AnalyzeSecurity => "analyze_security",
        }
    }

    fn description(self) -> &'static str {
        match self {
            GitHubOp::PrDetails => "Pull request metadata (repo, pr_number)",
            GitHubOp::PrDiff => "Changed files and patches of a pull request (repo, pr_number)",
            GitHubOp::AddReviewComment => "Post a review comment (repo, pr_number, comment[, file_path, line_number])",
            GitHubOp::IssueDetails => "Issue metadata and body (repo, issue_number)",
            GitHubOp::UpdateIssueLabels => "Replace the labels on an issue (repo, issue_number, labels)",
            GitHubOp::RepositoryInfo => "Repository summary (repo)",
            GitHubOp::SearchCode => "Search code in a repository (repo, query)",
            GitHubOp::FileContents => "Contents of one file (repo, file_path)",
            GitHubOp::AnalyzeSecurity => "Static security findings for a file (repo, file_path)",
        }
    }
}

/// One mock GitHub operation exposed as a tool
#[derive(Debug, Clone, Copy)]
pub struct GitHubTool {
    op: GitHubOp,
}

impl GitHubTool {
    pub fn new(op: GitHubOp) -> Self {
        Self { op }
    }

    pub fn catalogue() -> Vec<Arc<dyn Tool>> {
        GitHubOp::ALL
            .iter()
            .map(|op| Arc::new(GitHubTool::new(*op)) as Arc<dyn Tool>)
            .collect()
    }

    fn run(&self, params: &Value) -> Result<Value, ToolResult> {
        let repo = param_repo(params)?;

        let payload = match self.op {
            GitHubOp::PrDetails => {
                let pr = param_u64(params, "pr_number")?;
                json!({
                    "repo": repo,
                    "pr_number": pr,
                    "title": format!("Sample PR #{}", pr),
                    "author": "developer123",
                    "state": "open",
                    "files_changed": 2,
                    "additions": 80,
                    "deletions": 35,
                    "commits": 3,
                    "description": "Parameterize the login query and move the API key to the environment.",
                    "branch": "feature/harden-auth",
                    "base_branch": "main",
                })
            }
            GitHubOp::PrDiff => {
                let pr = param_u64(params, "pr_number")?;
                json!({
                    "repo": repo,
                    "pr_number": pr,
                    "files": [
                        {"filename": "src/app.py", "status": "modified", "additions": 50, "deletions": 20, "patch": APP_PATCH},
                        {"filename": "src/auth.py", "status": "modified", "additions": 30, "deletions": 15, "patch": AUTH_PATCH},
                    ],
                })
            }
            GitHubOp::AddReviewComment => {
                let pr = param_u64(params, "pr_number")?;
                param_str(params, "comment")?;
                let comment_type = match params.get("file_path").and_then(Value::as_str) {
                    Some(_) => "inline",
                    None => "general",
                };
                json!({
                    "message": "Comment added successfully",
                    "pr_number": pr,
                    "comment_id": 12345,
                    "comment_type": comment_type,
                })
            }
            GitHubOp::IssueDetails => {
                let issue = param_u64(params, "issue_number")?;
                json!({
                    "repo": repo,
                    "issue_number": issue,
                    "title": format!("Issue #{}: Crash on submit", issue),
                    "author": "user456",
                    "state": "open",
                    "labels": [],
                    "description": "The application crashes when clicking the submit button.",
                    "comments": 0,
                })
            }
            GitHubOp::UpdateIssueLabels => {
                let issue = param_u64(params, "issue_number")?;
                let labels = params
                    .get("labels")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                    .filter(|labels| !labels.is_empty())
                    .ok_or_else(|| {
                        ToolResult::failure(
                            ToolFailureKind::InvalidParams,
                            "parameter 'labels' must be a non-empty list of strings",
                        )
                    })?;
                json!({
                    "message": format!("Labels updated successfully: {}", labels.join(", ")),
                    "issue_number": issue,
                    "labels_applied": labels,
                })
            }
            GitHubOp::RepositoryInfo => {
                let (owner, name) = repo.split_once('/').unwrap_or((repo, repo));
                json!({
                    "repo": repo,
                    "owner": owner,
                    "name": name,
                    "description": "A sample repository for testing",
                    "language": "Python",
                    "stars": 42,
                    "open_issues": 5,
                    "open_prs": 3,
                    "default_branch": "main",
                })
            }
            GitHubOp::SearchCode => {
                let query = param_str(params, "query")?;
                json!({
                    "repo": repo,
                    "query": query,
                    "results": [
                        {"file": "src/app.py", "line": 23, "code": "query = f\"SELECT * FROM users WHERE name = '{username}'\""},
                    ],
                })
            }
            GitHubOp::FileContents => {
                let path = param_str(params, "file_path")?;
                json!({
                    "repo": repo,
                    "path": path,
                    "content": VULNERABLE_SOURCE,
                    "encoding": "utf-8",
                    "size": VULNERABLE_SOURCE.len(),
                })
            }
            GitHubOp::AnalyzeSecurity => {
                let path = param_str(params, "file_path")?;
                json!({
                    "file": path,
                    "vulnerabilities": [
                        {"severity": "critical", "type": "SQL Injection", "line": 23, "recommendation": "Use parameterized queries"},
                        {"severity": "high", "type": "Hardcoded Credentials", "line": 10, "recommendation": "Use environment variables"},
                    ],
                    "security_score": 35,
                })
            }
        };

        Ok(payload)
    }
}

#[async_trait]
impl Tool for GitHubTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    async fn invoke(&self, params: &Value) -> ToolResult {
        match self.run(params) {
            Ok(payload) => ToolResult::success(payload),
            Err(failure) => failure,
        }
    }
}
