//! Tool invocation envelope, the `Tool` trait and the mock tool catalogue

pub mod documents;
pub mod github;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use documents::DocumentTool;
pub use github::GitHubTool;
pub use registry::ToolRegistry;

/// Why a tool invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    InvalidParams,
    NotFound,
    Upstream,
    Internal,
}

impl std::fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolFailureKind::InvalidParams => "invalid_params",
            ToolFailureKind::NotFound => "not_found",
            ToolFailureKind::Upstream => "upstream",
            ToolFailureKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// Result envelope every tool invocation returns
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Failure { message: String, kind: ToolFailureKind },
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        ToolResult::Success(payload)
    }

    pub fn failure(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        ToolResult::Failure {
            message: message.into(),
            kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            ToolResult::Success(_) => "success",
            ToolResult::Failure { .. } => "error",
        }
    }

    /// Wire shape: `{"status":"success", ...payload}` or
    /// `{"status":"error","error_message":"..."}`
    ///
    /// Non-object payloads are carried under `result`.
    pub fn to_envelope(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("status".into(), Value::from(self.status()));
        match self {
            ToolResult::Success(Value::Object(fields)) => {
                for (k, v) in fields {
                    if k != "status" {
                        envelope.insert(k.clone(), v.clone());
                    }
                }
            }
            ToolResult::Success(other) => {
                envelope.insert("result".into(), other.clone());
            }
            ToolResult::Failure { message, kind } => {
                envelope.insert("error_message".into(), Value::from(message.as_str()));
                envelope.insert("error_kind".into(), Value::from(kind.to_string()));
            }
        }
        Value::Object(envelope)
    }

    /// Parse the wire shape back; anything unrecognised is an internal failure
    pub fn from_envelope(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::failure(ToolFailureKind::Internal, "tool envelope is not an object");
        };
        match fields.remove("status").as_ref().and_then(Value::as_str) {
            Some("success") => ToolResult::Success(Value::Object(fields)),
            Some("error") => {
                let message = fields
                    .get("error_message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown tool error")
                    .to_string();
                let kind = fields
                    .get("error_kind")
                    .cloned()
                    .and_then(|k| serde_json::from_value(k).ok())
                    .unwrap_or(ToolFailureKind::Upstream);
                ToolResult::Failure { message, kind }
            }
            _ => Self::failure(ToolFailureKind::Internal, "tool envelope has no valid status"),
        }
    }
}

/// A capability callable by name with JSON parameters
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(&self, params: &Value) -> ToolResult;
}

/// Required string parameter
pub(crate) fn param_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolResult> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing(key, "a non-empty string"))
}

/// Required positive integer parameter; numeric strings are accepted
pub(crate) fn param_u64(params: &Value, key: &str) -> Result<u64, ToolResult> {
    let value = params.get(key).ok_or_else(|| missing(key, "a number"))?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().trim_start_matches('#').parse().ok()))
        .filter(|n| *n > 0)
        .ok_or_else(|| missing(key, "a positive number"))
}

/// `owner/name` repository parameter
pub(crate) fn param_repo(params: &Value) -> Result<&str, ToolResult> {
    let repo = param_str(params, "repo")?;
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(repo),
        _ => Err(ToolResult::failure(
            ToolFailureKind::InvalidParams,
            format!("repo must look like owner/name, got '{}'", repo),
        )),
    }
}

fn missing(key: &str, expected: &str) -> ToolResult {
    ToolResult::failure(
        ToolFailureKind::InvalidParams,
        format!("parameter '{}' must be {}", key, expected),
    )
}
