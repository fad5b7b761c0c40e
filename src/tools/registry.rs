//! Tool lookup by name with logged, panic-contained invocation

use super::{DocumentTool, GitHubTool, Tool, ToolFailureKind, ToolResult};
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Registered tools keyed by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the full mock GitHub and document catalogue
    pub fn with_mock_catalogue() -> Self {
        let mut registry = Self::new();
        for tool in GitHubTool::catalogue() {
            registry.register(tool);
        }
        for tool in DocumentTool::catalogue() {
            registry.register(tool);
        }
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// `(name, description)` for every registered tool
    pub fn describe(&self) -> Vec<(String, String)> {
        self.tools
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    /// Invoke a tool by name
    ///
    /// Always returns an envelope: unknown names give `NotFound` and a
    /// panicking tool gives `Internal`.
    pub async fn invoke(&self, name: &str, params: &Value) -> ToolResult {
        let started = Instant::now();

        let result = match self.tools.get(name) {
            None => ToolResult::failure(
                ToolFailureKind::NotFound,
                format!("no tool named '{}' is registered", name),
            ),
            Some(tool) => AssertUnwindSafe(tool.invoke(params))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    ToolResult::failure(ToolFailureKind::Internal, format!("tool '{}' panicked", name))
                }),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            ToolResult::Success(_) => {
                info!(tool = name, params = %params, duration_ms, status = "success", "Tool invoked");
            }
            ToolResult::Failure { message, kind } => {
                warn!(
                    tool = name,
                    params = %params,
                    duration_ms,
                    status = "error",
                    kind = %kind,
                    error = %message,
                    "Tool invocation failed"
                );
            }
        }

        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
