//! Step executor - runs individual steps against shared state

use crate::{
    agent::ModelClient,
    core::{Capability, FailureKind, SharedState, Step, StepContext, StepFailure},
    tools::{ToolRegistry, ToolResult},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};

/// Result of executing a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step produced its output
    Produced { key: String, value: Value },
    /// The exit condition matched; nothing was written
    ExitLoop { key: String, sentinel: String },
}

/// Executes a single step
pub struct StepExecutor {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    default_timeout_secs: u64,
}

impl StepExecutor {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, default_timeout_secs: u64) -> Self {
        Self {
            model,
            tools,
            default_timeout_secs,
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Execute a step under its wall-clock budget
    pub async fn execute(&self, step: &Step, state: &SharedState) -> Result<StepOutcome, StepFailure> {
        info!("Executing step: {}", step.name);

        let timeout_secs = step.timeout_secs.unwrap_or(self.default_timeout_secs);
        match timeout(Duration::from_secs(timeout_secs), self.run(step, state)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Timeout for step {} after {}s", step.name, timeout_secs);
                Err(StepFailure::new(
                    &step.name,
                    FailureKind::Timeout { secs: timeout_secs },
                    format!("Timeout after {} seconds", timeout_secs),
                ))
            }
        }
    }

    async fn run(&self, step: &Step, state: &SharedState) -> Result<StepOutcome, StepFailure> {
        let mut ctx = StepContext::assemble(step, state)?;

        if let Some(exit) = &step.exit_condition {
            let current = ctx.text(&exit.key).unwrap_or_default();
            if exit.is_met(&current) {
                info!(step = %step.name, key = %exit.key, "Exit condition met");
                return Ok(StepOutcome::ExitLoop {
                    key: exit.key.clone(),
                    sentinel: exit.sentinel.clone(),
                });
            }
        }

        for call in &step.tools {
            let params = ctx.resolve_params(&call.params);
            let payload = self.call_tool(step, &call.tool, &params).await?;
            ctx.push_tool_result(&call.tool, payload);
        }

        let value = match &step.capability {
            Capability::Model { instruction } => {
                let prompt = ctx.prompt(instruction);
                debug!("Effective prompt for step {}: {}", step.name, prompt);

                let response = self
                    .model
                    .invoke(&prompt, &ctx.prior_context)
                    .await
                    .map_err(|e| {
                        error!("Model error for step {}: {}", step.name, e);
                        StepFailure::from_agent(&step.name, e)
                    })?;

                if response.content.trim().is_empty() {
                    return Err(StepFailure::new(
                        &step.name,
                        FailureKind::EmptyResponse,
                        "model returned no content",
                    ));
                }
                debug!("Model response for step {}: {}", step.name, response.content);
                Value::String(response.content)
            }
            Capability::Tool { tool, params } => {
                let params = ctx.resolve_params(params);
                self.call_tool(step, tool, &params).await?
            }
        };

        info!("Step {} completed successfully", step.name);
        Ok(StepOutcome::Produced {
            key: step.output_key.clone(),
            value,
        })
    }

    async fn call_tool(&self, step: &Step, tool: &str, params: &Value) -> Result<Value, StepFailure> {
        match self.tools.invoke(tool, params).await {
            ToolResult::Success(payload) => Ok(payload),
            ToolResult::Failure { message, kind } => Err(StepFailure::new(
                &step.name,
                FailureKind::Tool {
                    tool: tool.to_string(),
                    kind,
                },
                message,
            )),
        }
    }
}
