//! github-agents - multi-agent GitHub workflows over a composable pipeline engine

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod orchestration;
pub mod session;
pub mod tools;
pub mod workflows;

// Re-export commonly used types
pub use agent::{AgentError, AgentResponse, ModelClient, OfflineModel, RetryPolicy};
pub use self::core::{Node, Pipeline, SharedState, Step, StepFailure};
pub use execution::{ExecutionEngine, ExecutionEvent, RunReport};
pub use orchestration::{Coordinator, CoordinatorResponse, PipelineRegistry};
pub use session::{InMemorySessionStore, SessionStore};
pub use tools::{Tool, ToolRegistry, ToolResult};
pub use workflows::GitHubWorkflows;
