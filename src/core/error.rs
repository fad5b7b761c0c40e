//! Step failures and pipeline configuration errors

use crate::agent::AgentError;
use crate::tools::ToolFailureKind;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What went wrong inside a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FailureKind {
    /// A declared input key was absent from shared state
    MissingInput { key: String },
    /// A tool returned a failure envelope
    Tool { tool: String, kind: ToolFailureKind },
    /// The model failed with a non-retryable error
    Model,
    /// Transient model failures outlasted the retry policy
    RetriesExhausted { attempts: u32 },
    /// The step exceeded its wall-clock budget
    Timeout { secs: u64 },
    /// The model answered with nothing usable
    EmptyResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MissingInput { key } => write!(f, "missing input '{}'", key),
            FailureKind::Tool { tool, kind } => write!(f, "tool '{}' failed ({})", tool, kind),
            FailureKind::Model => write!(f, "model error"),
            FailureKind::RetriesExhausted { attempts } => {
                write!(f, "model retries exhausted after {} attempts", attempts)
            }
            FailureKind::Timeout { secs } => write!(f, "timed out after {}s", secs),
            FailureKind::EmptyResponse => write!(f, "empty model response"),
        }
    }
}

/// A failed step, with the composer path that led to it
///
/// `path` lists enclosing composers outermost first; loop entries carry the
/// iteration as `name#n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("step '{step}' failed at {}: {kind}: {message}", self.location())]
pub struct StepFailure {
    pub step: String,
    pub path: Vec<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(step: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            path: Vec::new(),
            kind,
            message: message.into(),
        }
    }

    pub fn missing_input(step: &str, key: &str) -> Self {
        Self::new(
            step,
            FailureKind::MissingInput { key: key.to_string() },
            format!("required input '{}' is not in shared state", key),
        )
    }

    /// Map a model error onto the step that made the call
    pub fn from_agent(step: &str, error: AgentError) -> Self {
        let kind = match &error {
            AgentError::RetriesExhausted { attempts, .. } => FailureKind::RetriesExhausted { attempts: *attempts },
            AgentError::Timeout(secs) => FailureKind::Timeout { secs: *secs },
            AgentError::Status { .. } | AgentError::Fatal(_) => FailureKind::Model,
        };
        Self::new(step, kind, error.to_string())
    }

    /// Record an enclosing composer
    pub fn within(mut self, composer: impl Into<String>) -> Self {
        self.path.insert(0, composer.into());
        self
    }

    /// `Outer/Inner/step`
    pub fn location(&self) -> String {
        let mut parts = self.path.clone();
        parts.push(self.step.clone());
        parts.join("/")
    }
}

/// Configuration errors found while building a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Parallel node '{node}' has more than one branch writing '{key}'")]
    DuplicateOutputKey { node: String, key: String },

    #[error("Step '{step}' has an exit condition but is not inside a loop")]
    ExitOutsideLoop { step: String },

    #[error("Step '{step}' has an exit condition inside parallel node '{node}'")]
    ExitInsideParallel { step: String, node: String },

    #[error("Step '{step}' exits on '{key}', which is not one of its inputs")]
    ExitKeyNotInput { step: String, key: String },

    #[error("Step '{step}' references '{{{key}}}' but does not declare it as an input")]
    UndeclaredPlaceholder { step: String, key: String },

    #[error("Loop '{0}' must allow at least one iteration")]
    ZeroIterations(String),

    #[error("Composer '{0}' has no children")]
    EmptyComposite(String),

    #[error("Pipeline output '{0}' is not written by any step")]
    UnknownOutput(String),

    #[error("Step '{0}' must have exactly one of 'instruction' or 'tool'")]
    AmbiguousCapability(String),
}
