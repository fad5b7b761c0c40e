//! Pipeline configuration from YAML

use crate::core::error::BuildError;
use crate::core::pipeline::{Node, Pipeline, DEFAULT_MAX_ITERATIONS};
use crate::core::state::SharedState;
use crate::core::step::{Step, DEFAULT_SENTINEL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Key holding the final artifact
    pub output: String,

    /// Default values for inputs the caller may leave out
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,

    #[serde(default)]
    pub defaults: StepDefaults,

    /// The composer tree
    pub root: NodeConfig,
}

/// Values applied to every step and loop unless overridden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDefaults {
    /// Per-step timeout; the engine default applies when unset
    pub timeout_secs: Option<u64>,

    /// Sentinel for exit conditions that do not name one
    pub sentinel: String,

    /// Bound for loops that do not set one
    pub max_iterations: u32,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            sentinel: DEFAULT_SENTINEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// One node of the composer tree, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Step(StepConfig),
    Sequential {
        name: String,
        children: Vec<NodeConfig>,
    },
    Parallel {
        name: String,
        children: Vec<NodeConfig>,
    },
    Loop {
        name: String,
        #[serde(default)]
        max_iterations: Option<u32>,
        body: Vec<NodeConfig>,
    },
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Optional step description
    #[serde(default)]
    pub description: Option<String>,

    /// Keys read from shared state
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Key written on success (defaults to the step name)
    #[serde(default)]
    pub output: Option<String>,

    /// Model instruction template (mutually exclusive with `tool`)
    #[serde(default)]
    pub instruction: Option<String>,

    /// Tool whose payload becomes the output
    #[serde(default)]
    pub tool: Option<String>,

    /// Parameters for `tool`
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Tools called before the model
    #[serde(default)]
    pub tools: Vec<ToolCallConfig>,

    #[serde(default)]
    pub exit_when: Option<ExitConfig>,

    /// Timeout for this step (overrides the default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallConfig {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// `exit_when: { key: critique, equals: APPROVED }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    pub key: String,
    #[serde(default)]
    pub equals: Option<String>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid pipeline file {}", path.display()))
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), BuildError> {
        self.to_pipeline().map(|_| ())
    }

    /// Override the iteration bound of every loop
    pub fn with_max_iterations(mut self, limit: u32) -> Self {
        self.defaults.max_iterations = limit;
        self.root.set_loop_limit(limit);
        self
    }

    /// Convert config to a validated Pipeline
    pub fn to_pipeline(&self) -> Result<Pipeline, BuildError> {
        let root = self.root.to_node(&self.defaults)?;
        let mut pipeline = Pipeline::build(self.name.clone(), root, self.output.clone())?
            .with_defaults(self.variables.clone().into_iter().collect::<SharedState>());
        pipeline.description = self.description.clone();
        Ok(pipeline)
    }
}

impl NodeConfig {
    fn to_node(&self, defaults: &StepDefaults) -> Result<Node, BuildError> {
        let convert = |children: &[NodeConfig]| -> Result<Vec<Node>, BuildError> {
            children.iter().map(|c| c.to_node(defaults)).collect()
        };

        Ok(match self {
            NodeConfig::Step(step) => Node::Step(Step::from_config(step, defaults)?),
            NodeConfig::Sequential { name, children } => Node::sequential(name.clone(), convert(children)?),
            NodeConfig::Parallel { name, children } => Node::parallel(name.clone(), convert(children)?),
            NodeConfig::Loop {
                name,
                max_iterations,
                body,
            } => Node::looped(
                name.clone(),
                max_iterations.unwrap_or(defaults.max_iterations),
                convert(body)?,
            ),
        })
    }

    fn set_loop_limit(&mut self, limit: u32) {
        match self {
            NodeConfig::Step(_) => {}
            NodeConfig::Sequential { children, .. } | NodeConfig::Parallel { children, .. } => {
                children.iter_mut().for_each(|c| c.set_loop_limit(limit));
            }
            NodeConfig::Loop {
                max_iterations, body, ..
            } => {
                *max_iterations = Some(limit);
                body.iter_mut().for_each(|c| c.set_loop_limit(limit));
            }
        }
    }
}
