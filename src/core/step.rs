//! Step domain model

use crate::core::config::{StepConfig, StepDefaults};
use crate::core::error::BuildError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Sentinel a critic emits to approve an artifact
pub const DEFAULT_SENTINEL: &str = "APPROVED";

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique step name within a pipeline
    pub name: String,

    /// Keys read from shared state, in order
    pub inputs: Vec<String>,

    /// The one key this step writes
    pub output_key: String,

    /// What the step does with its inputs
    pub capability: Capability,

    /// Tools called before the capability; their payloads are appended to the prompt
    pub tools: Vec<ToolCall>,

    /// Loop-exit condition checked before the capability runs
    pub exit_condition: Option<ExitCondition>,

    /// Wall-clock budget in seconds, engine default when `None`
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    /// Ask the model; `{key}` placeholders are filled from the step inputs
    Model { instruction: String },
    /// Call a registered tool and store its payload
    Tool { tool: String, params: Map<String, Value> },
}

/// A tool invocation with parameters bound from step inputs
///
/// A parameter that is exactly `"{key}"` takes the input value with its JSON
/// type intact; other strings are rendered as templates.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub params: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }
}

/// Terminate the enclosing loop when `key` equals `sentinel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitCondition {
    pub key: String,
    pub sentinel: String,
}

impl ExitCondition {
    pub fn new(key: impl Into<String>, sentinel: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            sentinel: sentinel.into(),
        }
    }

    /// Exact match after trimming surrounding whitespace
    pub fn is_met(&self, text: &str) -> bool {
        text.trim() == self.sentinel
    }
}

impl Step {
    /// Model step writing to a key named after the step
    pub fn model(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            output_key: name.clone(),
            name,
            inputs: Vec::new(),
            capability: Capability::Model {
                instruction: instruction.into(),
            },
            tools: Vec::new(),
            exit_condition: None,
            timeout_secs: None,
        }
    }

    /// Tool step writing the tool payload to a key named after the step
    pub fn tool(name: impl Into<String>, tool: impl Into<String>, params: Map<String, Value>) -> Self {
        let name = name.into();
        Self {
            output_key: name.clone(),
            name,
            inputs: Vec::new(),
            capability: Capability::Tool {
                tool: tool.into(),
                params,
            },
            tools: Vec::new(),
            exit_condition: None,
            timeout_secs: None,
        }
    }

    pub fn inputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn with_tool(mut self, call: ToolCall) -> Self {
        self.tools.push(call);
        self
    }

    pub fn exit_when(mut self, key: impl Into<String>, sentinel: impl Into<String>) -> Self {
        self.exit_condition = Some(ExitCondition::new(key, sentinel));
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Result<Self, BuildError> {
        let capability = match (&config.instruction, &config.tool) {
            (Some(instruction), None) => Capability::Model {
                instruction: instruction.clone(),
            },
            (None, Some(tool)) => Capability::Tool {
                tool: tool.clone(),
                params: config.params.clone(),
            },
            _ => return Err(BuildError::AmbiguousCapability(config.name.clone())),
        };

        let exit_condition = config.exit_when.as_ref().map(|exit| {
            ExitCondition::new(
                exit.key.clone(),
                exit.equals.clone().unwrap_or_else(|| defaults.sentinel.clone()),
            )
        });

        Ok(Step {
            name: config.name.clone(),
            inputs: config.inputs.clone(),
            output_key: config.output.clone().unwrap_or_else(|| config.name.clone()),
            capability,
            tools: config
                .tools
                .iter()
                .map(|call| ToolCall::new(call.tool.clone(), call.params.clone()))
                .collect(),
            exit_condition,
            timeout_secs: config.timeout_secs.or(defaults.timeout_secs),
        })
    }

    /// Every `{key}` this step's templates refer to
    pub fn referenced_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        match &self.capability {
            Capability::Model { instruction } => keys.extend(placeholders(instruction)),
            Capability::Tool { params, .. } => {
                for value in params.values() {
                    collect_value_placeholders(value, &mut keys);
                }
            }
        }
        for value in self.tools.iter().flat_map(|call| call.params.values()) {
            collect_value_placeholders(value, &mut keys);
        }

        keys.sort();
        keys.dedup();
        keys
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Keys named by `{key}` placeholders in a template
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_regex()
        .map(|re| {
            re.captures_iter(template)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Replace `{key}` placeholders using `lookup`; unknown keys are left as written
pub fn render_template(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    match placeholder_regex() {
        Some(re) => re
            .replace_all(template, |caps: &regex::Captures| {
                lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        None => template.to_string(),
    }
}

fn collect_value_placeholders(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::String(s) => keys.extend(placeholders(s)),
        Value::Array(items) => items.iter().for_each(|v| collect_value_placeholders(v, keys)),
        Value::Object(fields) => fields.values().for_each(|v| collect_value_placeholders(v, keys)),
        _ => {}
    }
}
