//! Context assembly: resolve a step's inputs before anything is invoked

use crate::core::error::StepFailure;
use crate::core::state::{value_text, SharedState};
use crate::core::step::{render_template, Step};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// State key carrying the session's conversation so far
///
/// Optional: when present it is handed to the model as prior context.
pub const SESSION_CONTEXT_KEY: &str = "session_context";

/// Everything a step may see, resolved from shared state up front
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    pub step: String,
    pub inputs: BTreeMap<String, Value>,
    pub prior_context: String,
    tool_results: Vec<(String, Value)>,
}

impl StepContext {
    /// Resolve the step's declared inputs, failing on the first missing key
    pub fn assemble(step: &Step, state: &SharedState) -> Result<Self, StepFailure> {
        let mut inputs = BTreeMap::new();
        for key in &step.inputs {
            let value = state
                .get(key)
                .ok_or_else(|| StepFailure::missing_input(&step.name, key))?;
            inputs.insert(key.clone(), value.clone());
        }

        Ok(Self {
            step: step.name.clone(),
            inputs,
            prior_context: state.get_text(SESSION_CONTEXT_KEY).unwrap_or_default(),
            tool_results: Vec::new(),
        })
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.inputs.get(key).map(value_text)
    }

    /// Fill `{key}` placeholders from the inputs
    pub fn render(&self, template: &str) -> String {
        render_template(template, |key| self.text(key))
    }

    /// Bind tool parameters: `"{key}"` alone keeps the input's JSON type,
    /// other strings are rendered, everything else passes through
    pub fn resolve_params(&self, params: &Map<String, Value>) -> Value {
        Value::Object(
            params
                .iter()
                .map(|(name, value)| (name.clone(), self.resolve_value(value)))
                .collect(),
        )
    }

    fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                let whole = s
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                    .and_then(|key| self.inputs.get(key));
                match whole {
                    Some(bound) => bound.clone(),
                    None => Value::String(self.render(s)),
                }
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_value(v)).collect()),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Record a tool payload to be shown to the model
    pub fn push_tool_result(&mut self, tool: &str, payload: Value) {
        self.tool_results.push((tool.to_string(), payload));
    }

    pub fn tool_results(&self) -> &[(String, Value)] {
        &self.tool_results
    }

    /// Rendered instruction followed by any tool payloads
    pub fn prompt(&self, instruction: &str) -> String {
        let mut prompt = self.render(instruction);
        if !self.tool_results.is_empty() {
            prompt.push_str("\n\nTool results:");
            for (tool, payload) in &self.tool_results {
                let body = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
                prompt.push_str(&format!("\n\n[{}]\n{}", tool, body));
            }
        }
        prompt
    }
}
