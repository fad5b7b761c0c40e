//! Shared state and execution state models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value space threaded through one pipeline run
///
/// Values are JSON so steps can exchange text, records and lists alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState {
    values: BTreeMap<String, Value>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value as display text: strings verbatim, anything else as JSON
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.values.get(key).map(value_text)
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy every entry of `other` over this state
    pub fn extend(&mut self, other: SharedState) {
        self.values.extend(other.values);
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SharedState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// Progress of a loop composer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Iteration `n` is in progress (0 before the first)
    Running { iteration: u32 },
    /// An exit condition matched during iteration `iterations`
    Approved { iterations: u32 },
    /// The iteration bound was reached without approval
    Exhausted { iterations: u32 },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopState::Running { .. })
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, LoopState::Approved { .. })
    }

    pub fn iterations(&self) -> u32 {
        match self {
            LoopState::Running { iteration } => *iteration,
            LoopState::Approved { iterations } | LoopState::Exhausted { iterations } => *iterations,
        }
    }
}

/// How a single step execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Completed,
    /// Exit condition matched; no output written
    ExitedLoop,
    Failed,
}
