//! Named pipelines the coordinator can route to

use crate::core::{Pipeline, SESSION_CONTEXT_KEY};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// State key holding the raw user request during a routed run
pub const REQUEST_KEY: &str = "request";

/// A pipeline exposed under a route name
#[derive(Debug, Clone)]
pub struct RegisteredPipeline {
    pub route: String,
    pub description: String,
    pub pipeline: Arc<Pipeline>,
}

impl RegisteredPipeline {
    /// Inputs a caller has to supply: external inputs without a default,
    /// minus the keys the coordinator fills in itself
    pub fn required_inputs(&self) -> BTreeSet<String> {
        self.pipeline
            .external_inputs()
            .into_iter()
            .filter(|key| !self.pipeline.defaults.contains(key))
            .filter(|key| key != REQUEST_KEY && key != SESSION_CONTEXT_KEY)
            .collect()
    }
}

/// Route name -> pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, RegisteredPipeline>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pipeline` under `route`, replacing any previous entry
    pub fn register(&mut self, route: impl Into<String>, pipeline: Pipeline) -> &mut Self {
        let route = route.into();
        let description = pipeline
            .description
            .clone()
            .unwrap_or_else(|| pipeline.name.clone());
        self.pipelines.insert(
            route.clone(),
            RegisteredPipeline {
                route,
                description,
                pipeline: Arc::new(pipeline),
            },
        );
        self
    }

    pub fn get(&self, route: &str) -> Option<&RegisteredPipeline> {
        self.pipelines.get(route)
    }

    pub fn contains(&self, route: &str) -> bool {
        self.pipelines.contains_key(route)
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPipeline> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
