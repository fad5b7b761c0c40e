//! Built-in pipelines, embedded as YAML

use crate::core::config::PipelineConfig;
use crate::orchestration::PipelineRegistry;
use anyhow::{Context, Result};

pub const PR_REVIEW: &str = "pr_review";
pub const ISSUE_TRIAGE: &str = "issue_triage";
pub const DOCUMENTATION: &str = "documentation";

const DEFINITIONS: [(&str, &str); 3] = [
    (PR_REVIEW, include_str!("../../pipelines/pr_review.yaml")),
    (ISSUE_TRIAGE, include_str!("../../pipelines/issue_triage.yaml")),
    (DOCUMENTATION, include_str!("../../pipelines/documentation.yaml")),
];

/// Parsed definition of one built-in pipeline
pub fn config(route: &str) -> Result<PipelineConfig> {
    let (_, yaml) = DEFINITIONS
        .iter()
        .find(|(name, _)| *name == route)
        .with_context(|| format!("No built-in pipeline named '{}'", route))?;
    PipelineConfig::from_yaml(yaml).with_context(|| format!("Invalid built-in pipeline '{}'", route))
}

/// Registry of every built-in pipeline, loops bounded by `max_iterations`
pub fn registry(max_iterations: u32) -> Result<PipelineRegistry> {
    let mut registry = PipelineRegistry::new();
    for (route, _) in DEFINITIONS {
        let pipeline = config(route)?
            .with_max_iterations(max_iterations)
            .to_pipeline()
            .with_context(|| format!("Invalid built-in pipeline '{}'", route))?;
        registry.register(route, pipeline);
    }
    Ok(registry)
}
