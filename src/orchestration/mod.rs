//! Orchestration root: routes requests to pipelines and keeps session memory

pub mod coordinator;
pub mod registry;

pub use coordinator::{Coordinator, CoordinatorError, CoordinatorResponse, ResponseStatus, Route};
pub use registry::{PipelineRegistry, RegisteredPipeline};
