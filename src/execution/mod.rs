//! Pipeline execution engine

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, LoopReport, RunReport, StepRecord};
pub use executor::{StepExecutor, StepOutcome};
