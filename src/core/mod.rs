//! Core domain models
//!
//! Steps, the composer tree they live in, the shared state a run threads
//! through it, and the configuration that builds both.

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod settings;
pub mod state;
pub mod step;

pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use settings::Settings;
pub use state::*;
pub use step::*;
