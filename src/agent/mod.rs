//! Model capability: the `invoke(prompt, prior_context)` seam and its clients

pub mod client;
pub mod offline;
pub mod response;
pub mod retry;
pub mod subprocess_client;

use async_trait::async_trait;
use std::sync::Arc;

pub use client::ModelClientConfig;
pub use offline::OfflineModel;
pub use response::{AgentError, AgentResponse};
pub use retry::{RetryPolicy, RetryingModel};
pub use subprocess_client::CommandModel;

/// Trait for model calls - allows for different implementations
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Answer `prompt`, given the conversation so far in `prior_context`
    async fn invoke(&self, prompt: &str, prior_context: &str) -> Result<AgentResponse, AgentError>;
}

#[async_trait]
impl<M: ModelClient + ?Sized> ModelClient for Arc<M> {
    async fn invoke(&self, prompt: &str, prior_context: &str) -> Result<AgentResponse, AgentError> {
        (**self).invoke(prompt, prior_context).await
    }
}

/// Build the configured model client, wrapped in the retry policy
///
/// A command model is used when `config.endpoint` is set, otherwise the
/// offline responder.
pub fn build_model(config: &ModelClientConfig, policy: RetryPolicy) -> Arc<dyn ModelClient> {
    match CommandModel::from_config(config) {
        Some(command) => Arc::new(RetryingModel::new(command, policy)),
        None => Arc::new(RetryingModel::new(OfflineModel::new(), policy)),
    }
}
