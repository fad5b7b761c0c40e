//! Retry wrapper for model clients with exponential backoff

use crate::agent::{AgentError, AgentResponse, ModelClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// When and how often transient model failures are retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of calls, including the first
    pub attempts: u32,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Each further delay is the previous one times this
    pub multiplier: u64,

    /// Status codes treated as transient
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay_ms: 1_000,
            multiplier: 7,
            retry_statuses: vec![429, 500, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): initial * multiplier^retry
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(retry);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }

    /// Sum of every delay slept before the last attempt
    pub fn backoff_window(&self) -> Duration {
        (0..self.max_attempts().saturating_sub(1)).map(|retry| self.delay_for(retry)).sum()
    }

    pub fn is_retryable(&self, error: &AgentError) -> bool {
        match error {
            AgentError::Status { status, .. } => self.retry_statuses.contains(status),
            _ => false,
        }
    }

    fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Model client that retries transient failures of the wrapped client
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M: ModelClient> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<M: ModelClient> ModelClient for RetryingModel<M> {
    async fn invoke(&self, prompt: &str, prior_context: &str) -> Result<AgentResponse, AgentError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.inner.invoke(prompt, prior_context).await {
                Ok(mut response) => {
                    if attempt > 1 {
                        debug!(attempt, "Model call succeeded after retry");
                    }
                    response.attempts = attempt;
                    return Ok(response);
                }
                Err(e) if self.policy.is_retryable(&e) => {
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, error = %e, "Model retries exhausted");
                        return Err(AgentError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    let delay = self.policy.delay_for(attempt - 1);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        status = e.status(),
                        error = %e,
                        "Retrying model call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
