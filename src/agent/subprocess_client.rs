//! Command-backed model client - runs an external executable per prompt

use crate::agent::{AgentError, AgentResponse, ModelClient, ModelClientConfig};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Model client that shells out to a configured executable
///
/// The prompt is passed as the last argument and the prior context is written
/// to stdin. Stdout is the response.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_secs,
        }
    }

    /// Build from client config, returning `None` when no endpoint is set
    pub fn from_config(config: &ModelClientConfig) -> Option<Self> {
        config
            .endpoint
            .as_ref()
            .map(|program| Self::new(program.clone(), config.args.clone(), config.timeout_secs))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Pull an HTTP-like status out of stderr ("status 503", "HTTP 429", ...)
fn parse_status(stderr: &str) -> Option<u16> {
    static STATUS: OnceLock<Option<Regex>> = OnceLock::new();
    let re = STATUS.get_or_init(|| Regex::new(r"\b([45]\d{2})\b").ok());
    re.as_ref()?
        .captures(stderr)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[async_trait]
impl ModelClient for CommandModel {
    async fn invoke(&self, prompt: &str, prior_context: &str) -> Result<AgentResponse, AgentError> {
        debug!(
            program = %self.program,
            prompt_len = prompt.len(),
            context_len = prior_context.len(),
            "Spawning model command"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(prompt)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Fatal(format!("Failed to spawn {}: {}", self.program, e)))?;

        // The command may fill stdout before it reads stdin
        let feeder = child.stdin.take().map(|mut stdin| {
            let context = prior_context.to_owned();
            tokio::spawn(async move {
                // The command may exit without reading stdin
                if let Err(e) = stdin.write_all(context.as_bytes()).await {
                    debug!("Model command did not accept prior context: {}", e);
                }
            })
        });

        let waited = timeout(Duration::from_secs(self.timeout_secs), child.wait_with_output()).await;
        if let Some(feeder) = feeder {
            feeder.abort();
        }
        let output = waited
            .map_err(|_| AgentError::Timeout(self.timeout_secs))?
            .map_err(|e| AgentError::Fatal(format!("Failed to wait for {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, stderr = %stderr.trim(), "Model command failed");
            let message = format!("{} exited with code {}: {}", self.program, exit_code, stderr.trim());
            return Err(match parse_status(&stderr) {
                Some(status) => AgentError::Status { status, message },
                None => AgentError::Fatal(message),
            });
        }

        let content = String::from_utf8(output.stdout)
            .map_err(|e| AgentError::Fatal(format!("Failed to decode model output: {}", e)))?;

        debug!("Model command returned {} bytes", content.len());

        Ok(AgentResponse::new(content.trim_end().to_string()))
    }
}
