//! Application settings: YAML file plus `GITHUB_AGENTS_*` environment overrides

use crate::agent::{ModelClientConfig, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "GITHUB_AGENTS_";

/// Runtime settings shared by the CLI and the orchestration layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default tracing level when neither `--verbose` nor `RUST_LOG` is given
    pub log_level: String,

    pub model: ModelSettings,

    pub retry: RetryPolicy,

    /// Wall-clock budget for a step without its own timeout
    pub step_timeout_secs: u64,

    /// Bound for the documentation refinement loop
    pub max_iterations: u32,

    /// SQLite file for durable sessions; platform data dir when unset
    pub database_path: Option<PathBuf>,

    /// How many past exchanges are handed to the model as context
    pub history_window: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Executable answering prompts; the offline responder is used when unset
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: 120,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            model: ModelSettings::default(),
            retry: RetryPolicy::default(),
            step_timeout_secs: 600,
            max_iterations: 3,
            database_path: None,
            history_window: 10,
        }
    }
}

impl Settings {
    /// Load from `path`, or from the user config file when it exists, then
    /// apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env(std::env::vars())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// `<config dir>/github-agents/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("github-agents").join("config.yaml"))
    }

    /// Apply `GITHUB_AGENTS_*` variables from `vars`
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "MODEL_COMMAND" => self.model.command = Some(value).filter(|v| !v.trim().is_empty()),
                "LOG_LEVEL" => self.log_level = value,
                "STEP_TIMEOUT_SECS" => {
                    self.step_timeout_secs = value
                        .parse()
                        .with_context(|| format!("{} must be a number of seconds", name))?;
                }
                "MAX_ITERATIONS" => {
                    self.max_iterations = value
                        .parse()
                        .with_context(|| format!("{} must be a positive number", name))?;
                }
                "DATABASE_PATH" => self.database_path = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether a step can live through every retry delay
    pub fn step_timeout_covers_retries(&self) -> bool {
        Duration::from_secs(self.step_timeout_secs) > self.retry.backoff_window()
    }

    pub fn model_config(&self) -> ModelClientConfig {
        let config = ModelClientConfig::new()
            .with_args(self.model.args.clone())
            .with_timeout(self.model.timeout_secs);
        match &self.model.command {
            Some(command) => config.with_endpoint(command.clone()),
            None => config,
        }
    }

    /// Configured database file or the platform default
    pub fn database_file(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(|| {
            dirs::data_local_dir().map(|dir| dir.join("github-agents").join("sessions.db"))
        })
    }
}
