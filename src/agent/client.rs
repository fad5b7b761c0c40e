//! Model client configuration

/// Configuration for the command-backed model client
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    /// Path to the executable that answers prompts
    ///
    /// When `None` the offline responder is used instead.
    pub endpoint: Option<String>,

    /// Extra arguments placed before the prompt
    pub args: Vec<String>,

    /// Timeout for a single call in seconds
    pub timeout_secs: u64,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            args: Vec::new(),
            timeout_secs: 120,
        }
    }
}

impl ModelClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
