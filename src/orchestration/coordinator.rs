//! Request coordinator - routes each request and records it in the session

use crate::{
    agent::{offline::ROUTING_MARKER, AgentError, ModelClient},
    core::{SharedState, StepFailure, SESSION_CONTEXT_KEY},
    execution::ExecutionEngine,
    orchestration::registry::{PipelineRegistry, REQUEST_KEY},
    session::{Exchange, Session, SessionStore},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Route name used when no pipeline applies
pub const DIRECT_ROUTE: &str = "direct";

/// Where a request goes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Pipeline { name: String, inputs: Map<String, Value> },
    Direct,
}

#[derive(Deserialize)]
struct RouteReply {
    route: String,
    #[serde(default)]
    inputs: Map<String, Value>,
}

impl Route {
    /// Interpret the model's routing reply
    ///
    /// Anything that is not a JSON object naming a registered route is
    /// treated as a direct answer.
    pub fn parse(reply: &str, pipelines: &PipelineRegistry) -> Self {
        let json = match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => return Route::Direct,
        };

        match serde_json::from_str::<RouteReply>(json) {
            Ok(parsed) if pipelines.contains(&parsed.route) => Route::Pipeline {
                name: parsed.route,
                inputs: parsed.inputs,
            },
            Ok(parsed) => {
                if parsed.route != DIRECT_ROUTE {
                    warn!(route = %parsed.route, "Model chose an unknown route, answering directly");
                }
                Route::Direct
            }
            Err(e) => {
                debug!("Unparseable routing reply ({}): {}", e, reply);
                Route::Direct
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Route::Pipeline { name, .. } => name,
            Route::Direct => DIRECT_ROUTE,
        }
    }
}

/// Failures surfaced to the caller as an error response
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Step(#[from] StepFailure),

    #[error(transparent)]
    Model(#[from] AgentError),

    #[error("session store error: {0}")]
    Session(String),
}

impl CoordinatorError {
    fn session(error: anyhow::Error) -> Self {
        CoordinatorError::Session(format!("{:#}", error))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// What the caller gets back for every request, failed or not
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Route taken; absent when routing itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub request: String,
    pub session_id: String,
}

impl CoordinatorResponse {
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Response text, or the error message for failures
    pub fn text(&self) -> &str {
        self.response
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or_default()
    }
}

/// Entry point for free-form requests
///
/// Requests for the same session are handled one at a time; distinct sessions
/// proceed independently.
pub struct Coordinator {
    model: Arc<dyn ModelClient>,
    engine: Arc<ExecutionEngine>,
    pipelines: PipelineRegistry,
    sessions: Arc<dyn SessionStore>,
    session_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    history_window: usize,
}

impl Coordinator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        engine: Arc<ExecutionEngine>,
        pipelines: PipelineRegistry,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            model,
            engine,
            pipelines,
            sessions,
            session_locks: StdMutex::new(HashMap::new()),
            history_window: 10,
        }
    }

    /// Number of past exchanges handed to the model
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Handle one request within `session_id`
    ///
    /// The exchange is appended to the session history whatever the outcome.
    pub async fn handle(&self, request: &str, session_id: &str) -> CoordinatorResponse {
        let lock = self.session_lock(session_id);
        let response = {
            let _guard = lock.lock().await;
            self.handle_locked(request, session_id).await
        };
        self.release_session_lock(session_id, lock);
        response
    }

    async fn handle_locked(&self, request: &str, session_id: &str) -> CoordinatorResponse {
        info!(session = %session_id, "Handling request: {}", request);
        let mut route = None;
        let outcome = self.process(request, session_id, &mut route).await;

        let (exchange, response) = match outcome {
            Ok(text) => (
                Exchange::success(request, text.clone()),
                CoordinatorResponse {
                    status: ResponseStatus::Success,
                    response: Some(text),
                    error_message: None,
                    route,
                    request: request.to_string(),
                    session_id: session_id.to_string(),
                },
            ),
            Err(e) => {
                error!(session = %session_id, "Request failed: {}", e);
                let message = e.to_string();
                (
                    Exchange::error(request, message.clone()),
                    CoordinatorResponse {
                        status: ResponseStatus::Error,
                        response: None,
                        error_message: Some(message),
                        route,
                        request: request.to_string(),
                        session_id: session_id.to_string(),
                    },
                )
            }
        };

        if let Err(e) = self.sessions.append_exchange(session_id, exchange).await {
            error!(session = %session_id, "Failed to record exchange: {:#}", e);
        }

        response
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the session's lock entry once no other request holds or awaits it
    fn release_session_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks
            .get(session_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(session_id);
        }
    }

    async fn process(
        &self,
        request: &str,
        session_id: &str,
        taken: &mut Option<String>,
    ) -> Result<String, CoordinatorError> {
        let session = self
            .sessions
            .get_or_create(session_id)
            .await
            .map_err(CoordinatorError::session)?;
        let prior = session.context_text(self.history_window);

        let route = self.route(request, &prior).await?;
        info!(session = %session_id, route = %route.name(), "Routed request");
        *taken = Some(route.name().to_string());

        match route {
            Route::Direct => {
                let reply = self.model.invoke(request, &prior).await?;
                Ok(reply.content)
            }
            Route::Pipeline { name, inputs } => {
                self.run_pipeline(&name, inputs, request, &session, prior)
                    .await
            }
        }
    }

    async fn route(&self, request: &str, prior: &str) -> Result<Route, CoordinatorError> {
        if self.pipelines.is_empty() {
            return Ok(Route::Direct);
        }
        let reply = self.model.invoke(&self.routing_prompt(request), prior).await?;
        Ok(Route::parse(&reply.content, &self.pipelines))
    }

    fn routing_prompt(&self, request: &str) -> String {
        let mut prompt = format!(
            "{}\nDecide whether one of these pipelines should handle the request:\n",
            ROUTING_MARKER
        );
        for entry in self.pipelines.iter() {
            let inputs: Vec<String> = entry.required_inputs().into_iter().collect();
            prompt.push_str(&format!(
                "- {}: {} (inputs: {})\n",
                entry.route,
                entry.description,
                inputs.join(", ")
            ));
        }
        prompt.push_str(&format!(
            "\nReply with JSON only: {{\"route\": \"<pipeline>\", \"inputs\": {{...}}}}.\n\
             Use \"{}\" as the route when no pipeline applies.\n\nRequest: {}",
            DIRECT_ROUTE, request
        ));
        prompt
    }

    async fn run_pipeline(
        &self,
        name: &str,
        inputs: Map<String, Value>,
        request: &str,
        session: &Session,
        prior: String,
    ) -> Result<String, CoordinatorError> {
        let Some(entry) = self.pipelines.get(name) else {
            let reply = self.model.invoke(request, &prior).await?;
            return Ok(reply.content);
        };

        let mut state: SharedState = session.scratch.clone();
        state.insert(REQUEST_KEY, request);
        state.insert(SESSION_CONTEXT_KEY, prior);
        for (key, value) in &inputs {
            state.insert(key.clone(), value.clone());
        }

        let report = self.engine.run(&entry.pipeline, state).await?;

        let written = entry.pipeline.root.output_keys();
        for key in inputs.keys().chain(written.iter()) {
            if let Some(value) = report.state.get(key) {
                self.sessions
                    .write_scratch(&session.id, key, value.clone())
                    .await
                    .map_err(CoordinatorError::session)?;
            }
        }

        Ok(report.output_text().unwrap_or_default())
    }
}
