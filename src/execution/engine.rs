//! Main execution engine - walks the composer tree for one pipeline run

use crate::{
    agent::ModelClient,
    core::{ExecutionStatus, LoopState, Node, Pipeline, SharedState, Step, StepFailure, StepStatus},
    execution::{StepExecutor, StepOutcome},
    tools::ToolRegistry,
};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
    },
    StepStarted {
        step: String,
    },
    StepCompleted {
        step: String,
        output_key: String,
        duration_ms: u64,
    },
    StepFailed {
        step: String,
        error: String,
    },
    LoopIteration {
        name: String,
        iteration: u32,
        max_iterations: u32,
    },
    /// An exit condition matched inside the loop
    LoopExitRequested {
        step: String,
    },
    LoopFinished {
        name: String,
        state: LoopState,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// One step execution as it happened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub status: StepStatus,
    pub duration_ms: u64,
}

/// Terminal state of one loop composer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopReport {
    pub name: String,
    pub state: LoopState,
}

/// Outcome of a successful pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_id: Uuid,
    pub pipeline: String,
    pub output_key: String,
    pub state: SharedState,
    /// Step executions in completion order
    pub steps: Vec<StepRecord>,
    pub loops: Vec<LoopReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// The pipeline's final artifact
    pub fn output(&self) -> Option<&serde_json::Value> {
        self.state.get(&self.output_key)
    }

    pub fn output_text(&self) -> Option<String> {
        self.state.get_text(&self.output_key)
    }

    pub fn loop_state(&self, name: &str) -> Option<LoopState> {
        self.loops.iter().rev().find(|l| l.name == name).map(|l| l.state)
    }

    /// How many times a step ran (any status)
    pub fn runs_of(&self, step: &str) -> usize {
        self.steps.iter().filter(|r| r.step == step).count()
    }
}

/// Whether a subtree finished normally or was cut short by an exit condition
enum Flow {
    Continue(SharedState),
    Exit(SharedState),
}

impl Flow {
    fn into_state(self) -> SharedState {
        match self {
            Flow::Continue(state) | Flow::Exit(state) => state,
        }
    }
}

/// Per-run bookkeeping shared by concurrently running branches
#[derive(Default)]
struct RunTrace {
    steps: StdMutex<Vec<StepRecord>>,
    loops: StdMutex<Vec<LoopReport>>,
}

impl RunTrace {
    fn record_step(&self, record: StepRecord) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(record);
        }
    }

    fn record_loop(&self, report: LoopReport) {
        if let Ok(mut loops) = self.loops.lock() {
            loops.push(report);
        }
    }

    fn take(&self) -> (Vec<StepRecord>, Vec<LoopReport>) {
        let steps = self.steps.lock().map(|mut s| std::mem::take(&mut *s)).unwrap_or_default();
        let loops = self.loops.lock().map(|mut l| std::mem::take(&mut *l)).unwrap_or_default();
        (steps, loops)
    }
}

/// Main pipeline execution engine
///
/// Stateless between runs: one engine can run many pipelines concurrently.
pub struct ExecutionEngine {
    executor: StepExecutor,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl ExecutionEngine {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, default_timeout_secs: u64) -> Self {
        Self {
            executor: StepExecutor::new(model, tools, default_timeout_secs),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.executor.tools()
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Run `pipeline` from `inputs` (overlaid on the pipeline's defaults)
    pub async fn run(&self, pipeline: &Pipeline, inputs: SharedState) -> Result<RunReport, StepFailure> {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
        })
        .await;

        let trace = RunTrace::default();
        let result = self
            .run_node(&pipeline.root, pipeline.initial_state(inputs), &trace)
            .await;

        let status = match &result {
            Ok(_) => ExecutionStatus::Completed,
            Err(_) => ExecutionStatus::Failed,
        };
        self.emit_event(ExecutionEvent::PipelineCompleted { execution_id, status })
            .await;

        match result {
            Ok(flow) => {
                info!("Pipeline {} completed ({})", pipeline.name, execution_id);
                let (steps, loops) = trace.take();
                Ok(RunReport {
                    execution_id,
                    pipeline: pipeline.name.clone(),
                    output_key: pipeline.output_key.clone(),
                    state: flow.into_state(),
                    steps,
                    loops,
                    started_at,
                    completed_at: Utc::now(),
                })
            }
            Err(failure) => {
                error!("Pipeline {} failed: {}", pipeline.name, failure);
                Err(failure)
            }
        }
    }

    fn run_node<'a>(
        &'a self,
        node: &'a Node,
        state: SharedState,
        trace: &'a RunTrace,
    ) -> BoxFuture<'a, Result<Flow, StepFailure>> {
        Box::pin(async move {
            match node {
                Node::Step(step) => self.run_step(step, state, trace).await,
                Node::Sequential { name, children } => self.run_sequential(name, children, state, trace).await,
                Node::Parallel { name, children } => self.run_parallel(name, children, state, trace).await,
                Node::Loop {
                    name,
                    body,
                    max_iterations,
                } => self.run_loop(name, body, *max_iterations, state, trace).await,
            }
        })
    }

    async fn run_step(&self, step: &Step, mut state: SharedState, trace: &RunTrace) -> Result<Flow, StepFailure> {
        self.emit_event(ExecutionEvent::StepStarted {
            step: step.name.clone(),
        })
        .await;

        let started = Instant::now();
        let outcome = self.executor.execute(step, &state).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, flow) = match outcome {
            Ok(StepOutcome::Produced { key, value }) => {
                self.emit_event(ExecutionEvent::StepCompleted {
                    step: step.name.clone(),
                    output_key: key.clone(),
                    duration_ms,
                })
                .await;
                state.insert(key, value);
                (StepStatus::Completed, Ok(Flow::Continue(state)))
            }
            Ok(StepOutcome::ExitLoop { .. }) => {
                self.emit_event(ExecutionEvent::LoopExitRequested {
                    step: step.name.clone(),
                })
                .await;
                (StepStatus::ExitedLoop, Ok(Flow::Exit(state)))
            }
            Err(failure) => {
                self.emit_event(ExecutionEvent::StepFailed {
                    step: step.name.clone(),
                    error: failure.to_string(),
                })
                .await;
                (StepStatus::Failed, Err(failure))
            }
        };

        trace.record_step(StepRecord {
            step: step.name.clone(),
            status,
            duration_ms,
        });
        flow
    }

    /// Children in order; the first failure stops the rest
    async fn run_sequential(
        &self,
        name: &str,
        children: &[Node],
        mut state: SharedState,
        trace: &RunTrace,
    ) -> Result<Flow, StepFailure> {
        for child in children {
            match self.run_node(child, state, trace).await.map_err(|f| f.within(name))? {
                Flow::Continue(next) => state = next,
                Flow::Exit(next) => return Ok(Flow::Exit(next)),
            }
        }
        Ok(Flow::Continue(state))
    }

    /// Every child gets the same snapshot; all are awaited before merging
    async fn run_parallel(
        &self,
        name: &str,
        children: &[Node],
        snapshot: SharedState,
        trace: &RunTrace,
    ) -> Result<Flow, StepFailure> {
        let branches = children
            .iter()
            .map(|child| self.run_node(child, snapshot.clone(), trace));
        let results = join_all(branches).await;

        let mut merged = snapshot;
        let mut first_failure = None;
        for (child, result) in children.iter().zip(results) {
            match result {
                Ok(flow) => {
                    let branch = flow.into_state();
                    for key in child.output_keys() {
                        if let Some(value) = branch.get(&key) {
                            merged.insert(key, value.clone());
                        }
                    }
                }
                Err(failure) => {
                    if first_failure.is_some() {
                        warn!("Parallel {}: additional failure in {}", name, failure.location());
                    } else {
                        first_failure = Some(failure);
                    }
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure.within(name)),
            None => Ok(Flow::Continue(merged)),
        }
    }

    /// Body repeated until an exit condition matches or the bound is hit
    async fn run_loop(
        &self,
        name: &str,
        body: &[Node],
        max_iterations: u32,
        mut state: SharedState,
        trace: &RunTrace,
    ) -> Result<Flow, StepFailure> {
        let mut loop_state = LoopState::Running { iteration: 0 };

        for iteration in 1..=max_iterations {
            loop_state = LoopState::Running { iteration };
            info!(loop_name = name, iteration, max_iterations, "Loop iteration");
            self.emit_event(ExecutionEvent::LoopIteration {
                name: name.to_string(),
                iteration,
                max_iterations,
            })
            .await;

            let mut exited = false;
            for child in body {
                let flow = self
                    .run_node(child, state, trace)
                    .await
                    .map_err(|f| f.within(format!("{}#{}", name, iteration)))?;
                match flow {
                    Flow::Continue(next) => state = next,
                    Flow::Exit(next) => {
                        state = next;
                        exited = true;
                        break;
                    }
                }
            }

            if exited {
                loop_state = LoopState::Approved { iterations: iteration };
                break;
            }
        }

        if !loop_state.is_terminal() {
            loop_state = LoopState::Exhausted {
                iterations: max_iterations,
            };
            warn!(loop_name = name, max_iterations, "Loop ended without approval");
        } else {
            info!(loop_name = name, iterations = loop_state.iterations(), "Loop approved");
        }

        trace.record_loop(LoopReport {
            name: name.to_string(),
            state: loop_state,
        });
        self.emit_event(ExecutionEvent::LoopFinished {
            name: name.to_string(),
            state: loop_state,
        })
        .await;

        Ok(Flow::Continue(state))
    }
}
