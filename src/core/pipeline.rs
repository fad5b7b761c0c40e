//! Pipeline domain model: a tree of composers with steps at the leaves

use crate::core::error::BuildError;
use crate::core::state::SharedState;
use crate::core::step::Step;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Default bound for loop composers
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// A node in the composer tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Step(Step),
    /// Children run in order, each seeing the previous child's writes
    Sequential { name: String, children: Vec<Node> },
    /// Children run concurrently against one snapshot
    Parallel { name: String, children: Vec<Node> },
    /// Body runs until an exit condition matches or the bound is hit
    Loop {
        name: String,
        body: Vec<Node>,
        max_iterations: u32,
    },
}

impl From<Step> for Node {
    fn from(step: Step) -> Self {
        Node::Step(step)
    }
}

impl Node {
    pub fn sequential(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Sequential {
            name: name.into(),
            children,
        }
    }

    pub fn parallel(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Parallel {
            name: name.into(),
            children,
        }
    }

    pub fn looped(name: impl Into<String>, max_iterations: u32, body: Vec<Node>) -> Self {
        Node::Loop {
            name: name.into(),
            body,
            max_iterations,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Step(step) => &step.name,
            Node::Sequential { name, .. } | Node::Parallel { name, .. } | Node::Loop { name, .. } => name,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Step(_) => &[],
            Node::Sequential { children, .. } | Node::Parallel { children, .. } => children,
            Node::Loop { body, .. } => body,
        }
    }

    /// Every key a run of this node may write
    pub fn output_keys(&self) -> BTreeSet<String> {
        self.steps().into_iter().map(|s| s.output_key.clone()).collect()
    }

    /// Steps in declaration order
    pub fn steps(&self) -> Vec<&Step> {
        let mut steps = Vec::new();
        self.collect_steps(&mut steps);
        steps
    }

    fn collect_steps<'a>(&'a self, out: &mut Vec<&'a Step>) {
        match self {
            Node::Step(step) => out.push(step),
            _ => self.children().iter().for_each(|c| c.collect_steps(out)),
        }
    }

    /// Apply `max_iterations` to every loop in this subtree
    pub fn set_loop_limit(&mut self, limit: u32) {
        match self {
            Node::Step(_) => {}
            Node::Sequential { children, .. } | Node::Parallel { children, .. } => {
                children.iter_mut().for_each(|c| c.set_loop_limit(limit));
            }
            Node::Loop { body, max_iterations, .. } => {
                *max_iterations = limit;
                body.iter_mut().for_each(|c| c.set_loop_limit(limit));
            }
        }
    }
}

/// A validated composer tree plus the key a caller reads its result from
///
/// Built once and shared across runs; per-run data lives in [`SharedState`].
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub name: String,
    pub description: Option<String>,
    pub root: Node,

    /// Key holding the pipeline's final artifact
    pub output_key: String,

    /// Values seeded into shared state when the caller does not supply them
    pub defaults: SharedState,
}

/// Innermost composer that matters for exit conditions
#[derive(Clone, Copy)]
enum Scope<'a> {
    Top,
    Loop,
    Parallel(&'a str),
}

impl Pipeline {
    /// Validate `root` and wrap it as a pipeline
    pub fn build(name: impl Into<String>, root: Node, output_key: impl Into<String>) -> Result<Self, BuildError> {
        let output_key = output_key.into();

        let mut names = HashSet::new();
        validate_node(&root, Scope::Top, &mut names)?;

        if !root.output_keys().contains(&output_key) {
            return Err(BuildError::UnknownOutput(output_key));
        }

        Ok(Self {
            name: name.into(),
            description: None,
            root,
            output_key,
            defaults: SharedState::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_defaults(mut self, defaults: SharedState) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn steps(&self) -> Vec<&Step> {
        self.root.steps()
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps().into_iter().find(|s| s.name == name)
    }

    /// Keys some step reads but no step writes: the caller must supply these
    /// (unless a default covers them)
    pub fn external_inputs(&self) -> BTreeSet<String> {
        let written = self.root.output_keys();
        self.steps()
            .into_iter()
            .flat_map(|s| s.inputs.iter())
            .filter(|k| !written.contains(*k))
            .cloned()
            .collect()
    }

    /// Initial state for a run: defaults overlaid with caller inputs
    pub fn initial_state(&self, inputs: SharedState) -> SharedState {
        let mut state = self.defaults.clone();
        state.extend(inputs);
        state
    }
}

fn validate_node<'a>(node: &'a Node, scope: Scope<'a>, names: &mut HashSet<&'a str>) -> Result<(), BuildError> {
    match node {
        Node::Step(step) => validate_step(step, scope, names),
        Node::Sequential { name, children } => {
            if children.is_empty() {
                return Err(BuildError::EmptyComposite(name.clone()));
            }
            children.iter().try_for_each(|c| validate_node(c, scope, names))
        }
        Node::Parallel { name, children } => {
            if children.is_empty() {
                return Err(BuildError::EmptyComposite(name.clone()));
            }
            let mut writers: BTreeMap<String, usize> = BTreeMap::new();
            for (index, child) in children.iter().enumerate() {
                for key in child.output_keys() {
                    if let Some(other) = writers.insert(key.clone(), index) {
                        if other != index {
                            return Err(BuildError::DuplicateOutputKey {
                                node: name.clone(),
                                key,
                            });
                        }
                    }
                }
            }
            children
                .iter()
                .try_for_each(|c| validate_node(c, Scope::Parallel(name), names))
        }
        Node::Loop {
            name,
            body,
            max_iterations,
        } => {
            if body.is_empty() {
                return Err(BuildError::EmptyComposite(name.clone()));
            }
            if *max_iterations == 0 {
                return Err(BuildError::ZeroIterations(name.clone()));
            }
            body.iter().try_for_each(|c| validate_node(c, Scope::Loop, names))
        }
    }
}

fn validate_step<'a>(step: &'a Step, scope: Scope<'a>, names: &mut HashSet<&'a str>) -> Result<(), BuildError> {
    if !names.insert(step.name.as_str()) {
        return Err(BuildError::DuplicateStep(step.name.clone()));
    }

    for key in step.referenced_keys() {
        if !step.inputs.contains(&key) {
            return Err(BuildError::UndeclaredPlaceholder {
                step: step.name.clone(),
                key,
            });
        }
    }

    if let Some(exit) = &step.exit_condition {
        match scope {
            Scope::Top => {
                return Err(BuildError::ExitOutsideLoop {
                    step: step.name.clone(),
                })
            }
            Scope::Parallel(node) => {
                return Err(BuildError::ExitInsideParallel {
                    step: step.name.clone(),
                    node: node.to_string(),
                })
            }
            Scope::Loop => {}
        }
        if !step.inputs.contains(&exit.key) {
            return Err(BuildError::ExitKeyNotInput {
                step: step.name.clone(),
                key: exit.key.clone(),
            });
        }
    }

    Ok(())
}
