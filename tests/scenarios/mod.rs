//! Scenario-based tests for github-agents

mod failure_handling;
mod github_workflows;
mod parallel_fanout;
mod refinement_loop;
mod retry_behavior;
mod sequential_chain;
