//! CLI output formatting

use crate::{
    core::{ExecutionStatus, LoopState},
    execution::ExecutionEvent,
    orchestration::CoordinatorResponse,
    session::{Exchange, ExchangeStatus},
    workflows::{DocsResult, IssueOutcome, ReviewResult, TriageResult},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static LOOP: Emoji<'_, '_> = Emoji("🔁 ", "@ ");

/// Spinner shown while a workflow runs
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

pub fn format_loop_state(state: LoopState) -> String {
    match state {
        LoopState::Running { iteration } => style(format!("RUNNING (iteration {})", iteration)).yellow().to_string(),
        LoopState::Approved { iterations } => style(format!("APPROVED after {} iteration(s)", iterations))
            .green()
            .to_string(),
        LoopState::Exhausted { iterations } => style(format!("NOT APPROVED after {} iteration(s)", iterations))
            .yellow()
            .to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted { step } => format!("{} {}", SPINNER, style(step).cyan()),
        ExecutionEvent::StepCompleted {
            step,
            output_key,
            duration_ms,
        } => format!(
            "{} {} → {} {}",
            CHECK,
            style(step).green(),
            style(output_key).cyan(),
            style(format!("({}ms)", duration_ms)).dim()
        ),
        ExecutionEvent::StepFailed { step, error } => {
            format!("{} {}: {}", CROSS, style(step).red(), style(error).dim())
        }
        ExecutionEvent::LoopIteration {
            name,
            iteration,
            max_iterations,
        } => format!(
            "{} {} (iteration {}/{})",
            LOOP,
            style(name).bold(),
            iteration,
            max_iterations
        ),
        ExecutionEvent::LoopExitRequested { step } => {
            format!("{} {} requested loop exit", INFO, style(step).yellow())
        }
        ExecutionEvent::LoopFinished { name, state } => {
            format!("{} {} {}", LOOP, style(name).bold(), format_loop_state(*state))
        }
        ExecutionEvent::PipelineCompleted { execution_id, status } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_review(result: &ReviewResult) -> String {
    let posted = if result.comment_posted {
        format!("{} Review posted to {}#{}", CHECK, result.repo, result.pr_number)
    } else {
        format!("{} Review not posted", INFO)
    };
    format!(
        "{} {}#{}\n\n{}\n\n{}",
        style("Review of").bold(),
        style(&result.repo).cyan(),
        result.pr_number,
        result.review,
        posted
    )
}

pub fn format_triage(result: &TriageResult) -> String {
    let labels = if result.labels.is_empty() {
        style("none").dim().to_string()
    } else {
        result
            .labels
            .iter()
            .map(|l| style(l).cyan().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let applied = if result.labels_applied { " (applied)" } else { "" };
    format!(
        "{} {}#{}\n  Labels: {}{}\n{}",
        CHECK,
        style(&result.repo).bold(),
        result.issue_number,
        labels,
        applied,
        format_output(&result.triage, 5)
    )
}

pub fn format_issue_outcome(outcome: &IssueOutcome) -> String {
    match &outcome.result {
        Ok(result) => format_triage(result),
        Err(e) => format!(
            "{} Issue #{}: {}",
            CROSS,
            outcome.issue_number,
            style(e).red()
        ),
    }
}

pub fn format_docs(result: &DocsResult) -> String {
    format!(
        "{}\n\n{} Review loop: {}",
        result.documentation,
        LOOP,
        format_loop_state(result.loop_state)
    )
}

/// Coordinator reply for the interactive prompt
pub fn format_response(response: &CoordinatorResponse) -> String {
    if response.is_success() {
        response.text().to_string()
    } else {
        format!("{} {}", CROSS, style(response.text()).red())
    }
}

pub fn format_exchange(exchange: &Exchange) -> String {
    let marker = match exchange.status {
        ExchangeStatus::Success => CHECK,
        ExchangeStatus::Error => CROSS,
    };
    format!(
        "{} {} {}\n   {}",
        marker,
        style(exchange.at.format("%Y-%m-%d %H:%M:%S")).dim(),
        style(&exchange.request).bold(),
        format_output(&exchange.response, 3).replace('\n', "\n   ")
    )
}
