//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Review a pull request
#[derive(Debug, Args, Clone)]
pub struct ReviewPrCommand {
    /// Repository as owner/name
    #[arg(value_parser = parse_repo)]
    pub repo: String,

    /// Pull request number
    #[arg(value_parser = parse_number)]
    pub pr_number: u64,

    /// Post the review as a comment on the pull request
    #[arg(long)]
    pub post_comments: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Triage issues
#[derive(Debug, Args, Clone)]
pub struct TriageIssueCommand {
    /// Repository as owner/name
    #[arg(value_parser = parse_repo)]
    pub repo: String,

    /// Issue numbers; several are triaged concurrently
    #[arg(required = true, num_args = 1.., value_parser = parse_number)]
    pub issue_numbers: Vec<u64>,

    /// Apply the suggested labels
    #[arg(long)]
    pub apply_labels: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Write and refine documentation
#[derive(Debug, Args, Clone)]
pub struct UpdateDocsCommand {
    /// Source text, a text file or a PDF
    pub source: String,

    /// Extra context for the writer
    #[arg(long)]
    pub context: Option<String>,

    /// Write the final documentation to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Interactive session
#[derive(Debug, Args, Clone)]
pub struct InteractiveCommand {
    /// Session id to use (a new one is generated when absent)
    #[arg(long)]
    pub session: Option<String>,

    /// Keep the session in the database across runs
    #[arg(long)]
    pub persist: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show session history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Session to show; lists sessions when absent
    #[arg(short, long)]
    pub session: Option<String>,

    /// Number of recent exchanges to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse `owner/name`
pub fn parse_repo(s: &str) -> Result<String, String> {
    match s.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(s.to_string()),
        _ => Err(format!("Invalid repository '{}', expected owner/name", s)),
    }
}

/// Parse an issue or PR number, with or without a leading `#`
pub fn parse_number(s: &str) -> Result<u64, String> {
    s.trim_start_matches('#')
        .parse()
        .map_err(|_| format!("Invalid number: {}", s))
}
