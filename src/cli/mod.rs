//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    HistoryCommand, InteractiveCommand, ReviewPrCommand, TriageIssueCommand, UpdateDocsCommand, ValidateCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// GitHub agents: PR review, issue triage and documentation workflows
#[derive(Debug, Parser, Clone)]
#[command(name = "github-agents")]
#[command(version)]
#[command(about = "Multi-agent GitHub workflows: PR review, issue triage and documentation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Review a pull request
    ReviewPr(ReviewPrCommand),

    /// Triage one or more issues
    TriageIssue(TriageIssueCommand),

    /// Write and refine documentation from text, a file or a PDF
    UpdateDocs(UpdateDocsCommand),

    /// Chat with the coordinator; one session across turns
    Interactive(InteractiveCommand),

    /// Validate a pipeline definition
    Validate(ValidateCommand),

    /// Show stored session history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Commands that keep the process alive until the user leaves
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, Command::Interactive(_))
    }
}
