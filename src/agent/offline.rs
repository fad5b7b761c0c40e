//! Deterministic offline responder used when no model command is configured

use crate::agent::{AgentError, AgentResponse, ModelClient};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Marker that opens every routing prompt the coordinator sends
pub const ROUTING_MARKER: &str = "You are the GitHub coordinator.";

const CODE_ANALYSIS: &str = "\
Code analysis:
- The change adds input validation to the request handler.
- Error paths now return typed errors instead of panicking.
- One helper duplicates logic from utils/parse.rs; consider reusing it.
- New public functions lack doc comments.";

const SECURITY_ANALYSIS: &str = "\
Security analysis:
- No hardcoded credentials found in the diff.
- User input is validated before it reaches the database layer.
- Low risk: the new endpoint has no rate limiting.";

const FINAL_REVIEW: &str = "\
## Review summary

The change is well structured and improves error handling.

**Requested changes**
1. Reuse the existing parser helper instead of duplicating it.
2. Add doc comments to the new public functions.

**Security**: no blocking findings; consider rate limiting the new endpoint.

Verdict: approve once the requested changes are addressed.";

const CATEGORY: &str = "Category: bug\nReason: the issue describes a crash with reproduction steps.";

const PRIORITY: &str = "Priority: high\nReason: the crash affects the default configuration.";

const LABELS: &str = "Labels: bug, priority:high, needs-triage\nSummary: crash in default configuration, fix soon.";

const DRAFT: &str = "\
# Documentation

## Overview
This module explains the feature described in the source material.

## Usage
Call the entry point with a configuration file.";

const REVISED: &str = "\
# Documentation

## Overview
This module explains the feature described in the source material.

## Usage
Call the entry point with a configuration file:

    tool run --config config.yaml

## Troubleshooting
If the run fails, re-run with --verbose and check the log for the failing step.";

const CRITIQUE: &str = "\
- Add a concrete usage example.
- Add a troubleshooting section.";

const DIRECT_FALLBACK: &str = "I can review pull requests, triage issues and improve documentation. \
Try: \"review PR #42 in octocat/hello-world\".";

/// Canned model that recognises the built-in pipeline roles by phrase
///
/// It holds no state of its own: anything it "remembers" comes from the
/// prior context it is handed.
#[derive(Debug, Clone, Default)]
pub struct OfflineModel;

impl OfflineModel {
    pub fn new() -> Self {
        Self
    }

    fn respond(&self, prompt: &str, prior_context: &str) -> String {
        if prompt.contains(ROUTING_MARKER) {
            return route_request(request_line(prompt)).to_string();
        }

        let lower = prompt.to_lowercase();
        let canned = [
            ("code analysis specialist", CODE_ANALYSIS),
            ("security analysis specialist", SECURITY_ANALYSIS),
            ("pull request review writer", FINAL_REVIEW),
            ("issue categorization specialist", CATEGORY),
            ("issue priority specialist", PRIORITY),
            ("label application specialist", LABELS),
            ("technical documentation writer", DRAFT),
            ("documentation improvement specialist", REVISED),
        ];

        if lower.contains("documentation quality reviewer") {
            // Drafts that already went through a revision pass are accepted
            return if prompt.contains("## Troubleshooting") {
                "APPROVED".to_string()
            } else {
                CRITIQUE.to_string()
            };
        }

        canned
            .iter()
            .find(|(role, _)| lower.contains(role))
            .map(|(_, text)| text.to_string())
            .unwrap_or_else(|| direct_answer(prompt, prior_context))
    }
}

#[async_trait]
impl ModelClient for OfflineModel {
    async fn invoke(&self, prompt: &str, prior_context: &str) -> Result<AgentResponse, AgentError> {
        Ok(AgentResponse::new(self.respond(prompt, prior_context)))
    }
}

fn request_line(prompt: &str) -> &str {
    prompt
        .rsplit_once("Request:")
        .map(|(_, rest)| rest.trim())
        .unwrap_or(prompt)
}

/// Patterns the responder extracts request details with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Repo,
    HashNumber,
    BareNumber,
    Name,
}

impl Pattern {
    fn regex(self) -> Option<&'static Regex> {
        static REPO: OnceLock<Option<Regex>> = OnceLock::new();
        static HASH_NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
        static BARE_NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
        static NAME: OnceLock<Option<Regex>> = OnceLock::new();

        let (cell, pattern) = match self {
            Pattern::Repo => (&REPO, r"([A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+)"),
            Pattern::HashNumber => (&HASH_NUMBER, r"#(\d+)"),
            Pattern::BareNumber => (&BARE_NUMBER, r"\b(\d+)\b"),
            Pattern::Name => (&NAME, r"(?i)my name is ([A-Za-z][A-Za-z'-]*)"),
        };
        cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
    }
}

fn capture(pattern: Pattern, text: &str) -> Option<&str> {
    pattern.regex()?.captures(text)?.get(1).map(|m| m.as_str())
}

fn route_request(request: &str) -> Value {
    let lower = request.to_lowercase();
    let repo = capture(Pattern::Repo, request);
    let number = capture(Pattern::HashNumber, request)
        .or_else(|| capture(Pattern::BareNumber, request))
        .and_then(|n| n.parse::<u64>().ok());

    let mut inputs = Map::new();
    let route = match (repo, number) {
        (Some(repo), Some(n)) if lower.contains("review") || lower.contains("pull") => {
            inputs.insert("repo".into(), json!(repo));
            inputs.insert("pr_number".into(), json!(n));
            "pr_review"
        }
        (Some(repo), Some(n)) if lower.contains("triage") || lower.contains("issue") => {
            inputs.insert("repo".into(), json!(repo));
            inputs.insert("issue_number".into(), json!(n));
            "issue_triage"
        }
        _ if lower.contains("doc") => {
            let content = request
                .split_once(':')
                .map(|(_, rest)| rest.trim())
                .unwrap_or(request);
            inputs.insert("content".into(), json!(content));
            inputs.insert("context".into(), json!("general"));
            "documentation"
        }
        _ => "direct",
    };

    json!({ "route": route, "inputs": inputs })
}

fn direct_answer(prompt: &str, prior_context: &str) -> String {
    if let Some(name) = capture(Pattern::Name, prompt) {
        return format!("Nice to meet you, {}!", name);
    }

    let lower = prompt.to_lowercase();
    if lower.contains("my name") {
        return match capture(Pattern::Name, prior_context) {
            Some(name) => format!("Your name is {}.", name),
            None => "I don't know your name yet.".to_string(),
        };
    }

    DIRECT_FALLBACK.to_string()
}
