//! Mock document tools: PDF conversion, key-information extraction, Q&A

use super::{param_str, Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const CONVERTED_MARKDOWN: &str = "# System Architecture Documentation

## Overview
This document describes the architecture decisions for the TaskFlow application.

## Technology Stack
- **Language**: Python 3.9+
- **Framework**: Flask 2.0
- **Database**: PostgreSQL 12+

### Why PostgreSQL?
1. **ACID Compliance**: full transaction support
2. **JSON Support**: native JSONB type
3. **Performance**: strong query optimization

## Security Considerations
- JWT tokens for stateless authentication, 24 hour expiry
- Passwords hashed with bcrypt
- API keys stored in environment variables

## API Design
    GET    /api/tasks          - List all tasks
    POST   /api/tasks          - Create new task
    PUT    /api/tasks/:id      - Update task
    DELETE /api/tasks/:id      - Delete task
";

const ANSWERS: [(&str, &str); 4] = [
    (
        "postgresql",
        "PostgreSQL was chosen for ACID compliance, native JSON support and query performance.",
    ),
    (
        "authentication",
        "The system uses JWT tokens for stateless authentication with a 24 hour expiry.",
    ),
    (
        "security",
        "Passwords are hashed with bcrypt and API keys live in environment variables.",
    ),
    (
        "api",
        "The API is RESTful with standard CRUD endpoints under /api/tasks.",
    ),
];

/// Which document operation a [`DocumentTool`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOp {
    ConvertPdf,
    ExtractKeyInformation,
    AnswerQuestion,
}

impl DocumentOp {
    pub fn name(self) -> &'static str {
        match self {
            DocumentOp::ConvertPdf => "convert_pdf_to_markdown",
            DocumentOp::ExtractKeyInformation => "extract_key_information",
            DocumentOp::AnswerQuestion => "answer_question_from_document",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentTool {
    op: DocumentOp,
}

impl DocumentTool {
    pub fn new(op: DocumentOp) -> Self {
        Self { op }
    }

    pub fn catalogue() -> Vec<Arc<dyn Tool>> {
        [
            DocumentOp::ConvertPdf,
            DocumentOp::ExtractKeyInformation,
            DocumentOp::AnswerQuestion,
        ]
        .into_iter()
        .map(|op| Arc::new(DocumentTool::new(op)) as Arc<dyn Tool>)
        .collect()
    }

    fn run(&self, params: &Value) -> Result<Value, ToolResult> {
        let payload = match self.op {
            DocumentOp::ConvertPdf => {
                let path = param_str(params, "pdf_path")?;
                json!({
                    "source_file": path,
                    "markdown_content": CONVERTED_MARKDOWN,
                    "page_count": 5,
                    "word_count": CONVERTED_MARKDOWN.split_whitespace().count(),
                })
            }
            DocumentOp::ExtractKeyInformation => {
                let markdown = param_str(params, "markdown_content")?;
                let sections: Vec<&str> = markdown
                    .lines()
                    .filter_map(|line| line.strip_prefix("## ").or_else(|| line.strip_prefix("# ")))
                    .map(str::trim)
                    .collect();
                json!({
                    "sections": sections,
                    "technologies": {
                        "backend": "Python 3.9+ with Flask 2.0",
                        "database": "PostgreSQL 12+",
                        "authentication": "JWT tokens",
                    },
                    "key_decisions": [
                        {"topic": "Database Choice", "decision": "PostgreSQL"},
                        {"topic": "Authentication", "decision": "JWT tokens"},
                    ],
                })
            }
            DocumentOp::AnswerQuestion => {
                param_str(params, "markdown_content")?;
                let question = param_str(params, "question")?;
                let lower = question.to_lowercase();
                let answer = ANSWERS
                    .iter()
                    .find(|(keyword, _)| lower.contains(keyword))
                    .map(|(_, answer)| *answer)
                    .unwrap_or("Information not found in document.");
                json!({ "question": question, "answer": answer })
            }
        };
        Ok(payload)
    }
}

#[async_trait]
impl Tool for DocumentTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        match self.op {
            DocumentOp::ConvertPdf => "Convert a PDF to markdown (pdf_path)",
            DocumentOp::ExtractKeyInformation => "Sections and decisions in markdown (markdown_content)",
            DocumentOp::AnswerQuestion => "Answer a question from markdown (markdown_content, question)",
        }
    }

    async fn invoke(&self, params: &Value) -> ToolResult {
        self.run(params).map_or_else(|failure| failure, ToolResult::success)
    }
}
