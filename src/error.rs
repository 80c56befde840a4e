//! Error types with fix suggestions
//!
//! Every failure in the dispatch pipeline ends up as a [`TaskError`] carried by
//! an error [`Response`](crate::response::Response). Display strings are kept
//! undecorated: the message a handler produced is the message the poller sees.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaskError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum TaskError {
    // ═══════════════════════════════════════════
    // ROUTING
    // ═══════════════════════════════════════════
    #[error("handler not found")]
    HandlerNotFound,

    /// Failure reported by a handler. Displayed verbatim.
    #[error("{0}")]
    Handler(String),

    #[error("context canceled")]
    Cancelled,

    // ═══════════════════════════════════════════
    // SECRET RESOLUTION
    // ═══════════════════════════════════════════
    #[error("received error code {code}")]
    Status { code: i64 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    // ═══════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════
    #[error("error evaluating expression {expr:?}: {reason}")]
    ExpressionSyntax { expr: String, reason: String },

    #[error("template expressions still unresolved after {limit} iterations")]
    IterationLimit { limit: usize },

    // ═══════════════════════════════════════════
    // IO / CONFIG
    // ═══════════════════════════════════════════
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl TaskError {
    /// Build a handler failure from any displayable message
    pub fn handler(msg: impl Into<String>) -> Self {
        TaskError::Handler(msg.into())
    }

    pub(crate) fn syntax(expr: &str, reason: impl Into<String>) -> Self {
        TaskError::ExpressionSyntax {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

impl FixSuggestion for TaskError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TaskError::HandlerNotFound => {
                Some("Register a handler for the task type or set a not-found handler")
            }
            TaskError::Handler(_) => None,
            TaskError::Cancelled => Some("The request was cancelled before it completed"),
            TaskError::Status { .. } => {
                Some("The secret sub-task exited with a non-2xx status; check its driver output")
            }
            TaskError::Json(_) => Some("Check the payload is valid JSON"),
            TaskError::Base64(_) => Some("CGI envelope bodies must be standard base64"),
            TaskError::ExpressionSyntax { .. } => {
                Some("Use <{ value | getAsBase64 }> or <{ .secrets.<id> }> syntax")
            }
            TaskError::IterationLimit { .. } => Some("Reduce the nesting depth of <{ }> expressions"),
            TaskError::Io(_) => Some("Check file path and permissions"),
            TaskError::Config { .. } => {
                Some("Check ~/.config/task-agent/config.toml for syntax errors")
            }
        }
    }
}
