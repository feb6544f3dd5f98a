//! Task outcomes and the failure taxonomy reported to collectors

use serde::Serialize;
use thiserror::Error;

/// Why a single task failed.
///
/// Failures are reported once and never abort the session loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("unexpected status {0}")]
    HttpStatus(u16),

    #[error("token not received")]
    TokenMissing,

    #[error("JSON parse error: {0}")]
    BodyParse(String),

    #[error("request failed: {0}")]
    Transport(String),
}

impl FailureKind {
    /// Stable label used for metrics and the failure table
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::HttpStatus(_) => "http_status",
            FailureKind::TokenMissing => "token_missing",
            FailureKind::BodyParse(_) => "body_parse",
            FailureKind::Transport(_) => "transport",
        }
    }
}

/// Result of one executed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failure(FailureKind),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    /// Human-readable reason for failures, `None` on success
    pub fn reason(&self) -> Option<String> {
        match self {
            TaskOutcome::Success => None,
            TaskOutcome::Failure(kind) => Some(kind.to_string()),
        }
    }

    pub fn label(&self) -> OutcomeLabel {
        match self {
            TaskOutcome::Success => OutcomeLabel::Success,
            TaskOutcome::Failure(_) => OutcomeLabel::Failure,
        }
    }
}

impl From<FailureKind> for TaskOutcome {
    fn from(kind: FailureKind) -> Self {
        TaskOutcome::Failure(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    Success,
    Failure,
}

impl OutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeLabel::Success => "success",
            OutcomeLabel::Failure => "failure",
        }
    }
}
