//! Error types for the conversational core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use barista_core::error::BaristaError;
use barista_storage::OutletQueryError;

/// Errors from the chat engine.
///
/// Tool failures are recorded in the turn trace and never abort a turn;
/// only `ReasoningUnavailable` and input validation errors reach the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("similarity search unavailable: {0}")]
    SearchUnavailable(String),
    #[error("SQL generation failed: {0}")]
    SqlGenerationFailed(String),
    #[error("SQL execution failed: {message}")]
    SqlExecutionFailed {
        sql: Option<String>,
        message: String,
    },
    #[error("reasoning collaborator unavailable: {0}")]
    ReasoningUnavailable(String),
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Stable, serializable error classification used in tool traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    SearchUnavailable,
    SqlGenerationFailed,
    SqlExecutionFailed,
    ReasoningUnavailable,
    SessionNotFound,
    EmptyMessage,
    MessageTooLong,
    Storage,
}

impl ChatError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ChatError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            ChatError::InvalidArguments { .. } => ToolErrorKind::InvalidArguments,
            ChatError::SearchUnavailable(_) => ToolErrorKind::SearchUnavailable,
            ChatError::SqlGenerationFailed(_) => ToolErrorKind::SqlGenerationFailed,
            ChatError::SqlExecutionFailed { .. } => ToolErrorKind::SqlExecutionFailed,
            ChatError::ReasoningUnavailable(_) => ToolErrorKind::ReasoningUnavailable,
            ChatError::SessionNotFound(_) => ToolErrorKind::SessionNotFound,
            ChatError::EmptyMessage => ToolErrorKind::EmptyMessage,
            ChatError::MessageTooLong(_) => ToolErrorKind::MessageTooLong,
            ChatError::Storage(_) => ToolErrorKind::Storage,
        }
    }

    /// SQL that was generated before the failure, if any.
    pub fn generated_sql(&self) -> Option<&str> {
        match self {
            ChatError::SqlExecutionFailed { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn invalid_args(tool: &str, message: impl Into<String>) -> Self {
        ChatError::InvalidArguments {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

impl From<BaristaError> for ChatError {
    fn from(err: BaristaError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<OutletQueryError> for ChatError {
    fn from(err: OutletQueryError) -> Self {
        match err {
            OutletQueryError::Generation(message) => ChatError::SqlGenerationFailed(message),
            OutletQueryError::Execution { sql, message } => ChatError::SqlExecutionFailed {
                sql: Some(sql),
                message,
            },
        }
    }
}
