//! Conversation data model: sessions, turns, tool invocations, envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ChatError, ToolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a session. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Tool activity that produced an assistant turn. Always empty for user turns.
    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,
    pub recorded_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            recorded_at: now,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        tool_calls: Vec<ToolInvocation>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            recorded_at: now,
        }
    }
}

/// Server-side record of one user's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Refresh last activity. Never moves it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

/// A tool request as proposed by the reasoning collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kwargs: Map::new(),
            args: Vec::new(),
        }
    }

    pub fn with_kwarg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Successful tool result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub value: Value,
    /// Present only for SQL-backed tools.
    pub generated_sql: Option<String>,
}

impl ToolOutput {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            generated_sql: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationResult {
    Ok { value: Value },
    Error { kind: ToolErrorKind, message: String },
}

/// A completed tool call with its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub kwargs: Map<String, Value>,
    pub args: Vec<Value>,
    pub result: InvocationResult,
    pub generated_sql: Option<String>,
}

impl ToolInvocation {
    /// Record a call once its outcome is known.
    pub fn completed(call: &ToolCall, outcome: Result<ToolOutput, ChatError>) -> Self {
        let (result, generated_sql) = match outcome {
            Ok(output) => (
                InvocationResult::Ok {
                    value: output.value,
                },
                output.generated_sql,
            ),
            Err(err) => {
                let sql = err.generated_sql().map(str::to_string);
                (
                    InvocationResult::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                    },
                    sql,
                )
            }
        };

        Self {
            tool_name: call.name.clone(),
            kwargs: call.kwargs.clone(),
            args: call.args.clone(),
            result,
            generated_sql,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, InvocationResult::Ok { .. })
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.result {
            InvocationResult::Ok { .. } => None,
            InvocationResult::Error { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Success,
    Error,
}

/// Response for one executed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub response: String,
    pub session_id: Uuid,
    pub status: ChatStatus,
    pub tool_calls: Vec<ToolInvocation>,
}
