//! Reasoning collaborator: proposes tool calls and writes replies.
//!
//! The protocol has two phases. `decide` is consulted once per tool round
//! and either answers directly or asks for tool calls. Once tools have run,
//! `respond` writes the final reply from the accumulated trace.

pub mod keyword;
pub mod openai;
#[cfg(test)]
pub(crate) mod scripted;

use std::sync::Arc;

use async_trait::async_trait;

use barista_core::config::ReasonerConfig;

use crate::error::ChatError;
use crate::tools::{ToolDescriptor, ToolKind};
use crate::types::{ToolCall, ToolInvocation, Turn};

pub use keyword::KeywordReasoner;
pub use openai::OpenAiReasoner;

/// Everything the collaborator sees for one decision.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningRequest<'a> {
    /// Prior turns of the session, oldest first.
    pub history: &'a [Turn],
    pub message: &'a str,
    pub tools: &'a [ToolDescriptor],
    /// Tool invocations already completed in this turn.
    pub trace: &'a [ToolInvocation],
    pub forced_tool: Option<ToolKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Reply(String),
    ToolCalls(Vec<ToolCall>),
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Choose between answering directly and calling tools.
    async fn decide(&self, request: &ReasoningRequest<'_>) -> Result<Decision, ChatError>;

    /// Write the final reply from `request.trace`.
    async fn respond(&self, request: &ReasoningRequest<'_>) -> Result<String, ChatError>;
}

/// Build the reasoner selected by `reasoner.backend`.
pub fn build_reasoner(config: &ReasonerConfig) -> Result<Arc<dyn Reasoner>, ChatError> {
    match config.backend.as_str() {
        "keyword" => Ok(Arc::new(KeywordReasoner::new())),
        "openai" => Ok(Arc::new(OpenAiReasoner::from_config(config)?)),
        other => Err(ChatError::ReasoningUnavailable(format!(
            "unknown reasoner backend `{}`",
            other
        ))),
    }
}
