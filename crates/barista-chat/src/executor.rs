//! Turn executor: runs one user message end-to-end against a session.
//!
//! The session's history lock is held for the whole turn, so turns on one
//! session are serialized. Both turns are appended only after every await
//! has completed; a turn that is dropped mid-flight leaves the history
//! untouched.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use barista_core::config::AgentConfig;

use crate::error::ChatError;
use crate::reasoner::{Reasoner, ReasoningRequest};
use crate::router::{CapabilityRouter, RouteDecision};
use crate::session::SessionStore;
use crate::tools::{ToolDescriptor, ToolKind, ToolRegistry};
use crate::types::{ChatEnvelope, ChatStatus, ToolInvocation, Turn};

const APOLOGY: &str = "Sorry, I'm having trouble answering right now. Please try again in a moment.";
const EMPTY_REPLY_FALLBACK: &str = "I'm not sure how to answer that. Could you rephrase your question?";

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Require this tool in the first round (single-tool endpoints).
    pub forced_tool: Option<ToolKind>,
}

impl ExecuteOptions {
    pub fn forced(kind: ToolKind) -> Self {
        Self {
            forced_tool: Some(kind),
        }
    }
}

pub struct TurnExecutor {
    store: Arc<dyn SessionStore>,
    registry: Arc<ToolRegistry>,
    reasoner: Arc<dyn Reasoner>,
    router: CapabilityRouter,
    tools: Vec<ToolDescriptor>,
    max_message_chars: usize,
    sweep_on_request: bool,
}

impl TurnExecutor {
    pub fn new(
        store: Arc<dyn SessionStore>,
        registry: Arc<ToolRegistry>,
        reasoner: Arc<dyn Reasoner>,
        config: &AgentConfig,
    ) -> Self {
        let tools = registry.list_tools();
        Self {
            store,
            registry,
            reasoner,
            router: CapabilityRouter::from_config(config),
            tools,
            max_message_chars: config.max_message_chars,
            sweep_on_request: true,
        }
    }

    /// Sweep expired sessions before resolving each request (default on).
    pub fn with_sweep_on_request(mut self, enabled: bool) -> Self {
        self.sweep_on_request = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one turn.
    ///
    /// Only input validation fails the call. An unreachable reasoner yields
    /// an envelope with [`ChatStatus::Error`], a generic reply and no
    /// committed turns.
    pub async fn execute(
        &self,
        message: &str,
        session_id: Option<Uuid>,
        options: ExecuteOptions,
    ) -> Result<ChatEnvelope, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_chars {
            return Err(ChatError::MessageTooLong(self.max_message_chars));
        }

        let now = Utc::now();
        if self.sweep_on_request {
            self.store.sweep(now);
        }

        let (handle, is_new) = self.store.resolve(session_id, now);
        let mut locked = handle.lock().await;
        debug!(session_id = %handle.id(), is_new, "Resolved session");

        let outcome = self
            .run_turn(locked.turns(), message, options.forced_tool)
            .await;

        let (reply, trace) = match outcome {
            Ok(done) => done,
            Err((err, trace)) => {
                warn!(session_id = %handle.id(), error = %err, "Reasoning failed, turn not recorded");
                return Ok(ChatEnvelope {
                    response: APOLOGY.to_string(),
                    session_id: handle.id(),
                    status: ChatStatus::Error,
                    tool_calls: trace,
                });
            }
        };

        let reply = if reply.trim().is_empty() {
            EMPTY_REPLY_FALLBACK.to_string()
        } else {
            reply
        };

        let committed_at = Utc::now();
        self.store
            .append_turn(&mut locked, Turn::user(message, committed_at), committed_at);
        self.store.append_turn(
            &mut locked,
            Turn::assistant(reply.clone(), trace.clone(), committed_at),
            committed_at,
        );

        info!(
            session_id = %handle.id(),
            tool_calls = trace.len(),
            failed = trace.iter().filter(|t| !t.is_ok()).count(),
            turns = locked.turns().len(),
            "Turn completed"
        );

        Ok(ChatEnvelope {
            response: reply,
            session_id: handle.id(),
            status: ChatStatus::Success,
            tool_calls: trace,
        })
    }

    /// Route, invoke and synthesize. On failure the partial trace is
    /// returned alongside the error.
    async fn run_turn(
        &self,
        history: &[Turn],
        message: &str,
        forced_tool: Option<ToolKind>,
    ) -> Result<(String, Vec<ToolInvocation>), (ChatError, Vec<ToolInvocation>)> {
        let mut trace: Vec<ToolInvocation> = Vec::new();
        let mut round = 0;

        loop {
            let request = ReasoningRequest {
                history,
                message,
                tools: &self.tools,
                trace: &trace,
                forced_tool,
            };
            let decision = match self.router.route(self.reasoner.as_ref(), &request, round).await {
                Ok(decision) => decision,
                Err(err) => return Err((err, trace)),
            };

            match decision {
                RouteDecision::Reply(text) => return Ok((text, trace)),
                RouteDecision::Synthesize => break,
                RouteDecision::Invoke { calls, last_round } => {
                    let mut unknown = false;
                    for planned in calls {
                        let outcome = match planned.target {
                            Ok(kind) => {
                                self.registry
                                    .invoke_kind(kind, &planned.call.kwargs, &planned.call.args)
                                    .await
                            }
                            Err(err) => {
                                unknown = true;
                                Err(err)
                            }
                        };
                        if let Err(err) = &outcome {
                            warn!(tool = %planned.call.name, kind = ?err.kind(), "Tool call failed");
                        }
                        trace.push(ToolInvocation::completed(&planned.call, outcome));
                    }
                    if unknown || last_round {
                        break;
                    }
                    round += 1;
                }
            }
        }

        let request = ReasoningRequest {
            history,
            message,
            tools: &self.tools,
            trace: &trace,
            forced_tool,
        };
        match self.reasoner.respond(&request).await {
            Ok(reply) => Ok((reply, trace)),
            Err(err) => Err((err, trace)),
        }
    }
}
