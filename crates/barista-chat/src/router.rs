//! Capability router: turns collaborator decisions into executable plans.
//!
//! The router is stateless between turns. Within a turn it enforces the
//! round limit, the per-tool call bound (counted against the trace so far),
//! forced-tool substitution for single-tool endpoints, and resolves every
//! requested name against the closed [`ToolKind`] set.

use std::collections::HashMap;

use tracing::{debug, warn};

use barista_core::config::AgentConfig;

use crate::error::ChatError;
use crate::reasoner::{Decision, Reasoner, ReasoningRequest};
use crate::tools::ToolKind;
use crate::types::ToolCall;

/// A requested call paired with the tool it resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub call: ToolCall,
    pub target: Result<ToolKind, ChatError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Answer directly; no tools ran this turn.
    Reply(String),
    /// Execute these calls. `last_round` ends the tool phase afterwards.
    Invoke {
        calls: Vec<PlannedCall>,
        last_round: bool,
    },
    /// Tool phase is over; synthesize the reply from the trace.
    Synthesize,
}

#[derive(Debug, Clone)]
pub struct CapabilityRouter {
    max_calls_per_tool: usize,
    max_tool_rounds: usize,
}

impl CapabilityRouter {
    pub fn new(max_calls_per_tool: usize, max_tool_rounds: usize) -> Self {
        Self {
            max_calls_per_tool,
            max_tool_rounds,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.max_calls_per_tool, config.max_tool_rounds)
    }

    /// Consult the collaborator for tool round `round` (zero-based).
    pub async fn route(
        &self,
        reasoner: &dyn Reasoner,
        request: &ReasoningRequest<'_>,
        round: usize,
    ) -> Result<RouteDecision, ChatError> {
        if round >= self.max_tool_rounds {
            debug!(round, "Tool round limit reached");
            return Ok(RouteDecision::Synthesize);
        }

        let decision = reasoner.decide(request).await?;
        let mut calls = match decision {
            Decision::Reply(text) if request.trace.is_empty() && round == 0 => {
                match request.forced_tool {
                    Some(forced) => vec![forced_call(forced, request.message)],
                    None => return Ok(RouteDecision::Reply(text)),
                }
            }
            Decision::Reply(_) => return Ok(RouteDecision::Synthesize),
            Decision::ToolCalls(calls) => calls,
        };

        if round == 0 {
            if let Some(forced) = request.forced_tool {
                calls.retain(|c| c.name == forced.name());
                if calls.is_empty() {
                    calls.push(forced_call(forced, request.message));
                }
            }
        }

        if calls.is_empty() {
            return Ok(RouteDecision::Synthesize);
        }

        let mut used: HashMap<String, usize> = HashMap::new();
        for inv in request.trace {
            *used.entry(inv.tool_name.clone()).or_default() += 1;
        }

        let mut planned = Vec::with_capacity(calls.len());
        let mut over_bound = false;
        for call in calls {
            let count = used.entry(call.name.clone()).or_default();
            if *count >= self.max_calls_per_tool {
                warn!(
                    tool = %call.name,
                    bound = self.max_calls_per_tool,
                    "Per-tool call bound reached, dropping call"
                );
                over_bound = true;
                continue;
            }
            *count += 1;
            let target = ToolKind::from_name(&call.name)
                .ok_or_else(|| ChatError::UnknownTool(call.name.clone()));
            planned.push(PlannedCall { call, target });
        }

        if planned.is_empty() {
            return Ok(RouteDecision::Synthesize);
        }

        Ok(RouteDecision::Invoke {
            last_round: over_bound || round + 1 >= self.max_tool_rounds,
            calls: planned,
        })
    }
}

fn forced_call(kind: ToolKind, message: &str) -> ToolCall {
    ToolCall::new(kind.name()).with_kwarg("query", message.trim())
}
