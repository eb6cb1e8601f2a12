//! Deterministic reasoner for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Decision, Reasoner, ReasoningRequest};
use crate::error::ChatError;

pub(crate) struct ScriptedReasoner {
    script: Mutex<VecDeque<Decision>>,
    repeat: Option<Decision>,
    reply: String,
    delay: Option<Duration>,
    fail: bool,
    decide_calls: AtomicUsize,
}

impl ScriptedReasoner {
    /// Plays `script` in order, then answers with an empty reply.
    pub(crate) fn new(script: Vec<Decision>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            reply: "Here is what I found.".to_string(),
            delay: None,
            fail: false,
            decide_calls: AtomicUsize::new(0),
        }
    }

    /// Returns `decision` on every call.
    pub(crate) fn repeating(decision: Decision) -> Self {
        Self {
            repeat: Some(decision),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    /// Synthesizes a blank reply.
    pub(crate) fn silent(script: Vec<Decision>) -> Self {
        Self {
            reply: String::new(),
            ..Self::new(script)
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn decide_calls(&self) -> usize {
        self.decide_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn decide(&self, _request: &ReasoningRequest<'_>) -> Result<Decision, ChatError> {
        self.decide_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ChatError::ReasoningUnavailable(
                "upstream returned 503: secret-key-abc".to_string(),
            ));
        }
        if let Some(decision) = &self.repeat {
            return Ok(decision.clone());
        }
        let next = self.script.lock().map(|mut s| s.pop_front()).unwrap_or(None);
        Ok(next.unwrap_or_else(|| Decision::Reply(String::new())))
    }

    async fn respond(&self, request: &ReasoningRequest<'_>) -> Result<String, ChatError> {
        if self.fail {
            return Err(ChatError::ReasoningUnavailable("upstream down".to_string()));
        }
        if self.reply.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{} ({} tool results)", self.reply, request.trace.len()))
    }
}
