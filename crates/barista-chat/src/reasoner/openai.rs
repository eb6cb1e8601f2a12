//! Reasoner backed by an OpenAI-compatible chat-completions endpoint.
//!
//! `decide` sends the conversation with the tool catalog attached and maps
//! any returned `tool_calls` to [`ToolCall`]s. `respond` replays the tool
//! trace as assistant/tool messages and asks for a plain-text answer.
//! Transport failures, non-success statuses and unreadable bodies all
//! surface as [`ChatError::ReasoningUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use barista_core::config::ReasonerConfig;

use crate::error::ChatError;
use crate::reasoner::{Decision, Reasoner, ReasoningRequest};
use crate::tools::{ParamKind, ToolDescriptor};
use crate::types::{Role, ToolCall};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

const SYSTEM_PROMPT: &str = "You are a helpful customer-service assistant for a coffee chain. \
Answer strictly from the tools available to you: drinkware products (mugs, tumblers, cups, \
bottles), outlet locations and opening hours, and arithmetic. Always use the calculator tools \
for any addition or multiplication. If a question is outside this scope, say politely that you \
cannot help with it. Be clear and concise.";

#[derive(Debug, Clone)]
pub struct OpenAiReasoner {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiReasoner {
    pub fn new(base_url: &str, model: &str, api_key: String, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::ReasoningUnavailable(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// Build from config, reading the API key from `api_key_env`.
    pub fn from_config(config: &ReasonerConfig) -> Result<Self, ChatError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ChatError::ReasoningUnavailable(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }

    async fn complete(&self, body: &Value) -> Result<AssistantMessage, ChatError> {
        debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::ReasoningUnavailable(format!("transport: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Chat completion request failed");
            return Err(ChatError::ReasoningUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ReasoningUnavailable(format!("response parse: {}", e)))?;
        first_message(parsed)
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn decide(&self, request: &ReasoningRequest<'_>) -> Result<Decision, ChatError> {
        let body = decide_body(&self.model, request);
        let message = self.complete(&body).await?;
        Ok(to_decision(message))
    }

    async fn respond(&self, request: &ReasoningRequest<'_>) -> Result<String, ChatError> {
        let body = json!({
            "model": self.model,
            "messages": build_messages(request),
        });
        let message = self.complete(&body).await?;
        Ok(reply_text(message))
    }
}

// ---- wire format ----

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn first_message(response: CompletionResponse) -> Result<AssistantMessage, ChatError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| ChatError::ReasoningUnavailable("no choices in completion".to_string()))
}

/// Content of a synthesis completion. Blank content is returned as is and
/// left to the executor's fallback reply.
fn reply_text(message: AssistantMessage) -> String {
    message.content.unwrap_or_default()
}

fn to_decision(message: AssistantMessage) -> Decision {
    if message.tool_calls.is_empty() {
        return Decision::Reply(message.content.unwrap_or_default());
    }

    let calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let kwargs = parse_arguments(&call.function.name, &call.function.arguments);
            ToolCall {
                name: call.function.name,
                kwargs,
                args: Vec::new(),
            }
        })
        .collect();
    Decision::ToolCalls(calls)
}

/// Unparseable arguments become an empty map; the registry then reports
/// the missing parameters as invalid arguments.
fn parse_arguments(tool: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            warn!(tool, "Tool call arguments are not a JSON object");
            Map::new()
        }
    }
}

fn decide_body(model: &str, request: &ReasoningRequest<'_>) -> Value {
    let mut body = json!({
        "model": model,
        "messages": build_messages(request),
        "tools": tool_specs(request.tools),
    });
    if let (Some(forced), true) = (request.forced_tool, request.trace.is_empty()) {
        body["tool_choice"] = json!({
            "type": "function",
            "function": {"name": forced.name()},
        });
    }
    body
}

fn tool_specs(tools: &[ToolDescriptor]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut properties = Map::new();
            for param in &tool.params {
                let schema = match param.kind {
                    ParamKind::String => json!({"type": "string", "description": param.description}),
                    ParamKind::Integer => json!({"type": "integer", "description": param.description}),
                    ParamKind::IntegerList => json!({
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": param.description,
                    }),
                };
                properties.insert(param.name.to_string(), schema);
            }
            let required: Vec<&str> = tool
                .params
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name)
                .collect();

            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    },
                },
            })
        })
        .collect()
}

fn build_messages(request: &ReasoningRequest<'_>) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": SYSTEM_PROMPT})];

    for turn in request.history {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages.push(json!({"role": role, "content": turn.content}));
    }
    messages.push(json!({"role": "user", "content": request.message}));

    if !request.trace.is_empty() {
        let calls: Vec<Value> = request
            .trace
            .iter()
            .enumerate()
            .map(|(i, inv)| {
                json!({
                    "id": format!("call_{}", i),
                    "type": "function",
                    "function": {
                        "name": inv.tool_name,
                        "arguments": Value::Object(inv.kwargs.clone()).to_string(),
                    },
                })
            })
            .collect();
        messages.push(json!({"role": "assistant", "content": Value::Null, "tool_calls": calls}));

        for (i, inv) in request.trace.iter().enumerate() {
            messages.push(json!({
                "role": "tool",
                "tool_call_id": format!("call_{}", i),
                "content": json!(inv.result).to_string(),
            }));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolKind;
    use crate::types::{ToolInvocation, ToolOutput, Turn};
    use chrono::Utc;

    fn descriptors() -> Vec<ToolDescriptor> {
        ToolKind::ALL.iter().map(|k| k.descriptor()).collect()
    }

    #[test]
    fn test_tool_specs_shape() {
        let specs = tool_specs(&descriptors());
        assert_eq!(specs.len(), 5);
        let add = &specs[3]["function"];
        assert_eq!(add["name"], "addition_calculator");
        assert_eq!(add["parameters"]["properties"]["numbers"]["type"], "array");
        assert_eq!(add["parameters"]["required"], json!(["numbers"]));
        let search = &specs[0]["function"]["parameters"];
        assert_eq!(search["required"], json!(["query"]));
    }

    #[test]
    fn test_messages_include_history_and_trace() {
        let now = Utc::now();
        let history = vec![Turn::user("hi", now), Turn::assistant("hello!", vec![], now)];
        let call = ToolCall::new("addition_calculator").with_kwarg("numbers", json!([2, 3]));
        let trace = vec![ToolInvocation::completed(&call, Ok(ToolOutput::value(json!(5))))];
        let tools = descriptors();
        let request = ReasoningRequest {
            history: &history,
            message: "add 2 and 3",
            tools: &tools,
            trace: &trace,
            forced_tool: None,
        };

        let messages = build_messages(&request);
        let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user", "assistant", "tool"]);
        assert_eq!(messages[4]["tool_calls"][0]["function"]["name"], "addition_calculator");
        assert_eq!(messages[5]["tool_call_id"], "call_0");
        assert!(messages[5]["content"].as_str().unwrap().contains("\"value\":5"));
    }

    #[test]
    fn test_forced_tool_sets_tool_choice_in_first_round() {
        let tools = descriptors();
        let request = ReasoningRequest {
            history: &[],
            message: "mugs",
            tools: &tools,
            trace: &[],
            forced_tool: Some(ToolKind::GetSimilarProducts),
        };
        let body = decide_body("gpt-test", &request);
        assert_eq!(body["tool_choice"]["function"]["name"], "get_similar_products");
        assert_eq!(body["model"], "gpt-test");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "text_to_sql_query",
                            "arguments": "{\"query\": \"outlets in Kuala Lumpur\"}"
                        }
                    }]
                }
            }]
        });
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        match to_decision(first_message(parsed).unwrap()) {
            Decision::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "text_to_sql_query");
                assert_eq!(calls[0].kwargs["query"], "outlets in Kuala Lumpur");
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_reply_response() {
        let raw = json!({"choices": [{"message": {"content": "Hello!"}}]});
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(
            to_decision(first_message(parsed).unwrap()),
            Decision::Reply("Hello!".to_string())
        );
    }

    #[test]
    fn test_blank_synthesis_is_not_an_error() {
        let raw = json!({"choices": [{"message": {"content": null}}]});
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(reply_text(first_message(parsed).unwrap()), "");

        let raw = json!({"choices": [{"message": {"content": "Two outlets match."}}]});
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(reply_text(first_message(parsed).unwrap()), "Two outlets match.");
    }

    #[test]
    fn test_empty_choices_is_unavailable() {
        let parsed: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            first_message(parsed),
            Err(ChatError::ReasoningUnavailable(_))
        ));
    }

    #[test]
    fn test_bad_arguments_become_empty_map() {
        assert!(parse_arguments("x", "not json").is_empty());
        assert!(parse_arguments("x", "[1, 2]").is_empty());
        assert_eq!(parse_arguments("x", "{\"a\": 1}")["a"], 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let reasoner = OpenAiReasoner::new(
            "http://127.0.0.1:9",
            "gpt-test",
            "key".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();
        let request = ReasoningRequest {
            history: &[],
            message: "hi",
            tools: &[],
            trace: &[],
            forced_tool: None,
        };
        let err = reasoner.decide(&request).await.unwrap_err();
        assert!(matches!(err, ChatError::ReasoningUnavailable(_)));
    }
}
