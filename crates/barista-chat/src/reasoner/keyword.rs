//! Offline, regex-driven reasoner.
//!
//! Classifies a message by intent (arithmetic, outlets, catalog, product
//! search, follow-up, small talk) and maps it to at most one tool call per
//! turn. Replies are composed from the tool trace and never echo internal
//! error text.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::{ChatError, ToolErrorKind};
use crate::reasoner::{Decision, Reasoner, ReasoningRequest};
use crate::tools::ToolKind;
use crate::types::{InvocationResult, Role, ToolCall, ToolInvocation, Turn};

/// Products listed in a reply before summarizing the rest.
const MAX_LISTED: usize = 5;

const INTRO: &str = "I can help with our drinkware (mugs, tumblers, cups and bottles), \
                     outlet locations and opening hours, and simple sums.";

// =============================================================================
// Compiled regex sets
// =============================================================================

struct IntentPatterns {
    multiplication: Vec<Regex>,
    addition: Vec<Regex>,
    outlet: Vec<Regex>,
    catalog: Vec<Regex>,
    product: Vec<Regex>,
    follow_up: Regex,
    greeting: Regex,
    thanks: Regex,
}

static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> {
        pats.iter()
            .map(|p| Regex::new(p).expect("Invalid intent regex"))
            .collect()
    };

    IntentPatterns {
        multiplication: mk(&[
            r"\d\s*[x×*]\s*-?\d",
            r"(?i)\b(?:times|multiply|multiplied|product\s+of)\b",
        ]),
        addition: mk(&[
            r"\d\s*\+\s*-?\d",
            r"(?i)\b(?:add|adding|sum|plus|total\s+of)\b",
        ]),
        outlet: mk(&[
            r"(?i)\b(?:outlets?|branch(?:es)?|stores?|shops?|kiosks?|locations?)\b",
            r"(?i)\b(?:opening|closing)\s+(?:hours|times?)\b",
            r"(?i)\bwhere\s+(?:can\s+i\s+find|are\s+you|is\s+the\s+nearest)\b",
        ]),
        catalog: mk(&[
            r"(?i)\b(?:all|every|full|entire|whole)\s+(?:the\s+|your\s+)?(?:products?|items?|catalog(?:ue)?|range)\b",
            r"(?i)\bwhat\s+do\s+you\s+sell\b",
            r"(?i)\bcatalog(?:ue)?\b",
        ]),
        product: mk(&[
            r"(?i)\b(?:mugs?|tumblers?|cups?|bottles?|flasks?|drinkware|glass(?:es)?|straws?|merch(?:andise)?|products?)\b",
        ]),
        follow_up: Regex::new(r"(?i)^\s*(?:(?:what|how)\s+about|and|also)\b")
            .expect("Invalid follow-up regex"),
        greeting: Regex::new(r"(?i)^\s*(?:hi|hello|hey|good\s+(?:morning|afternoon|evening))\b")
            .expect("Invalid greeting regex"),
        thanks: Regex::new(r"(?i)\b(?:thanks|thank\s+you|cheers)\b")
            .expect("Invalid thanks regex"),
    }
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("Invalid number regex"));

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

fn numbers(text: &str) -> Vec<i64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct KeywordReasoner;

impl KeywordReasoner {
    pub fn new() -> Self {
        Self
    }

    /// Map a message to a tool call, if any intent applies.
    pub fn classify(&self, message: &str, history: &[Turn]) -> Option<ToolCall> {
        let p = &*INTENT_PATTERNS;

        let nums = numbers(message);
        if nums.len() >= 2 {
            if any_match(&p.multiplication, message) {
                return Some(
                    ToolCall::new(ToolKind::MultiplicationCalculator.name())
                        .with_kwarg("num", nums[0])
                        .with_kwarg("multiplier", nums[1]),
                );
            }
            if any_match(&p.addition, message) {
                return Some(
                    ToolCall::new(ToolKind::AdditionCalculator.name())
                        .with_kwarg("numbers", json!(nums)),
                );
            }
        }

        if any_match(&p.outlet, message) {
            return Some(query_call(ToolKind::TextToSqlQuery, message));
        }
        if any_match(&p.catalog, message) {
            return Some(ToolCall::new(ToolKind::GetProducts.name()));
        }
        if any_match(&p.product, message) {
            return Some(query_call(ToolKind::GetSimilarProducts, message));
        }
        if p.follow_up.is_match(message) {
            return last_query_tool(history).map(|kind| query_call(kind, message));
        }
        None
    }

    fn small_talk(&self, message: &str) -> String {
        let p = &*INTENT_PATTERNS;
        if p.greeting.is_match(message) {
            format!("Hi there! {} What can I get for you?", INTRO)
        } else if p.thanks.is_match(message) {
            "You're welcome! Let me know if there's anything else.".to_string()
        } else {
            format!(
                "I'm not sure I can help with that. {} Could you rephrase your question?",
                INTRO
            )
        }
    }
}

fn query_call(kind: ToolKind, message: &str) -> ToolCall {
    ToolCall::new(kind.name()).with_kwarg("query", message.trim())
}

/// Most recent query-style tool used by the assistant in this session.
fn last_query_tool(history: &[Turn]) -> Option<ToolKind> {
    history
        .iter()
        .rev()
        .filter(|turn| turn.role == Role::Assistant)
        .flat_map(|turn| turn.tool_calls.iter().rev())
        .filter_map(|inv| ToolKind::from_name(&inv.tool_name))
        .find(|kind| matches!(kind, ToolKind::GetSimilarProducts | ToolKind::TextToSqlQuery))
}

#[async_trait]
impl Reasoner for KeywordReasoner {
    async fn decide(&self, request: &ReasoningRequest<'_>) -> Result<Decision, ChatError> {
        // One round of tools is enough for every intent this reasoner knows.
        if !request.trace.is_empty() {
            return Ok(Decision::Reply(String::new()));
        }

        Ok(match self.classify(request.message, request.history) {
            Some(call) => Decision::ToolCalls(vec![call]),
            None => Decision::Reply(self.small_talk(request.message)),
        })
    }

    async fn respond(&self, request: &ReasoningRequest<'_>) -> Result<String, ChatError> {
        let mut parts: Vec<String> = Vec::new();
        for invocation in request.trace {
            let part = describe(invocation);
            if !parts.contains(&part) {
                parts.push(part);
            }
        }

        if parts.is_empty() {
            return Ok(self.small_talk(request.message));
        }
        Ok(parts.join("\n\n"))
    }
}

fn describe(invocation: &ToolInvocation) -> String {
    match &invocation.result {
        InvocationResult::Ok { value } => describe_success(&invocation.tool_name, value),
        InvocationResult::Error { kind, .. } => describe_failure(*kind).to_string(),
    }
}

fn describe_success(tool_name: &str, value: &Value) -> String {
    match ToolKind::from_name(tool_name) {
        Some(ToolKind::GetSimilarProducts) => {
            let items = value.as_array().cloned().unwrap_or_default();
            if items.is_empty() {
                return "I couldn't find any products matching that. Try describing it differently."
                    .to_string();
            }
            let lines = product_lines(items.iter().map(|hit| &hit["content"]));
            format!("Here's what I found:\n{}", lines)
        }
        Some(ToolKind::GetProducts) => {
            let total = value["total"].as_u64().unwrap_or(0);
            let items = value["products"].as_array().cloned().unwrap_or_default();
            if items.is_empty() {
                return "Our catalog is empty at the moment.".to_string();
            }
            format!(
                "We carry {} products. Some of them:\n{}",
                total,
                product_lines(items.iter())
            )
        }
        Some(ToolKind::TextToSqlQuery) => describe_outlets(value),
        Some(ToolKind::AdditionCalculator) => format!("The total is {}.", value),
        Some(ToolKind::MultiplicationCalculator) => format!("The result is {}.", value),
        None => "Done.".to_string(),
    }
}

fn product_lines<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    let items: Vec<&Value> = items.collect();
    let mut lines: Vec<String> = items
        .iter()
        .take(MAX_LISTED)
        .map(|item| {
            let name = item["name"].as_str().unwrap_or("Unnamed product");
            match item["price"].as_str().filter(|p| !p.is_empty()) {
                Some(price) => format!("- {} ({})", name, price),
                None => format!("- {}", name),
            }
        })
        .collect();
    if items.len() > MAX_LISTED {
        lines.push(format!("...and {} more.", items.len() - MAX_LISTED));
    }
    lines.join("\n")
}

fn describe_outlets(value: &Value) -> String {
    let rows = value["rows"].as_array().cloned().unwrap_or_default();
    if let Some(count) = rows.first().and_then(|row| row.get("outlet_count")) {
        return match count.as_i64().unwrap_or(0) {
            0 => "I couldn't find any outlets matching that.".to_string(),
            1 => "There is 1 matching outlet.".to_string(),
            n => format!("There are {} matching outlets.", n),
        };
    }
    if rows.is_empty() {
        return "I couldn't find any outlets matching that. Try another area or outlet name."
            .to_string();
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let name = row["name"].as_str().unwrap_or("Outlet");
            let address = row["address"].as_str().unwrap_or_default();
            match row["opening_hours"].as_str().filter(|h| !h.is_empty()) {
                Some(hours) => format!("- {}: {} (open {})", name, address, hours),
                None => format!("- {}: {}", name, address),
            }
        })
        .collect();
    format!("Here are the outlets I found:\n{}", lines.join("\n"))
}

fn describe_failure(kind: ToolErrorKind) -> &'static str {
    match kind {
        ToolErrorKind::UnknownTool => {
            "I don't have a way to do that, but I can still help with products and outlets."
        }
        ToolErrorKind::InvalidArguments => {
            "I couldn't work out the details needed for that request. Could you rephrase it?"
        }
        ToolErrorKind::SearchUnavailable => {
            "Product search isn't available right now. Please try again shortly."
        }
        ToolErrorKind::SqlGenerationFailed => {
            "I couldn't turn that into an outlet lookup. Try asking about outlets in a specific area."
        }
        ToolErrorKind::SqlExecutionFailed => {
            "I had trouble looking up our outlets just now. Please try again shortly."
        }
        _ => "Something went wrong while handling part of your request.",
    }
}
