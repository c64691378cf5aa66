//! Boundary to the conversational tool-calling runtime.
//!
//! The runtime owns the model conversation. It is handed the task prompt, the tool
//! declarations and a [`ToolHandler`]; it invokes tools on its own and reports every
//! text, call and response back as [`ConversationEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Delay assumed when a rate-limit error carries no retry hint.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(30);

static RETRY_IN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"retry in (\d+(?:\.\d+)?)s").expect("retry-in regex"));
static RETRY_DELAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"retryDelay"?:\s*"?(\d+)s"#).expect("retryDelay regex"));

/// Tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: Value,
}

/// Executes tool calls on behalf of the runtime.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn declarations(&self) -> Vec<ToolDeclaration>;

    /// Never fails; problems are reported as `{"success": false, "message": ...}`.
    async fn call(&self, name: &str, args: Value) -> Value;
}

/// Everything needed to start one conversation.
#[derive(Clone)]
pub struct SessionRequest {
    /// Sent as the single user message.
    pub prompt: String,
    pub tools: Vec<ToolDeclaration>,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRequest")
            .field("prompt", &self.prompt)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPart {
    Text { text: String },
    ToolCall { name: String, args: Value },
    ToolResponse { name: String, response: Value },
}

impl EventPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_call(name: impl Into<String>, args: Value) -> Self {
        Self::ToolCall {
            name: name.into(),
            args,
        }
    }

    pub fn tool_response(name: impl Into<String>, response: Value) -> Self {
        Self::ToolResponse {
            name: name.into(),
            response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    /// Streaming fragment; a complete event follows.
    #[serde(default)]
    pub partial: bool,
    pub parts: Vec<EventPart>,
}

impl ConversationEvent {
    pub fn new(parts: Vec<EventPart>) -> Self {
        Self {
            partial: false,
            parts,
        }
    }

    pub fn partial(parts: Vec<EventPart>) -> Self {
        Self {
            partial: true,
            parts,
        }
    }
}

/// Transport-level failure reported by the runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// `Some(delay)` when the error is a rate-limit rejection.
    pub fn rate_limit_delay(&self) -> Option<Duration> {
        parse_rate_limit_delay(&self.message)
    }
}

#[async_trait]
pub trait ConversationRuntime: Send + Sync {
    async fn open_session(
        &self,
        request: SessionRequest,
    ) -> Result<Box<dyn ConversationSession>, RuntimeError>;
}

#[async_trait]
pub trait ConversationSession: Send {
    /// `None` once the conversation is over.
    async fn next_event(&mut self) -> Option<Result<ConversationEvent, RuntimeError>>;
}

/// Recognizes `429` / `RESOURCE_EXHAUSTED` errors and extracts the suggested delay from
/// `retry in <secs>s` or `retryDelay:<secs>s`, defaulting to [`DEFAULT_RATE_LIMIT_DELAY`].
pub fn parse_rate_limit_delay(message: &str) -> Option<Duration> {
    if !message.contains("429") && !message.contains("RESOURCE_EXHAUSTED") {
        return None;
    }

    if let Some(secs) = RETRY_IN_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        return Some(Duration::from_millis((secs * 1000.0) as u64));
    }

    if let Some(secs) = RETRY_DELAY_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }

    Some(DEFAULT_RATE_LIMIT_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_retry_in_seconds() {
        let delay = parse_rate_limit_delay(
            "Error 429, Message: quota exceeded. Please retry in 12.5s., Status: RESOURCE_EXHAUSTED",
        );
        assert_eq!(delay, Some(Duration::from_millis(12_500)));
    }

    #[test]
    fn parses_retry_delay_detail() {
        let delay = parse_rate_limit_delay(
            r#"RESOURCE_EXHAUSTED details: [{"@type": "RetryInfo", "retryDelay": "41s"}]"#,
        );
        assert_eq!(delay, Some(Duration::from_secs(41)));
        let delay = parse_rate_limit_delay("RESOURCE_EXHAUSTED retryDelay:41s");
        assert_eq!(delay, Some(Duration::from_secs(41)));
    }

    #[test]
    fn defaults_when_no_hint() {
        assert_eq!(
            parse_rate_limit_delay("HTTP 429 Too Many Requests"),
            Some(DEFAULT_RATE_LIMIT_DELAY)
        );
    }

    #[test]
    fn other_errors_are_not_rate_limits() {
        assert_eq!(parse_rate_limit_delay("connection reset"), None);
        assert_eq!(RuntimeError::new("empty response").rate_limit_delay(), None);
    }

    #[test]
    fn event_parts_serialize_tagged() {
        let event = ConversationEvent::new(vec![EventPart::tool_call(
            "click",
            json!({ "element_index": 3 }),
        )]);
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["parts"][0]["kind"], "tool_call");
        assert_eq!(value["parts"][0]["args"]["element_index"], 3);
        assert_eq!(value["partial"], false);
    }
}
