//! Per-attempt state folded from the conversation event stream.

use std::collections::HashMap;
use std::time::Duration;

use perceiver_structural::truncate;
use serde_json::{Map, Value};

use super::runtime::{ConversationEvent, EventPart};
use super::types::{AgentLoopStatus, AgentRunResult, Step};
use crate::thinking::{parse_structured_thinking, StructuredThinking};
use crate::tokens::TokenCounter;

pub const DONE_TOOL: &str = "done";
pub const HUMAN_TAKEOVER_TOOL: &str = "request_human_takeover";
pub const PAGE_STATE_TOOL: &str = "get_page_state";

pub const HUMAN_TAKEOVER_ERROR: &str = "human takeover requested - agent could not complete task";
pub const NO_DONE_ERROR: &str = "agent did not complete task (no done() call)";
pub const DONE_FAILURE_ERROR: &str = "task reported failure";

const TARGET_TEXT_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DoneSignal {
    pub success: bool,
    pub summary: String,
    pub data: Option<Map<String, Value>>,
}

/// Owned by one attempt; a rate-limit retry starts from a fresh instance.
#[derive(Debug, Default)]
pub struct RunBookkeeping {
    pending: HashMap<String, Step>,
    steps: Vec<Step>,
    tokens: TokenCounter,
    thinking: StructuredThinking,
    last_text: Option<String>,
    tool_calls: u32,
    done: Option<DoneSignal>,
    takeover_reason: Option<String>,
    takeover: Option<String>,
}

impl RunBookkeeping {
    pub fn new(prompt: &str) -> Self {
        let mut tokens = TokenCounter::new();
        tokens.add_text(prompt);
        Self {
            tokens,
            ..Self::default()
        }
    }

    pub fn absorb(&mut self, event: &ConversationEvent) {
        for part in &event.parts {
            match part {
                EventPart::Text { text } => {
                    if event.partial || text.is_empty() {
                        continue;
                    }
                    self.tokens.add_text(text);
                    let parsed = parse_structured_thinking(text);
                    if !parsed.is_empty() {
                        self.thinking = parsed;
                    }
                    self.last_text = Some(text.clone());
                }
                EventPart::ToolCall { name, args } => {
                    if !event.partial {
                        self.tokens.add_text(&format!("{name}({args})"));
                    }
                    self.on_call(name, args);
                }
                EventPart::ToolResponse { name, response } => {
                    if !event.partial {
                        self.tokens.add_text(&response.to_string());
                    }
                    self.on_response(name, response);
                }
            }
        }
    }

    fn on_call(&mut self, name: &str, args: &Value) {
        self.tool_calls += 1;

        let step = Step {
            action: name.to_string(),
            target: step_target(args),
            reasoning: string_arg(args, "reasoning")
                .or_else(|| string_arg(args, "reason"))
                .unwrap_or_default(),
            thinking: self.thinking.thinking.clone(),
            evaluation: self.thinking.evaluation.clone(),
            memory: self.thinking.memory.clone(),
            next_goal: self.thinking.next_goal.clone(),
        };
        self.pending.insert(name.to_string(), step);

        match name {
            DONE_TOOL => {
                self.done = Some(DoneSignal {
                    success: args.get("success").and_then(Value::as_bool).unwrap_or(false),
                    summary: string_arg(args, "summary").unwrap_or_default(),
                    data: args.get("data").and_then(Value::as_object).cloned(),
                });
            }
            HUMAN_TAKEOVER_TOOL => {
                self.takeover_reason = Some(string_arg(args, "reason").unwrap_or_default());
            }
            _ => {}
        }
    }

    fn on_response(&mut self, name: &str, response: &Value) {
        let succeeded = response
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if let Some(step) = self.pending.remove(name) {
            if succeeded && name != DONE_TOOL && name != PAGE_STATE_TOOL {
                self.steps.push(step);
            }
        }
        // a refused takeover (headless browser) leaves the run going
        if name == HUMAN_TAKEOVER_TOOL {
            let reason = self.takeover_reason.take();
            if succeeded {
                self.takeover = reason;
            }
        }
    }

    pub fn tool_calls(&self) -> u32 {
        self.tool_calls
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn tokens_used(&self) -> usize {
        self.tokens.used()
    }

    /// A `done(success = true)` call was seen.
    pub fn completed_successfully(&self) -> bool {
        self.done.as_ref().is_some_and(|done| done.success)
    }

    pub fn done_called(&self) -> bool {
        self.done.is_some()
    }

    pub fn takeover_requested(&self) -> bool {
        self.takeover.is_some()
    }

    /// Builds the terminal result. `failure` is the error that ended the stream, if any.
    /// A human takeover or a successful `done` takes precedence over it; after
    /// `done(success = false)` the failure replaces the summary as the error.
    pub fn finish(self, failure: Option<String>, attempts: u32, duration: Duration) -> AgentRunResult {
        let mut data = self
            .done
            .as_ref()
            .and_then(|done| done.data.clone())
            .unwrap_or_default();

        let (status, error) = if let Some(reason) = &self.takeover {
            data.insert(
                "summary".into(),
                Value::String(format!("Human takeover requested: {reason}")),
            );
            (
                AgentLoopStatus::AwaitingHuman,
                Some(HUMAN_TAKEOVER_ERROR.to_string()),
            )
        } else if let Some(done) = &self.done {
            if !done.summary.is_empty() {
                data.insert("summary".into(), Value::String(done.summary.clone()));
            }
            if done.success {
                (AgentLoopStatus::Succeeded, None)
            } else if let Some(failure) = failure {
                (AgentLoopStatus::Failed, Some(failure))
            } else if done.summary.is_empty() {
                (AgentLoopStatus::Failed, Some(DONE_FAILURE_ERROR.to_string()))
            } else {
                (AgentLoopStatus::Failed, Some(done.summary.clone()))
            }
        } else {
            (
                AgentLoopStatus::Failed,
                Some(failure.unwrap_or_else(|| NO_DONE_ERROR.to_string())),
            )
        };

        if data.is_empty() {
            if let Some(text) = self.last_text {
                data.insert("response".into(), Value::String(text));
            }
        }

        AgentRunResult {
            success: status == AgentLoopStatus::Succeeded,
            status,
            data,
            error,
            steps: self.steps,
            tokens_used: self.tokens.used(),
            duration,
            attempts,
        }
    }
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

/// `Element #N`, a URL, or quoted typed text; typed text on an element renders
/// `Element #N → "text"`.
fn step_target(args: &Value) -> String {
    let mut target = String::new();
    if let Some(index) = args.get("element_index") {
        target = format!("Element #{}", display_index(index));
    }
    if let Some(url) = args.get("url").and_then(Value::as_str) {
        target = url.to_string();
    }
    if let Some(text) = args.get("text").and_then(Value::as_str) {
        let quoted = format!("\"{}\"", truncate(text, TARGET_TEXT_LIMIT));
        if target.is_empty() {
            target = quoted;
        } else {
            target = format!("{target} → {quoted}");
        }
    }
    target
}

fn display_index(index: &Value) -> String {
    match index {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.fract() == 0.0)
                    .map(|v| format!("{}", v as i64))
            })
            .unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
