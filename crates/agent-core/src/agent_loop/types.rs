//! Core data types for the orchestration loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of the orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLoopStatus {
    Idle,
    Running,
    /// Sleeping before a fresh session after a rate-limit rejection.
    RateLimited,
    Succeeded,
    Failed,
    /// The model asked for a human; the run ends unsuccessfully.
    AwaitingHuman,
}

impl AgentLoopStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentLoopStatus::Succeeded | AgentLoopStatus::Failed | AgentLoopStatus::AwaitingHuman
        )
    }
}

/// One successful tool call, as recorded in the run history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Tool name.
    pub action: String,

    /// `Element #N`, a URL, or the quoted typed text.
    pub target: String,

    pub reasoning: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_goal: Option<String>,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub success: bool,

    /// One of `Succeeded`, `Failed`, `AwaitingHuman`.
    pub status: AgentLoopStatus,

    /// `done` data plus `summary`, or `response` when only free text came back.
    pub data: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub steps: Vec<Step>,

    /// Estimated, for the last attempt.
    pub tokens_used: usize,

    pub duration: Duration,

    /// Sessions opened; greater than one after rate-limit retries.
    pub attempts: u32,
}

impl AgentRunResult {
    pub fn summary(&self) -> Option<&str> {
        self.data.get("summary").and_then(Value::as_str)
    }

    /// Steps rendered one per line, e.g. `1. click Element #3 (open the menu)`.
    pub fn steps_summary(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let mut line = format!("{}. {}", i + 1, step.action);
                if !step.target.is_empty() {
                    line.push(' ');
                    line.push_str(&step.target);
                }
                if !step.reasoning.is_empty() {
                    line.push_str(&format!(" ({})", step.reasoning));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
