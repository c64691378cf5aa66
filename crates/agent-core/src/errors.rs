use thiserror::Error;

/// Errors emitted by the agent-core crate.
///
/// Orchestration failures are reported through [`crate::AgentRunResult::error`]; only
/// problems that prevent a run from starting surface here.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The conversational runtime refused to open a session.
    #[error("failed to create session: {0}")]
    Session(String),

    /// Toolset or runtime wiring is unusable.
    #[error("agent setup failed: {0}")]
    Setup(String),

    /// Raised when a run request is malformed or missing required fields.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// Another task is still running on this agent.
    #[error("a task is already running")]
    Busy,
}

impl AgentError {
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup(message.into())
    }

    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Tool arguments that could not be turned into a [`crate::tools::ToolCall`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    Invalid { tool: String, message: String },
}

impl ArgumentError {
    pub fn invalid(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
