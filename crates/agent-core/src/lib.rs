//! Agent core: the tool-calling orchestration loop and the browser toolset it drives.
//!
//! A [`ConversationRuntime`] owns the model conversation and calls tools through a
//! [`ToolHandler`] (normally a [`tools::BrowserToolset`]); the [`AgentLoopController`]
//! watches the resulting event stream and produces an [`AgentRunResult`].

pub mod agent_loop;
pub mod errors;
pub mod thinking;
pub mod tokens;
pub mod tools;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent_loop::{
    parse_rate_limit_delay, AgentLoopConfig, AgentLoopController, AgentLoopStatus,
    AgentRunResult, ConversationEvent, ConversationRuntime, ConversationSession, EventPart,
    RunBookkeeping, RuntimeError, SessionRequest, Step, ToolDeclaration, ToolHandler,
};
pub use errors::{AgentError, ArgumentError};
pub use thinking::{parse_structured_thinking, StructuredThinking};
pub use tokens::{estimate_tokens, TokenCounter};
pub use tools::{BrowserToolset, ScreenshotMode, ToolCall, ToolsetConfig};
