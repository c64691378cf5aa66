//! Agent loop execution mode.
//!
//! The model drives the browser through tool calls inside a single conversation; the
//! loop watches the event stream, records successful actions as steps, and stops on
//! `done`, a human-takeover request, an error, or the iteration limit.
//!
//! ```text
//! session = runtime.open(prompt, tools, handler)
//! for event in session:
//!     bookkeeping.absorb(event)        // text, tool calls, tool responses
//!     if limit exceeded or error: stop // rate limits reopen a fresh session
//! result = bookkeeping.finish()
//! ```
//!
//! # Key Components
//!
//! - [`AgentLoopConfig`]: iteration and rate-limit bounds
//! - [`ConversationRuntime`]: the model boundary
//! - [`AgentLoopController`]: main loop orchestrator

pub mod bookkeeping;
pub mod config;
pub mod controller;
pub mod runtime;
pub mod types;

pub use bookkeeping::{
    RunBookkeeping, DONE_TOOL, HUMAN_TAKEOVER_ERROR, HUMAN_TAKEOVER_TOOL, NO_DONE_ERROR,
    PAGE_STATE_TOOL,
};
pub use config::AgentLoopConfig;
pub use controller::AgentLoopController;
pub use runtime::{
    parse_rate_limit_delay, ConversationEvent, ConversationRuntime, ConversationSession,
    EventPart, RuntimeError, SessionRequest, ToolDeclaration, ToolHandler,
    DEFAULT_RATE_LIMIT_DELAY,
};
pub use types::{AgentLoopStatus, AgentRunResult, Step};
