//! BUA: drive a live browser through numbered page elements.
//!
//! The page is snapshotted into an [`ElementMap`] whose indices a model refers to when
//! it calls the browser tools; [`Agent`] wires Chrome, the toolset and the
//! orchestration loop together behind one lifecycle.

pub mod agent;
pub mod config;
pub mod logging;

pub use agent::Agent;
pub use config::{load_config, BuaConfig, LoadedConfig, TokenPreset, ViewportPreset};
pub use logging::init_logging;

pub use action_primitives::{AnnotationConfig, Viewport};
pub use agent_core::{
    AgentLoopConfig, AgentLoopStatus, AgentRunResult, ConversationEvent, ConversationRuntime,
    ConversationSession, EventPart, RuntimeError, ScreenshotMode, SessionRequest, Step,
    ToolDeclaration, ToolHandler,
};
pub use perceiver_structural::{Element, ElementMap};
