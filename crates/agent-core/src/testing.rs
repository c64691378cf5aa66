//! Test doubles for driving the agent loop without a model.
//!
//! [`ScriptedRuntime`] replays one script per opened session. Scripted tool calls go
//! through the real [`ToolHandler`] handed to the session, so the response events carry
//! whatever the handler returned.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::agent_loop::runtime::{
    ConversationEvent, ConversationRuntime, ConversationSession, EventPart, RuntimeError,
    SessionRequest, ToolDeclaration, ToolHandler,
};

#[derive(Debug, Clone)]
pub enum ScriptItem {
    /// Complete model text.
    Text(String),
    /// Invokes the handler, then emits the call and the response as two events.
    Call { name: String, args: Value },
    /// Transport error.
    Error(String),
    /// Emitted verbatim.
    Event(ConversationEvent),
}

impl ScriptItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn call(name: impl Into<String>, args: Value) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    scripts: Mutex<VecDeque<Vec<ScriptItem>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the script for the next session to be opened.
    pub fn with_session(mut self, script: Vec<ScriptItem>) -> Self {
        self.scripts.get_mut().push_back(script);
        self
    }

    pub async fn push_session(&self, script: Vec<ScriptItem>) {
        self.scripts.lock().await.push_back(script);
    }

    pub async fn sessions_opened(&self) -> usize {
        self.prompts.lock().await.len()
    }

    /// Prompts received, one per opened session.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl ConversationRuntime for ScriptedRuntime {
    async fn open_session(
        &self,
        request: SessionRequest,
    ) -> Result<Box<dyn ConversationSession>, RuntimeError> {
        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| RuntimeError::new("no scripted session left"))?;
        self.prompts.lock().await.push(request.prompt);
        Ok(Box::new(ScriptedSession {
            items: script.into(),
            queued: VecDeque::new(),
            handler: request.handler,
        }))
    }
}

struct ScriptedSession {
    items: VecDeque<ScriptItem>,
    queued: VecDeque<ConversationEvent>,
    handler: Arc<dyn ToolHandler>,
}

#[async_trait]
impl ConversationSession for ScriptedSession {
    async fn next_event(&mut self) -> Option<Result<ConversationEvent, RuntimeError>> {
        if let Some(event) = self.queued.pop_front() {
            return Some(Ok(event));
        }

        match self.items.pop_front()? {
            ScriptItem::Text(text) => Some(Ok(ConversationEvent::new(vec![EventPart::text(text)]))),
            ScriptItem::Call { name, args } => {
                let response = self.handler.call(&name, args.clone()).await;
                self.queued
                    .push_back(ConversationEvent::new(vec![EventPart::tool_response(
                        name.clone(),
                        response,
                    )]));
                Some(Ok(ConversationEvent::new(vec![EventPart::tool_call(name, args)])))
            }
            ScriptItem::Error(message) => Some(Err(RuntimeError::new(message))),
            ScriptItem::Event(event) => Some(Ok(event)),
        }
    }
}

/// Records every call and answers `{"success": true}` unless a response was set.
#[derive(Debug, Default)]
pub struct RecordingToolHandler {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<VecDeque<(String, Value)>>,
}

impl RecordingToolHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next call to `name` with `response`.
    pub async fn respond(&self, name: impl Into<String>, response: Value) {
        self.responses.lock().await.push_back((name.into(), response));
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolHandler for RecordingToolHandler {
    fn declarations(&self) -> Vec<ToolDeclaration> {
        Vec::new()
    }

    async fn call(&self, name: &str, args: Value) -> Value {
        self.calls.lock().await.push((name.to_string(), args));
        let mut responses = self.responses.lock().await;
        if let Some(pos) = responses.iter().position(|(tool, _)| tool == name) {
            if let Some((_, response)) = responses.remove(pos) {
                return response;
            }
        }
        json!({ "success": true })
    }
}
