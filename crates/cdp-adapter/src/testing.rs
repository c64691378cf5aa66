//! Scriptable in-memory transport for exercising the adapter without a browser.
//!
//! Every command is recorded. Responses come from, in order: values queued per method,
//! the installed handler, then built-in defaults that emulate target/session bookkeeping.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;
use crate::transport::{CdpTransport, CommandTarget, TransportEvent};

/// 1x1 transparent PNG.
pub const BLANK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub type CommandHandler =
    Arc<dyn Fn(&str, &Value) -> Option<Result<Value, AdapterError>> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct RecordedCommand {
    pub target: CommandTarget,
    pub method: String,
    pub params: Value,
}

#[derive(Clone, Debug, Default)]
struct MockTarget {
    url: String,
    title: String,
}

pub struct MockTransport {
    started: AtomicBool,
    stopped: AtomicBool,
    disconnected: CancellationToken,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    commands: Mutex<Vec<RecordedCommand>>,
    queued: Mutex<HashMap<String, VecDeque<Result<Value, AdapterError>>>>,
    handler: Mutex<Option<CommandHandler>>,
    targets: Mutex<HashMap<String, MockTarget>>,
    sessions: Mutex<HashMap<String, String>>,
    seq: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(64);
        Arc::new(Self {
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            disconnected: CancellationToken::new(),
            events_tx,
            events_rx: Mutex::new(events_rx),
            commands: Mutex::new(Vec::new()),
            queued: Mutex::new(HashMap::new()),
            handler: Mutex::new(None),
            targets: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            seq: AtomicUsize::new(0),
        })
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether the adapter shut the transport down.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Ends the event stream as a dropped websocket would.
    pub fn disconnect(&self) {
        self.disconnected.cancel();
    }

    /// Queues a one-shot response for the next `method` call.
    pub async fn push_response(&self, method: &str, response: Result<Value, AdapterError>) {
        self.queued
            .lock()
            .await
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    /// Installs a handler consulted for every command without a queued response.
    /// Returning `None` falls through to the defaults.
    pub async fn on_command<F>(&self, handler: F)
    where
        F: Fn(&str, &Value) -> Option<Result<Value, AdapterError>> + Send + Sync + 'static,
    {
        *self.handler.lock().await = Some(Arc::new(handler));
    }

    pub async fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().await.clone()
    }

    pub async fn commands_for(&self, method: &str) -> Vec<RecordedCommand> {
        self.commands
            .lock()
            .await
            .iter()
            .filter(|cmd| cmd.method == method)
            .cloned()
            .collect()
    }

    /// Evaluated expressions, in call order.
    pub async fn evaluated(&self) -> Vec<String> {
        self.commands_for("Runtime.evaluate")
            .await
            .into_iter()
            .filter_map(|cmd| {
                cmd.params
                    .get("expression")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }

    pub async fn clear_commands(&self) {
        self.commands.lock().await.clear();
    }

    pub async fn set_target_title(&self, target_id: &str, title: &str) {
        if let Some(target) = self.targets.lock().await.get_mut(target_id) {
            target.title = title.to_string();
        }
    }

    pub async fn emit(&self, event: TransportEvent) {
        let _ = self.events_tx.send(event).await;
    }

    async fn default_response(&self, target: &CommandTarget, method: &str, params: &Value) -> Value {
        match method {
            "Target.createTarget" => {
                let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
                let target_id = format!("target-{n}");
                let url = params
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or("about:blank")
                    .to_string();
                self.targets.lock().await.insert(
                    target_id.clone(),
                    MockTarget {
                        url,
                        title: String::new(),
                    },
                );
                json!({ "targetId": target_id })
            }
            "Target.attachToTarget" => {
                let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
                let session = format!("session-{n}");
                if let Some(target_id) = params.get("targetId").and_then(Value::as_str) {
                    self.sessions
                        .lock()
                        .await
                        .insert(session.clone(), target_id.to_string());
                }
                json!({ "sessionId": session })
            }
            "Target.getTargetInfo" => {
                let target_id = params
                    .get("targetId")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let info = self
                    .targets
                    .lock()
                    .await
                    .get(target_id)
                    .cloned()
                    .unwrap_or_default();
                json!({
                    "targetInfo": {
                        "targetId": target_id,
                        "type": "page",
                        "url": info.url,
                        "title": info.title,
                    }
                })
            }
            "Target.closeTarget" => {
                if let Some(target_id) = params.get("targetId").and_then(Value::as_str) {
                    self.targets.lock().await.remove(target_id);
                }
                json!({ "success": true })
            }
            "Page.navigate" => {
                if let (CommandTarget::Session(session), Some(url)) =
                    (target, params.get("url").and_then(Value::as_str))
                {
                    let target_id = self.sessions.lock().await.get(session).cloned();
                    if let Some(target_id) = target_id {
                        if let Some(entry) = self.targets.lock().await.get_mut(&target_id) {
                            entry.url = url.to_string();
                        }
                    }
                }
                json!({ "frameId": "frame-main" })
            }
            "Runtime.evaluate" => {
                let expression = params
                    .get("expression")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if expression == "document.readyState" {
                    json!({ "result": { "type": "string", "value": "complete" } })
                } else {
                    json!({ "result": { "type": "undefined" } })
                }
            }
            "Page.captureScreenshot" => json!({ "data": BLANK_PNG_BASE64 }),
            _ => json!({}),
        }
    }
}

#[async_trait]
impl CdpTransport for MockTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        tokio::select! {
            _ = self.disconnected.cancelled() => None,
            event = async { self.events_rx.lock().await.recv().await } => event,
        }
    }

    async fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        self.commands.lock().await.push(RecordedCommand {
            target: target.clone(),
            method: method.to_string(),
            params: params.clone(),
        });

        let queued = self
            .queued
            .lock()
            .await
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        if let Some(response) = queued {
            return response;
        }

        let handler = self.handler.lock().await.clone();
        if let Some(handler) = handler {
            if let Some(response) = handler(method, &params) {
                return response;
            }
        }

        Ok(self.default_response(&target, method, &params).await)
    }
}
