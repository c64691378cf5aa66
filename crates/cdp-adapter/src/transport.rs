//! Wire transport: one websocket to the browser, multiplexing commands and events.

use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::cdp::browser_protocol::target::SessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, Response};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::launcher;

const COMMAND_QUEUE: usize = 128;
const EVENT_QUEUE: usize = 512;

#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Where a command is routed: the browser endpoint or a flattened page session.
#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    /// `None` once the connection is gone for good.
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
    /// Drops the connection and stops a browser this transport launched.
    async fn shutdown(&self) {}
}

fn io_error(hint: impl Display) -> AdapterError {
    AdapterError::new(AdapterErrorKind::CdpIo).with_hint(hint.to_string())
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

/// Transport over a real Chrome, launched from [`CdpConfig`] or attached by websocket url.
pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: OnceCell<Link>,
}

struct Link {
    commands: mpsc::Sender<Outgoing>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    pump: JoinHandle<()>,
    browser: Mutex<Option<Child>>,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        Self {
            cfg,
            link: OnceCell::new(),
        }
    }

    fn link(&self) -> Result<&Link, AdapterError> {
        self.link
            .get()
            .ok_or_else(|| io_error("transport not started"))
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        self.link.get_or_try_init(|| Link::open(&self.cfg)).await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        let link = self.link.get()?;
        link.events.lock().await.recv().await
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let link = self.link()?;
        let (reply, response) = oneshot::channel();
        link.commands
            .send(Outgoing {
                target,
                method: method.to_string(),
                params,
                reply,
            })
            .await
            .map_err(|_| io_error("cdp connection closed"))?;

        match timeout(Duration::from_millis(self.cfg.default_deadline_ms), response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(io_error(format!("{method} dropped by a closing connection"))),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{method} got no response in time"))
                .retriable(true)),
        }
    }

    async fn shutdown(&self) {
        if let Some(link) = self.link.get() {
            link.close().await;
        }
    }
}

impl Link {
    async fn open(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let (browser, ws_url) = match &cfg.websocket_url {
            Some(url) => {
                info!(target: "cdp-transport", %url, "attaching to running browser");
                (None, url.clone())
            }
            None => {
                let (child, url) = launcher::launch(cfg).await?;
                (Some(child), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| io_error(format!("cannot connect to {ws_url}: {err}")))?;
        let (commands, outgoing) = mpsc::channel(COMMAND_QUEUE);
        let (events_tx, events) = mpsc::channel(EVENT_QUEUE);
        let pump = tokio::spawn(pump(conn, outgoing, events_tx));
        debug!(target: "cdp-transport", url = %ws_url, "devtools connection open");

        Ok(Self {
            commands,
            events: Mutex::new(events),
            pump,
            browser: Mutex::new(browser),
        })
    }

    async fn close(&self) {
        self.pump.abort();
        if let Some(mut child) = self.browser.lock().await.take() {
            if let Err(err) = child.kill().await {
                warn!(target: "cdp-transport", %err, "failed to stop chrome");
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Moves commands onto the socket and responses/events off it until either side closes.
/// Commands still waiting for a response fail with the reason the connection ended.
async fn pump(
    mut conn: Connection<CdpEventMessage>,
    mut outgoing: mpsc::Receiver<Outgoing>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut waiting: HashMap<CallId, Reply> = HashMap::new();

    let reason = loop {
        tokio::select! {
            Some(cmd) = outgoing.recv() => {
                let session = match cmd.target {
                    CommandTarget::Browser => None,
                    CommandTarget::Session(id) => Some(SessionId::from(id)),
                };
                match conn.submit_command(cmd.method.into(), session, cmd.params) {
                    Ok(id) => {
                        waiting.insert(id, cmd.reply);
                    }
                    Err(err) => {
                        let _ = cmd.reply.send(Err(io_error(err)));
                    }
                }
            }
            message = conn.next() => match message {
                Some(Ok(Message::Response(response))) => {
                    if let Some(reply) = waiting.remove(&response.id) {
                        let _ = reply.send(response_payload(response));
                    }
                }
                Some(Ok(Message::Event(event))) => forward(event, &events).await,
                Some(Err(err)) => break err.to_string(),
                None => break "websocket closed".to_string(),
            }
        }
    };

    warn!(target: "cdp-transport", %reason, pending = waiting.len(), "devtools connection ended");
    for (_, reply) in waiting.drain() {
        let _ = reply.send(Err(io_error(&reason)));
    }
}

async fn forward(event: CdpEventMessage, events: &mpsc::Sender<TransportEvent>) {
    let raw: CdpJsonEventMessage = match event.try_into() {
        Ok(raw) => raw,
        Err(err) => {
            debug!(target: "cdp-transport", %err, "undecodable cdp event");
            return;
        }
    };
    let event = TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    };
    if events.send(event).await.is_err() {
        debug!(target: "cdp-transport", "event receiver gone");
    }
}

fn response_payload(response: Response) -> Result<Value, AdapterError> {
    match (response.result, response.error) {
        (Some(result), _) => Ok(result),
        (None, Some(error)) => Err(io_error(format!(
            "cdp error {}: {}",
            error.code, error.message
        ))),
        (None, None) => Ok(Value::Null),
    }
}
