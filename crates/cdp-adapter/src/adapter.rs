//! Page-level CDP surface and the adapter implementing it over a [`CdpTransport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{DeviceMetrics, MouseEvent, PageInfo};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::events::BrowserEvent;
use crate::ids::PageId;
use crate::metrics::CommandMetrics;
use crate::registry::Registry;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

/// Broadcast channel carrying [`BrowserEvent`]s.
pub type EventBus = broadcast::Sender<BrowserEvent>;

const READY_POLL: Duration = Duration::from_millis(100);

/// Schemes accepted as typed; anything else without `://` is taken as a bare host.
const SCHEMELESS_PREFIXES: &[&str] = &["about:", "data:", "file:", "javascript:", "chrome:"];

/// Minimal CDP capability surface required by the upper layers.
#[async_trait]
pub trait Cdp: Send + Sync {
    /// Opens a new page target and attaches a flattened session to it.
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError>;
    async fn close_page(&self, page: PageId) -> Result<(), AdapterError>;
    /// Brings the page's target to the foreground.
    async fn activate_page(&self, page: PageId) -> Result<(), AdapterError>;
    /// Navigates and waits for the load event (`readyState == "complete"`).
    /// `example.com` is read as `https://example.com`.
    async fn navigate(&self, page: PageId, url: &str, deadline: Duration)
        -> Result<(), AdapterError>;
    async fn wait_for_load(&self, page: PageId, deadline: Duration) -> Result<(), AdapterError>;
    /// Evaluates an expression (promises awaited) and returns its value by value.
    async fn evaluate_script(&self, page: PageId, expression: &str)
        -> Result<Value, AdapterError>;
    /// Captures the visible viewport as PNG bytes.
    async fn screenshot(&self, page: PageId) -> Result<Vec<u8>, AdapterError>;
    async fn dispatch_mouse_event(&self, page: PageId, event: MouseEvent)
        -> Result<(), AdapterError>;
    async fn insert_text(&self, page: PageId, text: &str) -> Result<(), AdapterError>;
    async fn set_device_metrics(
        &self,
        page: PageId,
        metrics: DeviceMetrics,
    ) -> Result<(), AdapterError>;
    /// Live url and title, never cached.
    async fn page_info(&self, page: PageId) -> Result<PageInfo, AdapterError>;
    /// Sends any protocol method on the page's session and returns the raw result.
    async fn call(&self, page: PageId, method: &str, params: Value)
        -> Result<Value, AdapterError>;
}

pub struct CdpAdapter {
    pub cfg: CdpConfig,
    bus: EventBus,
    registry: Arc<Registry>,
    metrics: CommandMetrics,
    shutdown: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
    transport: Arc<dyn CdpTransport>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetEvent {
    target_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetachEvent {
    session_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfoResult {
    target_info: TargetInfo,
}

#[derive(Deserialize)]
struct TargetInfo {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
}

fn decode_error(err: serde_json::Error) -> AdapterError {
    AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string())
}

/// Trims `raw`, adds `https://` when no scheme was typed and checks the result parses.
pub fn normalize_url(raw: &str) -> Result<String, AdapterError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://")
        || SCHEMELESS_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
    {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    url::Url::parse(&candidate).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Navigation)
            .with_hint(format!("invalid url '{raw}': {err}"))
    })?;
    Ok(candidate)
}

impl CdpAdapter {
    /// Adapter over a real Chrome described by `cfg`. Nothing is launched until
    /// [`CdpAdapter::start`].
    pub fn new(cfg: CdpConfig, bus: EventBus) -> Self {
        let transport = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::with_transport(cfg, bus, transport)
    }

    pub fn with_transport(
        cfg: CdpConfig,
        bus: EventBus,
        transport: Arc<dyn CdpTransport>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry: Arc::new(Registry::new()),
            metrics: CommandMetrics::default(),
            shutdown: CancellationToken::new(),
            listener: Mutex::new(None),
            transport,
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> &CommandMetrics {
        &self.metrics
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
        self.bus.subscribe()
    }

    /// Default per-operation deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    /// Connects the transport, turns on target discovery and starts listening for events.
    /// A second call is a no-op.
    pub async fn start(self: Arc<Self>) -> Result<(), AdapterError> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }
        self.transport.start().await?;
        self.send_command("Target.setDiscoverTargets", json!({ "discover": true }))
            .await?;
        *listener = Some(tokio::spawn(Self::listen(Arc::clone(&self))));
        info!(target: "cdp-adapter", headless = self.cfg.headless, "adapter started");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.listener.lock().await.take() {
            let _ = handle.await;
        }
        self.transport.shutdown().await;
    }

    async fn listen(self: Arc<Self>) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                event = self.transport.next_event() => event,
            };
            match event {
                Some(event) => self.apply_event(event),
                None => {
                    self.on_disconnect();
                    return;
                }
            }
        }
    }

    fn publish(&self, event: BrowserEvent) {
        // No subscribers is fine.
        let _ = self.bus.send(event);
    }

    fn on_disconnect(&self) {
        let pages = self.registry.pages();
        warn!(target: "cdp-adapter", pages = pages.len(), "browser connection lost");
        self.registry.clear();
        for page in pages {
            self.publish(BrowserEvent::PageClosed { page });
        }
        self.publish(BrowserEvent::Disconnected {
            reason: "devtools connection closed".to_string(),
        });
    }

    fn apply_event(&self, event: TransportEvent) {
        self.metrics.record_event();
        if let Err(err) = self.route_event(&event) {
            debug!(target: "cdp-adapter", method = %event.method, %err, "malformed cdp event");
        }
    }

    fn route_event(&self, event: &TransportEvent) -> Result<(), AdapterError> {
        let params = event.params.clone();
        match event.method.as_str() {
            "Target.targetDestroyed" => {
                let payload: TargetEvent = serde_json::from_value(params).map_err(decode_error)?;
                if let Some(page) = self.registry.page_for_target(&payload.target_id) {
                    self.forget_page(page);
                }
            }
            "Target.detachedFromTarget" => {
                let payload: DetachEvent = serde_json::from_value(params).map_err(decode_error)?;
                if let Some(page) = self.registry.page_for_session(&payload.session_id) {
                    self.forget_page(page);
                }
            }
            "Target.targetCrashed" => {
                let payload: TargetEvent = serde_json::from_value(params).map_err(decode_error)?;
                if let Some(page) = self.registry.page_for_target(&payload.target_id) {
                    warn!(target: "cdp-adapter", %page, "renderer crashed");
                    self.publish(BrowserEvent::PageCrashed { page });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn forget_page(&self, page: PageId) {
        if self.registry.remove_page(&page).is_some() {
            self.publish(BrowserEvent::PageClosed { page });
        }
    }

    async fn send_command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.send_to(CommandTarget::Browser, method, params).await
    }

    async fn send_page_command(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let ctx = self.registry.get(&page).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no cdp session for page {page}"))
        })?;
        self.send_to(CommandTarget::Session(ctx.cdp_session), method, params)
            .await
    }

    async fn send_to(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let started = Instant::now();
        let result = self.transport.send_command(target, method, params).await;
        self.metrics
            .record_command(method, started.elapsed(), result.is_ok());
        result
    }

    fn target_id(&self, page: PageId) -> Result<String, AdapterError> {
        self.registry
            .get(&page)
            .map(|ctx| ctx.target_id)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("unknown page {page}"))
            })
    }

    async fn wait_for_ready_state(
        &self,
        page: PageId,
        deadline: Instant,
        accepted: &[&str],
    ) -> Result<(), AdapterError> {
        loop {
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint("page did not finish loading before the deadline")
                    .retriable(true));
            }

            let response = self
                .send_page_command(
                    page,
                    "Runtime.evaluate",
                    json!({
                        "expression": "document.readyState",
                        "returnByValue": true,
                    }),
                )
                .await?;

            let ready = response
                .pointer("/result/value")
                .and_then(Value::as_str)
                .is_some_and(|state| accepted.contains(&state));
            if ready {
                return Ok(());
            }

            sleep(READY_POLL).await;
        }
    }
}

#[async_trait]
impl Cdp for CdpAdapter {
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError> {
        let created = self
            .send_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("createTarget missing targetId")
            })?
            .to_string();

        let attached = self
            .send_command(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("attachToTarget missing sessionId")
            })?
            .to_string();

        let page = PageId::new();
        self.registry
            .insert_page(page, target_id.clone(), session.clone());
        debug!(target: "cdp-adapter", %page, %target_id, %session, "page attached");
        Ok(page)
    }

    async fn close_page(&self, page: PageId) -> Result<(), AdapterError> {
        let target_id = self.target_id(page)?;
        self.send_command("Target.closeTarget", json!({ "targetId": target_id }))
            .await?;
        self.forget_page(page);
        Ok(())
    }

    async fn activate_page(&self, page: PageId) -> Result<(), AdapterError> {
        let target_id = self.target_id(page)?;
        self.send_command("Target.activateTarget", json!({ "targetId": target_id }))
            .await
            .map(|_| ())
    }

    async fn navigate(
        &self,
        page: PageId,
        url: &str,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let url = normalize_url(url)?;
        let response = self
            .send_page_command(page, "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error_text) = response
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            return Err(AdapterError::new(AdapterErrorKind::Navigation)
                .with_hint(format!("navigation to {url} failed: {error_text}")));
        }
        self.wait_for_load(page, deadline).await
    }

    async fn wait_for_load(&self, page: PageId, deadline: Duration) -> Result<(), AdapterError> {
        let start = Instant::now();
        let deadline_at = start
            .checked_add(deadline)
            .unwrap_or_else(|| start + self.deadline());
        self.wait_for_ready_state(page, deadline_at, &["complete"])
            .await
    }

    async fn evaluate_script(
        &self,
        page: PageId,
        expression: &str,
    ) -> Result<Value, AdapterError> {
        let response = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            let description = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("evaluation raised an exception")
                .to_string();
            return Err(AdapterError::new(AdapterErrorKind::ScriptException)
                .with_hint(description)
                .with_data(details.clone()));
        }

        Ok(response
            .get("result")
            .and_then(|res| res.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn screenshot(&self, page: PageId) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .send_page_command(
                page,
                "Page.captureScreenshot",
                json!({ "format": "png", "captureBeyondViewport": false }),
            )
            .await?;
        let data = response
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal).with_hint("missing screenshot data")
            })?;
        STANDARD
            .decode(data)
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
    }

    async fn dispatch_mouse_event(
        &self,
        page: PageId,
        event: MouseEvent,
    ) -> Result<(), AdapterError> {
        let payload = serde_json::to_value(event).map_err(decode_error)?;
        self.send_page_command(page, "Input.dispatchMouseEvent", payload)
            .await
            .map(|_| ())
    }

    async fn insert_text(&self, page: PageId, text: &str) -> Result<(), AdapterError> {
        self.send_page_command(page, "Input.insertText", json!({ "text": text }))
            .await
            .map(|_| ())
    }

    async fn set_device_metrics(
        &self,
        page: PageId,
        metrics: DeviceMetrics,
    ) -> Result<(), AdapterError> {
        let payload = serde_json::to_value(metrics).map_err(decode_error)?;
        self.send_page_command(page, "Emulation.setDeviceMetricsOverride", payload)
            .await
            .map(|_| ())
    }

    async fn page_info(&self, page: PageId) -> Result<PageInfo, AdapterError> {
        let target_id = self.target_id(page)?;
        let response = self
            .send_command("Target.getTargetInfo", json!({ "targetId": target_id }))
            .await?;
        let payload: TargetInfoResult = serde_json::from_value(response).map_err(decode_error)?;
        Ok(PageInfo {
            url: payload.target_info.url,
            title: payload.target_info.title,
        })
    }

    async fn call(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        debug!(target: "cdp-adapter", %page, %method, "raw cdp call");
        self.send_page_command(page, method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use tokio::time::{timeout, Duration as TokioDuration};

    async fn started_adapter() -> (Arc<CdpAdapter>, Arc<MockTransport>) {
        let (bus, _rx) = crate::event_bus(16);
        let transport = MockTransport::new();
        let adapter = Arc::new(CdpAdapter::with_transport(
            CdpConfig::default(),
            bus,
            transport.clone() as Arc<dyn CdpTransport>,
        ));
        Arc::clone(&adapter).start().await.expect("start adapter");
        (adapter, transport)
    }

    #[tokio::test]
    async fn create_page_attaches_flattened_session() {
        let (adapter, transport) = started_adapter().await;
        assert!(transport.started());

        let page = adapter.create_page("about:blank").await.expect("page");
        adapter
            .evaluate_script(page, "1 + 1")
            .await
            .expect("evaluate");

        let attach = transport.commands_for("Target.attachToTarget").await;
        assert_eq!(attach.len(), 1);
        assert_eq!(attach[0].params["flatten"], true);
        assert_eq!(attach[0].params["targetId"], "target-1");

        let evaluate = transport.commands_for("Runtime.evaluate").await;
        assert!(matches!(
            &evaluate[0].target,
            CommandTarget::Session(session) if session == "session-2"
        ));

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn navigate_surfaces_error_text() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        transport
            .push_response(
                "Page.navigate",
                Ok(json!({ "frameId": "f", "errorText": "net::ERR_NAME_NOT_RESOLVED" })),
            )
            .await;

        let err = adapter
            .navigate(page, "https://nowhere.invalid", Duration::from_secs(1))
            .await
            .expect_err("navigation should fail");
        assert_eq!(err.kind, AdapterErrorKind::Navigation);
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn navigate_polls_until_complete() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        transport
            .push_response(
                "Runtime.evaluate",
                Ok(json!({ "result": { "type": "string", "value": "loading" } })),
            )
            .await;
        transport
            .push_response(
                "Runtime.evaluate",
                Ok(json!({ "result": { "type": "string", "value": "interactive" } })),
            )
            .await;

        adapter
            .navigate(page, "https://example.com/", Duration::from_secs(5))
            .await
            .expect("navigate");

        assert_eq!(transport.evaluated().await.len(), 3);
        let info = adapter.page_info(page).await.expect("info");
        assert_eq!(info.url, "https://example.com/");

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn navigate_rejects_malformed_url() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        let err = adapter
            .navigate(page, "not a url", Duration::from_secs(1))
            .await
            .expect_err("invalid url");
        assert_eq!(err.kind, AdapterErrorKind::Navigation);
        assert!(transport.commands_for("Page.navigate").await.is_empty());
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn evaluate_maps_exception_details() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        transport
            .push_response(
                "Runtime.evaluate",
                Ok(json!({
                    "result": { "type": "object" },
                    "exceptionDetails": {
                        "text": "Uncaught",
                        "exception": { "description": "ReferenceError: foo is not defined" }
                    }
                })),
            )
            .await;

        let err = adapter
            .evaluate_script(page, "foo()")
            .await
            .expect_err("exception");
        assert_eq!(err.kind, AdapterErrorKind::ScriptException);
        assert_eq!(
            err.hint.as_deref(),
            Some("ReferenceError: foo is not defined")
        );
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn set_device_metrics_dispatches_emulation_override() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");

        adapter
            .set_device_metrics(page, DeviceMetrics::desktop(1280, 800))
            .await
            .expect("set device metrics");

        let commands = transport
            .commands_for("Emulation.setDeviceMetricsOverride")
            .await;
        let entry = &commands[0].params;
        assert_eq!(entry["width"], 1280);
        assert_eq!(entry["height"], 800);
        assert_eq!(entry["deviceScaleFactor"], 1.0);
        assert_eq!(entry["mobile"], false);

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn screenshot_decodes_base64_payload() {
        let (adapter, _transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        let bytes = adapter.screenshot(page).await.expect("screenshot");
        assert_eq!(&bytes[1..4], b"PNG");
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn close_unknown_page_is_target_not_found() {
        let (adapter, _transport) = started_adapter().await;
        let err = adapter
            .close_page(PageId::new())
            .await
            .expect_err("unknown page");
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn destroyed_target_event_forgets_page() {
        let (adapter, transport) = started_adapter().await;
        let mut rx = adapter.subscribe();
        let page = adapter.create_page("about:blank").await.expect("page");

        transport
            .emit(TransportEvent {
                method: "Target.targetDestroyed".into(),
                params: json!({ "targetId": "target-1" }),
                session_id: None,
            })
            .await;

        let event = timeout(TokioDuration::from_secs(1), rx.recv())
            .await
            .expect("event in time")
            .expect("event");
        assert_eq!(event, BrowserEvent::PageClosed { page });
        assert!(adapter.registry().get(&page).is_none());
        assert_eq!(adapter.metrics().events(), 1);

        adapter.shutdown().await;
        assert!(transport.stopped());
    }

    #[tokio::test]
    async fn crashed_target_is_reported_but_kept() {
        let (adapter, transport) = started_adapter().await;
        let mut rx = adapter.subscribe();
        let page = adapter.create_page("about:blank").await.expect("page");

        transport
            .emit(TransportEvent {
                method: "Target.targetCrashed".into(),
                params: json!({ "targetId": "target-1", "status": "crashed", "errorCode": 133 }),
                session_id: None,
            })
            .await;

        let event = timeout(TokioDuration::from_secs(1), rx.recv())
            .await
            .expect("event in time")
            .expect("event");
        assert_eq!(event, BrowserEvent::PageCrashed { page });
        assert!(adapter.registry().get(&page).is_some());
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn lost_connection_closes_every_page() {
        let (adapter, transport) = started_adapter().await;
        let mut rx = adapter.subscribe();
        let first = adapter.create_page("about:blank").await.expect("first");
        let second = adapter.create_page("about:blank").await.expect("second");

        transport.disconnect();

        let mut closed = Vec::new();
        loop {
            let event = timeout(TokioDuration::from_secs(1), rx.recv())
                .await
                .expect("event in time")
                .expect("event");
            match event {
                BrowserEvent::PageClosed { page } => closed.push(page),
                BrowserEvent::Disconnected { .. } => break,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(closed.len(), 2);
        assert!(closed.contains(&first) && closed.contains(&second));
        assert!(adapter.registry().is_empty());
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn start_twice_enables_discovery_once() {
        let (adapter, transport) = started_adapter().await;
        Arc::clone(&adapter).start().await.expect("second start");
        let discover = transport.commands_for("Target.setDiscoverTargets").await;
        assert_eq!(discover.len(), 1);
        assert_eq!(discover[0].params["discover"], true);
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn bare_host_is_loaded_over_https() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");

        adapter
            .navigate(page, "example.com", Duration::from_secs(1))
            .await
            .expect("navigate");

        let sent = transport.commands_for("Page.navigate").await;
        assert_eq!(sent[0].params["url"], "https://example.com");
        let info = adapter.page_info(page).await.expect("info");
        assert_eq!(info.url, "https://example.com");
        adapter.shutdown().await;
    }

    #[test]
    fn url_normalization() {
        assert_eq!(normalize_url("about:blank").expect("about"), "about:blank");
        assert_eq!(
            normalize_url(" https://a.test/x ").expect("trimmed"),
            "https://a.test/x"
        );
        assert_eq!(
            normalize_url("localhost:8080/login").expect("host with port"),
            "https://localhost:8080/login"
        );
        assert_eq!(
            normalize_url("data:text/html,<p>hi</p>").expect("data"),
            "data:text/html,<p>hi</p>"
        );
        let err = normalize_url("not a url").expect_err("spaces");
        assert_eq!(err.kind, AdapterErrorKind::Navigation);
    }

    #[tokio::test]
    async fn call_uses_the_page_session() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        transport
            .push_response(
                "Performance.getMetrics",
                Ok(json!({ "metrics": [{ "name": "Nodes", "value": 42 }] })),
            )
            .await;

        let result = adapter
            .call(page, "Performance.getMetrics", json!({}))
            .await
            .expect("call");
        assert_eq!(result["metrics"][0]["value"], 42);

        let sent = transport.commands_for("Performance.getMetrics").await;
        assert!(matches!(
            &sent[0].target,
            CommandTarget::Session(session) if session == "session-2"
        ));

        let err = adapter
            .call(PageId::new(), "Page.reload", json!({}))
            .await
            .expect_err("unknown page");
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn failed_commands_are_counted() {
        let (adapter, transport) = started_adapter().await;
        let page = adapter.create_page("about:blank").await.expect("page");
        transport
            .push_response(
                "Page.navigate",
                Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint("socket reset")),
            )
            .await;

        assert!(adapter
            .navigate(page, "https://a.test/", Duration::from_secs(1))
            .await
            .is_err());
        assert_eq!(adapter.metrics().sent("Page.navigate"), 1);
        assert_eq!(adapter.metrics().failed("Page.navigate"), 1);
        assert_eq!(adapter.metrics().failed("Target.createTarget"), 0);
        adapter.shutdown().await;
    }
}
