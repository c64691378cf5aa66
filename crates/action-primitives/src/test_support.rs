//! Shared fixtures for unit tests driven by the mock transport.

use std::sync::Arc;

use cdp_adapter::testing::MockTransport;
use cdp_adapter::{event_bus, Cdp, CdpAdapter, CdpConfig};
use perceiver_structural::extract::EXTRACT_SCRIPT;
use serde_json::{json, Value};

use crate::highlight::Highlighter;
use crate::primitives::{ActionPrimitives, DefaultActionPrimitives, PrimitivesConfig};
use crate::tabs::TabRegistry;
use crate::types::{ExecCtx, Viewport};
use crate::waiting::DefaultWaitStrategy;

pub(crate) struct Harness {
    pub adapter: Arc<CdpAdapter>,
    pub transport: Arc<MockTransport>,
    /// Standalone registry over the same adapter, for registry-level tests.
    pub tabs: TabRegistry,
    pub primitives: DefaultActionPrimitives,
}

pub(crate) async fn harness() -> Harness {
    let (bus, _rx) = event_bus(16);
    let transport = MockTransport::new();
    let adapter = Arc::new(CdpAdapter::with_transport(
        CdpConfig::default(),
        bus,
        transport.clone(),
    ));
    let cdp: Arc<dyn Cdp> = adapter.clone();
    let tabs = TabRegistry::new(cdp, Viewport::default(), adapter.deadline());
    let primitives = DefaultActionPrimitives::new(
        adapter.clone(),
        Arc::new(DefaultWaitStrategy),
        PrimitivesConfig {
            highlighter: Highlighter::disabled(),
            ..PrimitivesConfig::default()
        },
    );
    Harness {
        adapter,
        transport,
        tabs,
        primitives,
    }
}

/// Harness whose primitives already navigated to `url`.
pub(crate) async fn with_page(url: &str) -> Harness {
    let h = harness().await;
    if let Err(err) = h.primitives.navigate(&ExecCtx::detached(), url).await {
        panic!("fixture navigation failed: {err}");
    }
    h
}

/// Login form: an input (index 0) and a button (index 1).
pub(crate) fn elements_fixture() -> Value {
    json!({
        "title": "Login",
        "url": "https://example.com/login",
        "elements": [
            {
                "index": 0, "tagName": "input", "type": "email", "placeholder": "Email",
                "boundingBox": { "x": 10, "y": 20, "width": 200, "height": 30 },
                "isVisible": true, "isInteractive": true
            },
            {
                "index": 1, "tagName": "button", "text": "Sign in",
                "boundingBox": { "x": 10, "y": 60, "width": 80, "height": 30 },
                "isVisible": true, "isInteractive": true
            }
        ]
    })
}

/// Answers the extraction script with [`elements_fixture`].
pub(crate) async fn serve_elements(transport: &MockTransport) {
    transport
        .on_command(|method, params| {
            if method != "Runtime.evaluate" {
                return None;
            }
            let expression = params.get("expression")?.as_str()?;
            (expression == EXTRACT_SCRIPT)
                .then(|| Ok(json!({ "result": { "value": elements_fixture() } })))
        })
        .await;
}
