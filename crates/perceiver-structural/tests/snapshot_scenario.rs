use std::sync::Arc;

use cdp_adapter::testing::MockTransport;
use cdp_adapter::{event_bus, Cdp, CdpAdapter, CdpConfig};
use perceiver_structural::{extract_element_map, find_scrollable_modal, INDEX_ATTRIBUTE};
use serde_json::{json, Value};

fn button(index: u32, label: &str, y: f64) -> Value {
    json!({
        "index": index, "tagName": "button", "role": "", "type": "submit", "text": label,
        "href": "", "value": "", "ariaLabel": "", "placeholder": "",
        "boundingBox": { "x": 20, "y": y, "width": 120, "height": 32 },
        "isVisible": true, "isInteractive": true
    })
}

async fn adapter() -> (Arc<CdpAdapter>, Arc<MockTransport>) {
    let (bus, _rx) = event_bus(8);
    let transport = MockTransport::new();
    let adapter = Arc::new(CdpAdapter::with_transport(
        CdpConfig::default(),
        bus,
        transport.clone(),
    ));
    (adapter, transport)
}

#[tokio::test]
async fn three_visible_buttons_and_hidden_input() {
    let (adapter, transport) = adapter().await;
    let page = adapter.create_page("about:blank").await.expect("page");

    let hidden_input = json!({
        "index": 3, "tagName": "input", "type": "hidden", "text": "",
        "boundingBox": { "x": 0, "y": 0, "width": 0, "height": 0 },
        "isVisible": false, "isInteractive": true
    });
    transport
        .push_response(
            "Runtime.evaluate",
            Ok(json!({ "result": { "value": {
                "title": "Fixture",
                "url": "https://fixture.test/",
                "elements": [button(0, "One", 10.0), button(1, "Two", 50.0), button(2, "Three", 90.0), hidden_input]
            }}})),
        )
        .await;

    let map = extract_element_map(adapter.as_ref(), page)
        .await
        .expect("snapshot");

    assert_eq!(map.count(), 4);
    let element_lines = map
        .to_token_string()
        .lines()
        .filter(|line| line.starts_with('['))
        .count();
    assert_eq!(element_lines, 3);
    for index in 0..4 {
        assert!(map.by_index(index).is_some(), "index {index} should resolve");
    }
    assert_eq!(map.interactive_elements().len(), 3);
}

#[tokio::test]
async fn overlay_probe_prefers_dialog_over_plain_scroll_div() {
    let (adapter, transport) = adapter().await;
    let page = adapter.create_page("about:blank").await.expect("page");

    transport
        .on_command(|method, params| {
            let expression = params.get("expression").and_then(Value::as_str)?;
            if method != "Runtime.evaluate" || !expression.contains(INDEX_ATTRIBUTE) {
                return None;
            }
            Some(Ok(json!({ "result": { "value": [
                {
                    "index": 0, "role": "", "display": "block", "visibility": "visible",
                    "position": "static", "overflowY": "scroll", "scrollHeight": 3000,
                    "clientHeight": 600, "childScrollable": false,
                    "width": 900, "height": 600, "top": 0, "left": 0
                },
                {
                    "index": 5, "role": "dialog", "display": "block", "visibility": "visible",
                    "position": "fixed", "overflowY": "auto", "scrollHeight": 800,
                    "clientHeight": 400, "childScrollable": false,
                    "width": 500, "height": 400, "top": 100, "left": 200
                }
            ]}})))
        })
        .await;

    assert_eq!(find_scrollable_modal(adapter.as_ref(), page).await, Some(5));
}

#[tokio::test]
async fn overlay_probe_failure_reports_none() {
    let (adapter, transport) = adapter().await;
    let page = adapter.create_page("about:blank").await.expect("page");
    transport
        .push_response(
            "Runtime.evaluate",
            Ok(json!({ "exceptionDetails": { "text": "boom" } })),
        )
        .await;
    assert_eq!(find_scrollable_modal(adapter.as_ref(), page).await, None);
}
