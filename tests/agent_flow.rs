use std::sync::Arc;

use agent_core::testing::{ScriptItem, ScriptedRuntime};
use agent_core::{
    AgentError, ConversationEvent, ConversationRuntime, ConversationSession, EventPart,
    RuntimeError, SessionRequest,
};
use async_trait::async_trait;
use bua::{Agent, AgentLoopStatus, BuaConfig};
use cdp_adapter::testing::MockTransport;
use cdp_adapter::CommandTarget;
use perceiver_structural::extract::EXTRACT_SCRIPT;
use serde_json::{json, Value};
use tokio::sync::Notify;

fn page() -> Value {
    json!({
        "title": "Shop",
        "url": "https://shop.test/",
        "elements": [
            {
                "index": 0, "tagName": "input", "type": "search", "placeholder": "Search",
                "boundingBox": { "x": 20, "y": 10, "width": 300, "height": 32 },
                "isVisible": true, "isInteractive": true
            },
            {
                "index": 1, "tagName": "button", "text": "Go",
                "boundingBox": { "x": 330, "y": 10, "width": 60, "height": 32 },
                "isVisible": true, "isInteractive": true
            }
        ]
    })
}

fn config(downloads: &std::path::Path) -> BuaConfig {
    let mut config = BuaConfig::default();
    config.highlight.enabled = Some(false);
    config.downloads_dir = downloads.to_path_buf();
    config.agent.loop_config.rate_limit_buffer_ms = 0;
    config
}

async fn transport() -> Arc<MockTransport> {
    let transport = MockTransport::new();
    transport
        .on_command(|method, params| {
            if method != "Runtime.evaluate" {
                return None;
            }
            let expression = params.get("expression")?.as_str()?;
            (expression == EXTRACT_SCRIPT).then(|| Ok(json!({ "result": { "value": page() } })))
        })
        .await;
    transport
}

#[tokio::test]
async fn scripted_task_runs_to_done() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = transport().await;
    let runtime = Arc::new(ScriptedRuntime::new().with_session(vec![
        ScriptItem::call("navigate", json!({ "url": "https://shop.test/" })),
        ScriptItem::call("get_page_state", json!({ "exclude_screenshot": true })),
        ScriptItem::text("THINKING: the search box is element 0\nNEXT_GOAL: search"),
        ScriptItem::call(
            "type_text",
            json!({ "element_index": 0, "text": "lamp", "reasoning": "search" }),
        ),
        ScriptItem::call("click", json!({ "element_index": 1 })),
        ScriptItem::call(
            "done",
            json!({ "success": true, "summary": "searched", "data": { "query": "lamp" } }),
        ),
    ]));
    let agent = Agent::with_transport(config(dir.path()), runtime.clone(), transport.clone());

    agent.start().await.expect("start");
    assert!(transport.started());

    let result = agent.run("find a lamp").await.expect("run");
    assert!(result.success, "{result:?}");
    assert_eq!(result.status, AgentLoopStatus::Succeeded);
    assert_eq!(result.summary(), Some("searched"));
    assert_eq!(result.data["query"], "lamp");
    assert_eq!(result.attempts, 1);

    let actions: Vec<_> = result.steps.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(actions, ["navigate", "type_text", "click"]);
    assert_eq!(result.steps[1].target, "Element #0 → \"lamp\"");
    assert_eq!(result.steps[1].thinking.as_deref(), Some("the search box is element 0"));

    assert_eq!(runtime.prompts().await, ["find a lamp"]);
    let inserted = transport.commands_for("Input.insertText").await;
    assert_eq!(inserted.len(), 1);
    assert_eq!(agent.status().await, AgentLoopStatus::Succeeded);

    agent.close().await.expect("close");
    assert_eq!(transport.commands_for("Target.closeTarget").await.len(), 1);
}

#[tokio::test]
async fn run_before_start_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = Agent::with_transport(
        config(dir.path()),
        Arc::new(ScriptedRuntime::new()),
        transport().await,
    );

    let err = agent.run("anything").await.expect_err("not started");
    assert_eq!(err.to_string(), "agent not started, call start() first");
    assert!(agent.navigate("https://shop.test/").await.is_err());
    assert_eq!(agent.status().await, AgentLoopStatus::Idle);
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = Agent::with_transport(
        config(dir.path()),
        Arc::new(ScriptedRuntime::new()),
        transport().await,
    );
    agent.start().await.expect("start");
    agent.close().await.expect("first close");
    agent.close().await.expect("second close");

    assert_eq!(agent.start().await.expect_err("closed").to_string(), "agent is closed");
    assert_eq!(agent.run("task").await.expect_err("closed").to_string(), "agent is closed");
}

#[tokio::test]
async fn facade_helpers_reach_the_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = transport().await;
    let agent = Agent::with_transport(
        config(dir.path()),
        Arc::new(ScriptedRuntime::new()),
        transport.clone(),
    );
    agent.start().await.expect("start");
    agent.navigate("https://shop.test/").await.expect("navigate");

    let map = agent.element_map().await.expect("element map");
    assert_eq!(map.count(), 2);
    assert_eq!(map.page_title, "Shop");

    let png = agent.screenshot().await.expect("screenshot");
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

    agent.close().await.expect("close");
}

#[tokio::test]
async fn task_failure_is_a_result_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_session(vec![ScriptItem::call("request_human_takeover", json!({ "reason": "CAPTCHA" }))]),
    );
    let mut config = config(dir.path());
    config.browser.headless = false;
    let agent = Agent::with_transport(config, runtime, transport().await);
    agent.start().await.expect("start");

    let result = agent.run("log in").await.expect("run");
    assert!(!result.success);
    assert_eq!(result.status, AgentLoopStatus::AwaitingHuman);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("human takeover requested")));
    agent.close().await.expect("close");
}

#[tokio::test]
async fn headless_run_cannot_hand_over_to_a_human() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = Arc::new(ScriptedRuntime::new().with_session(vec![
        ScriptItem::call("request_human_takeover", json!({ "reason": "CAPTCHA" })),
        ScriptItem::call("done", json!({ "success": false, "summary": "blocked by CAPTCHA" })),
    ]));
    let agent = Agent::with_transport(config(dir.path()), runtime, transport().await);
    agent.start().await.expect("start");

    let result = agent.run("log in").await.expect("run");
    assert_eq!(result.status, AgentLoopStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("blocked by CAPTCHA"));
    agent.close().await.expect("close");
}

#[tokio::test]
async fn raw_calls_go_to_the_active_tab() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = transport().await;
    let agent = Agent::with_transport(
        config(dir.path()),
        Arc::new(ScriptedRuntime::new()),
        transport.clone(),
    );
    agent.start().await.expect("start");

    let err = agent
        .call("Network.getCookies", json!({}))
        .await
        .expect_err("no tab yet");
    assert_eq!(err.to_string(), "no active page");

    agent.navigate("shop.test").await.expect("navigate");
    let navigated = transport.commands_for("Page.navigate").await;
    assert_eq!(navigated[0].params["url"], "https://shop.test");

    transport
        .push_response(
            "Network.getCookies",
            Ok(json!({ "cookies": [{ "name": "sid", "value": "42" }] })),
        )
        .await;
    let out = agent
        .call("Network.getCookies", json!({ "urls": ["https://shop.test/"] }))
        .await
        .expect("call");
    assert_eq!(out["cookies"][0]["name"], "sid");

    let sent = transport.commands_for("Network.getCookies").await;
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0].target, CommandTarget::Session(id) if id == "session-2"));
    assert_eq!(sent[0].params["urls"][0], "https://shop.test/");
    agent.close().await.expect("close");
}

#[tokio::test]
async fn annotations_toggle_on_and_off() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = transport().await;
    let agent = Agent::with_transport(
        config(dir.path()),
        Arc::new(ScriptedRuntime::new()),
        transport.clone(),
    );
    agent.start().await.expect("start");
    agent.navigate("https://shop.test/").await.expect("navigate");

    assert!(agent.toggle_annotations().await.expect("show"));
    assert!(transport
        .evaluated()
        .await
        .iter()
        .any(|s| s.contains("bua-annotation-container")));

    transport
        .push_response("Runtime.evaluate", Ok(json!({ "result": { "value": true } })))
        .await;
    assert!(!agent.toggle_annotations().await.expect("hide"));
    agent.close().await.expect("close");
}

/// Holds its single `done` call back until released.
struct GatedRuntime {
    release: Arc<Notify>,
}

struct GatedSession {
    release: Arc<Notify>,
    finished: bool,
}

#[async_trait]
impl ConversationRuntime for GatedRuntime {
    async fn open_session(
        &self,
        _request: SessionRequest,
    ) -> Result<Box<dyn ConversationSession>, RuntimeError> {
        Ok(Box::new(GatedSession {
            release: Arc::clone(&self.release),
            finished: false,
        }))
    }
}

#[async_trait]
impl ConversationSession for GatedSession {
    async fn next_event(&mut self) -> Option<Result<ConversationEvent, RuntimeError>> {
        if self.finished {
            return None;
        }
        self.release.notified().await;
        self.finished = true;
        Some(Ok(ConversationEvent::new(vec![EventPart::tool_call(
            "done",
            json!({ "success": true, "summary": "released" }),
        )])))
    }
}

#[tokio::test]
async fn second_run_while_busy_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let release = Arc::new(Notify::new());
    let agent = Agent::with_transport(
        config(dir.path()),
        Arc::new(GatedRuntime {
            release: Arc::clone(&release),
        }),
        transport().await,
    );
    agent.start().await.expect("start");

    let (first, second) = tokio::join!(agent.run("slow task"), async {
        while agent.status().await != AgentLoopStatus::Running {
            tokio::task::yield_now().await;
        }
        let second = agent.run("second task").await;
        release.notify_one();
        second
    });

    let err = second.expect_err("busy");
    assert!(matches!(err.downcast_ref::<AgentError>(), Some(AgentError::Busy)));
    assert_eq!(first.expect("first run").summary(), Some("released"));

    // the slot is free again once the first run is over
    release.notify_one();
    assert!(agent.run("third task").await.expect("third run").success);
    agent.close().await.expect("close");
}
