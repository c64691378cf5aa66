//! Browser toolset: executes validated [`ToolCall`]s against [`ActionPrimitives`].
//!
//! Every tool answers with a JSON object carrying `success`; failures never escape as
//! errors so the model can read them and recover.

use std::path::PathBuf;
use std::sync::Arc;

use action_primitives::{
    ActionPrimitives, AnnotationConfig, ClickTarget, ExecCtx, ScrollOutcome, ScrollTarget,
};
use async_trait::async_trait;
use perceiver_visual::{encode_base64, ScreenshotOptions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::args::*;
use super::download::{decode_page_payload, page_fetch_script, DownloadError, Downloader};
use super::{declarations, ToolCall};
use crate::agent_loop::runtime::{ToolDeclaration, ToolHandler};

pub const DEFAULT_MAX_ELEMENTS: usize = 150;

/// When screenshots are attached to tool responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotMode {
    /// Only `get_page_state` returns a screenshot.
    #[default]
    Normal,
    /// Successful click/type/scroll/navigate responses carry one too.
    Smart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsetConfig {
    /// Element lines rendered into `get_page_state`; `0` means unlimited.
    pub max_elements: usize,
    pub screenshot: ScreenshotOptions,
    /// Never capture screenshots.
    pub text_only: bool,
    pub screenshot_mode: ScreenshotMode,
    /// Draw the index overlay around each action.
    pub show_annotations: bool,
    pub annotation: AnnotationConfig,
    pub downloads_dir: PathBuf,
    /// Nobody can see a headless browser, so takeover requests are refused.
    pub headless: bool,
}

impl Default for ToolsetConfig {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
            screenshot: ScreenshotOptions::default(),
            text_only: false,
            screenshot_mode: ScreenshotMode::Normal,
            show_annotations: false,
            annotation: AnnotationConfig::default(),
            downloads_dir: PathBuf::from("downloads"),
            headless: true,
        }
    }
}

fn failure(message: impl Into<String>) -> Value {
    json!({ "success": false, "message": message.into() })
}

pub struct BrowserToolset {
    primitives: Arc<dyn ActionPrimitives>,
    config: ToolsetConfig,
    downloader: Downloader,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BrowserToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserToolset")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BrowserToolset {
    pub fn new(primitives: Arc<dyn ActionPrimitives>, config: ToolsetConfig) -> Self {
        let downloader = Downloader::new(config.downloads_dir.clone());
        Self {
            primitives,
            config,
            downloader,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the HTTP client used for direct downloads.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.downloader = Downloader::with_client(http, self.config.downloads_dir.clone());
        self
    }

    /// Ties every tool execution to `cancel`.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ToolsetConfig {
        &self.config
    }

    fn ctx(&self) -> ExecCtx {
        ExecCtx::new(self.cancel.child_token())
    }

    /// Runs one validated call.
    pub async fn execute(&self, call: ToolCall) -> Value {
        let ctx = self.ctx();
        debug!(
            target: "agent-tools",
            action_id = %ctx.action_id,
            tool = call.name(),
            reasoning = call.reasoning().unwrap_or(""),
            "executing tool"
        );

        match call {
            ToolCall::Click(args) => self.click(&ctx, args).await,
            ToolCall::TypeText(args) => self.type_text(&ctx, args).await,
            ToolCall::Scroll(args) => self.scroll(&ctx, args).await,
            ToolCall::Navigate(args) => self.navigate(&ctx, args).await,
            ToolCall::Wait(args) => self.wait(&ctx, args).await,
            ToolCall::GetPageState(args) => self.page_state(&ctx, args).await,
            ToolCall::NewTab(args) => self.new_tab(&ctx, args).await,
            ToolCall::SwitchTab(args) => self.switch_tab(&ctx, args).await,
            ToolCall::CloseTab(args) => self.close_tab(&ctx, args).await,
            ToolCall::ListTabs(_) => self.list_tabs().await,
            ToolCall::DownloadFile(args) => self.download(&ctx, args).await,
            ToolCall::RequestHumanTakeover(args) if self.config.headless => {
                warn!(target: "agent-tools", reason = %args.reason, "takeover refused in headless mode");
                failure(format!(
                    "human takeover is unavailable in headless mode ({}); \
                     continue the task or call done with success=false",
                    args.reason
                ))
            }
            ToolCall::RequestHumanTakeover(args) => {
                warn!(target: "agent-tools", reason = %args.reason, "human takeover requested");
                json!({
                    "success": true,
                    "message": format!(
                        "Human takeover requested: {}. Please complete the action and confirm.",
                        args.reason
                    ),
                    "completed": false,
                })
            }
            ToolCall::Done(args) => {
                info!(target: "agent-tools", success = args.success, summary = %args.summary, "task finished");
                let mut out = Map::new();
                out.insert("success".into(), Value::Bool(args.success));
                out.insert("summary".into(), Value::String(args.summary));
                if let Some(data) = args.data {
                    out.insert("data".into(), Value::Object(data));
                }
                Value::Object(out)
            }
        }
    }

    async fn pre_action(&self, ctx: &ExecCtx) {
        if !self.config.show_annotations {
            return;
        }
        match self
            .primitives
            .show_annotations(ctx, &self.config.annotation)
            .await
        {
            Ok(count) => debug!(target: "agent-tools", count, "annotations shown"),
            Err(err) => warn!(target: "agent-tools", %err, "failed to show annotations"),
        }
    }

    async fn post_action(&self, ctx: &ExecCtx) {
        if !self.config.show_annotations {
            return;
        }
        if let Err(err) = self.primitives.hide_annotations(ctx).await {
            warn!(target: "agent-tools", %err, "failed to hide annotations");
        }
        if let Err(err) = self.primitives.wait_for_stable(ctx).await {
            debug!(target: "agent-tools", %err, "page did not settle after action");
        }
    }

    /// Base64 JPEG of the active tab, drawn with the overlay when annotations are on.
    async fn capture(&self, ctx: &ExecCtx) -> Option<String> {
        if self.config.show_annotations {
            if let Err(err) = self
                .primitives
                .show_annotations(ctx, &self.config.annotation)
                .await
            {
                warn!(target: "agent-tools", %err, "failed to show annotations for screenshot");
            }
        }

        let shot = self
            .primitives
            .screenshot_for_consumer(ctx, &self.config.screenshot)
            .await;

        if self.config.show_annotations {
            if let Err(err) = self.primitives.hide_annotations(ctx).await {
                warn!(target: "agent-tools", %err, "failed to hide annotations after screenshot");
            }
        }

        match shot {
            Ok(shot) => Some(encode_base64(&shot.data)),
            Err(err) => {
                warn!(target: "agent-tools", %err, "screenshot failed");
                None
            }
        }
    }

    /// Attaches a screenshot to a successful action response in smart mode.
    async fn with_smart_screenshot(&self, ctx: &ExecCtx, mut response: Value) -> Value {
        if self.config.text_only || self.config.screenshot_mode != ScreenshotMode::Smart {
            return response;
        }
        if let Some(shot) = self.capture(ctx).await {
            if let Some(obj) = response.as_object_mut() {
                obj.insert("screenshot".into(), Value::String(shot));
            }
        }
        response
    }

    async fn click(&self, ctx: &ExecCtx, args: ClickArgs) -> Value {
        let (target, message) = match (args.element_index, args.x, args.y) {
            (Some(index), _, _) => (ClickTarget::Index(index), format!("Clicked element {index}")),
            (None, Some(x), Some(y)) => (ClickTarget::Point { x, y }, format!("Clicked at ({x}, {y})")),
            _ => return failure("element_index or both x and y are required"),
        };

        self.pre_action(ctx).await;
        let response = match self.primitives.click(ctx, target).await {
            Ok(_) => {
                let response = json!({ "success": true, "message": message });
                self.with_smart_screenshot(ctx, response).await
            }
            Err(err) => failure(err.to_string()),
        };
        self.post_action(ctx).await;
        response
    }

    async fn type_text(&self, ctx: &ExecCtx, args: TypeTextArgs) -> Value {
        self.pre_action(ctx).await;
        let response = match self
            .primitives
            .type_text(ctx, args.element_index, &args.text)
            .await
        {
            Ok(_) => {
                let response = json!({
                    "success": true,
                    "message": format!("Typed '{}' into element {}", args.text, args.element_index),
                });
                self.with_smart_screenshot(ctx, response).await
            }
            Err(err) => failure(err.to_string()),
        };
        self.post_action(ctx).await;
        response
    }

    async fn scroll(&self, ctx: &ExecCtx, args: ScrollArgs) -> Value {
        let amount = args.amount();
        let delta_y = match args.direction.as_str() {
            "up" => -f64::from(amount),
            "down" => f64::from(amount),
            _ => return failure("Invalid direction. Use: up or down"),
        };
        let direction = args.direction.as_str();

        let target = match (args.element_id, args.auto_detect) {
            (Some(id), _) if id > 0 => ScrollTarget::Element(id),
            (_, Some(true)) => ScrollTarget::AutoDetect,
            _ => ScrollTarget::Page,
        };

        self.pre_action(ctx).await;
        let response = match self.primitives.scroll(ctx, 0.0, delta_y, target).await {
            Ok(outcome) => {
                let (message, element_scrolled) = match (target, outcome) {
                    (ScrollTarget::AutoDetect, ScrollOutcome::Element(id)) => (
                        format!(
                            "Auto-detected modal: Scrolled {direction} by {amount} pixels within element {id}"
                        ),
                        id,
                    ),
                    (ScrollTarget::AutoDetect, ScrollOutcome::Page) => (
                        format!("No modal detected: Scrolled {direction} by {amount} pixels on the page"),
                        0,
                    ),
                    (_, ScrollOutcome::Element(id)) => (
                        format!("Scrolled {direction} by {amount} pixels within element {id}"),
                        id,
                    ),
                    (_, ScrollOutcome::Page) => {
                        (format!("Scrolled {direction} by {amount} pixels"), 0)
                    }
                };
                let response = json!({
                    "success": true,
                    "message": message,
                    "element_scrolled": element_scrolled,
                });
                self.with_smart_screenshot(ctx, response).await
            }
            Err(err) => failure(err.to_string()),
        };
        self.post_action(ctx).await;
        response
    }

    /// No overlay before loading; the old page is about to go away.
    async fn navigate(&self, ctx: &ExecCtx, args: NavigateArgs) -> Value {
        let response = match self.primitives.navigate(ctx, &args.url).await {
            Ok(_) => {
                let response = json!({
                    "success": true,
                    "message": format!("Navigated to {}", args.url),
                    "url": self.primitives.current_url().await,
                    "title": self.primitives.current_title().await,
                });
                self.with_smart_screenshot(ctx, response).await
            }
            Err(err) => failure(err.to_string()),
        };
        self.post_action(ctx).await;
        response
    }

    async fn wait(&self, ctx: &ExecCtx, args: WaitArgs) -> Value {
        match self.primitives.wait_for_stable(ctx).await {
            Ok(()) => json!({
                "success": true,
                "message": format!("Waited for page to stabilize: {}", args.reason),
            }),
            Err(err) => failure(err.to_string()),
        }
    }

    async fn page_state(&self, ctx: &ExecCtx, args: GetPageStateArgs) -> Value {
        let url = self.primitives.current_url().await;
        let title = self.primitives.current_title().await;

        let map = match self.primitives.element_map(ctx).await {
            Ok(map) => map,
            Err(err) => {
                warn!(target: "agent-tools", %err, "get_page_state failed");
                return json!({
                    "success": false,
                    "url": url,
                    "title": title,
                    "element_map": "",
                    "error": format!("Failed to get element map: {err}"),
                });
            }
        };

        let mut out = Map::new();
        out.insert("success".into(), Value::Bool(true));
        out.insert("url".into(), Value::String(url));
        out.insert("title".into(), Value::String(title));
        out.insert(
            "element_map".into(),
            Value::String(map.to_token_string_limited(self.config.max_elements)),
        );
        info!(target: "agent-tools", elements = map.count(), "page state captured");

        let exclude = self.config.text_only || args.exclude_screenshot.unwrap_or(false);
        if !exclude {
            if let Some(shot) = self.capture(ctx).await {
                out.insert("screenshot".into(), Value::String(shot));
            }
        }
        Value::Object(out)
    }

    async fn new_tab(&self, ctx: &ExecCtx, args: NewTabArgs) -> Value {
        self.pre_action(ctx).await;
        let response = match self.primitives.new_tab(ctx, &args.url).await {
            Ok(tab_id) => json!({
                "success": true,
                "message": format!("Opened new tab: {tab_id}"),
                "tab_id": tab_id,
                "url": args.url,
            }),
            Err(err) => failure(err.to_string()),
        };
        self.post_action(ctx).await;
        response
    }

    async fn switch_tab(&self, ctx: &ExecCtx, args: SwitchTabArgs) -> Value {
        self.pre_action(ctx).await;
        let response = match self.primitives.switch_tab(ctx, &args.tab_id).await {
            Ok(()) => json!({
                "success": true,
                "message": format!("Switched to tab: {}", args.tab_id),
                "url": self.primitives.current_url().await,
                "title": self.primitives.current_title().await,
            }),
            Err(err) => failure(err.to_string()),
        };
        self.post_action(ctx).await;
        response
    }

    async fn close_tab(&self, ctx: &ExecCtx, args: CloseTabArgs) -> Value {
        match self.primitives.close_tab(ctx, &args.tab_id).await {
            Ok(()) => json!({
                "success": true,
                "message": format!("Closed tab: {}", args.tab_id),
            }),
            Err(err) => failure(err.to_string()),
        }
    }

    async fn list_tabs(&self) -> Value {
        let tabs: Vec<Value> = self
            .primitives
            .list_tabs()
            .await
            .into_iter()
            .map(|tab| {
                json!({
                    "tab_id": tab.id,
                    "url": tab.url,
                    "title": tab.title,
                    "active": tab.active,
                })
            })
            .collect();
        let active = self.primitives.active_tab_id().await.unwrap_or_default();
        json!({ "success": true, "tabs": tabs, "active_tab": active })
    }

    async fn download(&self, ctx: &ExecCtx, args: DownloadFileArgs) -> Value {
        let use_page_auth = args.use_page_auth.unwrap_or(false);
        info!(target: "agent-tools", url = %args.url, use_page_auth, "downloading file");

        let result = if use_page_auth {
            self.download_in_page(ctx, &args).await
        } else {
            self.downloader
                .fetch_direct(&args.url, args.filename.as_deref())
                .await
        };

        match result {
            Ok(info) => json!({
                "success": true,
                "message": format!("Downloaded: {} ({} bytes)", info.filename, info.size),
                "filename": info.filename,
                "file_path": info.file_path.display().to_string(),
                "size": info.size,
                "mime_type": info.mime_type,
            }),
            Err(err) => {
                warn!(target: "agent-tools", url = %args.url, %err, "download failed");
                failure(err.to_string())
            }
        }
    }

    async fn download_in_page(
        &self,
        ctx: &ExecCtx,
        args: &DownloadFileArgs,
    ) -> Result<super::DownloadInfo, DownloadError> {
        let payload = self
            .primitives
            .evaluate(ctx, &page_fetch_script(&args.url))
            .await
            .map_err(|err| DownloadError::Page(err.to_string()))?;
        let (bytes, mime_type) = decode_page_payload(&payload)?;
        self.downloader
            .save(&args.url, args.filename.as_deref(), &bytes, &mime_type)
            .await
    }
}

#[async_trait]
impl ToolHandler for BrowserToolset {
    fn declarations(&self) -> Vec<ToolDeclaration> {
        declarations()
    }

    async fn call(&self, name: &str, args: Value) -> Value {
        match ToolCall::parse(name, &args) {
            Ok(call) => self.execute(call).await,
            Err(err) => {
                warn!(target: "agent-tools", tool = name, %err, "rejected tool call");
                failure(err.to_string())
            }
        }
    }
}
