//! Action primitives implementation
//!
//! Index-driven primitives over the active tab:
//! 1. navigate - load a URL, lazily opening the first tab
//! 2. click - click an indexed element or a viewport point
//! 3. type_text - focus an indexed element and insert text
//! 4. scroll - wheel the page, scroll an indexed container, or auto-detect an overlay
//!
//! plus snapshot, screenshot, tab and annotation passthroughs.
//! None of the primitives retry; callers decide what to do with an [`ActionError`].

mod click;
mod navigate;
mod scroll;
mod type_text;

use async_trait::async_trait;
use cdp_adapter::{Cdp, CdpAdapter, MouseEvent, PageId};
use perceiver_structural::{extract_element_map, Element, ElementMap};
use perceiver_visual::{Screenshot, ScreenshotCapture, ScreenshotOptions};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    annotation::{self, AnnotationConfig},
    errors::ActionError,
    highlight::Highlighter,
    tabs::TabRegistry,
    types::{
        ActionReport, ClickTarget, ExecCtx, PostSignals, ScrollOutcome, ScrollTarget, TabInfo,
        Viewport,
    },
    waiting::{StabilityWindow, WaitStrategy},
};

/// Tunables shared by every primitive.
#[derive(Debug, Clone, Copy)]
pub struct PrimitivesConfig {
    pub viewport: Viewport,
    pub highlighter: Highlighter,
    pub navigation_window: StabilityWindow,
    pub post_type_window: StabilityWindow,
}

impl Default for PrimitivesConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            highlighter: Highlighter::default(),
            navigation_window: StabilityWindow::navigation(),
            post_type_window: StabilityWindow::post_type(),
        }
    }
}

/// Action primitives trait
///
/// Every primitive checks its [`ExecCtx`] for cancellation before touching the page
/// and stops at the next suspension point once the context is cancelled.
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Navigate the active tab, creating the first tab if none exists
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError>;

    async fn click(&self, ctx: &ExecCtx, target: ClickTarget) -> Result<ActionReport, ActionError>;

    /// Click the element to focus it, then insert `text` in one step
    async fn type_text(
        &self,
        ctx: &ExecCtx,
        index: u32,
        text: &str,
    ) -> Result<ActionReport, ActionError>;

    async fn scroll(
        &self,
        ctx: &ExecCtx,
        delta_x: f64,
        delta_y: f64,
        target: ScrollTarget,
    ) -> Result<ScrollOutcome, ActionError>;

    /// Scroll until the indexed element sits in the middle of the viewport
    async fn scroll_to_element(&self, ctx: &ExecCtx, index: u32)
        -> Result<ScrollOutcome, ActionError>;

    /// Best-effort wait for the DOM to settle on the active tab
    async fn wait_for_stable(&self, ctx: &ExecCtx) -> Result<(), ActionError>;

    /// Fresh snapshot of the active tab
    async fn element_map(&self, ctx: &ExecCtx) -> Result<ElementMap, ActionError>;

    async fn find_scrollable_modal(&self, ctx: &ExecCtx) -> Result<Option<u32>, ActionError>;

    /// Raw PNG of the active viewport
    async fn screenshot(&self, ctx: &ExecCtx) -> Result<Vec<u8>, ActionError>;

    async fn screenshot_for_consumer(
        &self,
        ctx: &ExecCtx,
        options: &ScreenshotOptions,
    ) -> Result<Screenshot, ActionError>;

    /// Empty when there is no active tab or the target cannot be queried
    async fn current_url(&self) -> String;

    async fn current_title(&self) -> String;

    async fn new_tab(&self, ctx: &ExecCtx, url: &str) -> Result<String, ActionError>;

    async fn switch_tab(&self, ctx: &ExecCtx, tab_id: &str) -> Result<(), ActionError>;

    async fn close_tab(&self, ctx: &ExecCtx, tab_id: &str) -> Result<(), ActionError>;

    async fn list_tabs(&self) -> Vec<TabInfo>;

    async fn active_tab_id(&self) -> Option<String>;

    /// Draws the index overlay; returns the number of annotated elements
    async fn show_annotations(
        &self,
        ctx: &ExecCtx,
        config: &AnnotationConfig,
    ) -> Result<usize, ActionError>;

    async fn hide_annotations(&self, ctx: &ExecCtx) -> Result<(), ActionError>;

    /// Hides the overlay if the page shows one, otherwise draws it; returns whether it
    /// is shown afterwards
    async fn toggle_annotations(
        &self,
        ctx: &ExecCtx,
        config: &AnnotationConfig,
    ) -> Result<bool, ActionError>;

    /// Evaluates `expression` on the active tab, awaiting promises
    async fn evaluate(&self, ctx: &ExecCtx, expression: &str) -> Result<Value, ActionError>;
}

/// Default implementation of action primitives
pub struct DefaultActionPrimitives {
    /// CDP adapter for browser communication
    adapter: Arc<CdpAdapter>,

    tabs: Arc<TabRegistry>,

    /// Wait strategy for built-in waiting
    wait_strategy: Arc<dyn WaitStrategy>,

    config: PrimitivesConfig,

    /// Tracks adapter start state
    adapter_ready: OnceCell<()>,

    /// Keeps `tabs` in sync with pages the browser closes on its own
    tab_follower: Mutex<Option<JoinHandle<()>>>,
}

impl DefaultActionPrimitives {
    pub fn new(
        adapter: Arc<CdpAdapter>,
        wait_strategy: Arc<dyn WaitStrategy>,
        config: PrimitivesConfig,
    ) -> Self {
        let cdp: Arc<dyn Cdp> = adapter.clone();
        let tabs = Arc::new(TabRegistry::new(cdp, config.viewport, adapter.deadline()));
        Self {
            adapter,
            tabs,
            wait_strategy,
            config,
            adapter_ready: OnceCell::new(),
            tab_follower: Mutex::new(None),
        }
    }

    /// Get reference to CDP adapter
    pub fn adapter(&self) -> &Arc<CdpAdapter> {
        &self.adapter
    }

    pub fn tabs(&self) -> &TabRegistry {
        &self.tabs
    }

    pub fn config(&self) -> &PrimitivesConfig {
        &self.config
    }

    pub(crate) fn cdp(&self) -> &dyn Cdp {
        self.adapter.as_ref()
    }

    pub(crate) fn highlighter(&self) -> &Highlighter {
        &self.config.highlighter
    }

    /// Ensure the underlying adapter is started and its events reach the tab registry
    pub async fn ensure_adapter_ready(&self) -> Result<(), ActionError> {
        self.adapter_ready
            .get_or_try_init(|| async {
                let events = self.adapter.subscribe();
                Arc::clone(&self.adapter).start().await.map_err(|err| {
                    ActionError::Internal(format!("failed to start CDP adapter: {}", err))
                })?;
                let follower = tokio::spawn(TabRegistry::follow(Arc::clone(&self.tabs), events));
                *self.tab_follower.lock().await = Some(follower);
                Ok::<(), ActionError>(())
            })
            .await
            .map(|_| ())
    }

    pub(crate) async fn active_page(&self) -> Result<PageId, ActionError> {
        self.tabs.active_page().await.ok_or(ActionError::NoActivePage)
    }

    /// Re-snapshots the page and resolves `index` against it.
    pub(crate) async fn locate(&self, page: PageId, index: u32) -> Result<Element, ActionError> {
        let map = extract_element_map(self.cdp(), page).await?;
        map.by_index(index)
            .cloned()
            .ok_or(ActionError::ElementNotFound(index))
    }

    /// Stability wait that never fails the action; only cancellation is surfaced.
    pub(crate) async fn settle(
        &self,
        ctx: &ExecCtx,
        page: PageId,
        window: StabilityWindow,
    ) -> Result<(), ActionError> {
        let outcome = ctx
            .run(self.wait_strategy.wait_stable(self.cdp(), page, window))
            .await;
        match outcome {
            Ok(_) => Ok(()),
            Err(err @ ActionError::Interrupted(_)) => Err(err),
            Err(err) => {
                warn!(target: "action-primitives", action_id = %ctx.action_id, %err, "stability wait failed");
                Ok(())
            }
        }
    }

    /// Move, press, release with the left button at viewport coordinates.
    pub(crate) async fn press_at(&self, page: PageId, x: f64, y: f64) -> Result<(), ActionError> {
        for event in [
            MouseEvent::moved(x, y),
            MouseEvent::pressed(x, y),
            MouseEvent::released(x, y),
        ] {
            self.cdp().dispatch_mouse_event(page, event).await?;
        }
        Ok(())
    }

    pub(crate) fn log_highlight_failure(
        &self,
        ctx: &ExecCtx,
        result: Result<(), ActionError>,
    ) {
        if let Err(err) = result {
            warn!(target: "action-primitives", action_id = %ctx.action_id, %err, "highlight failed");
        }
    }

    pub(crate) async fn clear_highlights(&self, ctx: &ExecCtx, page: PageId) {
        let result = self.highlighter().remove_highlights(self.cdp(), page).await;
        self.log_highlight_failure(ctx, result);
    }

    /// Capture URL/title signals for observability, logging errors but not failing actions.
    pub(crate) async fn capture_post_signals(&self, page: PageId) -> PostSignals {
        match self.cdp().page_info(page).await {
            Ok(info) => PostSignals {
                url_after: Some(info.url),
                title_after: Some(info.title),
            },
            Err(err) => {
                debug!(target: "action-primitives", %err, "failed to capture page signals");
                PostSignals::default()
            }
        }
    }

    /// Closes every tab; used on shutdown.
    pub async fn close(&self) {
        if let Some(follower) = self.tab_follower.lock().await.take() {
            follower.abort();
        }
        self.tabs.close_all().await;
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn navigate(&self, ctx: &ExecCtx, url: &str) -> Result<ActionReport, ActionError> {
        navigate::execute_navigate(self, ctx, url).await
    }

    async fn click(&self, ctx: &ExecCtx, target: ClickTarget) -> Result<ActionReport, ActionError> {
        click::execute_click(self, ctx, target).await
    }

    async fn type_text(
        &self,
        ctx: &ExecCtx,
        index: u32,
        text: &str,
    ) -> Result<ActionReport, ActionError> {
        type_text::execute_type_text(self, ctx, index, text).await
    }

    async fn scroll(
        &self,
        ctx: &ExecCtx,
        delta_x: f64,
        delta_y: f64,
        target: ScrollTarget,
    ) -> Result<ScrollOutcome, ActionError> {
        scroll::execute_scroll(self, ctx, delta_x, delta_y, target).await
    }

    async fn scroll_to_element(
        &self,
        ctx: &ExecCtx,
        index: u32,
    ) -> Result<ScrollOutcome, ActionError> {
        scroll::execute_scroll_to_element(self, ctx, index).await
    }

    async fn wait_for_stable(&self, ctx: &ExecCtx) -> Result<(), ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        self.settle(ctx, page, self.config.navigation_window).await
    }

    async fn element_map(&self, ctx: &ExecCtx) -> Result<ElementMap, ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        ctx.run(async {
            extract_element_map(self.cdp(), page)
                .await
                .map_err(ActionError::from)
        })
        .await
    }

    async fn find_scrollable_modal(&self, ctx: &ExecCtx) -> Result<Option<u32>, ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        Ok(perceiver_structural::find_scrollable_modal(self.cdp(), page).await)
    }

    async fn screenshot(&self, ctx: &ExecCtx) -> Result<Vec<u8>, ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        Ok(ScreenshotCapture::capture(self.cdp(), page).await?)
    }

    async fn screenshot_for_consumer(
        &self,
        ctx: &ExecCtx,
        options: &ScreenshotOptions,
    ) -> Result<Screenshot, ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        Ok(ScreenshotCapture::capture_for_consumer(self.cdp(), page, options).await?)
    }

    async fn current_url(&self) -> String {
        match self.tabs.active_page().await {
            Some(page) => self
                .cdp()
                .page_info(page)
                .await
                .map(|info| info.url)
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    async fn current_title(&self) -> String {
        match self.tabs.active_page().await {
            Some(page) => self
                .cdp()
                .page_info(page)
                .await
                .map(|info| info.title)
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    async fn new_tab(&self, ctx: &ExecCtx, url: &str) -> Result<String, ActionError> {
        navigate::execute_new_tab(self, ctx, url).await
    }

    async fn switch_tab(&self, ctx: &ExecCtx, tab_id: &str) -> Result<(), ActionError> {
        ctx.check()?;
        self.tabs.switch_tab(tab_id).await?;
        info!(target: "action-primitives", action_id = %ctx.action_id, tab = %tab_id, "switched tab");
        Ok(())
    }

    async fn close_tab(&self, ctx: &ExecCtx, tab_id: &str) -> Result<(), ActionError> {
        ctx.check()?;
        self.tabs.close_tab(tab_id).await
    }

    async fn list_tabs(&self) -> Vec<TabInfo> {
        self.tabs.list_tabs().await
    }

    async fn active_tab_id(&self) -> Option<String> {
        self.tabs.active_tab_id().await
    }

    async fn show_annotations(
        &self,
        ctx: &ExecCtx,
        config: &AnnotationConfig,
    ) -> Result<usize, ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        let map = extract_element_map(self.cdp(), page).await?;
        let drawn = self
            .cdp()
            .evaluate_script(page, &annotation::show_script(&map, config))
            .await?;
        Ok(drawn.as_u64().unwrap_or_default() as usize)
    }

    async fn hide_annotations(&self, ctx: &ExecCtx) -> Result<(), ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        self.cdp()
            .evaluate_script(page, &annotation::hide_script())
            .await?;
        Ok(())
    }

    async fn toggle_annotations(
        &self,
        ctx: &ExecCtx,
        config: &AnnotationConfig,
    ) -> Result<bool, ActionError> {
        ctx.check()?;
        let page = self.active_page().await?;
        let present = self
            .cdp()
            .evaluate_script(page, &annotation::present_script())
            .await?;
        if present == Value::Bool(true) {
            self.hide_annotations(ctx).await?;
            Ok(false)
        } else {
            self.show_annotations(ctx, config).await?;
            Ok(true)
        }
    }

    async fn evaluate(&self, ctx: &ExecCtx, expression: &str) -> Result<Value, ActionError> {
        let page = self.active_page().await?;
        ctx.run(async {
            self.cdp()
                .evaluate_script(page, expression)
                .await
                .map_err(ActionError::from)
        })
        .await
    }
}
