//! Tab bookkeeping over CDP page targets.
//!
//! The registry exclusively owns page handles. Exactly one tab is active while any tab
//! exists; the last tab can never be closed through [`TabRegistry::close_tab`].
//! Pages that go away on the browser side are dropped through [`TabRegistry::follow`].

use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{BrowserEvent, Cdp, DeviceMetrics, PageId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::ActionError;
use crate::types::{TabInfo, Viewport};

const BLANK_URL: &str = "about:blank";
const TAB_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
struct Tab {
    id: String,
    page: PageId,
}

#[derive(Debug, Default)]
struct TabState {
    /// Creation order.
    tabs: Vec<Tab>,
    active: Option<String>,
}

impl TabState {
    fn find(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    fn position_of_page(&self, page: PageId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.page == page)
    }

    /// Makes the newest remaining tab active; returns its page when one was promoted.
    fn promote_last(&mut self) -> Option<(String, PageId)> {
        let promoted = self.tabs.last().map(|tab| (tab.id.clone(), tab.page));
        self.active = promoted.as_ref().map(|(id, _)| id.clone());
        promoted
    }

    fn fresh_id(&self) -> String {
        loop {
            let candidate: String = uuid::Uuid::new_v4()
                .to_string()
                .chars()
                .take(TAB_ID_LEN)
                .collect();
            if self.find(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

pub struct TabRegistry {
    cdp: Arc<dyn Cdp>,
    viewport: Viewport,
    deadline: Duration,
    state: RwLock<TabState>,
}

impl TabRegistry {
    pub fn new(cdp: Arc<dyn Cdp>, viewport: Viewport, deadline: Duration) -> Self {
        Self {
            cdp,
            viewport,
            deadline,
            state: RwLock::new(TabState::default()),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Opens a blank tab, applies the viewport, then loads `url` and activates the tab.
    /// A tab that fails any of these steps is closed again and never registered.
    pub async fn create_tab(&self, url: &str) -> Result<String, ActionError> {
        let mut state = self.state.write().await;

        let page = self.cdp.create_page(BLANK_URL).await?;
        if let Err(err) = self.prepare_page(page, url).await {
            if let Err(close_err) = self.cdp.close_page(page).await {
                warn!(target: "action-primitives", %page, %close_err, "failed to close half-open tab");
            }
            return Err(err);
        }

        let id = state.fresh_id();
        state.tabs.push(Tab {
            id: id.clone(),
            page,
        });
        state.active = Some(id.clone());
        info!(target: "action-primitives", tab = %id, %page, "tab created");
        Ok(id)
    }

    async fn prepare_page(&self, page: PageId, url: &str) -> Result<(), ActionError> {
        self.cdp
            .set_device_metrics(
                page,
                DeviceMetrics::desktop(self.viewport.width, self.viewport.height),
            )
            .await?;
        if !url.is_empty() && url != BLANK_URL {
            self.cdp.navigate(page, url, self.deadline).await?;
        }
        Ok(())
    }

    pub async fn switch_tab(&self, id: &str) -> Result<(), ActionError> {
        let mut state = self.state.write().await;
        let tab = state
            .find(id)
            .cloned()
            .ok_or_else(|| ActionError::TabNotFound(id.to_string()))?;
        self.cdp.activate_page(tab.page).await?;
        state.active = Some(tab.id);
        debug!(target: "action-primitives", tab = %id, "tab activated");
        Ok(())
    }

    pub async fn close_tab(&self, id: &str) -> Result<(), ActionError> {
        let mut state = self.state.write().await;
        let position = state
            .tabs
            .iter()
            .position(|tab| tab.id == id)
            .ok_or_else(|| ActionError::TabNotFound(id.to_string()))?;
        if state.tabs.len() <= 1 {
            return Err(ActionError::LastTab);
        }

        let page = state.tabs[position].page;
        self.cdp.close_page(page).await?;
        state.tabs.remove(position);
        info!(target: "action-primitives", tab = %id, "tab closed");

        if state.active.as_deref() == Some(id) {
            if let Some((promoted, page)) = state.promote_last() {
                self.activate_promoted(&promoted, page).await;
            }
        }
        Ok(())
    }

    async fn activate_promoted(&self, id: &str, page: PageId) {
        if let Err(err) = self.cdp.activate_page(page).await {
            warn!(target: "action-primitives", tab = %id, %err, "failed to activate promoted tab");
        }
    }

    /// Applies a browser-side change. Closed or crashed pages leave the registry, which
    /// may leave it empty; a crashed page is also closed.
    pub async fn handle_event(&self, event: &BrowserEvent) {
        let mut state = self.state.write().await;
        let page = match event {
            BrowserEvent::PageClosed { page } | BrowserEvent::PageCrashed { page } => *page,
            BrowserEvent::Disconnected { reason } => {
                if !state.tabs.is_empty() {
                    warn!(target: "action-primitives", %reason, tabs = state.tabs.len(), "browser gone, dropping tabs");
                }
                state.tabs.clear();
                state.active = None;
                return;
            }
        };
        let Some(position) = state.position_of_page(page) else {
            return;
        };

        let tab = state.tabs.remove(position);
        if matches!(event, BrowserEvent::PageCrashed { .. }) {
            warn!(target: "action-primitives", tab = %tab.id, "tab crashed");
            if let Err(err) = self.cdp.close_page(page).await {
                debug!(target: "action-primitives", tab = %tab.id, %err, "crashed tab already gone");
            }
        } else {
            info!(target: "action-primitives", tab = %tab.id, "tab closed by browser");
        }

        if state.active.as_deref() == Some(tab.id.as_str()) {
            if let Some((promoted, page)) = state.promote_last() {
                self.activate_promoted(&promoted, page).await;
            }
        }
    }

    /// Feeds adapter events into [`TabRegistry::handle_event`] until the bus closes.
    pub async fn follow(self: Arc<Self>, mut events: broadcast::Receiver<BrowserEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "action-primitives", skipped, "missed browser events");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Live url/title per tab. Tabs whose target can no longer be queried are skipped.
    pub async fn list_tabs(&self) -> Vec<TabInfo> {
        let state = self.state.read().await;
        let mut tabs = Vec::with_capacity(state.tabs.len());
        for tab in &state.tabs {
            match self.cdp.page_info(tab.page).await {
                Ok(info) => tabs.push(TabInfo {
                    id: tab.id.clone(),
                    url: info.url,
                    title: info.title,
                    active: state.active.as_deref() == Some(tab.id.as_str()),
                }),
                Err(err) => {
                    debug!(target: "action-primitives", tab = %tab.id, %err, "skipping unreachable tab")
                }
            }
        }
        tabs
    }

    pub async fn active_page(&self) -> Option<PageId> {
        let state = self.state.read().await;
        let active = state.active.as_deref()?;
        state.find(active).map(|tab| tab.page)
    }

    pub async fn active_tab_id(&self) -> Option<String> {
        self.state.read().await.active.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.tabs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.tabs.is_empty()
    }

    /// Closes every tab, including the last one.
    pub async fn close_all(&self) {
        let mut state = self.state.write().await;
        for tab in state.tabs.drain(..) {
            if let Err(err) = self.cdp.close_page(tab.page).await {
                warn!(target: "action-primitives", tab = %tab.id, %err, "failed to close tab");
            }
        }
        state.active = None;
    }
}
