//! Adapter registry keeping track of attached pages and their CDP sessions.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::PageId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetContext {
    pub target_id: String,
    pub cdp_session: String,
}

/// Concurrent registry for pages, indexed by page, target and session.
#[derive(Default)]
pub struct Registry {
    pages: DashMap<PageId, TargetContext>,
    targets: DashMap<String, PageId>,
    sessions: DashMap<String, PageId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_page(&self, page: PageId, target_id: String, cdp_session: String) {
        self.targets.insert(target_id.clone(), page);
        self.sessions.insert(cdp_session.clone(), page);
        self.pages.insert(
            page,
            TargetContext {
                target_id,
                cdp_session,
            },
        );
    }

    pub fn remove_page(&self, page: &PageId) -> Option<TargetContext> {
        let (_, ctx) = self.pages.remove(page)?;
        self.targets.remove(&ctx.target_id);
        self.sessions.remove(&ctx.cdp_session);
        Some(ctx)
    }

    pub fn get(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.get(page).map(|entry| entry.value().clone())
    }

    pub fn page_for_target(&self, target_id: &str) -> Option<PageId> {
        self.targets.get(target_id).map(|entry| *entry.value())
    }

    pub fn page_for_session(&self, session: &str) -> Option<PageId> {
        self.sessions.get(session).map(|entry| *entry.value())
    }

    pub fn pages(&self) -> Vec<PageId> {
        self.pages.iter().map(|kv| *kv.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&self) {
        self.pages.clear();
        self.targets.clear();
        self.sessions.clear();
    }
}
