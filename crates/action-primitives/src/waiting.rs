//! Built-in DOM stability waiting for action primitives

use crate::errors::ActionError;
use async_trait::async_trait;
use cdp_adapter::{Cdp, PageId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Grace added on the Rust side on top of the in-page timeout.
const EVALUATION_GRACE: Duration = Duration::from_millis(500);

/// Quiet period without DOM mutations, bounded by an overall timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityWindow {
    #[serde(with = "millis")]
    pub window: Duration,
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl StabilityWindow {
    pub const fn new(window: Duration, timeout: Duration) -> Self {
        Self { window, timeout }
    }

    /// After navigation and new tabs.
    pub const fn navigation() -> Self {
        Self::new(Duration::from_millis(300), Duration::from_secs(5))
    }

    /// Between focusing an input and inserting text.
    pub const fn post_type() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(2))
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Promise resolving `true` once `window` ms pass without mutations, or `false` at `timeout`.
pub fn stability_script(window: StabilityWindow) -> String {
    format!(
        r#"new Promise((resolve) => {{
  const quiet = {window};
  const limit = {timeout};
  let timer = null;
  let cap = null;
  let observer = null;
  const finish = (stable) => {{
    if (observer) observer.disconnect();
    clearTimeout(timer);
    clearTimeout(cap);
    resolve(stable);
  }};
  observer = new MutationObserver(() => {{
    clearTimeout(timer);
    timer = setTimeout(() => finish(true), quiet);
  }});
  observer.observe(document.documentElement || document, {{ childList: true, subtree: true, attributes: true, characterData: true }});
  timer = setTimeout(() => finish(true), quiet);
  cap = setTimeout(() => finish(false), limit);
}})"#,
        window = window.window.as_millis(),
        timeout = window.timeout.as_millis(),
    )
}

/// Waiting strategy trait
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Waits until the page is quiet. Returns whether the quiet period was observed
    /// before the timeout.
    async fn wait_stable(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        window: StabilityWindow,
    ) -> Result<bool, ActionError>;
}

/// MutationObserver-based stability wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultWaitStrategy;

#[async_trait]
impl WaitStrategy for DefaultWaitStrategy {
    async fn wait_stable(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        window: StabilityWindow,
    ) -> Result<bool, ActionError> {
        let script = stability_script(window);
        match tokio::time::timeout(
            window.timeout + EVALUATION_GRACE,
            cdp.evaluate_script(page, &script),
        )
        .await
        {
            Ok(Ok(value)) => {
                let stable = value.as_bool().unwrap_or(true);
                debug!(%page, stable, window_ms = window.window.as_millis() as u64, "stability wait finished");
                Ok(stable)
            }
            Ok(Err(err)) => Err(ActionError::from(err)),
            Err(_) => {
                debug!(%page, "stability wait capped on the client side");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows() {
        let nav = StabilityWindow::navigation();
        assert_eq!(nav.window, Duration::from_millis(300));
        assert_eq!(nav.timeout, Duration::from_secs(5));
        let typed = StabilityWindow::post_type();
        assert_eq!(typed.window, Duration::from_millis(200));
        assert_eq!(typed.timeout, Duration::from_secs(2));
    }

    #[test]
    fn script_embeds_window_and_timeout() {
        let script = stability_script(StabilityWindow::post_type());
        assert!(script.contains("const quiet = 200;"));
        assert!(script.contains("const limit = 2000;"));
        assert!(script.contains("MutationObserver"));
    }

    #[test]
    fn window_round_trips_as_millis() {
        let window: StabilityWindow =
            serde_json::from_value(serde_json::json!({ "window": 150, "timeout": 900 })).unwrap();
        assert_eq!(window.window, Duration::from_millis(150));
        assert_eq!(
            serde_json::to_value(window).unwrap(),
            serde_json::json!({ "window": 150, "timeout": 900 })
        );
    }
}
