//! Navigate primitive - load a URL in the active tab or a new one

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx},
};
use cdp_adapter::Cdp;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute navigate primitive
///
/// The first navigation of a session opens the first tab. Afterwards the active tab
/// is navigated in place. Either way the page must reach `readyState == "complete"`
/// within the adapter deadline, then the navigation stability window is applied.
pub async fn execute_navigate(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        url = %url,
        "Executing navigate primitive"
    );

    if url.is_empty() {
        return Err(ActionError::Navigation("URL cannot be empty".to_string()));
    }
    ctx.check()?;
    primitives.ensure_adapter_ready().await?;

    let page = ctx
        .run(async {
            match primitives.tabs().active_page().await {
                Some(page) => {
                    debug!(target: "action-primitives", %page, "navigating active tab");
                    primitives
                        .cdp()
                        .navigate(page, url, primitives.adapter().deadline())
                        .await?;
                    Ok(page)
                }
                None => {
                    debug!(target: "action-primitives", "opening first tab");
                    primitives.tabs().create_tab(url).await?;
                    primitives.active_page().await
                }
            }
        })
        .await?;

    primitives
        .settle(ctx, page, primitives.config().navigation_window)
        .await?;

    let post_signals = primitives.capture_post_signals(page).await;
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        url_after = ?post_signals.url_after,
        "Navigate completed successfully"
    );
    Ok(ActionReport::success(started_at, latency_ms).with_signals(post_signals))
}

/// Opens a tab on `url` (blank when empty), makes it active and waits for it to settle.
pub async fn execute_new_tab(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    url: &str,
) -> Result<String, ActionError> {
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        url = %url,
        "Opening new tab"
    );
    ctx.check()?;
    primitives.ensure_adapter_ready().await?;

    let tab_id = ctx.run(primitives.tabs().create_tab(url)).await?;
    let page = primitives.active_page().await?;
    primitives
        .settle(ctx, page, primitives.config().navigation_window)
        .await?;
    Ok(tab_id)
}
