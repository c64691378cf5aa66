//! Scroll primitive - wheel the page or scroll inside an indexed container

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ExecCtx, ScrollDirection, ScrollOutcome, ScrollTarget},
};
use cdp_adapter::{Cdp, MouseEvent, PageId};
use perceiver_structural::{extract_element_map, find_scrollable_modal, index_selector};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Execute scroll primitive
///
/// `ScrollTarget::AutoDetect` re-snapshots the page so the overlay probe sees current
/// indices, then scrolls the detected container or falls back to the page.
pub async fn execute_scroll(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    delta_x: f64,
    delta_y: f64,
    target: ScrollTarget,
) -> Result<ScrollOutcome, ActionError> {
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        scroll_target = ?target,
        delta_x,
        delta_y,
        "Executing scroll primitive"
    );

    ctx.check()?;
    let page = primitives.active_page().await?;

    let outcome = ctx
        .run(async {
            match target {
                ScrollTarget::Page => scroll_page(primitives, ctx, page, delta_x, delta_y).await,
                ScrollTarget::Element(index) => {
                    let element = primitives.locate(page, index).await?;
                    scroll_in_element(primitives, page, element.index, delta_x, delta_y).await
                }
                ScrollTarget::AutoDetect => match detect_overlay(primitives, page).await {
                    Some(index) => {
                        debug!(target: "action-primitives", index, "scrolling detected overlay");
                        scroll_in_element(primitives, page, index, delta_x, delta_y).await
                    }
                    None => scroll_page(primitives, ctx, page, delta_x, delta_y).await,
                },
            }
        })
        .await?;

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        outcome = ?outcome,
        "Scroll completed successfully"
    );
    Ok(outcome)
}

async fn detect_overlay(primitives: &DefaultActionPrimitives, page: PageId) -> Option<u32> {
    if let Err(err) = extract_element_map(primitives.cdp(), page).await {
        warn!(target: "action-primitives", %err, "snapshot before overlay detection failed");
        return None;
    }
    find_scrollable_modal(primitives.cdp(), page).await
}

/// Mouse wheel at the viewport centre.
async fn scroll_page(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    page: PageId,
    delta_x: f64,
    delta_y: f64,
) -> Result<ScrollOutcome, ActionError> {
    let (x, y) = primitives.config().viewport.center();
    primitives.log_highlight_failure(
        ctx,
        primitives
            .highlighter()
            .highlight_scroll(
                primitives.cdp(),
                page,
                x,
                y,
                ScrollDirection::from_delta(delta_x, delta_y),
            )
            .await,
    );

    let result = primitives
        .cdp()
        .dispatch_mouse_event(page, MouseEvent::wheel(x, y, delta_x, delta_y))
        .await;
    primitives.clear_highlights(ctx, page).await;
    result?;
    Ok(ScrollOutcome::Page)
}

pub fn element_scroll_script(index: u32, delta_x: f64, delta_y: f64) -> String {
    format!(
        "(() => {{\n  const el = document.querySelector({selector});\n  if (!el) return false;\n  el.scrollBy({{ top: {delta_y}, left: {delta_x}, behavior: 'smooth' }});\n  return true;\n}})()",
        selector = Value::from(index_selector(index)),
    )
}

async fn scroll_in_element(
    primitives: &DefaultActionPrimitives,
    page: PageId,
    index: u32,
    delta_x: f64,
    delta_y: f64,
) -> Result<ScrollOutcome, ActionError> {
    let scrolled = primitives
        .cdp()
        .evaluate_script(page, &element_scroll_script(index, delta_x, delta_y))
        .await?;
    if scrolled == Value::Bool(false) {
        return Err(ActionError::ElementNotFound(index));
    }
    Ok(ScrollOutcome::Element(index))
}

/// Offset kept above an element when falling back to a wheel scroll.
const FALLBACK_TOP_MARGIN: f64 = 300.0;

pub fn scroll_into_view_script(index: u32) -> String {
    format!(
        "(() => {{\n  const el = document.querySelector({selector});\n  if (!el) return false;\n  el.scrollIntoView({{ behavior: 'smooth', block: 'center' }});\n  return true;\n}})()",
        selector = Value::from(index_selector(index)),
    )
}

/// Centres an indexed element in the viewport.
///
/// If the page refuses the script (or lost the index attribute), the page is wheeled by
/// the element's distance from the top instead and `ScrollOutcome::Page` is returned.
pub async fn execute_scroll_to_element(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    index: u32,
) -> Result<ScrollOutcome, ActionError> {
    info!(target: "action-primitives", action_id = %ctx.action_id, index, "Scrolling element into view");
    ctx.check()?;
    let page = primitives.active_page().await?;

    ctx.run(async {
        let element = primitives.locate(page, index).await?;
        let scripted = primitives
            .cdp()
            .evaluate_script(page, &scroll_into_view_script(element.index))
            .await;
        match scripted {
            Ok(Value::Bool(true)) => return Ok(ScrollOutcome::Element(element.index)),
            Ok(_) => debug!(target: "action-primitives", index, "element left the page, wheeling instead"),
            Err(err) => debug!(target: "action-primitives", index, %err, "scrollIntoView failed, wheeling instead"),
        }

        let (x, y) = primitives.config().viewport.center();
        let delta_y = element.bounding_box.y - FALLBACK_TOP_MARGIN;
        primitives
            .cdp()
            .dispatch_mouse_event(page, MouseEvent::wheel(x, y, 0.0, delta_y))
            .await?;
        Ok(ScrollOutcome::Page)
    })
    .await
}
