//! Click primitive - click an indexed element or a viewport point

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ClickTarget, ExecCtx},
};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute click primitive
///
/// Steps:
/// 1. Check context and resolve the active tab
/// 2. For an index, re-snapshot the page and take the element's bbox centre
/// 3. Highlight, then dispatch move/press/release
/// 4. Remove highlights and capture post-signals
pub async fn execute_click(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    target: ClickTarget,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        click_target = ?target,
        "Executing click primitive"
    );

    ctx.check()?;
    let page = primitives.active_page().await?;
    let cdp = primitives.cdp();
    let highlighter = primitives.highlighter();

    let result = ctx
        .run(async {
            let (x, y) = match target {
                ClickTarget::Index(index) => {
                    let element = primitives.locate(page, index).await?;
                    let label = format!("click [{index}]");
                    primitives.log_highlight_failure(
                        ctx,
                        highlighter
                            .highlight_element(cdp, page, &element.bounding_box, &label)
                            .await,
                    );
                    element.bounding_box.center()
                }
                ClickTarget::Point { x, y } => {
                    let label = format!("click ({},{})", x as i64, y as i64);
                    primitives.log_highlight_failure(
                        ctx,
                        highlighter.highlight_point(cdp, page, x, y, &label).await,
                    );
                    (x, y)
                }
            };
            debug!(target: "action-primitives", x, y, "dispatching mouse click");
            primitives.press_at(page, x, y).await
        })
        .await;
    primitives.clear_highlights(ctx, page).await;
    result?;

    let post_signals = primitives.capture_post_signals(page).await;
    let latency_ms = start_instant.elapsed().as_millis() as u64;
    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        latency_ms = latency_ms,
        "Click completed successfully"
    );
    Ok(ActionReport::success(started_at, latency_ms).with_signals(post_signals))
}

#[cfg(test)]
mod tests {
    use crate::primitives::ActionPrimitives;
    use crate::test_support::{serve_elements, with_page};
    use crate::types::{ClickTarget, ExecCtx};
    use crate::ActionError;

    #[tokio::test]
    async fn click_by_index_hits_bbox_centre() {
        let h = with_page("https://example.com/").await;
        serve_elements(&h.transport).await;
        h.transport.clear_commands().await;

        let report = h
            .primitives
            .click(&ExecCtx::detached(), ClickTarget::Index(1))
            .await
            .expect("click");
        assert!(report.ok);

        let mouse = h.transport.commands_for("Input.dispatchMouseEvent").await;
        let kinds: Vec<&str> = mouse
            .iter()
            .map(|cmd| cmd.params["type"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(kinds, vec!["mouseMoved", "mousePressed", "mouseReleased"]);
        // button 1 box: x=10 y=60 w=80 h=30
        assert_eq!(mouse[1].params["x"], 50.0);
        assert_eq!(mouse[1].params["y"], 75.0);
        assert_eq!(mouse[1].params["button"], "left");
        assert_eq!(mouse[1].params["clickCount"], 1);
        assert_eq!(mouse[0].params["clickCount"], 0);
    }

    #[tokio::test]
    async fn unknown_index_dispatches_nothing() {
        let h = with_page("https://example.com/").await;
        serve_elements(&h.transport).await;

        let err = h
            .primitives
            .click(&ExecCtx::detached(), ClickTarget::Index(42))
            .await
            .expect_err("missing element");
        assert!(matches!(err, ActionError::ElementNotFound(42)));
        assert!(h
            .transport
            .commands_for("Input.dispatchMouseEvent")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn click_point_uses_coordinates_verbatim() {
        let h = with_page("https://example.com/").await;
        h.primitives
            .click(&ExecCtx::detached(), ClickTarget::Point { x: 12.5, y: 300.0 })
            .await
            .expect("click");
        let mouse = h.transport.commands_for("Input.dispatchMouseEvent").await;
        assert_eq!(mouse.len(), 3);
        assert_eq!(mouse[2].params["x"], 12.5);
        assert_eq!(mouse[2].params["y"], 300.0);
    }

    #[tokio::test]
    async fn cancelled_context_is_interrupted() {
        let h = with_page("https://example.com/").await;
        let ctx = ExecCtx::detached();
        ctx.cancel_token.cancel();
        let err = h
            .primitives
            .click(&ctx, ClickTarget::Index(0))
            .await
            .expect_err("cancelled");
        assert!(matches!(err, ActionError::Interrupted(_)));
    }

    #[tokio::test]
    async fn click_without_tab_fails() {
        let h = crate::test_support::harness().await;
        let err = h
            .primitives
            .click(&ExecCtx::detached(), ClickTarget::Point { x: 1.0, y: 1.0 })
            .await
            .expect_err("no page");
        assert!(matches!(err, ActionError::NoActivePage));
    }
}
