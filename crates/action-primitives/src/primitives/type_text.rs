//! Type text primitive - focus an indexed element and insert text

use crate::{
    errors::ActionError,
    primitives::DefaultActionPrimitives,
    types::{ActionReport, ExecCtx},
};
use cdp_adapter::Cdp;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};

/// Execute type_text primitive
///
/// Steps:
/// 1. Check context and resolve the element against a fresh snapshot
/// 2. Show the typing cue and click the element centre to focus it
/// 3. Wait for the post-type stability window
/// 4. Insert the whole text with a single `Input.insertText`
pub async fn execute_type_text(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    index: u32,
    text: &str,
) -> Result<ActionReport, ActionError> {
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        target: "action-primitives",
        action_id = %ctx.action_id,
        index,
        text_length = text.len(),
        "Executing type_text primitive"
    );

    ctx.check()?;
    let page = primitives.active_page().await?;
    let cdp = primitives.cdp();

    let result = ctx
        .run(async {
            let element = primitives.locate(page, index).await?;
            primitives.log_highlight_failure(
                ctx,
                primitives
                    .highlighter()
                    .highlight_type(cdp, page, &element.bounding_box, text)
                    .await,
            );

            let (x, y) = element.bounding_box.center();
            primitives.press_at(page, x, y).await?;
            primitives
                .settle(ctx, page, primitives.config().post_type_window)
                .await?;

            debug!(target: "action-primitives", chars = text.chars().count(), "inserting text");
            cdp.insert_text(page, text).await?;
            Ok::<(), ActionError>(())
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
        "Type text completed successfully"
    );
    Ok(ActionReport::success(started_at, latency_ms).with_signals(post_signals))
}

#[cfg(test)]
mod tests {
    use crate::primitives::ActionPrimitives;
    use crate::test_support::{serve_elements, with_page};
    use crate::types::ExecCtx;
    use crate::ActionError;

    #[tokio::test]
    async fn focuses_then_inserts_once() {
        let h = with_page("https://example.com/login").await;
        serve_elements(&h.transport).await;
        h.transport.clear_commands().await;

        h.primitives
            .type_text(&ExecCtx::detached(), 0, "alice@example.com")
            .await
            .expect("type");

        let methods: Vec<String> = h
            .transport
            .commands()
            .await
            .into_iter()
            .map(|cmd| cmd.method)
            .filter(|m| m == "Input.dispatchMouseEvent" || m == "Input.insertText")
            .collect();
        assert_eq!(
            methods,
            vec![
                "Input.dispatchMouseEvent",
                "Input.dispatchMouseEvent",
                "Input.dispatchMouseEvent",
                "Input.insertText",
            ]
        );
        let inserted = h.transport.commands_for("Input.insertText").await;
        assert_eq!(inserted[0].params["text"], "alice@example.com");

        let evaluated = h.transport.evaluated().await;
        assert!(evaluated
            .iter()
            .any(|script| script.contains("const quiet = 200;")));
    }

    #[tokio::test]
    async fn missing_element_inserts_nothing() {
        let h = with_page("https://example.com/login").await;
        serve_elements(&h.transport).await;
        let err = h
            .primitives
            .type_text(&ExecCtx::detached(), 9, "x")
            .await
            .expect_err("missing");
        assert!(matches!(err, ActionError::ElementNotFound(9)));
        assert!(h.transport.commands_for("Input.insertText").await.is_empty());
    }
}
