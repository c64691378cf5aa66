//! Visual feedback drawn into the page before an action runs.

use std::time::Duration;

use cdp_adapter::{Cdp, PageId};
use perceiver_structural::BoundingBox;
use tracing::debug;

use crate::errors::ActionError;
use crate::types::ScrollDirection;

pub const STYLE_ID: &str = "bua-highlight-styles";
pub const ACCENT: &str = "#ff6b35";
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

const CORNER_SIZE: f64 = 20.0;
const TYPE_LABEL_LIMIT: usize = 20;

const HIGHLIGHT_SELECTOR: &str = ".bua-highlight-corner, .bua-highlight-crosshair, \
.bua-highlight-crosshair-h, .bua-highlight-crosshair-v, .bua-highlight-circle, .bua-highlight-label";

fn style_bootstrap() -> String {
    format!(
        r#"if (!document.getElementById('{STYLE_ID}')) {{
    const style = document.createElement('style');
    style.id = '{STYLE_ID}';
    style.textContent = `
      .bua-highlight-corner {{ position: fixed; pointer-events: none; z-index: 999999; transition: all 0.15s ease-out; }}
      .bua-highlight-corner-tl {{ border-top: 3px solid {ACCENT}; border-left: 3px solid {ACCENT}; }}
      .bua-highlight-corner-tr {{ border-top: 3px solid {ACCENT}; border-right: 3px solid {ACCENT}; }}
      .bua-highlight-corner-bl {{ border-bottom: 3px solid {ACCENT}; border-left: 3px solid {ACCENT}; }}
      .bua-highlight-corner-br {{ border-bottom: 3px solid {ACCENT}; border-right: 3px solid {ACCENT}; }}
      .bua-highlight-crosshair {{ position: fixed; pointer-events: none; z-index: 999999; }}
      .bua-highlight-crosshair-h {{ width: 40px; height: 2px; background: {ACCENT}; transform: translateX(-50%); }}
      .bua-highlight-crosshair-v {{ width: 2px; height: 40px; background: {ACCENT}; transform: translateY(-50%); }}
      .bua-highlight-circle {{ position: fixed; pointer-events: none; z-index: 999998; border: 2px solid {ACCENT}; border-radius: 50%; animation: bua-pulse 0.4s ease-out; }}
      @keyframes bua-pulse {{ 0% {{ transform: translate(-50%, -50%) scale(0.5); opacity: 1; }} 100% {{ transform: translate(-50%, -50%) scale(1.5); opacity: 0; }} }}
      .bua-highlight-label {{ position: fixed; pointer-events: none; z-index: 999999; background: {ACCENT}; color: white; padding: 2px 6px; font-size: 11px; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; font-weight: 500; border-radius: 3px; white-space: nowrap; }}
    `;
    (document.head || document.documentElement).appendChild(style);
  }}"#
    )
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Four corner brackets around the box, label 22px above it.
pub fn element_script(bbox: &BoundingBox, label: &str) -> String {
    format!(
        r#"(() => {{
  {bootstrap}
  document.querySelectorAll('.bua-highlight-corner, .bua-highlight-label').forEach((el) => el.remove());
  const x = {x}, y = {y}, w = {w}, h = {h};
  const size = {size};
  const padding = 4;
  const label = {label};
  [
    ['bua-highlight-corner-tl', x - padding, y - padding],
    ['bua-highlight-corner-tr', x + w + padding - size, y - padding],
    ['bua-highlight-corner-bl', x - padding, y + h + padding - size],
    ['bua-highlight-corner-br', x + w + padding - size, y + h + padding - size],
  ].forEach(([cls, left, top]) => {{
    const el = document.createElement('div');
    el.className = 'bua-highlight-corner ' + cls;
    el.style.left = left + 'px';
    el.style.top = top + 'px';
    el.style.width = size + 'px';
    el.style.height = size + 'px';
    document.body.appendChild(el);
  }});
  if (label) {{
    const el = document.createElement('div');
    el.className = 'bua-highlight-label';
    el.textContent = label;
    el.style.left = (x - padding) + 'px';
    el.style.top = (y - padding - 22) + 'px';
    document.body.appendChild(el);
  }}
  return true;
}})()"#,
        bootstrap = style_bootstrap(),
        x = bbox.x,
        y = bbox.y,
        w = bbox.width,
        h = bbox.height,
        size = CORNER_SIZE,
        label = js_string(label),
    )
}

/// Crosshair plus a 30px pulse circle at the point.
pub fn point_script(x: f64, y: f64, label: &str) -> String {
    format!(
        r#"(() => {{
  {bootstrap}
  document.querySelectorAll('{selector}').forEach((el) => el.remove());
  const x = {x}, y = {y};
  const label = {label};
  const add = (cls, extra) => {{
    const el = document.createElement('div');
    el.className = cls;
    el.style.left = x + 'px';
    el.style.top = y + 'px';
    Object.assign(el.style, extra || {{}});
    document.body.appendChild(el);
    return el;
  }};
  add('bua-highlight-crosshair bua-highlight-crosshair-h');
  add('bua-highlight-crosshair bua-highlight-crosshair-v');
  add('bua-highlight-circle', {{ width: '30px', height: '30px' }});
  if (label) {{
    const el = add('bua-highlight-label', {{ left: (x + 15) + 'px', top: (y - 25) + 'px' }});
    el.textContent = label;
  }}
  return true;
}})()"#,
        bootstrap = style_bootstrap(),
        selector = HIGHLIGHT_SELECTOR,
        x = x,
        y = y,
        label = js_string(label),
    )
}

pub fn scroll_script(x: f64, y: f64, direction: ScrollDirection) -> String {
    format!(
        r#"(() => {{
  {bootstrap}
  document.querySelectorAll('.bua-highlight-label').forEach((el) => el.remove());
  const el = document.createElement('div');
  el.className = 'bua-highlight-label';
  el.textContent = {label};
  el.style.left = '{x}px';
  el.style.top = '{y}px';
  el.style.fontSize = '14px';
  document.body.appendChild(el);
  return true;
}})()"#,
        bootstrap = style_bootstrap(),
        label = js_string(&format!("Scroll {}", direction.arrow())),
        x = x,
        y = y,
    )
}

pub fn remove_script() -> String {
    format!(
        "(() => {{ document.querySelectorAll('{HIGHLIGHT_SELECTOR}').forEach((el) => el.remove()); return true; }})()"
    )
}

/// `typing...`, `typing: <text>`, or the first 20 characters followed by `...`.
pub fn type_label(text: &str) -> String {
    if text.is_empty() {
        return "typing...".to_string();
    }
    if text.chars().count() > TYPE_LABEL_LIMIT {
        let head: String = text.chars().take(TYPE_LABEL_LIMIT).collect();
        return format!("typing: {head}...");
    }
    format!("typing: {text}")
}

#[derive(Debug, Clone, Copy)]
pub struct Highlighter {
    pub enabled: bool,
    pub delay: Duration,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: DEFAULT_DELAY,
        }
    }
}

impl Highlighter {
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self { enabled, delay }
    }

    pub fn disabled() -> Self {
        Self::new(false, DEFAULT_DELAY)
    }

    async fn show(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        script: String,
        hold: Duration,
    ) -> Result<(), ActionError> {
        if !self.enabled {
            return Ok(());
        }
        cdp.evaluate_script(page, &script).await?;
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
        Ok(())
    }

    pub async fn highlight_element(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        bbox: &BoundingBox,
        label: &str,
    ) -> Result<(), ActionError> {
        self.show(cdp, page, element_script(bbox, label), self.delay)
            .await
    }

    pub async fn highlight_point(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        x: f64,
        y: f64,
        label: &str,
    ) -> Result<(), ActionError> {
        self.show(cdp, page, point_script(x, y, label), self.delay)
            .await
    }

    /// Shorter hold than the other cues.
    pub async fn highlight_scroll(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        x: f64,
        y: f64,
        direction: ScrollDirection,
    ) -> Result<(), ActionError> {
        self.show(cdp, page, scroll_script(x, y, direction), self.delay / 2)
            .await
    }

    pub async fn highlight_type(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
        bbox: &BoundingBox,
        text: &str,
    ) -> Result<(), ActionError> {
        self.highlight_element(cdp, page, bbox, &type_label(text))
            .await
    }

    pub async fn remove_highlights(&self, cdp: &dyn Cdp, page: PageId) -> Result<(), ActionError> {
        if !self.enabled {
            return Ok(());
        }
        cdp.evaluate_script(page, &remove_script()).await?;
        debug!(%page, "highlights removed");
        Ok(())
    }
}
