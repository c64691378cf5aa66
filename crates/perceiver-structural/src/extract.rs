//! In-page extraction of the indexed element snapshot.

use cdp_adapter::{Cdp, PageId};
use serde::Deserialize;
use tracing::debug;

use crate::errors::PerceiverError;
use crate::model::{Element, ElementMap};

/// DOM attribute carrying an element's snapshot index.
pub const INDEX_ATTRIBUTE: &str = "data-bua-index";

/// Walks the document in order, tags every candidate with a fresh `data-bua-index` and
/// returns `{title, url, elements}`.
///
/// Form controls are indexed even when they cannot be seen (`type=hidden`, `display:none`);
/// they come back with `isVisible: false`.
pub const EXTRACT_SCRIPT: &str = r#"(() => {
  const INTERACTIVE_TAGS = new Set(['a', 'button', 'input', 'select', 'textarea', 'option', 'summary', 'details', 'label']);
  const INTERACTIVE_ROLES = new Set(['button', 'link', 'checkbox', 'radio', 'textbox', 'combobox', 'listbox', 'option',
    'menuitem', 'menuitemcheckbox', 'menuitemradio', 'tab', 'switch', 'slider', 'searchbox', 'spinbutton', 'treeitem']);
  const CONTAINER_ROLES = new Set(['dialog', 'alertdialog', 'listbox']);
  const HEADINGS = new Set(['h1', 'h2', 'h3', 'h4', 'h5', 'h6']);
  const SKIPPED = new Set(['script', 'style', 'noscript', 'template', 'head', 'meta', 'link']);

  document.querySelectorAll('[data-bua-index]').forEach((el) => el.removeAttribute('data-bua-index'));

  const clean = (value, max) => (value || '').replace(/\s+/g, ' ').trim().slice(0, max);
  const interactive = (el, tag, role) => {
    if (INTERACTIVE_TAGS.has(tag)) return true;
    if (INTERACTIVE_ROLES.has(role)) return true;
    if (el.hasAttribute('onclick') || el.hasAttribute('data-clickable')) return true;
    if (el.isContentEditable) return true;
    const tabindex = el.getAttribute('tabindex');
    return tabindex !== null && parseInt(tabindex, 10) >= 0;
  };
  const scrollable = (el, style) =>
    (style.overflowY === 'auto' || style.overflowY === 'scroll') && el.scrollHeight > el.clientHeight;

  const elements = [];
  let index = 0;
  const nodes = document.body ? document.body.querySelectorAll('*') : [];
  for (const el of nodes) {
    const tag = el.tagName.toLowerCase();
    if (SKIPPED.has(tag)) continue;
    const role = (el.getAttribute('role') || '').toLowerCase();
    const style = window.getComputedStyle(el);
    const isInteractive = interactive(el, tag, role);
    if (!isInteractive && !CONTAINER_ROLES.has(role) && !HEADINGS.has(tag) && !scrollable(el, style)) continue;

    const rect = el.getBoundingClientRect();
    const isVisible = style.display !== 'none' && style.visibility !== 'hidden' &&
      parseFloat(style.opacity || '1') > 0 && rect.width > 0 && rect.height > 0;
    el.setAttribute('data-bua-index', String(index));
    elements.push({
      index,
      tagName: tag,
      role,
      type: (el.getAttribute('type') || '').toLowerCase(),
      text: clean(el.innerText || el.textContent, 200),
      href: el.getAttribute('href') || '',
      value: typeof el.value === 'string' ? clean(el.value, 200) : '',
      ariaLabel: el.getAttribute('aria-label') || '',
      placeholder: el.getAttribute('placeholder') || '',
      boundingBox: { x: rect.left, y: rect.top, width: rect.width, height: rect.height },
      isVisible,
      isInteractive,
    });
    index += 1;
  }
  return { title: document.title || '', url: location.href, elements };
})()"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractionPayload {
    title: String,
    url: String,
    elements: Vec<Element>,
}

/// Snapshots the page into a fresh [`ElementMap`]. Re-tags the DOM, so indices from
/// earlier snapshots are invalidated.
pub async fn extract_element_map(
    cdp: &dyn Cdp,
    page: PageId,
) -> Result<ElementMap, PerceiverError> {
    let value = cdp
        .evaluate_script(page, EXTRACT_SCRIPT)
        .await
        .map_err(|err| PerceiverError::extraction(err.to_string()))?;
    if value.is_null() {
        return Err(PerceiverError::extraction("extraction script returned no data"));
    }

    let payload: ExtractionPayload = serde_json::from_value(value)
        .map_err(|err| PerceiverError::extraction(format!("malformed snapshot: {err}")))?;
    debug!(
        %page,
        elements = payload.elements.len(),
        url = %payload.url,
        "element map extracted"
    );
    Ok(ElementMap::from_elements(
        payload.title,
        payload.url,
        payload.elements,
    ))
}

/// Selector addressing the element tagged with `index` by the last extraction.
pub fn index_selector(index: u32) -> String {
    format!("[{INDEX_ATTRIBUTE}=\"{index}\"]")
}
