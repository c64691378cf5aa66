//! Debug overlay labelling every visible interactive element with its index.

use perceiver_structural::{Element, ElementMap};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const CONTAINER_ID: &str = "bua-annotation-container";
pub const STYLE_ID: &str = "bua-annotation-style";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub show_index: bool,
    pub show_type: bool,
    pub show_bounding_box: bool,
    pub opacity: f64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            show_index: true,
            show_type: true,
            show_bounding_box: true,
            opacity: 0.8,
        }
    }
}

/// Colour class for an element kind.
pub fn type_class(el: &Element) -> &'static str {
    match el.tag_name.as_str() {
        "button" => "bua-type-button",
        "a" => "bua-type-link",
        "input" if matches!(el.kind.as_str(), "submit" | "button") => "bua-type-button",
        "input" => "bua-type-input",
        "select" => "bua-type-select",
        "textarea" => "bua-type-textarea",
        "img" => "bua-type-image",
        _ if el.role == "button" => "bua-type-button",
        _ => "bua-type-other",
    }
}

fn label_for(el: &Element, cfg: &AnnotationConfig) -> String {
    let mut parts = Vec::with_capacity(2);
    if cfg.show_index {
        parts.push(el.index.to_string());
    }
    if cfg.show_type && !el.tag_name.is_empty() {
        parts.push(el.tag_name.clone());
    }
    parts.join(" ")
}

fn stylesheet(cfg: &AnnotationConfig) -> String {
    let colours = [
        ("button", "#e74c3c"),
        ("link", "#3498db"),
        ("input", "#2ecc71"),
        ("select", "#9b59b6"),
        ("textarea", "#1abc9c"),
        ("image", "#f39c12"),
        ("other", "#95a5a6"),
    ];
    let border = if cfg.show_bounding_box { "2px solid" } else { "0 solid" };
    let mut css = format!(
        ".bua-annotation-overlay {{ position: fixed; pointer-events: none; z-index: 2147483647; top: 0; left: 0; width: 100%; height: 100%; }}\n\
         .bua-element-box {{ position: absolute; border: {border}; box-sizing: border-box; pointer-events: none; }}\n\
         .bua-element-label {{ position: absolute; font-family: 'SF Mono', Monaco, monospace; font-size: 10px; font-weight: bold; padding: 2px 4px; border-radius: 3px; white-space: nowrap; opacity: {opacity:.2}; pointer-events: none; }}\n",
        opacity = cfg.opacity.clamp(0.0, 1.0),
    );
    for (kind, colour) in colours {
        css.push_str(&format!(
            ".bua-type-{kind} {{ border-color: {colour}; }}\n.bua-type-{kind} .bua-element-label {{ background: {colour}; color: white; }}\n"
        ));
    }
    css
}

/// Replaces any existing overlay with one box per visible interactive element that has
/// a non-empty bounding box. Resolves to the number of boxes drawn.
pub fn show_script(map: &ElementMap, cfg: &AnnotationConfig) -> String {
    let boxes: Vec<_> = map
        .interactive_elements()
        .into_iter()
        .filter(|el| !el.bounding_box.is_empty())
        .map(|el| {
            json!({
                "cls": type_class(el),
                "x": el.bounding_box.x,
                "y": el.bounding_box.y,
                "w": el.bounding_box.width,
                "h": el.bounding_box.height,
                "label": label_for(el, cfg),
            })
        })
        .collect();

    format!(
        r#"(() => {{
  const existing = document.getElementById('{CONTAINER_ID}');
  if (existing) existing.remove();
  let style = document.getElementById('{STYLE_ID}');
  if (!style) {{
    style = document.createElement('style');
    style.id = '{STYLE_ID}';
    (document.head || document.documentElement).appendChild(style);
  }}
  style.textContent = {css};
  const container = document.createElement('div');
  container.id = '{CONTAINER_ID}';
  container.className = 'bua-annotation-overlay';
  document.body.appendChild(container);
  const boxes = {boxes};
  for (const b of boxes) {{
    const box = document.createElement('div');
    box.className = 'bua-element-box ' + b.cls;
    box.style.left = b.x + 'px';
    box.style.top = b.y + 'px';
    box.style.width = b.w + 'px';
    box.style.height = b.h + 'px';
    if (b.label) {{
      const label = document.createElement('div');
      label.className = 'bua-element-label';
      label.textContent = b.label;
      label.style.left = '0';
      label.style.top = '-18px';
      box.appendChild(label);
    }}
    container.appendChild(box);
  }}
  return boxes.length;
}})()"#,
        css = serde_json::Value::from(stylesheet(cfg)),
        boxes = serde_json::Value::from(boxes),
    )
}

pub fn hide_script() -> String {
    format!(
        r#"(() => {{
  const container = document.getElementById('{CONTAINER_ID}');
  if (container) container.remove();
  const style = document.getElementById('{STYLE_ID}');
  if (style) style.remove();
  return true;
}})()"#
    )
}

/// Evaluates to whether the overlay is currently on the page.
pub fn present_script() -> String {
    format!("document.getElementById('{CONTAINER_ID}') !== null")
}

#[cfg(test)]
mod tests {
    use super::*;
    use perceiver_structural::BoundingBox;

    fn element(index: u32, tag: &str, kind: &str, visible: bool) -> Element {
        Element {
            index,
            tag_name: tag.into(),
            kind: kind.into(),
            bounding_box: BoundingBox::new(10.0, 10.0, 50.0, 20.0),
            is_visible: visible,
            is_interactive: true,
            ..Element::default()
        }
    }

    #[test]
    fn type_classes_follow_tag_and_role() {
        assert_eq!(type_class(&element(0, "button", "", true)), "bua-type-button");
        assert_eq!(type_class(&element(0, "input", "submit", true)), "bua-type-button");
        assert_eq!(type_class(&element(0, "input", "text", true)), "bua-type-input");
        assert_eq!(type_class(&element(0, "a", "", true)), "bua-type-link");
        let mut div = element(0, "div", "", true);
        assert_eq!(type_class(&div), "bua-type-other");
        div.role = "button".into();
        assert_eq!(type_class(&div), "bua-type-button");
    }

    #[test]
    fn overlay_covers_visible_interactive_elements_only() {
        let mut zero = element(3, "a", "", true);
        zero.bounding_box = BoundingBox::new(0.0, 0.0, 0.0, 0.0);
        let map = ElementMap::from_elements(
            "t",
            "u",
            [
                element(0, "button", "", true),
                element(1, "input", "text", false),
                element(2, "select", "", true),
                zero,
            ],
        );
        let script = show_script(&map, &AnnotationConfig::default());
        assert!(script.contains(CONTAINER_ID));
        assert!(script.contains(r#""label":"0 button""#));
        assert!(script.contains(r#""label":"2 select""#));
        assert!(!script.contains("1 input"));
        assert!(!script.contains("3 a"));
    }

    #[test]
    fn labels_honour_config() {
        let el = element(7, "button", "", true);
        let index_only = AnnotationConfig {
            show_type: false,
            ..AnnotationConfig::default()
        };
        assert_eq!(label_for(&el, &index_only), "7");
        assert!(stylesheet(&AnnotationConfig::default()).contains("opacity: 0.80"));
    }
}
