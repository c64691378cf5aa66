use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

const TOKEN_TEXT_LIMIT: usize = 100;

/// Viewport-relative rectangle captured at snapshot time. May be negative (scrolled off)
/// or zero-sized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// One interactive or textual node of a snapshot. `index` is the only handle callers
/// use to refer back to it and is valid until the next mutating action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Element {
    pub index: u32,
    pub tag_name: String,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub href: String,
    pub value: String,
    pub aria_label: String,
    pub placeholder: String,
    pub bounding_box: BoundingBox,
    pub is_visible: bool,
    pub is_interactive: bool,
}

impl Element {
    fn token_line(&self, out: &mut String) {
        let _ = write!(out, "[{}] {}", self.index, self.tag_name);
        let attrs = [
            ("type", self.kind.as_str()),
            ("role", self.role.as_str()),
            ("text", self.text.as_str()),
            ("placeholder", self.placeholder.as_str()),
            ("aria-label", self.aria_label.as_str()),
            ("value", self.value.as_str()),
            ("href", self.href.as_str()),
        ];
        for (name, value) in attrs {
            if value.is_empty() {
                continue;
            }
            let _ = write!(out, " {}=\"{}\"", name, truncate(value, TOKEN_TEXT_LIMIT));
        }
        out.push('\n');
    }
}

/// Indexed snapshot of one page.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ElementMap {
    pub page_title: String,
    pub page_url: String,
    elements: Vec<Element>,
    #[serde(skip)]
    by_index: HashMap<u32, usize>,
    #[serde(skip)]
    rendered: OnceLock<String>,
}

impl ElementMap {
    pub fn new(page_title: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            page_title: page_title.into(),
            page_url: page_url.into(),
            ..Self::default()
        }
    }

    pub fn from_elements(
        page_title: impl Into<String>,
        page_url: impl Into<String>,
        elements: impl IntoIterator<Item = Element>,
    ) -> Self {
        let mut map = Self::new(page_title, page_url);
        for element in elements {
            map.add(element);
        }
        map
    }

    /// Appends an element; a repeated index shadows the earlier entry for lookups.
    pub fn add(&mut self, element: Element) {
        self.by_index.insert(element.index, self.elements.len());
        self.elements.push(element);
        self.rendered = OnceLock::new();
    }

    pub fn by_index(&self, index: u32) -> Option<&Element> {
        self.by_index
            .get(&index)
            .and_then(|position| self.elements.get(*position))
    }

    pub fn count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Elements that are both interactive and visible.
    pub fn interactive_elements(&self) -> Vec<&Element> {
        self.elements
            .iter()
            .filter(|el| el.is_interactive && el.is_visible)
            .collect()
    }

    /// Compact textual form for a language-model prompt. Invisible elements are never
    /// rendered.
    pub fn to_token_string(&self) -> &str {
        self.rendered.get_or_init(|| self.render(0))
    }

    /// Like [`to_token_string`](Self::to_token_string) but stops after `limit` element
    /// lines. `0` means unlimited.
    pub fn to_token_string_limited(&self, limit: usize) -> String {
        if limit == 0 {
            return self.to_token_string().to_string();
        }
        self.render(limit)
    }

    fn render(&self, limit: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Page: {}", self.page_title);
        let _ = writeln!(out, "URL: {}", self.page_url);

        let visible: Vec<&Element> = self.elements.iter().filter(|el| el.is_visible).collect();
        let shown = if limit == 0 {
            visible.len()
        } else {
            visible.len().min(limit)
        };
        for element in &visible[..shown] {
            element.token_line(&mut out);
        }
        if shown < visible.len() {
            let _ = writeln!(
                out,
                "... ({} more elements not shown)",
                visible.len() - shown
            );
        }
        out
    }
}

/// Shortens `s` to at most `max` bytes, marking the cut with `...`. Never splits a
/// UTF-8 character.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return s[..floor_char_boundary(s, max)].to_string();
    }
    format!("{}...", &s[..floor_char_boundary(s, max - 3)])
}

fn floor_char_boundary(s: &str, mut at: usize) -> usize {
    while at > 0 && !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}
