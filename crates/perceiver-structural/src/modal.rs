//! Heuristic detection of the scrollable overlay (modal, drawer, popup list) that should
//! receive scroll input instead of the page.
//!
//! An in-page probe reports layout metrics for every indexed element; the decision is an
//! ordered list of [`ScoringRule`]s applied in Rust:
//!
//! 1. [`DialogRule`] is decisive: the first visible `role="dialog"` that scrolls (itself or
//!    its first descendant) wins outright.
//! 2. [`OverlayRule`] scores positioned scroll containers by area.
//! 3. [`ScrollRegionRule`] scores large in-flow scroll regions by overflow × width, at
//!    half weight.
//!
//! Rules 2 and 3 compete on score; the highest wins and ties keep document order.

use cdp_adapter::{Cdp, PageId};
use serde::Deserialize;
use tracing::{debug, warn};

/// Layout metrics for one indexed element, as reported by [`MODAL_PROBE_SCRIPT`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModalCandidate {
    pub index: u32,
    pub role: String,
    pub display: String,
    pub visibility: String,
    pub position: String,
    pub overflow_y: String,
    pub scroll_height: f64,
    pub client_height: f64,
    /// Whether the element's first descendant overflows vertically.
    pub child_scrollable: bool,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub left: f64,
}

impl ModalCandidate {
    fn displayed(&self) -> bool {
        self.display != "none"
    }

    fn scrolls_on_y(&self) -> bool {
        matches!(self.overflow_y.as_str(), "auto" | "scroll")
    }

    fn overflow(&self) -> f64 {
        self.scroll_height - self.client_height
    }
}

pub const MODAL_PROBE_SCRIPT: &str = r#"(() => {
  const out = [];
  document.querySelectorAll('[data-bua-index]').forEach((el) => {
    const index = parseInt(el.getAttribute('data-bua-index'), 10);
    if (Number.isNaN(index)) return;
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const child = el.querySelector('*');
    out.push({
      index,
      role: (el.getAttribute('role') || '').toLowerCase(),
      display: style.display,
      visibility: style.visibility,
      position: style.position,
      overflowY: style.overflowY,
      scrollHeight: el.scrollHeight,
      clientHeight: el.clientHeight,
      childScrollable: !!child && child.scrollHeight > child.clientHeight,
      width: rect.width,
      height: rect.height,
      top: rect.top,
      left: rect.left,
    });
  });
  return out;
})()"#;

pub trait ScoringRule: Send + Sync {
    fn name(&self) -> &'static str;
    /// A decisive rule short-circuits on its first qualifying candidate.
    fn decisive(&self) -> bool {
        false
    }
    fn score(&self, candidate: &ModalCandidate) -> Option<f64>;
}

pub struct DialogRule;

impl ScoringRule for DialogRule {
    fn name(&self) -> &'static str {
        "dialog"
    }

    fn decisive(&self) -> bool {
        true
    }

    fn score(&self, c: &ModalCandidate) -> Option<f64> {
        let visible = c.displayed() && c.visibility != "hidden";
        let scrolls = c.scroll_height > c.client_height || c.child_scrollable;
        (c.role == "dialog" && visible && scrolls).then_some(f64::INFINITY)
    }
}

pub struct OverlayRule;

impl ScoringRule for OverlayRule {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn score(&self, c: &ModalCandidate) -> Option<f64> {
        let positioned = matches!(c.position.as_str(), "fixed" | "absolute");
        let area = c.width * c.height;
        (c.scrolls_on_y() && c.overflow() > 0.0 && positioned && c.displayed() && area > 10_000.0)
            .then_some(area)
    }
}

pub struct ScrollRegionRule;

impl ScoringRule for ScrollRegionRule {
    fn name(&self) -> &'static str {
        "scroll-region"
    }

    fn score(&self, c: &ModalCandidate) -> Option<f64> {
        let qualifies = c.scrolls_on_y()
            && c.overflow() > 100.0
            && c.displayed()
            && c.width > 200.0
            && c.height > 200.0
            && c.top >= 0.0
            && c.left >= 0.0;
        qualifies.then(|| c.overflow() * c.width * 0.5)
    }
}

pub static SCORING_RULES: [&dyn ScoringRule; 3] = [&DialogRule, &OverlayRule, &ScrollRegionRule];

/// Picks the overlay index from probe metrics, or `None` when nothing qualifies.
pub fn select_modal(candidates: &[ModalCandidate]) -> Option<u32> {
    select_with_rules(&SCORING_RULES, candidates)
}

pub fn select_with_rules(rules: &[&dyn ScoringRule], candidates: &[ModalCandidate]) -> Option<u32> {
    let mut best: Option<(f64, u32, &'static str)> = None;

    for rule in rules {
        for candidate in candidates {
            let Some(score) = rule.score(candidate) else {
                continue;
            };
            if rule.decisive() {
                debug!(index = candidate.index, rule = rule.name(), "overlay selected");
                return Some(candidate.index);
            }
            if best.map_or(true, |(current, _, _)| score > current) {
                best = Some((score, candidate.index, rule.name()));
            }
        }
    }

    best.map(|(score, index, rule)| {
        debug!(index, rule, score, "overlay selected");
        index
    })
}

/// Probes the page for a scrollable overlay. Never fails: probe errors are logged and
/// reported as "no overlay".
pub async fn find_scrollable_modal(cdp: &dyn Cdp, page: PageId) -> Option<u32> {
    let value = match cdp.evaluate_script(page, MODAL_PROBE_SCRIPT).await {
        Ok(value) => value,
        Err(err) => {
            warn!(%page, %err, "overlay probe failed");
            return None;
        }
    };
    match serde_json::from_value::<Vec<ModalCandidate>>(value) {
        Ok(candidates) => select_modal(&candidates),
        Err(err) => {
            warn!(%page, %err, "overlay probe returned malformed metrics");
            None
        }
    }
}
