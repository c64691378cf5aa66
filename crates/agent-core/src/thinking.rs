//! Structured reasoning blocks emitted by the model before each tool call.
//!
//! ```text
//! **THINKING**: the search results are visible
//! **EVALUATION**: previous click opened the page
//! **MEMORY**: collected 3 of 10 titles
//! **NEXT_GOAL**: scroll for more results
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Recognized headers, in the order the model is asked to emit them.
pub const HEADERS: [&str; 4] = ["THINKING", "EVALUATION", "MEMORY", "NEXT_GOAL"];

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*{0,2}\b(THINKING|EVALUATION|MEMORY|NEXT_GOAL)\b\*{0,2}\s*:\s*\*{0,2}")
        .expect("valid header regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredThinking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_goal: Option<String>,
}

impl StructuredThinking {
    pub fn is_empty(&self) -> bool {
        self.thinking.is_none()
            && self.evaluation.is_none()
            && self.memory.is_none()
            && self.next_goal.is_none()
    }

    fn slot(&mut self, header: &str) -> Option<&mut Option<String>> {
        match header {
            "THINKING" => Some(&mut self.thinking),
            "EVALUATION" => Some(&mut self.evaluation),
            "MEMORY" => Some(&mut self.memory),
            "NEXT_GOAL" => Some(&mut self.next_goal),
            _ => None,
        }
    }
}

/// Splits `text` on the recognized headers. Each section runs to the next header or the
/// end of the text; empty sections stay `None` and the first occurrence of a header wins.
pub fn parse_structured_thinking(text: &str) -> StructuredThinking {
    let mut parsed = StructuredThinking::default();
    let matches: Vec<_> = HEADER_RE.captures_iter(text).collect();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(header)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let content = text[whole.end()..end]
            .trim()
            .trim_end_matches('*')
            .trim();
        if content.is_empty() {
            continue;
        }
        if let Some(slot) = parsed.slot(header.as_str()) {
            if slot.is_none() {
                *slot = Some(content.to_string());
            }
        }
    }
    parsed
}
