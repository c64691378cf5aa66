//! Rough token accounting for run statistics.

/// Characters per token assumed by the estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text` (rounded up).
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

/// Running total over everything exchanged in one attempt.
#[derive(Debug, Clone, Default)]
pub struct TokenCounter {
    used: usize,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(&mut self, text: &str) -> usize {
        let tokens = estimate_tokens(text);
        self.used += tokens;
        tokens
    }

    pub fn used(&self) -> usize {
        self.used
    }
}
