//! Core data types for action primitives

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::ActionError;

/// Execution context for action primitives
///
/// Carries the action id used for tracing correlation and the cancellation token
/// every primitive checks before touching the page.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Unique identifier for this action
    pub action_id: String,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,
}

impl ExecCtx {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            cancel_token,
        }
    }

    /// Context with its own token, for callers without a run to tie into.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Fails fast when the context is already cancelled.
    pub fn check(&self) -> Result<(), ActionError> {
        if self.is_cancelled() {
            return Err(ActionError::Interrupted("context cancelled".to_string()));
        }
        Ok(())
    }

    /// Runs `fut` until it completes or the context is cancelled.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>>,
    {
        self.check()?;
        tokio::select! {
            _ = self.cancel_token.cancelled() => {
                Err(ActionError::Interrupted("context cancelled".to_string()))
            }
            result = fut => result,
        }
    }
}

/// Emulated viewport applied to every tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClickTarget {
    /// Element index from the latest snapshot
    Index(u32),

    /// Absolute viewport coordinates
    Point { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollTarget {
    /// Mouse wheel at the viewport centre
    Page,

    /// Scroll inside the indexed container
    Element(u32),

    /// Scroll the detected overlay container, falling back to the page
    AutoDetect,
}

/// What a scroll actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollOutcome {
    Page,
    Element(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Vertical movement wins; a zero delta reads as down.
    pub fn from_delta(delta_x: f64, delta_y: f64) -> Self {
        if delta_y < 0.0 {
            ScrollDirection::Up
        } else if delta_y == 0.0 && delta_x > 0.0 {
            ScrollDirection::Right
        } else if delta_y == 0.0 && delta_x < 0.0 {
            ScrollDirection::Left
        } else {
            ScrollDirection::Down
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "↑",
            ScrollDirection::Down => "↓",
            ScrollDirection::Left => "←",
            ScrollDirection::Right => "→",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    pub title: String,
    pub active: bool,
}

/// Page signals captured after an action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostSignals {
    pub url_after: Option<String>,
    pub title_after: Option<String>,
}

/// Action execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub ok: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    pub latency_ms: u64,

    pub post_signals: PostSignals,
}

impl ActionReport {
    pub fn success(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            post_signals: PostSignals::default(),
        }
    }

    pub fn with_signals(mut self, signals: PostSignals) -> Self {
        self.post_signals = signals;
        self
    }
}
