//! Chromium DevTools Protocol adapter.
//!
//! Owns the browser connection and exposes the page-level surface the upper layers drive:
//! page lifecycle (create/close/activate), navigation, script evaluation, viewport capture
//! and absolute-coordinate input injection.

use tokio::sync::broadcast;

pub mod ids {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// Unique identifier for a page owned by the adapter.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct PageId(pub Uuid);

    impl PageId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for PageId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl std::fmt::Display for PageId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("navigation failed")]
        Navigation,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target not found")]
        TargetNotFound,
        #[error("script raised an exception")]
        ScriptException,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }
    }
}

pub mod events {
    use super::ids::PageId;
    use serde::{Deserialize, Serialize};

    /// Browser-side changes the upper layers react to.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum BrowserEvent {
        /// The target went away (closed by the page, the user or the adapter).
        PageClosed { page: PageId },
        /// The renderer died; the target still exists but is unusable.
        PageCrashed { page: PageId },
        /// The devtools connection ended. Every page is gone.
        Disconnected { reason: String },
    }
}

pub mod config {
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    /// How the adapter reaches a browser. Filled in by the caller; nothing here reads the
    /// environment.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CdpConfig {
        /// Chrome binary. `None` searches `PATH` and the usual install locations at launch.
        pub executable: Option<PathBuf>,
        /// Profile directory. `None` lets the launcher use a throwaway one.
        pub user_data_dir: Option<PathBuf>,
        pub headless: bool,
        /// Per-command deadline; navigation waits take their own.
        pub default_deadline_ms: u64,
        /// Attach to an already running browser instead of launching one.
        pub websocket_url: Option<String>,
        pub window_size: (u32, u32),
        #[serde(default)]
        pub extra_args: Vec<String>,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: None,
                user_data_dir: None,
                headless: true,
                default_deadline_ms: 30_000,
                websocket_url: None,
                window_size: (1280, 800),
                extra_args: Vec::new(),
            }
        }
    }
}

pub mod adapter;
pub mod commands;
pub mod launcher;
pub mod metrics;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use adapter::{Cdp, CdpAdapter, EventBus};
pub use commands::{DeviceMetrics, MouseButton, MouseEvent, MouseEventKind, PageInfo};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use events::BrowserEvent;
pub use ids::PageId;
pub use metrics::CommandMetrics;
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

/// Creates the broadcast channel the adapter publishes [`BrowserEvent`]s on.
pub fn event_bus(buffer: usize) -> (EventBus, broadcast::Receiver<BrowserEvent>) {
    broadcast::channel(buffer)
}
