//! Error types for action primitives

use cdp_adapter::{AdapterError, AdapterErrorKind};
use perceiver_structural::PerceiverError;
use perceiver_visual::VisualError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// No element carries this index in the current snapshot
    #[error("element with index {0} not found")]
    ElementNotFound(u32),

    /// The page could not be snapshotted
    #[error("failed to get element map: {0}")]
    Extraction(String),

    #[error("cannot close the last tab")]
    LastTab,

    #[error("tab {0} not found")]
    TabNotFound(String),

    #[error("no active page")]
    NoActivePage,

    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Navigation timed out waiting for page load
    #[error("navigation timeout: {0}")]
    NavTimeout(String),

    /// Operation was cancelled or interrupted
    #[error("operation interrupted: {0}")]
    Interrupted(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    #[error("failed to take screenshot: {0}")]
    Screenshot(String),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::NavTimeout(_) | ActionError::CdpIo(_))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Internal(_) => 3,
            ActionError::NavTimeout(_)
            | ActionError::Navigation(_)
            | ActionError::CdpIo(_)
            | ActionError::NoActivePage => 2,
            ActionError::Extraction(_)
            | ActionError::Screenshot(_)
            | ActionError::TabNotFound(_) => 1,
            ActionError::ElementNotFound(_) | ActionError::LastTab | ActionError::Interrupted(_) => {
                0
            }
        }
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::Navigation => {
                ActionError::Navigation(err.hint.unwrap_or(message))
            }
            AdapterErrorKind::NavTimeout => ActionError::NavTimeout(err.hint.unwrap_or(message)),
            AdapterErrorKind::Internal => ActionError::Internal(message),
            AdapterErrorKind::CdpIo
            | AdapterErrorKind::TargetNotFound
            | AdapterErrorKind::ScriptException => ActionError::CdpIo(message),
        }
    }
}

impl From<PerceiverError> for ActionError {
    fn from(err: PerceiverError) -> Self {
        match err {
            PerceiverError::Extraction(msg) => ActionError::Extraction(msg),
            PerceiverError::Adapter(err) => ActionError::Extraction(err.to_string()),
        }
    }
}

impl From<VisualError> for ActionError {
    fn from(err: VisualError) -> Self {
        match err {
            VisualError::Capture(err) => ActionError::from(err),
            other => ActionError::Screenshot(other.to_string()),
        }
    }
}
