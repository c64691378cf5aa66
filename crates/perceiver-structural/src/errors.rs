use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error("element extraction failed: {0}")]
    Extraction(String),
    #[error("cdp error: {0}")]
    Adapter(#[from] AdapterError),
}

impl PerceiverError {
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }
}
