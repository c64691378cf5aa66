//! Failures of the capture → JPEG pipeline.

use cdp_adapter::AdapterError;
use image::ImageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisualError {
    /// The browser did not return a screenshot.
    #[error("viewport capture failed: {0}")]
    Capture(#[from] AdapterError),

    /// The browser answered with zero bytes.
    #[error("viewport capture returned no data")]
    EmptyCapture,

    /// The capture is not a PNG the decoder understands.
    #[error("cannot decode captured png: {0}")]
    Decode(#[source] ImageError),

    #[error("jpeg encoding at quality {quality} failed: {source}")]
    JpegEncode {
        quality: u8,
        #[source]
        source: ImageError,
    },
}
