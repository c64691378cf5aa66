//! Visual perception: viewport capture and the consumer screenshot pipeline
//! (capture → bounded resize → JPEG → base64).

pub mod errors;
pub mod models;
pub mod screenshot;

// Re-exports
pub use errors::VisualError;
pub use models::*;
pub use screenshot::{compress_for_consumer, encode_base64, ScreenshotCapture};
