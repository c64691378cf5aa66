//! Data models for visual perception
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_QUALITY: u8 = 60;

/// Screenshot produced for a consumer (language model or caller)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: String,

    /// Encoded image bytes
    pub data: Vec<u8>,

    pub format: ImageFormat,

    pub width: u32,
    pub height: u32,

    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Size/quality bounds applied before a capture is handed to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Images wider than this are scaled down, keeping aspect ratio.
    pub max_width: u32,

    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ScreenshotOptions {
    pub fn new(max_width: u32, quality: u8) -> Self {
        Self {
            max_width,
            quality,
        }
    }

    /// Replaces non-positive values with defaults and clamps quality to 100.
    pub fn normalized(self) -> Self {
        Self {
            max_width: if self.max_width == 0 {
                DEFAULT_MAX_WIDTH
            } else {
                self.max_width
            },
            quality: match self.quality {
                0 => DEFAULT_QUALITY,
                q => q.min(100),
            },
        }
    }
}
