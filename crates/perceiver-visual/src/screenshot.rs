//! Viewport capture via the CDP adapter and consumer-side compression
use crate::{errors::VisualError, models::*};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cdp_adapter::{Cdp, PageId};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::time::SystemTime;
use uuid::Uuid;

/// Decodes a PNG capture, scales it down to `max_width` (bilinear, aspect preserved)
/// when wider, and re-encodes it as JPEG.
pub fn compress_for_consumer(
    raw_png: &[u8],
    options: &ScreenshotOptions,
) -> Result<Screenshot, VisualError> {
    if raw_png.is_empty() {
        return Err(VisualError::EmptyCapture);
    }
    let options = options.normalized();
    let img = image::load_from_memory(raw_png).map_err(VisualError::Decode)?;

    let img = if img.width() > options.max_width {
        let height = (u64::from(img.height()) * u64::from(options.max_width)
            / u64::from(img.width()))
        .max(1) as u32;
        img.resize_exact(options.max_width, height, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, options.quality)
        .encode_image(&rgb)
        .map_err(|source| VisualError::JpegEncode {
            quality: options.quality,
            source,
        })?;

    tracing::debug!(
        width = rgb.width(),
        height = rgb.height(),
        bytes = data.len(),
        quality = options.quality,
        "screenshot compressed"
    );

    Ok(Screenshot {
        id: Uuid::new_v4().to_string(),
        data,
        format: ImageFormat::Jpeg,
        width: rgb.width(),
        height: rgb.height(),
        timestamp: SystemTime::now(),
    })
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Screenshot capture service
pub struct ScreenshotCapture;

impl ScreenshotCapture {
    /// Raw PNG of the visible viewport.
    pub async fn capture(cdp: &dyn Cdp, page: PageId) -> Result<Vec<u8>, VisualError> {
        tracing::debug!(%page, "capturing viewport");
        Ok(cdp.screenshot(page).await?)
    }

    /// Viewport capture bounded for a consumer.
    pub async fn capture_for_consumer(
        cdp: &dyn Cdp,
        page: PageId,
        options: &ScreenshotOptions,
    ) -> Result<Screenshot, VisualError> {
        let raw = Self::capture(cdp, page).await?;
        compress_for_consumer(&raw, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::AdapterError;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn wide_capture_is_scaled_to_max_width() {
        let shot = compress_for_consumer(&png(1600, 1000), &ScreenshotOptions::new(800, 60))
            .expect("compress");
        assert_eq!((shot.width, shot.height), (800, 500));
        assert_eq!(shot.format, ImageFormat::Jpeg);
        assert_eq!(&shot.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn narrow_capture_keeps_dimensions() {
        let shot = compress_for_consumer(&png(400, 300), &ScreenshotOptions::default())
            .expect("compress");
        assert_eq!((shot.width, shot.height), (400, 300));
        assert_eq!(&shot.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn zero_options_fall_back_to_defaults() {
        let shot = compress_for_consumer(&png(1000, 100), &ScreenshotOptions::new(0, 0))
            .expect("compress");
        assert_eq!((shot.width, shot.height), (DEFAULT_MAX_WIDTH, 80));
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = compress_for_consumer(b"not an image", &ScreenshotOptions::default())
            .expect_err("decode failure");
        assert!(matches!(err, VisualError::Decode(_)));
        assert!(err.to_string().starts_with("cannot decode captured png"));
    }

    #[test]
    fn empty_capture_is_rejected() {
        let err = compress_for_consumer(&[], &ScreenshotOptions::default()).expect_err("empty");
        assert!(matches!(err, VisualError::EmptyCapture));
    }

    #[tokio::test]
    async fn failed_capture_keeps_the_adapter_error() {
        use cdp_adapter::testing::MockTransport;
        use cdp_adapter::{event_bus, AdapterErrorKind, CdpAdapter, CdpConfig};
        use std::sync::Arc;

        let (bus, _rx) = event_bus(8);
        let transport = MockTransport::new();
        let adapter = Arc::new(CdpAdapter::with_transport(
            CdpConfig::default(),
            bus,
            transport.clone(),
        ));
        let page = adapter.create_page("about:blank").await.expect("page");
        transport
            .push_response(
                "Page.captureScreenshot",
                Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint("renderer gone")),
            )
            .await;

        let err = ScreenshotCapture::capture(adapter.as_ref(), page)
            .await
            .expect_err("capture failure");
        match err {
            VisualError::Capture(inner) => assert_eq!(inner.kind, AdapterErrorKind::CdpIo),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn capture_for_consumer_reads_active_viewport() {
        use cdp_adapter::testing::MockTransport;
        use cdp_adapter::{event_bus, CdpAdapter, CdpConfig};
        use std::sync::Arc;

        let (bus, _rx) = event_bus(8);
        let transport = MockTransport::new();
        let adapter = Arc::new(CdpAdapter::with_transport(
            CdpConfig::default(),
            bus,
            transport.clone(),
        ));
        let page = adapter.create_page("about:blank").await.expect("page");

        let shot = ScreenshotCapture::capture_for_consumer(
            adapter.as_ref(),
            page,
            &ScreenshotOptions::default(),
        )
        .await
        .expect("capture");
        assert_eq!((shot.width, shot.height), (1, 1));

        let captures = transport.commands_for("Page.captureScreenshot").await;
        assert_eq!(captures[0].params["format"], "png");
        assert_eq!(captures[0].params["captureBeyondViewport"], false);
    }

    #[test]
    fn base64_roundtrip_prefix() {
        assert_eq!(encode_base64(&[0xFF, 0xD8, 0xFF]), "/9j/");
    }
}
