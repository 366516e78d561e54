//! Overlay snapshotter: rasterize everything except the live video.
//!
//! Normalization applied for the duration of one raster:
//! - capture root loses border/margin/padding and is pinned to the exact CSS
//!   width of the canvas, so percentage-positioned children land on the
//!   same pixels the compositor will use;
//! - elements flagged with [`HIDE_BACKGROUND_ATTR`] are painted with the key
//!   color so the video shows through them after punching;
//! - scrollable descendants are scrolled to their origin.
//!
//! All of it is undone by a [`StyleGuard`] before the snapshot returns.

use std::time::Duration;

use admock_common::config::ExportSettings;
use admock_common::error::{AdmockError, AdmockResult};
use admock_preview_model::geometry::CanvasSize;
use admock_processing_core::key_color::{punch_key_color, KeyColor};
use image::{Rgba, RgbaImage};

use crate::dom::{PreviewDocument, RasterizeOptions, HIDE_BACKGROUND_ATTR};
use crate::style_guard::StyleGuard;

/// A rasterized overlay for one animation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBitmap {
    pub image: RgbaImage,
    /// Whether this is the blank stand-in for a failed capture.
    pub blank: bool,
}

impl OverlayBitmap {
    /// Fully transparent bitmap of the given size.
    pub fn blank(size: CanvasSize) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
            blank: true,
        }
    }

    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.image.width(), self.image.height())
    }
}

/// What the raster is for.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RasterPurpose {
    /// Overlay for compositing: transparent background, key-colored holes,
    /// video excluded.
    Overlay,
    /// Plain still image of the preview, optionally over a solid fill.
    Still(Option<Rgba<u8>>),
}

/// Captures overlay bitmaps from a [`PreviewDocument`].
#[derive(Debug, Clone)]
pub struct OverlaySnapshotter {
    pixel_ratio: u32,
    key: KeyColor,
    settle: Duration,
    size_tolerance_px: u32,
}

impl OverlaySnapshotter {
    pub fn new(pixel_ratio: u32, key: KeyColor) -> Self {
        Self {
            pixel_ratio: pixel_ratio.max(1),
            key,
            settle: Duration::from_millis(150),
            size_tolerance_px: 2,
        }
    }

    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            pixel_ratio: settings.pixel_ratio.max(1),
            key: KeyColor::from(settings.key_color),
            settle: Duration::from_millis(settings.settle_delay_ms),
            size_tolerance_px: settings.size_tolerance_px,
        }
    }

    pub fn pixel_ratio(&self) -> u32 {
        self.pixel_ratio
    }

    pub fn key_color(&self) -> KeyColor {
        self.key
    }

    /// Snapshot and punch the key color. Never fails: a raster error yields
    /// a blank overlay so the export can continue with video only.
    pub async fn capture_overlay<D: PreviewDocument + ?Sized>(
        &self,
        doc: &D,
        canvas: CanvasSize,
    ) -> OverlayBitmap {
        match self.try_capture_overlay(doc, canvas).await {
            Ok(overlay) => overlay,
            Err(e) => {
                tracing::warn!(error = %e, "Overlay rasterization failed; continuing with a blank overlay");
                OverlayBitmap::blank(canvas)
            }
        }
    }

    /// Snapshot and punch the key color, surfacing raster errors.
    pub async fn try_capture_overlay<D: PreviewDocument + ?Sized>(
        &self,
        doc: &D,
        canvas: CanvasSize,
    ) -> AdmockResult<OverlayBitmap> {
        let mut image = self.rasterize_normalized(doc, canvas, RasterPurpose::Overlay).await?;
        let punched = punch_key_color(&mut image, self.key);
        tracing::debug!(
            punched,
            width = image.width(),
            height = image.height(),
            "Overlay captured"
        );
        Ok(OverlayBitmap {
            image,
            blank: false,
        })
    }

    /// Rasterize the full preview, video included. `None` keeps the
    /// preview's own (possibly transparent) background.
    pub async fn capture_still<D: PreviewDocument + ?Sized>(
        &self,
        doc: &D,
        canvas: CanvasSize,
        background: Option<Rgba<u8>>,
    ) -> AdmockResult<RgbaImage> {
        self.rasterize_normalized(doc, canvas, RasterPurpose::Still(background))
            .await
    }

    async fn rasterize_normalized<D: PreviewDocument + ?Sized>(
        &self,
        doc: &D,
        canvas: CanvasSize,
        purpose: RasterPurpose,
    ) -> AdmockResult<RgbaImage> {
        if canvas.is_empty() {
            return Err(AdmockError::capture(format!(
                "Cannot snapshot into an empty {}x{} canvas",
                canvas.width, canvas.height
            )));
        }

        let root = doc.root();
        let css_width = canvas.width as f64 / self.pixel_ratio as f64;
        let css_height = canvas.height as f64 / self.pixel_ratio as f64;

        let mut guard = StyleGuard::new(doc);
        guard.set(root, "border", "0");
        guard.set(root, "margin", "0");
        guard.set(root, "padding", "0");
        guard.set(root, "box-sizing", "border-box");
        guard.set(root, "width", &format!("{css_width}px"));

        let mut exclude = Vec::new();
        let background = match purpose {
            RasterPurpose::Overlay => {
                let key_css = self.key.css();
                for element in doc.elements_with_attribute(HIDE_BACKGROUND_ATTR) {
                    guard.set(element, "background", &key_css);
                    guard.set(element, "background-image", "none");
                }
                if let Some(video) = doc.find_video() {
                    exclude.push(video.element);
                }
                None
            }
            RasterPurpose::Still(fill) => fill,
        };

        for element in doc.scrollable_descendants() {
            guard.scroll_to_origin(element);
        }

        doc.wait_for_paint(self.settle).await;

        let options = RasterizeOptions {
            css_width,
            css_height,
            scale: self.pixel_ratio,
            background,
            exclude,
        };
        let result = doc.rasterize(&options).await;
        guard.restore();

        let image = result?;
        let actual = CanvasSize::new(image.width(), image.height());
        if !actual.approx_eq(canvas, self.size_tolerance_px) {
            tracing::warn!(
                expected_width = canvas.width,
                expected_height = canvas.height,
                actual_width = actual.width,
                actual_height = actual.height,
                "Snapshot size differs from canvas; it will be scaled on draw"
            );
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDocument, FakeVideo, CHROME_ROWS};
    use std::sync::Arc;

    fn canvas() -> CanvasSize {
        CanvasSize::new(72, 128)
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_punches_video_wrapper() {
        let doc = FakeDocument::new(36.0, 64.0).with_video(Arc::new(FakeVideo::new(10.0, (1080, 1920))));
        let snapshotter = OverlaySnapshotter::new(2, KeyColor::DEFAULT);

        let overlay = snapshotter.capture_overlay(&doc, canvas()).await;

        assert!(!overlay.blank);
        assert_eq!(overlay.size(), canvas());
        // Chrome rows stay opaque, the wrapper below becomes transparent.
        assert_eq!(overlay.image.get_pixel(0, 0).0[3], 255);
        assert_eq!(overlay.image.get_pixel(10, CHROME_ROWS + 5).0[3], 0);

        let options = doc.last_raster_options().unwrap();
        assert_eq!(options.background, None);
        assert_eq!(options.exclude, vec![FakeDocument::VIDEO]);
        assert_eq!(options.css_width, 36.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normalization_visible_during_raster_and_restored_after() {
        let doc = FakeDocument::new(36.0, 64.0);
        doc.set_style_property(FakeDocument::ROOT, "padding", Some("12px"));
        doc.set_style_property(FakeDocument::WRAPPER, "background", Some("black"));
        doc.set_scroll_offset(FakeDocument::SCROLLER, (0.0, 40.0));
        let before = doc.style_map();

        let snapshotter = OverlaySnapshotter::new(2, KeyColor::DEFAULT);
        snapshotter.capture_overlay(&doc, canvas()).await;

        let during = doc.styles_at_raster().pop().unwrap();
        assert_eq!(during.get(&(FakeDocument::ROOT, "padding".to_string())).map(String::as_str), Some("0"));
        assert_eq!(during.get(&(FakeDocument::ROOT, "width".to_string())).map(String::as_str), Some("36px"));
        assert_eq!(
            during.get(&(FakeDocument::WRAPPER, "background".to_string())).map(String::as_str),
            Some("rgb(1, 2, 3)")
        );
        assert_eq!(doc.scroll_at_raster(FakeDocument::SCROLLER), Some((0.0, 0.0)));

        assert_eq!(doc.style_map(), before);
        assert_eq!(doc.scroll_offset(FakeDocument::SCROLLER), (0.0, 40.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_raster_failure_restores_styles_and_returns_blank() {
        let doc = FakeDocument::new(36.0, 64.0);
        doc.set_style_property(FakeDocument::ROOT, "margin", Some("4px"));
        doc.fail_rasterization(true);
        let before = doc.style_map();

        let snapshotter = OverlaySnapshotter::new(2, KeyColor::DEFAULT);
        assert!(snapshotter.try_capture_overlay(&doc, canvas()).await.is_err());
        assert_eq!(doc.style_map(), before);

        let overlay = snapshotter.capture_overlay(&doc, canvas()).await;
        assert!(overlay.blank);
        assert_eq!(overlay.size(), canvas());
        assert!(overlay.image.pixels().all(|p| p.0[3] == 0));
        assert_eq!(doc.style_map(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_mismatch_is_kept() {
        let doc = FakeDocument::new(36.0, 64.0);
        doc.skew_raster_size(6);
        let snapshotter = OverlaySnapshotter::new(2, KeyColor::DEFAULT);
        let overlay = snapshotter.capture_overlay(&doc, canvas()).await;
        assert_eq!(overlay.size(), CanvasSize::new(78, 134));
        assert!(!overlay.blank);
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_capture_keeps_background() {
        let doc = FakeDocument::new(36.0, 64.0);
        let snapshotter = OverlaySnapshotter::new(2, KeyColor::DEFAULT);
        let white = Rgba([255, 255, 255, 255]);
        snapshotter.capture_still(&doc, canvas(), Some(white)).await.unwrap();

        let options = doc.last_raster_options().unwrap();
        assert_eq!(options.background, Some(white));
        assert!(options.exclude.is_empty());
        let during = doc.styles_at_raster().pop().unwrap();
        assert!(!during.contains_key(&(FakeDocument::WRAPPER, "background".to_string())));
    }

    #[tokio::test]
    async fn test_empty_canvas_rejected() {
        let doc = FakeDocument::new(36.0, 64.0);
        let snapshotter = OverlaySnapshotter::new(2, KeyColor::DEFAULT);
        let err = snapshotter
            .try_capture_overlay(&doc, CanvasSize::new(0, 128))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmockError::Capture { .. }));
        assert_eq!(doc.raster_calls(), 0);
    }
}
