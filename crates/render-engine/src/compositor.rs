//! Frame compositor: video under overlay, one canvas per tick.

use admock_capture_engine::stages::OverlaySet;
use admock_preview_model::geometry::{CanvasSize, DrawArea, DrawRect};
use admock_processing_core::geometry::fit_rect;
use image::RgbaImage;

use crate::canvas::Canvas;

/// Composes every recorded frame from the live video and the overlay set.
pub struct FrameCompositor {
    canvas: Canvas,
    area: DrawArea,
    draw_rect: DrawRect,
    overlays: OverlaySet,
}

impl FrameCompositor {
    /// `video_size` is the intrinsic size used for the fit; decoded frames of
    /// any resolution are scaled into the same rectangle.
    pub fn new(
        canvas: CanvasSize,
        area: DrawArea,
        video_size: (u32, u32),
        overlays: OverlaySet,
    ) -> Self {
        let draw_rect = fit_rect(
            &area.rect,
            area.fit,
            video_size.0 as f64,
            video_size.1 as f64,
        );
        tracing::debug!(
            canvas_width = canvas.width,
            canvas_height = canvas.height,
            draw_x = draw_rect.draw_x,
            draw_y = draw_rect.draw_y,
            draw_width = draw_rect.draw_width,
            draw_height = draw_rect.draw_height,
            overlays = overlays.len(),
            "Compositor ready"
        );
        Self {
            canvas: Canvas::new(canvas),
            area,
            draw_rect,
            overlays,
        }
    }

    pub fn area(&self) -> &DrawArea {
        &self.area
    }

    pub fn draw_rect(&self) -> &DrawRect {
        &self.draw_rect
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    /// Paint one frame: black, then the video clipped to the draw area,
    /// then the overlay for `time_secs` over the full canvas.
    pub fn compose(&mut self, frame: &RgbaImage, time_secs: f64) -> &RgbaImage {
        self.canvas.clear();
        self.canvas
            .draw_image(frame, &self.draw_rect, &self.area.rect);
        self.canvas
            .draw_overlay(&self.overlays.select(time_secs).image);
        self.canvas.image()
    }
}
