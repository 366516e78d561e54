//! Canvas-space geometry types.
//!
//! `Rect`, `DrawArea`, and `DrawRect` are in canvas pixels. `ElementBounds`
//! is in CSS pixels as reported by the preview document.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the export canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Canvas for a CSS-pixel preview rendered at `pixel_ratio`.
    pub fn from_css(css_width: f64, css_height: f64, pixel_ratio: u32) -> Self {
        Self {
            width: (css_width * pixel_ratio as f64).round().max(0.0) as u32,
            height: (css_height * pixel_ratio as f64).round().max(0.0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` is within `tolerance` pixels on both axes.
    pub fn approx_eq(&self, other: CanvasSize, tolerance: u32) -> bool {
        self.width.abs_diff(other.width) <= tolerance
            && self.height.abs_diff(other.height) <= tolerance
    }

    pub fn full_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn aspect(&self) -> f64 {
        self.w / self.h
    }

    /// True when the rectangle has no drawable area (or is NaN).
    pub fn is_degenerate(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0) || !self.x.is_finite() || !self.y.is_finite()
    }

    /// Intersect with `bounds`; `None` when nothing overlaps.
    pub fn intersect(&self, bounds: &Rect) -> Option<Rect> {
        let x0 = self.x.max(bounds.x);
        let y0 = self.y.max(bounds.y);
        let x1 = self.right().min(bounds.right());
        let y1 = self.bottom().min(bounds.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Whether `other` lies entirely inside this rectangle (with epsilon).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

/// How the video is scaled into its target area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fit entirely inside, letterboxing the remainder.
    Contain,
    /// Fill completely, cropping the overflow.
    Cover,
}

/// Where and how the live video is blitted each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawArea {
    pub rect: Rect,
    pub fit: FitMode,
}

/// Final destination rectangle for the video frame.
///
/// For `Cover` this may extend past the draw area; the compositor clips it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawRect {
    pub draw_x: f64,
    pub draw_y: f64,
    pub draw_width: f64,
    pub draw_height: f64,
}

impl DrawRect {
    pub fn as_rect(&self) -> Rect {
        Rect::new(self.draw_x, self.draw_y, self.draw_width, self.draw_height)
    }
}

impl From<Rect> for DrawRect {
    fn from(rect: Rect) -> Self {
        Self {
            draw_x: rect.x,
            draw_y: rect.y,
            draw_width: rect.w,
            draw_height: rect.h,
        }
    }
}

/// On-screen bounding box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Express `self` as fractions of `container`, or `None` if the
    /// container has no area.
    pub fn relative_to(&self, container: &ElementBounds) -> Option<Rect> {
        if !(container.width > 0.0 && container.height > 0.0) {
            return None;
        }
        Some(Rect::new(
            (self.left - container.left) / container.width,
            (self.top - container.top) / container.height,
            self.width / container.width,
            self.height / container.height,
        ))
    }
}
