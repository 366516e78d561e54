//! The preview document as seen by the export engine.
//!
//! The editor owns the real document tree. The engine only needs a narrow
//! view of it: find the video, read and write inline styles, scroll, measure,
//! and rasterize. Hosts implement [`PreviewDocument`] over whatever renders
//! the preview.

use std::sync::Arc;
use std::time::Duration;

use admock_common::error::AdmockResult;
use admock_preview_model::geometry::ElementBounds;
use image::{Rgba, RgbaImage};

use crate::video::VideoElement;

/// Boolean attribute marking elements whose background must not appear in
/// exported overlays (video wrappers, letterbox fills).
pub const HIDE_BACKGROUND_ATTR: &str = "data-hide-bg-export";

/// Opaque handle to an element in the preview document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// The preview's video element: where it sits in the tree and how to drive it.
#[derive(Clone)]
pub struct VideoHandle {
    pub element: ElementId,
    pub media: Arc<dyn VideoElement>,
}

impl std::fmt::Debug for VideoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoHandle")
            .field("element", &self.element)
            .finish_non_exhaustive()
    }
}

/// Parameters for one rasterization of the preview root.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizeOptions {
    /// Layout width of the root in CSS pixels.
    pub css_width: f64,
    /// Layout height of the root in CSS pixels.
    pub css_height: f64,
    /// Device pixel ratio; the bitmap is `css × scale` pixels.
    pub scale: u32,
    /// Fill behind the root. `None` leaves unpainted pixels transparent.
    pub background: Option<Rgba<u8>>,
    /// Elements (and their subtrees) left out of the raster.
    pub exclude: Vec<ElementId>,
}

/// Narrow, host-implemented view of the preview document.
///
/// Style and scroll accessors are synchronous so that restoration can run
/// from `Drop`. Implementations use interior mutability.
#[async_trait::async_trait]
pub trait PreviewDocument: Send + Sync {
    /// Root of the preview subtree.
    fn root(&self) -> ElementId;

    /// The single video element inside the preview, if any.
    fn find_video(&self) -> Option<VideoHandle>;

    /// Elements carrying a boolean attribute.
    fn elements_with_attribute(&self, name: &str) -> Vec<ElementId>;

    /// Descendants of the root whose content overflows and can scroll.
    fn scrollable_descendants(&self) -> Vec<ElementId>;

    /// Inline style value, or `None` when the property is not set inline.
    fn style_property(&self, element: ElementId, property: &str) -> Option<String>;

    /// Set (`Some`) or remove (`None`) an inline style property.
    fn set_style_property(&self, element: ElementId, property: &str, value: Option<&str>);

    /// Current `(left, top)` scroll offset.
    fn scroll_offset(&self, element: ElementId) -> (f64, f64);

    fn set_scroll_offset(&self, element: ElementId, offset: (f64, f64));

    /// On-screen bounding box, `None` when the element is detached.
    fn bounding_box(&self, element: ElementId) -> Option<ElementBounds>;

    /// Render the root subtree to a bitmap.
    async fn rasterize(&self, options: &RasterizeOptions) -> AdmockResult<RgbaImage>;

    /// Resolve once style changes have been laid out and painted.
    ///
    /// Hosts with a real paint signal (two animation-frame callbacks) should
    /// override this. The default sleeps for `fallback`.
    async fn wait_for_paint(&self, fallback: Duration) {
        tokio::time::sleep(fallback).await;
    }
}
