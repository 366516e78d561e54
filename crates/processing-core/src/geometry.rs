//! Geometry resolver: where the live video lands on the export canvas.
//!
//! Resolution happens once per export. The placement rule table decides the
//! target area and fit mode; `fit_rect` then maps the video's native aspect
//! ratio into that area.

use admock_preview_model::geometry::{CanvasSize, DrawArea, DrawRect, ElementBounds, FitMode, Rect};
use admock_preview_model::platform::{Placement, Platform};

/// Top of the reel band, in CSS pixels (header chrome above the video).
pub const REEL_TOP_OFFSET_CSS_PX: f64 = 56.0;

/// Height of the reel band as a fraction of the canvas height.
pub const REEL_HEIGHT_FRACTION: f64 = 0.72;

/// How a placement carves its video area out of the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaRule {
    /// The whole canvas.
    FullCanvas,
    /// Full width, between a fixed top offset and a fraction of the height.
    ReelBand {
        top_offset_css_px: f64,
        height_fraction: f64,
    },
    /// Wherever the video element currently sits inside the preview.
    VideoBounds,
}

/// One row of the placement table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRule {
    pub area: AreaRule,
    pub fit: FitMode,
}

const REEL_BAND: AreaRule = AreaRule::ReelBand {
    top_offset_css_px: REEL_TOP_OFFSET_CSS_PX,
    height_fraction: REEL_HEIGHT_FRACTION,
};

/// Per-placement overrides. Anything not listed uses the platform default.
const PLACEMENT_OVERRIDES: &[(Platform, &str, PlacementRule)] = &[
    (
        Platform::Facebook,
        Placement::REELS,
        PlacementRule {
            area: REEL_BAND,
            fit: FitMode::Cover,
        },
    ),
    (
        Platform::Facebook,
        Placement::SINGLE,
        PlacementRule {
            area: AreaRule::VideoBounds,
            fit: FitMode::Cover,
        },
    ),
    (
        Platform::Instagram,
        Placement::REELS,
        PlacementRule {
            area: REEL_BAND,
            fit: FitMode::Cover,
        },
    ),
];

/// Platform default: full-bleed feeds cover, letterboxing platforms contain.
fn platform_default(platform: Platform) -> PlacementRule {
    let fit = match platform {
        Platform::Facebook | Platform::Instagram | Platform::Tiktok => FitMode::Cover,
        Platform::Linkedin => FitMode::Contain,
    };
    PlacementRule {
        area: AreaRule::FullCanvas,
        fit,
    }
}

/// Look up the rule for a platform/placement pair.
pub fn placement_rule(platform: Platform, placement: &Placement) -> PlacementRule {
    PLACEMENT_OVERRIDES
        .iter()
        .find(|(p, name, _)| *p == platform && placement.is(name))
        .map(|(_, _, rule)| *rule)
        .unwrap_or_else(|| platform_default(platform))
}

/// Fit mode for a platform/placement pair.
pub fn resolve_fit_mode(platform: Platform, placement: &Placement) -> FitMode {
    placement_rule(platform, placement).fit
}

/// Live layout information needed by `AreaRule::VideoBounds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoLayout {
    /// Bounding box of the preview container.
    pub container: ElementBounds,
    /// Bounding box of the video element.
    pub video: ElementBounds,
}

/// Resolution context shared by every rule.
#[derive(Debug, Clone, Copy)]
pub struct AreaContext {
    pub canvas: CanvasSize,
    pub pixel_ratio: u32,
    pub layout: Option<VideoLayout>,
}

/// Compute the target area and fit for the video on this canvas.
pub fn resolve_draw_area(
    ctx: &AreaContext,
    platform: Platform,
    placement: &Placement,
) -> DrawArea {
    let rule = placement_rule(platform, placement);
    let full = ctx.canvas.full_rect();

    let rect = match rule.area {
        AreaRule::FullCanvas => full,
        AreaRule::ReelBand {
            top_offset_css_px,
            height_fraction,
        } => {
            let top = top_offset_css_px * ctx.pixel_ratio as f64;
            let band = Rect::new(0.0, top, full.w, full.h * height_fraction);
            band.intersect(&full).unwrap_or(full)
        }
        AreaRule::VideoBounds => video_bounds_rect(ctx, full),
    };

    tracing::debug!(
        %platform,
        %placement,
        fit = ?rule.fit,
        x = rect.x,
        y = rect.y,
        w = rect.w,
        h = rect.h,
        "Resolved draw area"
    );

    DrawArea {
        rect,
        fit: rule.fit,
    }
}

fn video_bounds_rect(ctx: &AreaContext, full: Rect) -> Rect {
    let Some(layout) = ctx.layout else {
        tracing::warn!("Video bounds unavailable; using full canvas");
        return full;
    };
    let Some(rel) = layout.video.relative_to(&layout.container) else {
        tracing::warn!("Preview container has no area; using full canvas");
        return full;
    };
    let scaled = Rect::new(rel.x * full.w, rel.y * full.h, rel.w * full.w, rel.h * full.h);
    match scaled.intersect(&full) {
        Some(rect) if !rect.is_degenerate() => rect,
        _ => {
            tracing::warn!("Video lies outside the preview; using full canvas");
            full
        }
    }
}

/// Map a `video_width × video_height` frame into `area` according to `fit`.
///
/// Degenerate video dimensions fall back to stretching over the area.
pub fn fit_rect(area: &Rect, fit: FitMode, video_width: f64, video_height: f64) -> DrawRect {
    if !(video_width > 0.0 && video_height > 0.0) || area.is_degenerate() {
        return DrawRect::from(*area);
    }

    let video_aspect = video_width / video_height;
    let area_aspect = area.aspect();
    // Contain is limited by the wider side, cover by the narrower one.
    let width_limited = match fit {
        FitMode::Contain => video_aspect > area_aspect,
        FitMode::Cover => video_aspect <= area_aspect,
    };

    let (draw_width, draw_height) = if width_limited {
        (area.w, area.w / video_aspect)
    } else {
        (area.h * video_aspect, area.h)
    };

    let (cx, cy) = area.center();
    DrawRect {
        draw_x: cx - draw_width / 2.0,
        draw_y: cy - draw_height / 2.0,
        draw_width,
        draw_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx(width: u32, height: u32) -> AreaContext {
        AreaContext {
            canvas: CanvasSize::new(width, height),
            pixel_ratio: 2,
            layout: None,
        }
    }

    #[test]
    fn test_platform_defaults() {
        let feed = Placement::new("feed");
        assert_eq!(resolve_fit_mode(Platform::Facebook, &feed), FitMode::Cover);
        assert_eq!(resolve_fit_mode(Platform::Linkedin, &feed), FitMode::Contain);

        let area = resolve_draw_area(&ctx(720, 1280), Platform::Instagram, &feed);
        assert_eq!(area.rect, Rect::new(0.0, 0.0, 720.0, 1280.0));
        assert_eq!(area.fit, FitMode::Cover);
    }

    #[test]
    fn test_reel_band() {
        let area = resolve_draw_area(&ctx(720, 1280), Platform::Instagram, &Placement::new("reels"));
        assert_eq!(area.rect.x, 0.0);
        assert_eq!(area.rect.y, 112.0);
        assert_eq!(area.rect.w, 720.0);
        assert!((area.rect.h - 1280.0 * REEL_HEIGHT_FRACTION).abs() < 1e-9);
    }

    #[test]
    fn test_reel_band_clamped_to_short_canvas() {
        let area = resolve_draw_area(&ctx(100, 120), Platform::Facebook, &Placement::new("reels"));
        assert!(area.rect.bottom() <= 120.0);
        assert_eq!(area.rect.y, 112.0);
    }

    #[test]
    fn test_video_bounds_scaled_to_canvas() {
        let mut context = ctx(720, 1280);
        context.layout = Some(VideoLayout {
            container: ElementBounds::new(10.0, 20.0, 360.0, 640.0),
            video: ElementBounds::new(10.0, 180.0, 360.0, 202.5),
        });
        let area = resolve_draw_area(&context, Platform::Facebook, &Placement::new("single"));
        assert!((area.rect.x - 0.0).abs() < 1e-9);
        assert!((area.rect.y - 320.0).abs() < 1e-9);
        assert!((area.rect.w - 720.0).abs() < 1e-9);
        assert!((area.rect.h - 405.0).abs() < 1e-9);
    }

    #[test]
    fn test_video_bounds_missing_falls_back_to_full() {
        let area = resolve_draw_area(&ctx(720, 1280), Platform::Facebook, &Placement::new("single"));
        assert_eq!(area.rect, Rect::new(0.0, 0.0, 720.0, 1280.0));
    }

    #[test]
    fn test_unknown_placement_uses_platform_default() {
        let rule = placement_rule(Platform::Tiktok, &Placement::new("topview"));
        assert_eq!(rule.area, AreaRule::FullCanvas);
        assert_eq!(rule.fit, FitMode::Cover);
    }

    #[test]
    fn test_contain_landscape_in_portrait() {
        let area = Rect::new(0.0, 0.0, 720.0, 1280.0);
        let rect = fit_rect(&area, FitMode::Contain, 1920.0, 1080.0);
        assert_eq!(rect.draw_width, 720.0);
        assert!((rect.draw_height - 405.0).abs() < 1e-9);
        assert!((rect.draw_y - 437.5).abs() < 1e-9);
        assert_eq!(rect.draw_x, 0.0);
    }

    #[test]
    fn test_cover_landscape_in_portrait() {
        let area = Rect::new(0.0, 0.0, 720.0, 1280.0);
        let rect = fit_rect(&area, FitMode::Cover, 1920.0, 1080.0);
        assert_eq!(rect.draw_height, 1280.0);
        assert!((rect.draw_width - 2275.555_555).abs() < 1e-3);
        assert!((rect.draw_x + (rect.draw_width - 720.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_matching_aspect_fills_exactly() {
        let area = Rect::new(0.0, 0.0, 720.0, 1280.0);
        for fit in [FitMode::Contain, FitMode::Cover] {
            let rect = fit_rect(&area, fit, 1080.0, 1920.0);
            assert!((rect.draw_width - 720.0).abs() < 1e-9);
            assert!((rect.draw_height - 1280.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_degenerate_video_uses_area() {
        let area = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(fit_rect(&area, FitMode::Cover, 0.0, 10.0), DrawRect::from(area));
    }

    fn arb_area() -> impl Strategy<Value = Rect> {
        (0.0..500.0f64, 0.0..500.0f64, 1.0..2000.0f64, 1.0..2000.0f64)
            .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
    }

    proptest! {
        #[test]
        fn prop_contain_fits_inside_and_centers(
            area in arb_area(),
            vw in 1.0..4000.0f64,
            vh in 1.0..4000.0f64,
        ) {
            let rect = fit_rect(&area, FitMode::Contain, vw, vh);
            let aspect = vw / vh;
            let tol = 1e-6 * area.w.max(area.h).max(1.0);

            if aspect > area.w / area.h {
                prop_assert!((rect.draw_width - area.w).abs() < tol);
                prop_assert!((rect.draw_height - area.w / aspect).abs() < tol);
            } else {
                prop_assert!((rect.draw_height - area.h).abs() < tol);
                prop_assert!((rect.draw_width - area.h * aspect).abs() < tol);
            }
            prop_assert!(area.contains_rect(&rect.as_rect()));
            let (acx, acy) = area.center();
            let (rcx, rcy) = rect.as_rect().center();
            prop_assert!((acx - rcx).abs() < tol);
            prop_assert!((acy - rcy).abs() < tol);
        }

        #[test]
        fn prop_cover_fills_area(
            area in arb_area(),
            vw in 1.0..4000.0f64,
            vh in 1.0..4000.0f64,
        ) {
            let rect = fit_rect(&area, FitMode::Cover, vw, vh);
            let tol = 1e-6 * area.w.max(area.h).max(1.0);

            prop_assert!(rect.draw_width >= area.w - tol);
            prop_assert!(rect.draw_height >= area.h - tol);
            // Only one axis overflows.
            let exact_w = (rect.draw_width - area.w).abs() < tol;
            let exact_h = (rect.draw_height - area.h).abs() < tol;
            prop_assert!(exact_w || exact_h);
            let (acx, acy) = area.center();
            let (rcx, rcy) = rect.as_rect().center();
            prop_assert!((acx - rcx).abs() < tol);
            prop_assert!((acy - rcy).abs() < tol);
        }
    }
}
