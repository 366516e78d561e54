//! Multi-stage overlay capture for animated CTAs.

use admock_preview_model::geometry::CanvasSize;
use admock_processing_core::stages::{CtaStage, StageSchedule};

use crate::dom::PreviewDocument;
use crate::snapshot::{OverlayBitmap, OverlaySnapshotter};

/// Drives the preview's animated call-to-action.
#[async_trait::async_trait]
pub trait StageController: Send + Sync {
    /// Force the CTA into `stage`. The change becomes visible on the next
    /// paint.
    async fn set_animation_stage(&self, stage: CtaStage);
}

/// Overlays consumed by the compositor.
#[derive(Debug, Clone)]
pub enum OverlaySet {
    /// Static overlay for the whole export.
    Single(OverlayBitmap),
    /// One overlay per CTA stage, picked by playback time.
    Staged {
        overlays: [OverlayBitmap; 3],
        schedule: StageSchedule,
    },
}

impl OverlaySet {
    /// Overlay visible at `time_secs`.
    pub fn select(&self, time_secs: f64) -> &OverlayBitmap {
        match self {
            OverlaySet::Single(overlay) => overlay,
            OverlaySet::Staged { overlays, schedule } => {
                &overlays[schedule.stage_at(time_secs).index()]
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OverlaySet::Single(_) => 1,
            OverlaySet::Staged { overlays, .. } => overlays.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, OverlaySet::Staged { .. })
    }
}

/// Capture one overlay per CTA stage.
///
/// The card stage is only driven when `schedule.show_card` is set; otherwise
/// its slot repeats the expanded overlay. A stage whose capture fails gets
/// `fallback` in its slot. The CTA is left on its resting stage.
pub async fn capture_stage_overlays<D, S>(
    doc: &D,
    controller: &S,
    snapshotter: &OverlaySnapshotter,
    canvas: CanvasSize,
    schedule: StageSchedule,
    fallback: &OverlayBitmap,
) -> OverlaySet
where
    D: PreviewDocument + ?Sized,
    S: StageController + ?Sized,
{
    let indicator =
        capture_one(doc, controller, snapshotter, canvas, CtaStage::Indicator, fallback).await;
    let expanded =
        capture_one(doc, controller, snapshotter, canvas, CtaStage::Expanded, fallback).await;
    let card = if schedule.show_card {
        capture_one(doc, controller, snapshotter, canvas, CtaStage::Card, fallback).await
    } else {
        expanded.clone()
    };

    controller
        .set_animation_stage(CtaStage::resting(schedule.show_card))
        .await;

    tracing::info!(show_card = schedule.show_card, "Captured staged CTA overlays");

    OverlaySet::Staged {
        overlays: [indicator, expanded, card],
        schedule,
    }
}

async fn capture_one<D, S>(
    doc: &D,
    controller: &S,
    snapshotter: &OverlaySnapshotter,
    canvas: CanvasSize,
    stage: CtaStage,
    fallback: &OverlayBitmap,
) -> OverlayBitmap
where
    D: PreviewDocument + ?Sized,
    S: StageController + ?Sized,
{
    controller.set_animation_stage(stage).await;
    match snapshotter.try_capture_overlay(doc, canvas).await {
        Ok(overlay) => overlay,
        Err(e) => {
            tracing::warn!(?stage, error = %e, "Stage capture failed; using default overlay");
            fallback.clone()
        }
    }
}
