//! Animated call-to-action stage schedule.
//!
//! Some placements reveal their CTA in steps: a minimal indicator, then an
//! expanded button, then (optionally) the button plus a content card. The
//! export captures one overlay per stage and switches between them by
//! playback time.

use admock_common::config::ExportSettings;
use admock_preview_model::platform::{Placement, Platform};
use serde::{Deserialize, Serialize};

/// One step of the CTA reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CtaStage {
    /// Minimal indicator.
    Indicator = 0,
    /// Expanded button.
    Expanded = 1,
    /// Button plus content card.
    Card = 2,
}

impl CtaStage {
    pub const ALL: [CtaStage; 3] = [CtaStage::Indicator, CtaStage::Expanded, CtaStage::Card];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Stage the UI settles on when no export is driving it.
    pub fn resting(show_card: bool) -> Self {
        if show_card {
            CtaStage::Card
        } else {
            CtaStage::Expanded
        }
    }
}

impl From<CtaStage> for u8 {
    fn from(stage: CtaStage) -> Self {
        stage as u8
    }
}

impl TryFrom<u8> for CtaStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CtaStage::Indicator),
            1 => Ok(CtaStage::Expanded),
            2 => Ok(CtaStage::Card),
            other => Err(format!("invalid CTA stage {other}")),
        }
    }
}

/// Whether a platform/placement animates its CTA and needs per-stage overlays.
pub fn requires_staged_cta(platform: Platform, _placement: &Placement) -> bool {
    matches!(platform, Platform::Tiktok)
}

/// Maps playback time to the CTA stage visible at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSchedule {
    /// Time at which the button expands.
    pub expand_at_secs: f64,
    /// Time at which the card appears (if enabled).
    pub card_at_secs: f64,
    pub show_card: bool,
}

impl StageSchedule {
    pub fn new(thresholds_secs: [f64; 2], show_card: bool) -> Self {
        Self {
            expand_at_secs: thresholds_secs[0],
            card_at_secs: thresholds_secs[1],
            show_card,
        }
    }

    pub fn from_settings(settings: &ExportSettings, show_card: bool) -> Self {
        Self::new(settings.stage_thresholds_secs, show_card)
    }

    /// Stage visible at `time_secs`. Non-decreasing in time; never `Card`
    /// unless the card is enabled.
    pub fn stage_at(&self, time_secs: f64) -> CtaStage {
        if time_secs >= self.card_at_secs && self.show_card {
            CtaStage::Card
        } else if time_secs >= self.expand_at_secs {
            CtaStage::Expanded
        } else {
            // NaN and negative times land here.
            CtaStage::Indicator
        }
    }
}

impl Default for StageSchedule {
    fn default() -> Self {
        Self::new([1.5, 3.0], false)
    }
}
