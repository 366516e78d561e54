//! AdMock Processing Core
//!
//! Pure algorithms behind the video export:
//! - **Key Color:** Punch the reserved transparency marker out of overlays
//! - **Geometry:** Resolve the video draw area and fit rectangle per placement
//! - **Stages:** Map playback time to the animated CTA stage
//! - **Frame Budget:** Stop conditions and progress for the render loop
//!
//! This crate is pure computation with no I/O or collaborators.
//! All inputs are data; all outputs are data.

pub mod frame_budget;
pub mod geometry;
pub mod key_color;
pub mod stages;

pub use frame_budget::{FrameBudget, StopReason};
pub use geometry::{fit_rect, resolve_draw_area, resolve_fit_mode, AreaContext, VideoLayout};
pub use key_color::{punch_key_color, KeyColor};
pub use stages::{requires_staged_cta, CtaStage, StageSchedule};
