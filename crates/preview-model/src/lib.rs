//! AdMock Preview Model
//!
//! Defines the data contracts shared by the export pipeline:
//! - **Platform:** Which social network a preview imitates, and its placements
//! - **Request:** What the user asked to export and how the result is named
//! - **Geometry:** Canvas-space rectangles, fit modes, and element bounds
//! - **Status:** Progress and lifecycle reporting for the host UI
//!
//! Geometry is expressed in canvas pixels (device-pixel-doubled) unless a
//! type says otherwise.

pub mod geometry;
pub mod platform;
pub mod request;
pub mod status;

pub use geometry::*;
pub use platform::*;
pub use request::*;
pub use status::*;
