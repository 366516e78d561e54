//! AdMock Common Utilities
//!
//! Shared infrastructure for all AdMock crates:
//! - Error taxonomy and result alias
//! - Frame cadence and timestamp utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
