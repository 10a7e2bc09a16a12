//! Shared utilities: geometry and error types

pub mod errors;
pub mod geometry;

pub use errors::OverlayError;
pub use geometry::{Point, Rect, Size};
