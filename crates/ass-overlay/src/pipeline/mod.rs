//! Pixel compositing pipelines
//!
//! A pipeline turns the per-frame list of [`RawLayer`]s into one combined
//! [`ProcessedImage`]. Two interchangeable implementations exist:
//! [`BlendPipeline`], the reference per-pixel blend, and
//! [`AcceleratePipeline`], which palettizes layers into translated buffers
//! and composes them with row parallelism. Both produce the same bytes for
//! the same input.

#[cfg(feature = "accelerate")]
mod accelerate;
mod blend;

#[cfg(feature = "accelerate")]
pub use accelerate::AcceleratePipeline;
pub use blend::BlendPipeline;

use crate::layer::{ProcessedImage, RawLayer};
use crate::utils::geometry::Rect;

/// Empirical lower clamp guard: accumulated values at or below this map to 0.
pub(crate) const MIN_UINT8_CAST: f32 = 0.9 / 255.0;

/// Empirical upper clamp guard: un-premultiplied values at or above this map
/// to exactly 255, absorbing float rounding at the top end.
pub(crate) const MAX_UINT8_CAST: f32 = 255.9 / 255.0;

/// Compositing pipeline turning raw layers into a processed image.
///
/// `bounding_rect` must equal [`crate::layer::bounding_rect`] of `layers`.
/// Returns `None` for an empty layer list or a zero-area bounding rect; an
/// empty subtitle frame is a normal outcome, not an error.
pub trait ImagePipeline: Send {
    /// Composite `layers` into a single image placed at `bounding_rect`.
    fn process(&self, layers: &[RawLayer], bounding_rect: Rect) -> Option<ProcessedImage>;
}

/// Default pipeline for new renderer sessions.
#[cfg(feature = "accelerate")]
pub fn default_pipeline() -> Box<dyn ImagePipeline> {
    Box::new(AcceleratePipeline::new())
}

/// Default pipeline for new renderer sessions.
#[cfg(not(feature = "accelerate"))]
pub fn default_pipeline() -> Box<dyn ImagePipeline> {
    Box::new(BlendPipeline::new())
}

/// Map a float channel value to 8 bits with the empirical clamp guards.
pub(crate) fn clamp_uint8(value: f32) -> u8 {
    if value > MIN_UINT8_CAST {
        if value < MAX_UINT8_CAST {
            (value * 255.0) as u8
        } else {
            255
        }
    } else {
        0
    }
}

/// Convert a premultiplied float RGBA accumulation buffer into straight-alpha
/// 8-bit RGBA, alpha last.
///
/// Pixels whose accumulated alpha does not clear [`MIN_UINT8_CAST`] come out
/// fully transparent instead of being un-premultiplied by a near-zero alpha.
pub(crate) fn resolve_straight_alpha(buf: &[f32], width: usize, height: usize) -> Vec<u8> {
    debug_assert_eq!(buf.len(), width * height * 4);
    let mut out = vec![0u8; width * height * 4];

    for (pixel, chunk) in buf.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        let alpha = pixel[3];
        if alpha > MIN_UINT8_CAST {
            chunk[0] = clamp_uint8(pixel[0] / alpha);
            chunk[1] = clamp_uint8(pixel[1] / alpha);
            chunk[2] = clamp_uint8(pixel[2] / alpha);
            chunk[3] = clamp_uint8(alpha);
        }
    }

    out
}

/// Integer buffer dimensions of a bounding rect, or `None` if degenerate.
pub(crate) fn buffer_size(bounding_rect: Rect) -> Option<(usize, usize)> {
    let integral = bounding_rect.integral();
    let width = integral.width() as usize;
    let height = integral.height() as usize;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
