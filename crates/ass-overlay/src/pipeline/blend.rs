//! Reference per-pixel blend pipeline

use crate::layer::{ProcessedImage, RawLayer};
use crate::pipeline::{buffer_size, resolve_straight_alpha, ImagePipeline};
use crate::utils::geometry::Rect;

/// Reference compositing pipeline.
///
/// Blends every layer, in list order, into a single premultiplied float
/// accumulation buffer sized to the bounding rect using the standard "over"
/// operator, then un-premultiplies into straight-alpha RGBA. O(total layer
/// pixels), one allocation for the accumulator.
#[derive(Debug, Default)]
pub struct BlendPipeline;

impl BlendPipeline {
    /// Create the reference blend pipeline.
    pub fn new() -> Self {
        Self
    }
}

impl ImagePipeline for BlendPipeline {
    fn process(&self, layers: &[RawLayer], bounding_rect: Rect) -> Option<ProcessedImage> {
        if layers.is_empty() {
            return None;
        }
        let (width, height) = buffer_size(bounding_rect)?;

        let mut buf = vec![0f32; width * height * 4];
        for layer in layers {
            blend_layer(&mut buf, width, height, layer, bounding_rect);
        }

        let data = resolve_straight_alpha(&buf, width, height);
        ProcessedImage::new(data, width as u32, height as u32, bounding_rect)
    }
}

/// Blend one layer into the accumulation buffer with the "over" operator.
pub(crate) fn blend_layer(
    buf: &mut [f32],
    width: usize,
    height: usize,
    layer: &RawLayer,
    bounding_rect: Rect,
) {
    if layer.is_blank() {
        return;
    }

    let layer_w = layer.width as usize;
    let layer_h = layer.height as usize;
    // Malformed strides below the row width would read past row data.
    let stride = (layer.stride as usize).max(layer_w);

    let origin_x = (layer.dst_x - bounding_rect.min_x() as i32) as usize;
    let origin_y = (layer.dst_y - bounding_rect.min_y() as i32) as usize;
    debug_assert!(origin_x + layer_w <= width);
    debug_assert!(origin_y + layer_h <= height);

    let layer_alpha = f32::from(layer.alpha()) / 255.0;
    let r = f32::from(layer.red()) / 255.0;
    let g = f32::from(layer.green()) / 255.0;
    let b = f32::from(layer.blue()) / 255.0;

    for row in 0..layer_h.min(height.saturating_sub(origin_y)) {
        let bitmap_row = &layer.bitmap[row * stride..row * stride + layer_w];
        let buf_row_start = ((origin_y + row) * width + origin_x) * 4;
        let buf_row = &mut buf[buf_row_start..buf_row_start + layer_w * 4];

        for (coverage, pixel) in bitmap_row.iter().zip(buf_row.chunks_exact_mut(4)) {
            let pix_alpha = f32::from(*coverage) * layer_alpha / 255.0;
            let inv_alpha = 1.0 - pix_alpha;

            pixel[0] = r * pix_alpha + pixel[0] * inv_alpha;
            pixel[1] = g * pix_alpha + pixel[1] * inv_alpha;
            pixel[2] = b * pix_alpha + pixel[2] * inv_alpha;
            pixel[3] = pix_alpha + pixel[3] * inv_alpha;
        }
    }
}
