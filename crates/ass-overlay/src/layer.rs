//! Raw glyph layers and processed frame images
//!
//! The layout engine hands back one frame as a chain of monochrome alpha-mask
//! layers. The chain is materialized into a flat list as soon as it crosses
//! the engine boundary ([`crate::library::RenderResult`]); everything in this
//! module operates on the flat list.

use smallvec::SmallVec;

use crate::utils::geometry::{Rect, Size};

/// Per-frame layer list. Frames rarely exceed a handful of layers.
pub type LayerList = SmallVec<[RawLayer; 8]>;

/// One rasterized glyph layer produced by the layout engine.
///
/// `bitmap` holds one alpha-coverage byte per pixel, rows `stride` bytes
/// apart. `color` packs RGB plus *inverse* alpha in the low byte, in engine
/// order: `0xRRGGBBAA` where `AA` is transparency, not opacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLayer {
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Bytes per bitmap row; at least `width` for well-formed layers
    pub stride: u32,
    /// Destination origin x, in render-canvas pixels
    pub dst_x: i32,
    /// Destination origin y, in render-canvas pixels
    pub dst_y: i32,
    /// Packed `0xRRGGBBAA` color, `AA` = inverse alpha
    pub color: u32,
    /// `width * height` coverage bytes laid out with `stride`
    pub bitmap: Vec<u8>,
}

impl RawLayer {
    /// Layer opacity derived from the packed color: `255 - (color & 0xFF)`.
    pub fn alpha(&self) -> u8 {
        255 - (self.color & 0xFF) as u8
    }

    /// Red component of the packed color.
    pub fn red(&self) -> u8 {
        ((self.color >> 24) & 0xFF) as u8
    }

    /// Green component of the packed color.
    pub fn green(&self) -> u8 {
        ((self.color >> 16) & 0xFF) as u8
    }

    /// Blue component of the packed color.
    pub fn blue(&self) -> u8 {
        ((self.color >> 8) & 0xFF) as u8
    }

    /// Destination rect of this layer in render-canvas pixels.
    pub fn rect(&self) -> Rect {
        Rect::new(
            f64::from(self.dst_x),
            f64::from(self.dst_y),
            f64::from(self.width),
            f64::from(self.height),
        )
    }

    /// Destination rect translated so its origin is relative to
    /// `bounding_rect`, for placement inside the combined buffer.
    pub fn relative_rect(&self, bounding_rect: Rect) -> Rect {
        let rect = self.rect();
        Rect::new(
            rect.min_x() - bounding_rect.min_x(),
            rect.min_y() - bounding_rect.min_y(),
            rect.width(),
            rect.height(),
        )
    }

    /// Whether the layer contributes no pixels: zero area or fully
    /// transparent.
    pub fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0 || self.alpha() == 0
    }
}

/// Union bounding rect of all non-empty layers, zero rect for empty input.
pub fn bounding_rect(layers: &[RawLayer]) -> Rect {
    layers
        .iter()
        .filter(|layer| layer.width > 0 && layer.height > 0)
        .fold(Rect::ZERO, |acc, layer| acc.union(layer.rect()))
}

/// Final composited subtitle image and its placement rect.
///
/// The pixel buffer is straight-alpha RGBA, alpha last, `width * height * 4`
/// bytes, row-major with no padding. `rect` is in the same pixel space as the
/// render canvas until the renderer rescales it to logical units. Equality is
/// structural over bitmap and rect.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Straight-alpha RGBA pixels, alpha last
    pub data: Vec<u8>,
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Placement rect for the bitmap
    pub rect: Rect,
}

impl ProcessedImage {
    /// Create an image, validating the buffer length.
    pub fn new(data: Vec<u8>, width: u32, height: u32, rect: Rect) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            rect,
        })
    }

    /// Replace the placement rect, keeping the bitmap.
    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Bitmap size as a [`Size`].
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}
