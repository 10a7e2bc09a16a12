//! Geometry primitives for canvas and image placement
//!
//! Rects flow through two distinct rounding policies: [`Rect::rounded`] for
//! display-boundary reporting (nearest, ties away from zero) and
//! [`Rect::integral`] for buffer and layout sizing (enclosing integer rect).
//! They intentionally disagree for non-exact inputs and must not be merged.

use std::ops::{Div, Mul};

/// Point in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round both coordinates to nearest, ties away from zero.
    pub fn rounded(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }
}

/// Size in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Size {
    /// Zero size.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Create a new size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero or negative.
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Round both dimensions to nearest, ties away from zero.
    pub fn rounded(self) -> Self {
        Self::new(self.width.round(), self.height.round())
    }
}

impl Mul<f64> for Size {
    type Output = Size;

    fn mul(self, rhs: f64) -> Size {
        Size::new(self.width * rhs, self.height * rhs)
    }
}

impl Div<f64> for Size {
    type Output = Size;

    fn div(self, rhs: f64) -> Size {
        Size::new(self.width / rhs, self.height / rhs)
    }
}

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Top-left origin
    pub origin: Point,
    /// Extent
    pub size: Size,
}

impl Rect {
    /// Zero rect.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a rect from origin and size components.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Left edge.
    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    /// Top edge.
    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    /// Right edge.
    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    /// Bottom edge.
    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    /// Width.
    pub fn width(&self) -> f64 {
        self.size.width
    }

    /// Height.
    pub fn height(&self) -> f64 {
        self.size.height
    }

    /// Whether the rect has no area.
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// Round origin and size to nearest, ties away from zero.
    ///
    /// Display rounding only. Use [`Rect::integral`] when the result sizes a
    /// pixel buffer.
    pub fn rounded(self) -> Self {
        Self {
            origin: self.origin.rounded(),
            size: self.size.rounded(),
        }
    }

    /// Smallest integer rect containing `self`: origin floored, far edges
    /// ceiled.
    ///
    /// Pixel-exact sizing for buffer allocation and published placement.
    pub fn integral(self) -> Self {
        let min_x = self.min_x().floor();
        let min_y = self.min_y().floor();
        let max_x = self.max_x().ceil();
        let max_y = self.max_y().ceil();

        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Union with another rect. Empty rects do not contribute.
    pub fn union(self, other: Rect) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());

        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Mirror the rect vertically inside a container of the given height.
    ///
    /// Converts between top-left-origin and bottom-left-origin coordinate
    /// conventions at the presentation boundary. Never used inside the
    /// compositor math.
    pub fn flip_y(self, container_height: f64) -> Self {
        Self {
            origin: Point::new(self.origin.x, container_height - self.max_y()),
            size: self.size,
        }
    }
}

impl Mul<f64> for Rect {
    type Output = Rect;

    fn mul(self, rhs: f64) -> Rect {
        Rect::new(
            self.origin.x * rhs,
            self.origin.y * rhs,
            self.size.width * rhs,
            self.size.height * rhs,
        )
    }
}

impl Div<f64> for Rect {
    type Output = Rect;

    fn div(self, rhs: f64) -> Rect {
        Rect::new(
            self.origin.x / rhs,
            self.origin.y / rhs,
            self.size.width / rhs,
            self.size.height / rhs,
        )
    }
}
