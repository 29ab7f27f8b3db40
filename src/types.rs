//! Common types and traits for 2D loading geometry.
//!
//! The loading plane is the container cross-section: `x` runs along the depth
//! (the "height" axis of the height map) and `y` runs across the width.

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for dimension comparisons and for pruning degenerate segments.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Axis-aligned rectangle in the loading plane.
///
/// # Examples
/// ```
/// use pallet_loader::types::Rect;
///
/// let a = Rect::new(0.0, 0.0, 4.0, 10.0);
/// let b = Rect::new(4.0, 0.0, 4.0, 10.0);
/// assert!(!a.intersects(&b));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    /// Depth coordinate of the near edge.
    pub x: f64,
    /// Lateral coordinate of the left edge.
    pub y: f64,
    /// Extent along the depth axis.
    pub height: f64,
    /// Extent across the width.
    pub width: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, height: f64, width: f64) -> Self {
        Self {
            x,
            y,
            height,
            width,
        }
    }

    /// Area covered by the rectangle.
    #[inline]
    pub fn area(&self) -> f64 {
        self.height * self.width
    }

    /// Far edge on the depth axis.
    #[inline]
    pub fn max_x(&self) -> f64 {
        self.x + self.height
    }

    /// Right edge on the lateral axis.
    #[inline]
    pub fn max_y(&self) -> f64 {
        self.y + self.width
    }

    /// Checks if two rectangles share interior area.
    ///
    /// Touching edges do not count as an intersection. `tolerance` shrinks the
    /// test so that rounding noise on shared edges is ignored.
    #[inline]
    pub fn intersects_with_tolerance(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max_x() <= other.x + tolerance
            || other.max_x() <= self.x + tolerance
            || self.max_y() <= other.y + tolerance
            || other.max_y() <= self.y + tolerance)
    }

    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersects_with_tolerance(other, 0.0)
    }

    /// Checks if the rectangle lies inside `[0, height] × [0, width]`.
    pub fn fits_within(&self, height: f64, width: f64, tolerance: f64) -> bool {
        self.x >= -tolerance
            && self.y >= -tolerance
            && self.max_x() <= height + tolerance
            && self.max_y() <= width + tolerance
    }
}

/// Trait for objects with a footprint in the loading plane.
pub trait Footprint {
    /// Extent along the depth axis.
    fn height(&self) -> f64;

    /// Extent across the width.
    fn width(&self) -> f64;

    fn area(&self) -> f64 {
        self.height() * self.width()
    }

    /// True when the footprint is longer along the depth axis than across.
    fn is_upright(&self) -> bool {
        self.height() > self.width()
    }
}

/// A bare footprint, used where only the dimensions of an item matter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub height: f64,
    pub width: f64,
}

impl Extent {
    #[inline]
    pub const fn new(height: f64, width: f64) -> Self {
        Self { height, width }
    }

    /// The same footprint turned by 90 degrees.
    #[inline]
    pub const fn rotated(self) -> Self {
        Self::new(self.width, self.height)
    }

    pub fn of(item: &impl Footprint) -> Self {
        Self::new(item.height(), item.width())
    }
}

impl Footprint for Extent {
    fn height(&self) -> f64 {
        self.height
    }

    fn width(&self) -> f64 {
        self.width
    }
}

/// Validation helpers shared by the model and the configuration layer.
pub mod validation {

    /// Validates a strictly positive, finite dimension.
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a clearance value, which may be zero.
    pub fn validate_padding(value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("Padding must be finite, got: {}", value));
        }
        if value < 0.0 {
            return Err(format!("Padding must not be negative, got: {}", value));
        }
        Ok(())
    }
}
