//! 2D Vector
//!
//! Plain `f64` vector used for ship positions and headings. Only IEEE-754
//! basic operations and `sqrt` are used in simulation paths, all of which
//! are correctly rounded, so every platform computes identical bits.

use std::fmt;
use std::ops::{Add, Sub, Mul, Neg};
use serde::{Serialize, Deserialize};

/// 2D vector with `f64` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
}

impl Vec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Build from the `[x, y]` wire form.
    #[inline]
    pub const fn from_array(xy: [f64; 2]) -> Self {
        Self { x: xy[0], y: xy[1] }
    }

    /// Convert to the `[x, y]` wire form.
    #[inline]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Squared length.
    #[inline]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Length.
    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Heading of this vector in degrees, counter-clockwise from +X.
    ///
    /// Presentation only; never feeds back into simulation state.
    pub fn heading_degrees(self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }

    /// Closest point to `self` on the segment `start..end`.
    pub fn closest_point_on_segment(self, start: Self, end: Self) -> Self {
        let segment = end - start;
        let len_sq = segment.length_squared();
        if len_sq == 0.0 {
            return start;
        }
        let t = ((self - start).dot(segment) / len_sq).clamp(0.0, 1.0);
        start + segment * t
    }

    /// Distance from `self` to the segment `start..end`.
    #[inline]
    pub fn distance_to_segment(self, start: Self, end: Self) -> f64 {
        self.distance(self.closest_point_on_segment(start, end))
    }

    /// Whether both components are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}
