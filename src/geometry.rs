//! 2D and 3D points used by calibration and mapping

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// A 2D point in either raw hand-tracking space or viewport space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Vector from `self` to `other`
    pub fn to(&self, other: Point) -> Vector2<f64> {
        Vector2::new(other.x - self.x, other.y - self.y)
    }

    /// Point reached by walking `distance` along `direction` from `self`
    pub fn offset(&self, direction: &Vector2<f64>, distance: f64) -> Point {
        Point::new(self.x + direction.x * distance, self.y + direction.y * distance)
    }

    pub fn distance(&self, other: Point) -> f64 {
        self.to(other).norm()
    }
}

impl From<Point> for Vector2<f64> {
    fn from(p: Point) -> Self {
        Vector2::new(p.x, p.y)
    }
}

impl From<Vector2<f64>> for Point {
    fn from(v: Vector2<f64>) -> Self {
        Point::new(v.x, v.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// A landmark position as reported by the tracker (x, y, depth)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Drop the depth component
    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}
