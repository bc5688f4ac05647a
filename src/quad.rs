//! Calibration quadrilaterals

use serde::{Deserialize, Serialize};

use crate::error::MapperError;
use crate::geometry::Point;

/// One corner of a [`ScreenQuad`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// Corners in quad order
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Corner::TopLeft => "Top Left",
            Corner::TopRight => "Top Right",
            Corner::BottomRight => "Bottom Right",
            Corner::BottomLeft => "Bottom Left",
        }
    }

    /// Parse a corner name as used in URLs (`top_left`, `top-right`, ...)
    pub fn parse(name: &str) -> Option<Corner> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "top_left" | "tl" => Some(Corner::TopLeft),
            "top_right" | "tr" => Some(Corner::TopRight),
            "bottom_right" | "br" => Some(Corner::BottomRight),
            "bottom_left" | "bl" => Some(Corner::BottomLeft),
            _ => None,
        }
    }
}

/// Four points ordered top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScreenQuad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Default for ScreenQuad {
    /// The unit square
    fn default() -> Self {
        Self::from_rect(0.0, 0.0, 1.0, 1.0)
    }
}

impl ScreenQuad {
    pub fn new(top_left: Point, top_right: Point, bottom_right: Point, bottom_left: Point) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Axis-aligned rectangle with its top-left corner at (x, y)
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        )
    }

    /// The full viewport `[0,0]..size`
    pub fn from_viewport(width: f64, height: f64) -> Self {
        Self::from_rect(0.0, 0.0, width, height)
    }

    /// Build a quad from a point list; anything but exactly 4 points is rejected
    pub fn from_points(points: &[Point]) -> Result<Self, MapperError> {
        match points {
            [tl, tr, br, bl] => Ok(Self::new(*tl, *tr, *br, *bl)),
            _ => Err(MapperError::DegenerateQuad(points.len())),
        }
    }

    pub fn to_array(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    pub fn corner(&self, corner: Corner) -> Point {
        self.to_array()[corner.index()]
    }

    pub fn corner_mut(&mut self, corner: Corner) -> &mut Point {
        match corner {
            Corner::TopLeft => &mut self.top_left,
            Corner::TopRight => &mut self.top_right,
            Corner::BottomRight => &mut self.bottom_right,
            Corner::BottomLeft => &mut self.bottom_left,
        }
    }
}
