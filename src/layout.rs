//! Rectangle layout used as the service's hit-tester

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::mapper::{HitInfo, HitTester};

/// A named screen region that can be pointed at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetRegion {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

fn default_kind() -> String {
    "widget".to_string()
}

impl TargetRegion {
    pub fn new(name: &str, kind: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// Regions in paint order; the last one containing a point is on top
#[derive(Debug, Clone, Default)]
pub struct Layout {
    regions: Vec<TargetRegion>,
}

impl Layout {
    pub fn new(regions: Vec<TargetRegion>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &[TargetRegion] {
        &self.regions
    }

    pub fn set_regions(&mut self, regions: Vec<TargetRegion>) {
        self.regions = regions;
    }

    /// Topmost region at `p`
    pub fn topmost(&self, p: Point) -> Option<&TargetRegion> {
        self.regions.iter().rev().find(|r| r.contains(p))
    }
}

impl HitTester for Layout {
    type Handle = String;

    fn hit_test(&mut self, point: Point) -> Option<HitInfo<String>> {
        self.topmost(point).map(|r| HitInfo {
            handle: Some(r.name.clone()),
            kind: r.kind.clone(),
            tag: Some(r.name.clone()),
        })
    }
}
