//! Canonical hand snapshots
//!
//! Upstream trackers report landmarks either as a structured `{id, location}`
//! list or as a flattened `x_y_z` array where landmark `i` lives at `i * 3`.
//! Both shapes are normalised here into a single id-keyed collection so the
//! mapper only ever deals with one representation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MapperError;
use crate::geometry::Point3;

/// MediaPipe hand landmark indices
pub mod landmarks {
    pub const WRIST: i32 = 0;
    pub const THUMB_TIP: i32 = 4;
    pub const INDEX_FINGER_MCP: i32 = 5;
    pub const INDEX_FINGER_PIP: i32 = 6;
    pub const INDEX_FINGER_DIP: i32 = 7;
    pub const INDEX_FINGER_TIP: i32 = 8;
    pub const MIDDLE_FINGER_TIP: i32 = 12;
    pub const RING_FINGER_TIP: i32 = 16;
    pub const PINKY_TIP: i32 = 20;
}

/// A single tracked landmark
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Landmark {
    pub id: i32,
    pub location: Point3,
}

/// One hand in one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HandSnapshot {
    /// Gesture state reported for this hand (`point`, `fist`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<String>,
    #[serde(default)]
    pub score: f32,
    landmarks: BTreeMap<u32, Point3>,
}

impl HandSnapshot {
    /// Build from a structured landmark list; negative ids are dropped and a
    /// repeated id keeps its first occurrence
    pub fn from_landmarks<I>(landmarks: I) -> Self
    where
        I: IntoIterator<Item = Landmark>,
    {
        let mut map = BTreeMap::new();
        for lm in landmarks {
            if let Ok(id) = u32::try_from(lm.id) {
                map.entry(id).or_insert(lm.location);
            }
        }
        Self {
            landmarks: map,
            ..Default::default()
        }
    }

    /// Build from a flattened `x, y, z, x, y, z, ...` array; a trailing
    /// partial triple is ignored
    pub fn from_flat(coords: &[f64]) -> Self {
        let landmarks = coords
            .chunks_exact(3)
            .enumerate()
            .map(|(i, c)| (i as u32, Point3::new(c[0], c[1], c[2])))
            .collect();
        Self {
            landmarks,
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn landmark(&self, id: i32) -> Result<Point3, MapperError> {
        u32::try_from(id)
            .ok()
            .and_then(|key| self.landmarks.get(&key).copied())
            .ok_or(MapperError::LandmarkNotFound(id))
    }

    pub fn landmarks(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.landmarks.iter().map(|(&id, &location)| Landmark {
            id: id as i32,
            location,
        })
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Whether the tracker labelled this hand as pointing
    pub fn is_pointing(&self) -> bool {
        self.state
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_lookup() {
        let hand = HandSnapshot::from_landmarks([
            Landmark {
                id: 7,
                location: Point3::new(10.0, 20.0, 0.0),
            },
            Landmark {
                id: 8,
                location: Point3::new(10.0, 30.0, 0.0),
            },
        ]);
        assert_eq!(hand.landmark(8).unwrap(), Point3::new(10.0, 30.0, 0.0));
        assert_eq!(hand.landmark(9), Err(MapperError::LandmarkNotFound(9)));
        assert_eq!(hand.landmark(-1), Err(MapperError::LandmarkNotFound(-1)));
    }

    #[test]
    fn test_flat_indexing() {
        let hand = HandSnapshot::from_flat(&[0.0, 0.0, 0.0, 0.25, 0.5, -0.1, 9.0]);
        assert_eq!(hand.len(), 2);
        assert_eq!(hand.landmark(1).unwrap(), Point3::new(0.25, 0.5, -0.1));
        // Trailing partial triple is out of range
        assert!(hand.landmark(2).is_err());
    }

    #[test]
    fn test_both_shapes_normalise_equal() {
        let flat = HandSnapshot::from_flat(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let structured = HandSnapshot::from_landmarks([
            Landmark {
                id: 1,
                location: Point3::new(4.0, 5.0, 6.0),
            },
            Landmark {
                id: 0,
                location: Point3::new(1.0, 2.0, 3.0),
            },
        ]);
        assert_eq!(flat, structured);
    }

    #[test]
    fn test_negative_and_duplicate_ids() {
        let hand = HandSnapshot::from_landmarks([
            Landmark {
                id: -3,
                location: Point3::new(1.0, 1.0, 1.0),
            },
            Landmark {
                id: 2,
                location: Point3::new(2.0, 2.0, 2.0),
            },
            Landmark {
                id: 2,
                location: Point3::new(9.0, 9.0, 9.0),
            },
        ]);
        assert_eq!(hand.len(), 1);
        assert_eq!(hand.landmark(2).unwrap().x, 2.0);
    }

    #[test]
    fn test_pointing_state() {
        assert!(HandSnapshot::default().with_state("Point").is_pointing());
        assert!(!HandSnapshot::default().with_state("fist").is_pointing());
        assert!(!HandSnapshot::default().is_pointing());
    }
}
