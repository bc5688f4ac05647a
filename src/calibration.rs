//! Guided corner calibration and UI state

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::MapperError;
use crate::geometry::Point;
use crate::mapper::HandViewportMapper;
use crate::quad::{Corner, ScreenQuad};

/// Where the interaction currently is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    SetTopLeft,
    SetTopRight,
    SetBottomRight,
    SetBottomLeft,
    #[default]
    World,
    Description,
}

impl FlowState {
    /// Corner captured in this state, if it is a calibration step
    pub fn corner(self) -> Option<Corner> {
        match self {
            FlowState::SetTopLeft => Some(Corner::TopLeft),
            FlowState::SetTopRight => Some(Corner::TopRight),
            FlowState::SetBottomRight => Some(Corner::BottomRight),
            FlowState::SetBottomLeft => Some(Corner::BottomLeft),
            FlowState::World | FlowState::Description => None,
        }
    }

    pub fn is_calibrating(self) -> bool {
        self.corner().is_some()
    }

    fn next(self) -> FlowState {
        match self {
            FlowState::SetTopLeft => FlowState::SetTopRight,
            FlowState::SetTopRight => FlowState::SetBottomRight,
            FlowState::SetBottomRight => FlowState::SetBottomLeft,
            FlowState::SetBottomLeft => FlowState::World,
            other => other,
        }
    }
}

/// Outcome of feeding a raw point into the flow
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Corner stored, more corners to go
    Captured { corner: Corner },
    /// Last corner stored; `error` is set when the quad was rejected
    Finished {
        valid: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<MapperError>,
    },
    /// Not calibrating, nothing changed
    Ignored,
}

/// Walks the user through pointing at the four screen corners
#[derive(Debug, Clone, Default)]
pub struct CalibrationFlow {
    state: FlowState,
    /// Source quad before `begin`, restored on cancel
    saved: Option<ScreenQuad>,
}

impl CalibrationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn begin(&mut self, mapper: &HandViewportMapper) {
        info!("Calibration started");
        self.saved = Some(*mapper.source());
        self.state = FlowState::SetTopLeft;
    }

    /// Store `raw` as the current corner of the source quad and advance
    pub fn capture(&mut self, mapper: &mut HandViewportMapper, raw: Point) -> CaptureOutcome {
        let Some(corner) = self.state.corner() else {
            return CaptureOutcome::Ignored;
        };

        // Intermediate quads are usually degenerate; only the final one counts
        let result = mapper.set_source_corner(corner, raw);
        info!("Captured {} at ({:.3}, {:.3})", corner.label(), raw.x, raw.y);
        self.state = self.state.next();

        if self.state.is_calibrating() {
            return CaptureOutcome::Captured { corner };
        }

        self.saved = None;
        match result {
            Ok(()) => {
                info!("Calibration finished");
                CaptureOutcome::Finished { valid: true, error: None }
            }
            Err(e) => {
                warn!("Calibration finished with an unusable quad: {}", e);
                CaptureOutcome::Finished {
                    valid: false,
                    error: Some(e),
                }
            }
        }
    }

    /// Selection in the world opens the description view
    pub fn select(&mut self) -> bool {
        if self.state == FlowState::World {
            self.state = FlowState::Description;
            true
        } else {
            false
        }
    }

    /// Leave the description view, or cancel a calibration in progress
    pub fn back(&mut self, mapper: &mut HandViewportMapper) -> bool {
        match self.state {
            FlowState::Description => {
                self.state = FlowState::World;
                true
            }
            s if s.is_calibrating() => {
                if let Some(quad) = self.saved.take() {
                    let _ = mapper.set_source_quad(quad);
                }
                info!("Calibration cancelled");
                self.state = FlowState::World;
                true
            }
            _ => false,
        }
    }
}

/// A labeled calibration corner for the UI
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationPoint {
    pub id: usize,
    pub corner: Corner,
    pub label: &'static str,
    pub source: Point,
    pub target: Point,
}

/// Get all four corners as labeled UI points
pub fn calibration_points(mapper: &HandViewportMapper) -> Vec<CalibrationPoint> {
    Corner::ALL
        .iter()
        .map(|&corner| CalibrationPoint {
            id: corner.index(),
            corner,
            label: corner.label(),
            source: mapper.source().corner(corner),
            target: mapper.target().corner(corner),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_capture_sequence() {
        let mut mapper = HandViewportMapper::new(
            ScreenQuad::default(),
            ScreenQuad::from_viewport(1000.0, 500.0),
        );
        let mut flow = CalibrationFlow::new();
        flow.begin(&mapper);
        assert_eq!(flow.state(), FlowState::SetTopLeft);

        let raw = [
            Point::new(0.2, 0.2),
            Point::new(0.8, 0.2),
            Point::new(0.8, 0.8),
            Point::new(0.2, 0.8),
        ];
        for (i, p) in raw.iter().enumerate().take(3) {
            assert_eq!(
                flow.capture(&mut mapper, *p),
                CaptureOutcome::Captured { corner: Corner::ALL[i] }
            );
        }
        assert_eq!(
            flow.capture(&mut mapper, raw[3]),
            CaptureOutcome::Finished { valid: true, error: None }
        );
        assert_eq!(flow.state(), FlowState::World);

        let center = mapper.map_point(Point::new(0.5, 0.5)).unwrap();
        assert!((center.x - 500.0).abs() < 1e-6);
        assert!((center.y - 250.0).abs() < 1e-6);
        assert_eq!(flow.capture(&mut mapper, raw[0]), CaptureOutcome::Ignored);
    }

    #[test]
    fn test_degenerate_capture_reports_invalid() {
        let mut mapper = HandViewportMapper::default();
        let mut flow = CalibrationFlow::new();
        flow.begin(&mapper);
        let same = Point::new(0.5, 0.5);
        for _ in 0..3 {
            flow.capture(&mut mapper, same);
        }
        assert_eq!(
            flow.capture(&mut mapper, same),
            CaptureOutcome::Finished {
                valid: false,
                error: Some(MapperError::SingularCalibration)
            }
        );
        assert!(!mapper.is_valid());
    }

    #[test]
    fn test_cancel_restores_source() {
        let mut mapper = HandViewportMapper::default();
        let original = *mapper.source();
        let mut flow = CalibrationFlow::new();
        flow.begin(&mapper);
        flow.capture(&mut mapper, Point::new(0.4, 0.4));
        assert!(flow.back(&mut mapper));
        assert_eq!(flow.state(), FlowState::World);
        assert_eq!(*mapper.source(), original);
        assert!(mapper.is_valid());
    }

    #[test]
    fn test_description_round_trip() {
        let mut mapper = HandViewportMapper::default();
        let mut flow = CalibrationFlow::new();
        assert!(flow.select());
        assert_eq!(flow.state(), FlowState::Description);
        assert!(!flow.select());
        assert!(flow.back(&mut mapper));
        assert_eq!(flow.state(), FlowState::World);
        assert!(!flow.back(&mut mapper));
    }

    #[test]
    fn test_ui_points() {
        let mapper = HandViewportMapper::default();
        let points = calibration_points(&mapper);
        assert_eq!(points.len(), 4);
        assert_eq!(points[2].label, "Bottom Right");
        assert_eq!(points[2].source, Point::new(1.0, 1.0));
    }
}
