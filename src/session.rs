//! Per-frame pointing pipeline
//!
//! Ties the pieces together for one gesture frame: pick the pointing hand,
//! map the fingertip, march along the finger ray over the layout, diff the
//! hit against the previous frame and drive the calibration flow.

use serde::Serialize;
use tracing::debug;

use crate::calibration::{CalibrationFlow, CaptureOutcome, FlowState};
use crate::config::SearchConfig;
use crate::error::MapperError;
use crate::geometry::Point;
use crate::gesture::{GestureFrame, GestureIntent};
use crate::layout::Layout;
use crate::mapper::{HandViewportMapper, WidgetHit};
use crate::selection::{SelectionChange, SelectionTracker};

/// What happened while handling a frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub hands: usize,
    pub intent: GestureIntent,
    /// Fingertip in viewport space
    pub pointer: Option<Point>,
    pub hit: Option<WidgetHit<String>>,
    pub selection: SelectionChange<String>,
    pub flow: FlowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureOutcome>,
    /// Why no hit was produced, when mapping failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MapperError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_hint: Option<String>,
}

/// Mapper, hit layer, hover state and calibration flow for one viewer
#[derive(Debug, Clone)]
pub struct PointerSession {
    pub mapper: HandViewportMapper,
    pub layout: Layout,
    pub selection: SelectionTracker<String>,
    pub flow: CalibrationFlow,
    pub search: SearchConfig,
    /// Intent of the previous frame; select only fires on its rising edge
    last_intent: GestureIntent,
}

impl PointerSession {
    pub fn new(mapper: HandViewportMapper, layout: Layout, search: SearchConfig) -> Self {
        Self {
            mapper,
            layout,
            selection: SelectionTracker::new(),
            flow: CalibrationFlow::new(),
            search,
            last_intent: GestureIntent::None,
        }
    }

    pub fn handle_frame(&mut self, frame: &GestureFrame) -> FrameReport {
        let intent = frame.intent();
        // A held gesture repeats on every frame, so act only when it starts
        let select_started =
            intent == GestureIntent::Select && self.last_intent != GestureIntent::Select;
        self.last_intent = intent;

        let mut report = FrameReport {
            hands: frame.hands.len(),
            intent,
            pointer: None,
            hit: None,
            selection: SelectionChange::Unchanged,
            flow: self.flow.state(),
            capture: None,
            error: None,
            object_hint: frame.object_hint.clone(),
        };

        if intent == GestureIntent::Back && self.flow.back(&mut self.mapper) {
            report.selection = self.selection.clear();
            report.flow = self.flow.state();
            return report;
        }

        let Some(hand) = frame.pointing_hand().or_else(|| frame.hands.first()) else {
            report.selection = self.selection.clear();
            return report;
        };

        if self.flow.state().is_calibrating() {
            // Calibration captures raw tracker coordinates, not mapped ones
            if select_started {
                match hand.landmark(self.search.tip_landmark) {
                    Ok(tip) => {
                        report.capture = Some(self.flow.capture(&mut self.mapper, tip.xy()));
                    }
                    Err(e) => report.error = Some(e),
                }
            }
            report.flow = self.flow.state();
            return report;
        }

        match self.mapper.map_landmark(hand, self.search.tip_landmark) {
            Ok(p) => report.pointer = Some(p),
            Err(e) => report.error = Some(e),
        }

        let result = self.mapper.find_target_along_direction(
            hand,
            self.search.origin_landmark,
            self.search.tip_landmark,
            self.search.max_distance,
            &mut self.layout,
        );
        let hit = match result {
            Ok(hit) => Some(hit),
            Err(MapperError::NoHitInRange) => None,
            Err(e) => {
                debug!("Pointing search failed: {}", e);
                if report.error.is_none() {
                    report.error = Some(e);
                }
                None
            }
        };

        report.selection = self.selection.update(hit.clone());
        report.hit = hit;

        if select_started && report.hit.is_some() {
            self.flow.select();
        }
        report.flow = self.flow.state();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TargetRegion;
    use crate::quad::{Corner, ScreenQuad};

    fn session() -> PointerSession {
        let mapper = HandViewportMapper::new(
            ScreenQuad::default(),
            ScreenQuad::from_viewport(1000.0, 1000.0),
        );
        let layout = Layout::new(vec![TargetRegion::new(
            "lion", "animal", 500.0, 0.0, 100.0, 1000.0,
        )]);
        PointerSession::new(mapper, layout, SearchConfig::default())
    }

    /// Index finger pointing right, DIP at (0.30, 0.5) and TIP at (0.35, 0.5)
    fn frame(gesture: &str) -> GestureFrame {
        let mut coords = vec![0.0; 21 * 3];
        coords[7 * 3] = 0.30;
        coords[7 * 3 + 1] = 0.5;
        coords[8 * 3] = 0.35;
        coords[8 * 3 + 1] = 0.5;
        let json = serde_json::json!({
            "hands": [{"state": "point", "x_y_z": coords}],
            "gesture": gesture,
        });
        GestureFrame::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_pointing_hits_and_hovers() {
        let mut session = session();
        let report = session.handle_frame(&frame("open"));
        let pointer = report.pointer.unwrap();
        assert!((pointer.x - 350.0).abs() < 1e-6);

        let hit = report.hit.unwrap();
        assert_eq!(hit.tag.as_deref(), Some("lion"));
        // First sample inside x >= 500 from origin 300 with step 24
        assert!((hit.distance - 216.0).abs() < 1e-6);
        assert!(matches!(report.selection, SelectionChange::Entered { .. }));

        let report = session.handle_frame(&frame("open"));
        assert!(report.selection.is_unchanged());
        assert_eq!(report.flow, FlowState::World);
    }

    #[test]
    fn test_select_then_back() {
        let mut session = session();
        let report = session.handle_frame(&frame("select"));
        assert_eq!(report.flow, FlowState::Description);

        let back = GestureFrame::from_json(r#"{"gesture":"fist"}"#).unwrap();
        let report = session.handle_frame(&back);
        assert_eq!(report.flow, FlowState::World);
        assert!(matches!(report.selection, SelectionChange::Left { .. }));
    }

    #[test]
    fn test_calibration_captures_raw_tip() {
        let mut session = session();
        session.flow.begin(&session.mapper);
        let report = session.handle_frame(&frame("point"));
        assert_eq!(
            report.capture,
            Some(CaptureOutcome::Captured {
                corner: Corner::TopLeft
            })
        );
        assert_eq!(session.mapper.source().top_left, Point::new(0.35, 0.5));
        assert!(report.hit.is_none());
    }

    #[test]
    fn test_held_point_captures_one_corner() {
        let mut session = session();
        session.flow.begin(&session.mapper);

        let captures: Vec<_> = (0..4)
            .map(|_| session.handle_frame(&frame("point")).capture)
            .collect();
        assert_eq!(
            captures[0],
            Some(CaptureOutcome::Captured {
                corner: Corner::TopLeft
            })
        );
        assert!(captures[1..].iter().all(Option::is_none));
        assert_eq!(session.flow.state(), FlowState::SetTopRight);

        // Releasing and pointing again captures the next corner
        session.handle_frame(&frame("open"));
        let report = session.handle_frame(&frame("point"));
        assert_eq!(
            report.capture,
            Some(CaptureOutcome::Captured {
                corner: Corner::TopRight
            })
        );
    }

    #[test]
    fn test_held_select_opens_description_once() {
        let mut session = session();
        let report = session.handle_frame(&frame("select"));
        assert_eq!(report.flow, FlowState::Description);

        session.flow.back(&mut session.mapper);
        let report = session.handle_frame(&frame("select"));
        assert_eq!(report.flow, FlowState::World);

        session.handle_frame(&frame("open"));
        let report = session.handle_frame(&frame("select"));
        assert_eq!(report.flow, FlowState::Description);
    }

    #[test]
    fn test_frame_without_hands() {
        let mut session = session();
        let report = session.handle_frame(&GestureFrame::default());
        assert_eq!(report.hands, 0);
        assert!(report.pointer.is_none() && report.hit.is_none());
    }
}
