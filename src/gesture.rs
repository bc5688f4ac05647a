//! Gesture stream frame decoding
//!
//! Frames arrive as JSON text, e.g.
//! `{"hands":[{"state":"point","x_y_z":[...]}],"gesture":"point"}`.
//! Producers disagree on field names, so each field is looked up through a
//! short fallback chain.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FrameError;
use crate::geometry::Point3;
use crate::hand::{HandSnapshot, Landmark};

/// What the frame asks the application to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureIntent {
    None,
    Select,
    Back,
}

/// A decoded gesture frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureFrame {
    pub hands: Vec<HandSnapshot>,
    pub gesture: Option<String>,
    pub hand: Option<String>,
    pub object_hint: Option<String>,
}

/// Decoded message from the gesture stream
#[derive(Debug, Clone, PartialEq)]
pub enum GestureMessage {
    Frame(GestureFrame),
    /// `{"type":"ping"}` / `{"type":"pong"}`
    Keepalive,
}

impl GestureMessage {
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let root = value.as_object().ok_or(FrameError::NotAnObject)?;

        if let Some(kind) = root.get("type").and_then(Value::as_str) {
            if kind.eq_ignore_ascii_case("ping") || kind.eq_ignore_ascii_case("pong") {
                return Ok(GestureMessage::Keepalive);
            }
        }

        Ok(GestureMessage::Frame(GestureFrame::from_object(root)))
    }
}

impl GestureFrame {
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let root = value.as_object().ok_or(FrameError::NotAnObject)?;
        Ok(Self::from_object(root))
    }

    fn from_object(root: &Map<String, Value>) -> Self {
        let hands = hand_objects(root).into_iter().map(parse_hand).collect();

        Self {
            hands,
            gesture: first_string(root, &["gesture", "hand_state"]),
            hand: first_string(root, &["hand", "handedness"]),
            object_hint: first_string(root, &["object_id", "object_hint"]),
        }
    }

    pub fn intent(&self) -> GestureIntent {
        let is = |field: &Option<String>, names: &[&str]| {
            field
                .as_deref()
                .is_some_and(|v| names.iter().any(|n| v.eq_ignore_ascii_case(n)))
        };

        if is(&self.gesture, &["point", "select"]) {
            GestureIntent::Select
        } else if is(&self.gesture, &["fist", "back"]) || is(&self.hand, &["fist"]) {
            GestureIntent::Back
        } else {
            GestureIntent::None
        }
    }

    /// The hand to point with: the first hand flagged as pointing, or the
    /// first hand when the frame as a whole is a pointing gesture
    pub fn pointing_hand(&self) -> Option<&HandSnapshot> {
        self.hands.iter().find(|h| h.is_pointing()).or_else(|| {
            (self.intent() == GestureIntent::Select)
                .then(|| self.hands.first())
                .flatten()
        })
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn hand_objects(root: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    if let Some(hands) = root.get("hands").and_then(Value::as_array) {
        return hands.iter().filter_map(Value::as_object).collect();
    }
    if let Some(hand) = root.get("hand").and_then(Value::as_object) {
        return vec![hand];
    }
    if root.contains_key("x_y_z") || root.contains_key("state") || root.contains_key("landmarks") {
        return vec![root];
    }
    Vec::new()
}

fn parse_hand(obj: &Map<String, Value>) -> HandSnapshot {
    let mut hand = if let Some(coords) = obj.get("x_y_z").and_then(Value::as_array) {
        HandSnapshot::from_flat(&flatten_numbers(coords))
    } else if let Some(list) = obj.get("landmarks").and_then(Value::as_array) {
        HandSnapshot::from_landmarks(list.iter().filter_map(parse_landmark))
    } else {
        HandSnapshot::default()
    };

    hand.state = first_string(obj, &["state", "hand_state", "gesture"]);
    hand.handedness = first_string(obj, &["handedness"]);
    hand.score = obj.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
    hand
}

/// Numbers in order, one level of nesting flattened, everything else skipped
fn flatten_numbers(values: &[Value]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Number(n) => out.extend(n.as_f64()),
            Value::Array(nested) => out.extend(nested.iter().filter_map(Value::as_f64)),
            _ => {}
        }
    }
    out
}

fn parse_landmark(value: &Value) -> Option<Landmark> {
    let obj = value.as_object()?;
    let id = i32::try_from(obj.get("id")?.as_i64()?).ok()?;

    let location = if let Some(loc) = obj.get("location").and_then(Value::as_array) {
        let c = flatten_numbers(loc);
        Point3::new(*c.first()?, *c.get(1)?, c.get(2).copied().unwrap_or(0.0))
    } else {
        let coord = |k: &str| obj.get(k).and_then(Value::as_f64);
        Point3::new(coord("x")?, coord("y")?, coord("z").unwrap_or(0.0))
    };

    Some(Landmark { id, location })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hands_array() {
        let frame = GestureFrame::from_json(
            r#"{"hands":[{"state":"point","handedness":"Right","score":0.9,
                "x_y_z":[0.1,0.2,0.0, 0.3,0.4,0.0]}], "gesture":"point"}"#,
        )
        .unwrap();

        assert_eq!(frame.hands.len(), 1);
        let hand = &frame.hands[0];
        assert_eq!(hand.state.as_deref(), Some("point"));
        assert_eq!(hand.handedness.as_deref(), Some("Right"));
        assert!((hand.score - 0.9).abs() < 1e-6);
        assert_eq!(hand.landmark(1).unwrap(), Point3::new(0.3, 0.4, 0.0));
        assert_eq!(frame.intent(), GestureIntent::Select);
        assert!(frame.pointing_hand().is_some());
    }

    #[test]
    fn test_single_implicit_hand_with_nested_coords() {
        let frame = GestureFrame::from_json(
            r#"{"hand_state":"select","x_y_z":[[0.5,0.5,0.1],[0.6,0.7,0.2],"junk"]}"#,
        )
        .unwrap();

        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].landmark(1).unwrap(), Point3::new(0.6, 0.7, 0.2));
        assert_eq!(frame.gesture.as_deref(), Some("select"));
        assert_eq!(frame.intent(), GestureIntent::Select);
    }

    #[test]
    fn test_structured_landmarks() {
        let frame = GestureFrame::from_json(
            r#"{"hand":{"state":"point","landmarks":[
                {"id":7,"x":10,"y":20,"z":0},
                {"id":8,"location":[10,30,0]},
                {"id":"bad","x":1,"y":1}]}}"#,
        )
        .unwrap();

        let hand = &frame.hands[0];
        assert_eq!(hand.len(), 2);
        assert_eq!(hand.landmark(7).unwrap(), Point3::new(10.0, 20.0, 0.0));
        assert_eq!(hand.landmark(8).unwrap(), Point3::new(10.0, 30.0, 0.0));
        // `hand` is an object here, so it does not count as a handedness string
        assert_eq!(frame.hand, None);
    }

    #[test]
    fn test_field_fallbacks_and_back_intent() {
        let frame = GestureFrame::from_json(
            r#"{"gesture":"","hand_state":"Fist","handedness":"Left","object_hint":"giraffe"}"#,
        )
        .unwrap();
        assert!(frame.hands.is_empty());
        assert_eq!(frame.gesture.as_deref(), Some("Fist"));
        assert_eq!(frame.hand.as_deref(), Some("Left"));
        assert_eq!(frame.object_hint.as_deref(), Some("giraffe"));
        assert_eq!(frame.intent(), GestureIntent::Back);

        let frame = GestureFrame::from_json(r#"{"hand":"fist"}"#).unwrap();
        assert_eq!(frame.intent(), GestureIntent::Back);
    }

    #[test]
    fn test_no_intent_without_gesture() {
        let frame = GestureFrame::from_json(r#"{"hands":[{"state":"open","x_y_z":[]}]}"#).unwrap();
        assert_eq!(frame.intent(), GestureIntent::None);
        assert!(frame.pointing_hand().is_none());
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            GestureFrame::from_json("not json"),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            GestureFrame::from_json("[1,2,3]"),
            Err(FrameError::NotAnObject)
        ));
    }

    #[test]
    fn test_keepalive() {
        assert_eq!(
            GestureMessage::from_json(r#"{"type":"ping"}"#).unwrap(),
            GestureMessage::Keepalive
        );
        assert!(matches!(
            GestureMessage::from_json(r#"{"gesture":"point"}"#).unwrap(),
            GestureMessage::Frame(_)
        ));
    }
}
