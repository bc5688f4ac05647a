//! Error types for calibration, mapping and gesture decoding

use serde::Serialize;
use thiserror::Error;

/// Failures of the calibration and mapping core
///
/// All of these are recoverable: callers drop the frame and try again
/// with the next one.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperError {
    /// No pivot above the configured epsilon while solving the 8x8 system
    #[error("calibration is singular (degenerate or collinear quad points)")]
    SingularCalibration,

    #[error("quad needs exactly 4 points, got {0}")]
    DegenerateQuad(usize),

    /// A mapping call was made while no valid homography exists
    #[error("no valid calibration")]
    InvalidCalibration,

    #[error("projective denominator is nearly zero")]
    DegenerateProjection,

    #[error("landmark {0} not found in hand snapshot")]
    LandmarkNotFound(i32),

    #[error("landmarks map to the same viewport point")]
    ZeroLengthDirection,

    #[error("no target hit within range")]
    NoHitInRange,
}

/// Failures while decoding a gesture stream payload
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed gesture payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("gesture payload is not a JSON object")]
    NotAnObject,
}
