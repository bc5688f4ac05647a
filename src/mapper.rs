//! Gesture-to-viewport mapping and pointing search
//!
//! The mapper owns the current calibration (source and target quads) and the
//! homography derived from it. Every calibration change rebuilds the
//! homography; a failed rebuild leaves the mapper invalid and every mapping
//! call fails until a good calibration arrives.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::MapperError;
use crate::geometry::Point;
use crate::hand::HandSnapshot;
use crate::quad::{Corner, ScreenQuad};
use crate::transform::{Homography, Tolerances};

/// What a hit-tester reports for a single viewport point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitInfo<H> {
    /// Element handle, when the hit layer can provide one
    pub handle: Option<H>,
    /// Type of the element (`button`, `animal`, ...)
    pub kind: String,
    /// Name/tag of the element
    pub tag: Option<String>,
}

/// Result of a pointing search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetHit<H> {
    pub handle: Option<H>,
    pub kind: String,
    pub tag: Option<String>,
    /// Sample point that produced the hit
    pub viewport_position: Point,
    /// Distance from the ray origin to the sample point
    pub distance: f64,
}

impl<H: PartialEq> WidgetHit<H> {
    /// Whether two hits refer to the same element
    pub fn same_target(&self, other: &WidgetHit<H>) -> bool {
        match (&self.handle, &other.handle) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.kind == other.kind && self.tag == other.tag,
            _ => false,
        }
    }
}

impl<H> WidgetHit<H> {
    /// Name used in logs
    pub fn label(&self) -> &str {
        self.tag.as_deref().unwrap_or("Unknown")
    }
}

/// Point-sampling oracle: "what is at this viewport point?"
pub trait HitTester {
    type Handle;

    fn hit_test(&mut self, point: Point) -> Option<HitInfo<Self::Handle>>;
}

impl<F, H> HitTester for F
where
    F: FnMut(Point) -> Option<HitInfo<H>>,
{
    type Handle = H;

    fn hit_test(&mut self, point: Point) -> Option<HitInfo<H>> {
        self(point)
    }
}

/// Upper bound on the sample count derived from a max distance
pub const MAX_DERIVED_SAMPLES: u32 = 4096;

/// Ray-march granularity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    /// Distance between samples, never below 1
    pub step: f64,
    /// Number of samples; 0 derives it from the max distance
    pub samples: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            step: 24.0,
            samples: 32,
        }
    }
}

impl SearchSettings {
    pub fn step_length(&self) -> f64 {
        if self.step.is_finite() {
            self.step.max(1.0)
        } else {
            1.0
        }
    }

    pub fn step_count(&self, max_distance: f64) -> u32 {
        if self.samples > 0 {
            return self.samples;
        }
        let steps = (max_distance / self.step_length()).ceil();
        if steps.is_finite() && steps >= 1.0 {
            steps.min(MAX_DERIVED_SAMPLES as f64) as u32
        } else {
            1
        }
    }
}

/// Current homography, or none at all
#[derive(Debug, Clone, Copy, PartialEq)]
enum CalibrationState {
    Valid(Homography),
    Invalid(MapperError),
}

/// Maps hand landmarks into viewport space and searches along pointing rays
#[derive(Debug, Clone)]
pub struct HandViewportMapper {
    source: ScreenQuad,
    target: ScreenQuad,
    state: CalibrationState,
    search: SearchSettings,
    tolerances: Tolerances,
}

impl Default for HandViewportMapper {
    fn default() -> Self {
        Self::new(ScreenQuad::default(), ScreenQuad::default())
    }
}

impl HandViewportMapper {
    pub fn new(source: ScreenQuad, target: ScreenQuad) -> Self {
        Self::with_settings(source, target, SearchSettings::default(), Tolerances::default())
    }

    pub fn with_settings(
        source: ScreenQuad,
        target: ScreenQuad,
        search: SearchSettings,
        tolerances: Tolerances,
    ) -> Self {
        let mut mapper = Self {
            source,
            target,
            state: CalibrationState::Invalid(MapperError::InvalidCalibration),
            search,
            tolerances,
        };
        let _ = mapper.rebuild();
        mapper
    }

    pub fn source(&self) -> &ScreenQuad {
        &self.source
    }

    pub fn target(&self) -> &ScreenQuad {
        &self.target
    }

    pub fn search_settings(&self) -> &SearchSettings {
        &self.search
    }

    pub fn set_search_settings(&mut self, search: SearchSettings) {
        self.search = search;
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    /// Changing the pivot floor re-solves the current calibration
    pub fn set_tolerances(&mut self, tolerances: Tolerances) -> Result<(), MapperError> {
        self.tolerances = tolerances;
        self.rebuild()
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, CalibrationState::Valid(_))
    }

    pub fn homography(&self) -> Option<&Homography> {
        match &self.state {
            CalibrationState::Valid(h) => Some(h),
            CalibrationState::Invalid(_) => None,
        }
    }

    /// Why the calibration is unusable, if it is
    pub fn calibration_error(&self) -> Option<MapperError> {
        match self.state {
            CalibrationState::Valid(_) => None,
            CalibrationState::Invalid(e) => Some(e),
        }
    }

    pub fn set_calibration(
        &mut self,
        source: ScreenQuad,
        target: ScreenQuad,
    ) -> Result<(), MapperError> {
        self.source = source;
        self.target = target;
        self.rebuild()
    }

    /// Set the calibration from point lists; a list that is not exactly 4
    /// points long invalidates the mapper
    pub fn set_calibration_points(
        &mut self,
        source: &[Point],
        target: &[Point],
    ) -> Result<(), MapperError> {
        let quads = ScreenQuad::from_points(source)
            .and_then(|s| ScreenQuad::from_points(target).map(|t| (s, t)));
        match quads {
            Ok((s, t)) => self.set_calibration(s, t),
            Err(e) => {
                warn!("Rejected calibration: {}", e);
                self.state = CalibrationState::Invalid(e);
                Err(e)
            }
        }
    }

    pub fn set_source_quad(&mut self, quad: ScreenQuad) -> Result<(), MapperError> {
        self.source = quad;
        self.rebuild()
    }

    pub fn set_target_quad(&mut self, quad: ScreenQuad) -> Result<(), MapperError> {
        self.target = quad;
        self.rebuild()
    }

    pub fn set_source_corner(&mut self, corner: Corner, point: Point) -> Result<(), MapperError> {
        *self.source.corner_mut(corner) = point;
        self.rebuild()
    }

    pub fn set_target_corner(&mut self, corner: Corner, point: Point) -> Result<(), MapperError> {
        *self.target.corner_mut(corner) = point;
        self.rebuild()
    }

    /// Target the full `[0,0]..size` viewport
    pub fn auto_initialize_target_from_viewport(
        &mut self,
        width: f64,
        height: f64,
    ) -> Result<(), MapperError> {
        self.set_target_quad(ScreenQuad::from_viewport(width, height))
    }

    fn rebuild(&mut self) -> Result<(), MapperError> {
        let result = Homography::solve_with(
            &self.source.to_array(),
            &self.target.to_array(),
            self.tolerances.pivot_epsilon,
        );
        match result {
            Ok(h) => {
                debug!("Rebuilt homography: {:?}", h.coefficients());
                self.state = CalibrationState::Valid(h);
                Ok(())
            }
            Err(e) => {
                warn!("Calibration rejected: {}", e);
                self.state = CalibrationState::Invalid(e);
                Err(e)
            }
        }
    }

    /// Map a raw point into viewport space
    pub fn map_point(&self, point: Point) -> Result<Point, MapperError> {
        match &self.state {
            CalibrationState::Valid(h) => h.apply(point, self.tolerances.projection_epsilon),
            CalibrationState::Invalid(_) => Err(MapperError::InvalidCalibration),
        }
    }

    /// Map the (x, y) of one landmark into viewport space
    pub fn map_landmark(
        &self,
        hand: &HandSnapshot,
        landmark_id: i32,
    ) -> Result<Point, MapperError> {
        let location = hand.landmark(landmark_id)?;
        self.map_point(location.xy())
    }

    /// Map the ray from `start_id` through `end_id`; the direction is not normalised
    pub fn map_direction(
        &self,
        hand: &HandSnapshot,
        start_id: i32,
        end_id: i32,
    ) -> Result<(Point, Vector2<f64>), MapperError> {
        let origin = self.map_landmark(hand, start_id)?;
        let end = self.map_landmark(hand, end_id)?;
        let direction = origin.to(end);

        if !(direction.norm() > self.tolerances.direction_epsilon) {
            return Err(MapperError::ZeroLengthDirection);
        }
        Ok((origin, direction))
    }

    /// March along the pointing ray and return the nearest sample that hits
    ///
    /// Samples sit at `step * i` for `i = 1..=count` and never past
    /// `max_distance`. Targets narrower than the step may be skipped.
    pub fn find_target_along_direction<T>(
        &self,
        hand: &HandSnapshot,
        start_id: i32,
        end_id: i32,
        max_distance: f64,
        hit_tester: &mut T,
    ) -> Result<WidgetHit<T::Handle>, MapperError>
    where
        T: HitTester + ?Sized,
    {
        let (origin, direction) = self.map_direction(hand, start_id, end_id)?;
        let direction = direction
            .try_normalize(self.tolerances.direction_epsilon)
            .ok_or(MapperError::ZeroLengthDirection)?;

        let step = self.search.step_length();
        let count = self.search.step_count(max_distance);

        for index in 1..=count {
            let distance = step * index as f64;
            if !(distance <= max_distance) {
                break;
            }

            let sample = origin.offset(&direction, distance);
            if let Some(info) = hit_tester.hit_test(sample) {
                let hit = WidgetHit {
                    handle: info.handle,
                    kind: info.kind,
                    tag: info.tag,
                    viewport_position: sample,
                    distance,
                };
                info!(
                    "Widget hit: {} at ({:.1}, {:.1})",
                    hit.label(),
                    sample.x,
                    sample.y
                );
                return Ok(hit);
            }
        }

        Err(MapperError::NoHitInRange)
    }
}
