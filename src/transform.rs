//! Perspective transformation for gesture calibration
//!
//! This module implements the planar homography that maps the calibrated
//! quad in hand-tracking space onto the target quad in viewport space.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::MapperError;
use crate::geometry::Point;

/// Smallest pivot accepted while solving the 8x8 system
pub const PIVOT_EPSILON: f64 = 1e-8;
/// Smallest projective denominator accepted when applying a homography
pub const PROJECTION_EPSILON: f64 = 1e-6;
/// Shortest mapped direction still treated as a direction
pub const DIRECTION_EPSILON: f64 = 1e-6;

/// Numerical thresholds used by the solver and the mapper
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tolerances {
    pub pivot_epsilon: f64,
    pub projection_epsilon: f64,
    pub direction_epsilon: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            pivot_epsilon: PIVOT_EPSILON,
            projection_epsilon: PROJECTION_EPSILON,
            direction_epsilon: DIRECTION_EPSILON,
        }
    }
}

/// Perspective transformation matrix (3x3 homography), `h[2][2] == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Compute the homography taking each `src[i]` to `dst[i]`
    pub fn solve(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self, MapperError> {
        Self::solve_with(src, dst, PIVOT_EPSILON)
    }

    /// Same as [`Homography::solve`] with an explicit pivot floor
    pub fn solve_with(
        src: &[Point; 4],
        dst: &[Point; 4],
        pivot_epsilon: f64,
    ) -> Result<Self, MapperError> {
        let h = compute_homography(src, dst, pivot_epsilon)?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(MapperError::SingularCalibration);
        }
        Ok(Self { matrix })
    }

    /// Transform a point from source to destination coordinates
    #[inline]
    pub fn apply(&self, p: Point, projection_epsilon: f64) -> Result<Point, MapperError> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        let w = v.z;
        if !(w.abs() >= projection_epsilon) {
            return Err(MapperError::DegenerateProjection);
        }
        let out = Point::new(v.x / w, v.y / w);
        if !out.is_finite() {
            return Err(MapperError::DegenerateProjection);
        }
        Ok(out)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Row-major coefficients h0..h8
    pub fn coefficients(&self) -> [f64; 9] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }
}

/// Compute h0..h7 from 4 point correspondences
fn compute_homography(
    src: &[Point; 4],
    dst: &[Point; 4],
    pivot_epsilon: f64,
) -> Result<[f64; 8], MapperError> {
    // For each correspondence (x,y) -> (X,Y):
    // h0*x + h1*y + h2 - h6*X*x - h7*X*y = X
    // h3*x + h4*y + h5 - h6*Y*x - h7*Y*y = Y
    let mut a = [[0.0f64; 8]; 8];
    let mut b = [0.0f64; 8];

    for i in 0..4 {
        let Point { x, y } = src[i];
        let Point { x: xp, y: yp } = dst[i];

        let row1 = i * 2;
        let row2 = row1 + 1;

        a[row1] = [x, y, 1.0, 0.0, 0.0, 0.0, -xp * x, -xp * y];
        b[row1] = xp;

        a[row2] = [0.0, 0.0, 0.0, x, y, 1.0, -yp * x, -yp * y];
        b[row2] = yp;
    }

    solve_linear_system(&mut a, &mut b, pivot_epsilon)
}

/// Solve an 8x8 linear system using Gauss-Jordan elimination with partial pivoting
fn solve_linear_system(
    a: &mut [[f64; 8]; 8],
    b: &mut [f64; 8],
    pivot_epsilon: f64,
) -> Result<[f64; 8], MapperError> {
    let n = 8;

    for col in 0..n {
        // Find pivot
        let mut max_row = col;
        let mut max_val = a[col][col].abs();
        for row in (col + 1)..n {
            if a[row][col].abs() > max_val {
                max_val = a[row][col].abs();
                max_row = row;
            }
        }

        // NaN compares false, so it is rejected here too
        if !(max_val >= pivot_epsilon) {
            return Err(MapperError::SingularCalibration);
        }

        if max_row != col {
            a.swap(col, max_row);
            b.swap(col, max_row);
        }

        let pivot = a[col][col];
        for j in col..n {
            a[col][j] /= pivot;
        }
        b[col] /= pivot;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    Ok(*b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quad::ScreenQuad;

    fn close(a: Point, b: Point, tol: f64) -> bool {
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol
    }

    #[test]
    fn test_identity_transform() {
        let quad = ScreenQuad::from_rect(0.0, 0.0, 100.0, 100.0).to_array();
        let h = Homography::solve(&quad, &quad).unwrap();

        for p in [Point::new(50.0, 50.0), Point::new(-250.0, 730.5), Point::new(1e4, -3.0)] {
            let mapped = h.apply(p, PROJECTION_EPSILON).unwrap();
            assert!(close(mapped, p, 1e-6), "{:?} -> {:?}", p, mapped);
        }
    }

    #[test]
    fn test_unit_square_to_viewport() {
        let src = ScreenQuad::default().to_array();
        let dst = ScreenQuad::from_viewport(1920.0, 1080.0).to_array();
        let h = Homography::solve(&src, &dst).unwrap();

        let mapped = h.apply(Point::new(0.5, 0.5), PROJECTION_EPSILON).unwrap();
        assert!(close(mapped, Point::new(960.0, 540.0), 1e-6));
    }

    #[test]
    fn test_general_quad_corners() {
        let src = [
            Point::new(0.12, 0.08),
            Point::new(0.91, 0.15),
            Point::new(0.85, 0.93),
            Point::new(0.05, 0.82),
        ];
        let dst = [
            Point::new(10.0, 20.0),
            Point::new(1900.0, -5.0),
            Point::new(1850.0, 1075.0),
            Point::new(40.0, 1000.0),
        ];
        let h = Homography::solve(&src, &dst).unwrap();

        for i in 0..4 {
            let mapped = h.apply(src[i], PROJECTION_EPSILON).unwrap();
            assert!(close(mapped, dst[i], 1e-6 * 2000.0), "corner {}: {:?}", i, mapped);
        }
        assert_eq!(h.coefficients()[8], 1.0);
    }

    #[test]
    fn test_repeated_point_is_singular() {
        let mut src = ScreenQuad::default().to_array();
        src[1] = src[0];
        let dst = ScreenQuad::from_viewport(800.0, 600.0).to_array();
        assert_eq!(Homography::solve(&src, &dst), Err(MapperError::SingularCalibration));
    }

    #[test]
    fn test_collinear_points_are_singular() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 3.0),
        ];
        let dst = ScreenQuad::default().to_array();
        assert_eq!(Homography::solve(&src, &dst), Err(MapperError::SingularCalibration));
    }

    #[test]
    fn test_nan_input_is_rejected() {
        let mut src = ScreenQuad::default().to_array();
        src[2] = Point::new(f64::NAN, 1.0);
        let dst = ScreenQuad::default().to_array();
        assert!(Homography::solve(&src, &dst).is_err());
    }

    #[test]
    fn test_degenerate_projection() {
        // Maps the line x = 1 to infinity
        let src = ScreenQuad::default().to_array();
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 1.0),
        ];
        let h = Homography::solve(&src, &dst).unwrap();
        let [.., g, hh, i] = h.coefficients();
        assert!(g.abs() > 1e-9);
        // Solve g*x + h*y + 1 = 0 at y = 0
        let x = -(i + hh * 0.0) / g;
        assert_eq!(
            h.apply(Point::new(x, 0.0), PROJECTION_EPSILON),
            Err(MapperError::DegenerateProjection)
        );
    }

    #[test]
    fn test_solve_is_deterministic() {
        let src = ScreenQuad::from_rect(0.2, 0.1, 0.6, 0.7).to_array();
        let dst = ScreenQuad::from_viewport(1280.0, 720.0).to_array();
        let a = Homography::solve(&src, &dst).unwrap();
        let b = Homography::solve(&src, &dst).unwrap();
        assert_eq!(a.coefficients(), b.coefficients());
    }
}
