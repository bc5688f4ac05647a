//! handpoint - point at things on screen with a tracked hand
//!
//! A calibrated homography maps hand-tracking landmarks into viewport space,
//! and a ray-march along the index finger finds which on-screen element the
//! hand is pointing at.

pub mod calibration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod hand;
pub mod layout;
pub mod mapper;
pub mod quad;
pub mod selection;
pub mod server;
pub mod session;
pub mod transform;

pub use error::{FrameError, MapperError};
pub use geometry::{Point, Point3};
pub use hand::{HandSnapshot, Landmark};
pub use mapper::{HandViewportMapper, HitInfo, HitTester, SearchSettings, WidgetHit};
pub use quad::{Corner, ScreenQuad};
pub use transform::{Homography, Tolerances};
