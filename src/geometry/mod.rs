//! Geometry utilities: camera pose, half-life blending, planes, pinhole rays.

pub mod camera;
pub mod plane;
pub mod pose;
pub mod smoothing;

pub use camera::CameraIntrinsics;
pub use plane::{Plane, centroid};
pub use pose::{AxisFixup, CameraPose, PoseDecodeError};
pub use smoothing::{blend_pose, half_life_factor};
