//! Velocity-based motion model for pose prediction.

use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::geometry::CameraPose;

/// Raw pose stamped with session time (seconds).
#[derive(Debug, Clone, Copy)]
struct TimedPose {
    pose: CameraPose,
    time: f64,
}

/// Constant velocity motion model.
///
/// Linear velocity and a world-frame rotation axis/speed are derived from the
/// two most recent raw poses. Predictions extrapolate from the latest raw pose.
#[derive(Debug, Clone)]
pub struct MotionModel {
    last: Option<TimedPose>,
    /// Velocity in world frame (m/s).
    velocity: Vector3<f64>,
    rotation_axis: Unit<Vector3<f64>>,
    /// Angular speed about `rotation_axis` (rad/s).
    angular_speed: f64,
    /// Set once two raw poses with distinct timestamps have been seen.
    has_velocity: bool,
}

impl MotionModel {
    pub fn new() -> Self {
        Self {
            last: None,
            velocity: Vector3::zeros(),
            rotation_axis: Vector3::y_axis(),
            angular_speed: 0.0,
            has_velocity: false,
        }
    }

    /// Update the model with a new raw pose observed at `time`.
    pub fn update(&mut self, pose: &CameraPose, time: f64) {
        if let Some(prev) = self.last {
            let dt = time - prev.time;
            if dt > f64::EPSILON {
                self.velocity = (pose.position - prev.pose.position) / dt;
                let delta = pose.orientation * prev.pose.orientation.inverse();
                match delta.axis_angle() {
                    Some((axis, angle)) => {
                        self.rotation_axis = axis;
                        self.angular_speed = angle / dt;
                    }
                    None => self.angular_speed = 0.0,
                }
                self.has_velocity = true;
            }
        }
        self.last = Some(TimedPose { pose: *pose, time });
    }

    /// Extrapolate to `time`, never further than `max_horizon` seconds past
    /// the latest raw pose.
    pub fn predict(&self, time: f64, max_horizon: f64) -> Option<CameraPose> {
        self.last.map(|last| {
            let horizon = (time - last.time).clamp(0.0, max_horizon.max(0.0));
            let spin =
                UnitQuaternion::from_axis_angle(&self.rotation_axis, self.angular_speed * horizon);
            CameraPose {
                position: last.pose.position + self.velocity * horizon,
                orientation: spin * last.pose.orientation,
            }
        })
    }

    pub fn last_pose(&self) -> Option<&CameraPose> {
        self.last.as_ref().map(|l| &l.pose)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.last.map(|l| l.time)
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    pub fn angular_speed(&self) -> f64 {
        self.angular_speed
    }

    /// False until a second raw pose has given the model a velocity.
    pub fn has_velocity(&self) -> bool {
        self.has_velocity
    }

    /// Reset the motion model.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::new()
    }
}
