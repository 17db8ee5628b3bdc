//! Raw pose sources: the opaque monocular tracker and the device-sensor
//! fallback, plus the collaborator traits they are built on.
//!
//! The controller picks exactly one [`PoseSource`] variant at `start()` and
//! dispatches on it every tick.

use anyhow::Result;
use nalgebra::{Point2, UnitQuaternion, Vector3};

use crate::geometry::CameraPose;

/// Longest processing edge handed to the tracker.
pub const MAX_PROCESSING_LONG_EDGE: u32 = 640;
/// Shortest processing edge handed to the tracker.
pub const MAX_PROCESSING_SHORT_EDGE: u32 = 480;

/// Pixel buffer the current video frame is rendered into before tracking.
///
/// Owned by the controller and sized once to the tracker dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }
}

/// Live video source.
pub trait FrameSource {
    /// Native video size, or `None` while no video is playing.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Draw the current frame scaled into `target`. Returns false when no
    /// frame could be decoded.
    fn render_into(&mut self, target: &mut FrameBuffer) -> bool;
}

/// Factory for the opaque monocular tracker.
pub trait TrackerBackend {
    fn initialize(&mut self, width: u32, height: u32) -> Result<Box<dyn TrackerInstance>>;
}

/// One initialized tracker. Matrices are 16 values in column-major order.
pub trait TrackerInstance {
    fn find_camera_pose(&mut self, frame: &FrameBuffer) -> Option<Vec<f64>>;

    fn find_plane(&mut self) -> Option<Vec<f64>> {
        None
    }

    /// 2D feature points of the last processed frame, in tracker pixels.
    fn frame_points(&self) -> Vec<Point2<f64>> {
        Vec::new()
    }

    /// Returns false when the backend has no reset.
    fn reset(&mut self) -> bool {
        false
    }
}

/// Device orientation angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceOrientation {
    /// Rotation about the vertical axis.
    pub alpha: f64,
    /// Front-back tilt.
    pub beta: f64,
    /// Left-right tilt.
    pub gamma: f64,
}

impl DeviceOrientation {
    /// Convert to a camera orientation.
    ///
    /// Intrinsic Y-X-Z Euler angles `(alpha, beta, -gamma)`, then a -90°
    /// turn about X so that a device lying flat looks down.
    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.alpha.to_radians());
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.beta.to_radians());
        let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -self.gamma.to_radians());
        let screen =
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -std::f64::consts::FRAC_PI_2);
        yaw * pitch * roll * screen
    }

    pub fn is_finite(&self) -> bool {
        self.alpha.is_finite() && self.beta.is_finite() && self.gamma.is_finite()
    }
}

/// Device orientation/motion sensors used when no tracker is available.
pub trait SensorBackend {
    /// Attach listeners, requesting runtime permission if the platform needs
    /// it. Errors mean the fallback is unusable.
    fn start(&mut self) -> Result<()>;

    /// Latest orientation reading, if any has arrived.
    fn orientation(&self) -> Option<DeviceOrientation>;

    /// Latest linear acceleration (gravity removed) in device frame, m/s².
    fn acceleration(&self) -> Option<Vector3<f64>>;

    fn stop(&mut self);
}

/// Integration state for the sensor fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorIntegrator {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Multiplier applied to velocity every tick.
    damping: f64,
}

impl SensorIntegrator {
    pub fn new(damping: f64) -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            damping: damping.clamp(0.0, 1.0),
        }
    }

    /// Advance by `dt` seconds. Acceleration is in device frame and is
    /// rotated by the current orientation before integration.
    pub fn step(
        &mut self,
        orientation: &DeviceOrientation,
        acceleration: Option<Vector3<f64>>,
        dt: f64,
    ) -> CameraPose {
        self.orientation = orientation.to_quaternion();
        if let Some(acc) = acceleration.filter(|a| a.iter().all(|v| v.is_finite())) {
            let world_acc = self.orientation * acc;
            self.velocity += world_acc * dt;
        }
        self.velocity *= self.damping;
        self.position += self.velocity * dt;
        self.pose()
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.position, self.orientation)
    }

    /// Zero the accumulated velocity and position.
    pub fn reset(&mut self) {
        self.position = Vector3::zeros();
        self.velocity = Vector3::zeros();
    }
}

/// Opaque tracker attached for one session.
pub struct NativeSession {
    pub instance: Box<dyn TrackerInstance>,
    pub frame: FrameBuffer,
}

impl NativeSession {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }
}

/// The raw pose source selected at `start()`.
pub enum PoseSource {
    Native(NativeSession),
    Sensor(SensorIntegrator),
    None,
}

/// Scale the native video size down so the long edge is at most
/// [`MAX_PROCESSING_LONG_EDGE`] and the short edge at most
/// [`MAX_PROCESSING_SHORT_EDGE`]. Both edges are rounded down to even values.
pub fn processing_resolution(width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let (long, short) = if width >= height { (width, height) } else { (height, width) };
    // Scale factor num/den, kept rational so exact fits stay exact.
    let (num, den) = if MAX_PROCESSING_LONG_EDGE as u64 * short as u64
        <= MAX_PROCESSING_SHORT_EDGE as u64 * long as u64
    {
        (MAX_PROCESSING_LONG_EDGE as u64, long as u64)
    } else {
        (MAX_PROCESSING_SHORT_EDGE as u64, short as u64)
    };
    let (num, den) = if num >= den { (1, 1) } else { (num, den) };
    let fit = |v: u32| (((v as u64 * num / den) as u32) & !1).max(2);
    Some((fit(width), fit(height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_processing_resolution_caps_edges() {
        assert_eq!(processing_resolution(1920, 1080), Some((640, 360)));
        assert_eq!(processing_resolution(1080, 1920), Some((360, 640)));
        assert_eq!(processing_resolution(640, 480), Some((640, 480)));
        assert_eq!(processing_resolution(320, 241), Some((320, 240)));
        assert_eq!(processing_resolution(0, 480), None);
    }

    #[test]
    fn test_flat_device_looks_down() {
        let flat = DeviceOrientation {
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
        };
        let forward = flat.to_quaternion() * Vector3::new(0.0, 0.0, -1.0);
        assert_relative_eq!(forward, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_upright_device_looks_forward() {
        let upright = DeviceOrientation {
            alpha: 0.0,
            beta: 90.0,
            gamma: 0.0,
        };
        let q = upright.to_quaternion();
        assert_relative_eq!(q.angle(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_integrator_damps_and_resets() {
        let mut integrator = SensorIntegrator::new(0.9);
        let upright = DeviceOrientation {
            alpha: 0.0,
            beta: 90.0,
            gamma: 0.0,
        };
        let pose = integrator.step(&upright, Some(Vector3::new(1.0, 0.0, 0.0)), 0.1);
        assert_relative_eq!(integrator.velocity.x, 0.09, epsilon = 1e-12);
        assert_relative_eq!(pose.position.x, 0.009, epsilon = 1e-12);

        integrator.step(&upright, None, 0.1);
        assert_relative_eq!(integrator.velocity.x, 0.081, epsilon = 1e-12);

        integrator.reset();
        assert_eq!(integrator.position, Vector3::zeros());
        assert_eq!(integrator.velocity, Vector3::zeros());
    }
}
