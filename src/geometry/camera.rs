//! Pinhole camera described by vertical field of view and aspect ratio.
//!
//! Camera space follows the render convention: +X right, +Y up, the optical
//! axis along -Z.

use nalgebra::Vector3;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraIntrinsics {
    /// Vertical field of view in degrees.
    pub fov_y_deg: f64,
    /// Width / height.
    pub aspect: f64,
}

impl CameraIntrinsics {
    pub fn new(fov_y_deg: f64, aspect: f64) -> Self {
        Self { fov_y_deg, aspect }
    }

    pub fn is_valid(&self) -> bool {
        self.fov_y_deg.is_finite()
            && self.fov_y_deg > 0.0
            && self.fov_y_deg < 180.0
            && self.aspect.is_finite()
            && self.aspect > 0.0
    }

    /// Ray through normalized device coordinates (`[-1, 1]`, +Y up), scaled
    /// so that its z component is -1.
    pub fn ray_from_ndc(&self, ndc_x: f64, ndc_y: f64) -> Vector3<f64> {
        let tan_half = (self.fov_y_deg.to_radians() * 0.5).tan();
        Vector3::new(ndc_x * tan_half * self.aspect, ndc_y * tan_half, -1.0)
    }

    /// Ray through the centre of pixel `(u, v)` of a `width` x `height` image
    /// (row 0 at the top).
    pub fn pixel_ray(&self, u: usize, v: usize, width: usize, height: usize) -> Vector3<f64> {
        let ndc_x = (u as f64 + 0.5) / width as f64 * 2.0 - 1.0;
        let ndc_y = 1.0 - (v as f64 + 0.5) / height as f64 * 2.0;
        self.ray_from_ndc(ndc_x, ndc_y)
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            fov_y_deg: 60.0,
            aspect: 4.0 / 3.0,
        }
    }
}
