//! Back-projection of a normalized depth buffer into world-space points.
//!
//! Monocular depth has no metric scale of its own: normalized depth in
//! `[0, 1]` is remapped to `[near_m, far_m]` and multiplied by an externally
//! calibrated scale factor.

use nalgebra::Vector3;
use serde::Deserialize;

use crate::geometry::{CameraIntrinsics, CameraPose};

/// Row-major normalized depth (0 = near, 1 = far).
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// True when the buffer is non-empty and `data` matches its dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width.checked_mul(self.height) == Some(self.data.len())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Pixel step in both directions.
    pub stride: usize,
    /// Normalized depths outside `[valid_min, valid_max]` are rejected.
    pub valid_min: f32,
    pub valid_max: f32,
    /// Metric depth at normalized 0.
    pub near_m: f64,
    /// Metric depth at normalized 1.
    pub far_m: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            stride: 4,
            valid_min: 0.02,
            valid_max: 0.98,
            near_m: 0.3,
            far_m: 5.0,
        }
    }
}

impl SamplerConfig {
    /// Metric depth along the optical axis for a normalized sample.
    #[inline]
    pub fn metric_depth(&self, normalized: f32, scale_factor: f64) -> f64 {
        (self.near_m + normalized as f64 * (self.far_m - self.near_m)) * scale_factor
    }
}

/// Sample the buffer on a fixed stride and lift valid pixels to world space.
///
/// Returns `None` for malformed input (dimension mismatch, bad intrinsics or
/// scale); an empty vector just means no pixel passed the depth window.
pub fn sample_points(
    depth: &DepthBuffer,
    intrinsics: &CameraIntrinsics,
    pose: &CameraPose,
    scale_factor: f64,
    config: &SamplerConfig,
) -> Option<Vec<Vector3<f64>>> {
    if !depth.is_well_formed()
        || !intrinsics.is_valid()
        || !scale_factor.is_finite()
        || scale_factor <= 0.0
    {
        return None;
    }
    let stride = config.stride.max(1);
    let mut points =
        Vec::with_capacity(depth.width.div_ceil(stride) * depth.height.div_ceil(stride));

    for v in (0..depth.height).step_by(stride) {
        for u in (0..depth.width).step_by(stride) {
            let d = depth.data[v * depth.width + u];
            if !d.is_finite() || d < config.valid_min || d > config.valid_max {
                continue;
            }
            let ray = intrinsics.pixel_ray(u, v, depth.width, depth.height);
            let p_cam = ray * config.metric_depth(d, scale_factor);
            points.push(pose.transform_point(&p_cam));
        }
    }
    Some(points)
}
