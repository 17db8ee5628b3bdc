use serde::Deserialize;

use crate::geometry::AxisFixup;

/// Tuning for the tracking controller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Maximum rate of native tracker invocations.
    pub target_fps: f64,
    pub position_half_life_s: f64,
    pub rotation_half_life_s: f64,
    /// Furthest the motion model extrapolates past the last raw pose.
    pub max_prediction_s: f64,
    /// Sustained loss after which the tracker instance is reset.
    pub lost_reset_timeout_s: f64,
    /// EMA weight of each new jitter sample.
    pub jitter_smoothing: f64,
    /// Per-tick velocity multiplier on the sensor path.
    pub sensor_velocity_damping: f64,
    /// Convention fix-up for raw tracker matrices.
    pub axis_fixup: AxisFixup,
}

impl TrackingConfig {
    pub fn min_native_interval(&self) -> f64 {
        if self.target_fps > 0.0 {
            1.0 / self.target_fps
        } else {
            0.0
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            position_half_life_s: 0.06,
            rotation_half_life_s: 0.05,
            max_prediction_s: 0.12,
            lost_reset_timeout_s: 1.5,
            jitter_smoothing: 0.2,
            sensor_velocity_damping: 0.9,
            axis_fixup: AxisFixup::default(),
        }
    }
}
