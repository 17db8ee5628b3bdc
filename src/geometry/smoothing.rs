//! Half-life exponential blending for positions, rotations and scalars.

use nalgebra::{UnitQuaternion, Vector3};

use super::CameraPose;

/// Fraction of the remaining gap closed after `dt` seconds.
///
/// `1 - 0.5^(dt / half_life)`; a non-positive half-life snaps immediately.
#[inline]
pub fn half_life_factor(dt: f64, half_life: f64) -> f64 {
    if half_life <= 0.0 {
        return 1.0;
    }
    if dt <= 0.0 {
        return 0.0;
    }
    1.0 - 0.5f64.powf(dt / half_life)
}

/// Exponential moving average step.
#[inline]
pub fn ema(current: f64, sample: f64, alpha: f64) -> f64 {
    current + (sample - current) * alpha.clamp(0.0, 1.0)
}

#[inline]
pub fn lerp_vec(from: &Vector3<f64>, to: &Vector3<f64>, t: f64) -> Vector3<f64> {
    from + (to - from) * t
}

/// Blend `current` toward `target` with independent half-lives for position
/// and rotation.
pub fn blend_pose(
    current: &CameraPose,
    target: &CameraPose,
    dt: f64,
    position_half_life: f64,
    rotation_half_life: f64,
) -> CameraPose {
    let kp = half_life_factor(dt, position_half_life);
    let kr = half_life_factor(dt, rotation_half_life);
    CameraPose {
        position: lerp_vec(&current.position, &target.position, kp),
        orientation: slerp(&current.orientation, &target.orientation, kr),
    }
}

/// Shortest-arc slerp that falls back to nlerp near antipodal inputs.
pub fn slerp(from: &UnitQuaternion<f64>, to: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    from.try_slerp(to, t, 1e-9)
        .unwrap_or_else(|| from.nlerp(to, t))
}
