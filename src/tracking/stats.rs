//! Rolling tracking diagnostics.

use crate::geometry::CameraPose;
use crate::geometry::smoothing::ema;
use crate::tracking::TrackingMode;

/// Counters and jitter rates reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackingStats {
    /// Attempted pose updates (tracker calls or sensor ticks).
    pub frames_processed: u64,
    pub tracked_count: u64,
    pub lost_count: u64,
    pub mode: TrackingMode,
    /// Smoothed positional rate of change between raw poses (m/s).
    pub position_jitter_rate: f64,
    /// Smoothed angular rate of change between raw poses (rad/s).
    pub angular_jitter_rate: f64,
    /// Time since the last accepted raw pose (ms); 0 before the first one.
    pub last_pose_age_ms: f64,
}

impl TrackingStats {
    pub fn new(mode: TrackingMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Fold one pair of consecutive raw poses into the jitter averages.
    pub(crate) fn record_jitter(
        &mut self,
        prev: &CameraPose,
        curr: &CameraPose,
        dt: f64,
        alpha: f64,
    ) {
        if dt.is_nan() || dt <= f64::EPSILON {
            return;
        }
        let (dp, dq) = prev.delta(curr);
        let pos_rate = dp / dt;
        let ang_rate = dq / dt;
        if pos_rate.is_finite() {
            self.position_jitter_rate = ema(self.position_jitter_rate, pos_rate, alpha);
        }
        if ang_rate.is_finite() {
            self.angular_jitter_rate = ema(self.angular_jitter_rate, ang_rate, alpha);
        }
    }

    /// Fraction of attempted updates that produced a pose.
    pub fn tracked_ratio(&self) -> f64 {
        if self.frames_processed == 0 {
            0.0
        } else {
            self.tracked_count as f64 / self.frames_processed as f64
        }
    }
}
