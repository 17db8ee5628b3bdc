//! Tracking controller: owns the pose-source lifecycle, the status state
//! machine, motion prediction and smoothing, and loss recovery.
//!
//! The controller never returns errors or panics across its public surface.
//! Startup failures surface as [`TrackingStatus::Unavailable`] plus a reason,
//! per-tick failures as [`TrackingStatus::Lost`] while the pose keeps moving
//! along the motion model.

use anyhow::{Context, Result};
use nalgebra::Point2;
use tracing::{debug, info, warn};

use crate::geometry::{CameraPose, blend_pose};
use crate::tracking::config::TrackingConfig;
use crate::tracking::motion_model::MotionModel;
use crate::tracking::source::{
    FrameBuffer, FrameSource, NativeSession, PoseSource, SensorBackend, SensorIntegrator,
    TrackerBackend, processing_resolution,
};
use crate::tracking::stats::TrackingStats;
use crate::tracking::{TrackingMode, TrackingStatus};

/// Slack when comparing accumulated tick time against the throttle interval.
const THROTTLE_EPS: f64 = 1e-9;

/// Tracker feature points for diagnostics, in tracker pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePoints {
    pub points: Vec<Point2<f64>>,
    pub width: u32,
    pub height: u32,
}

pub struct TrackingController {
    config: TrackingConfig,

    frames: Option<Box<dyn FrameSource>>,
    backend: Option<Box<dyn TrackerBackend>>,
    sensors: Option<Box<dyn SensorBackend>>,

    /// Selected at `start()`, dropped at `stop()`.
    source: PoseSource,

    status: TrackingStatus,
    reason: String,

    motion: MotionModel,
    /// Smoothed pose handed to consumers.
    pose: CameraPose,

    stats: TrackingStats,

    /// Session clock, advanced by `update(dt)`.
    clock: f64,
    /// Time accumulated since the last native tracker call.
    since_native_update: f64,
    /// Start of the current loss episode (re-armed after each tracker reset).
    first_loss_at: Option<f64>,

    plane: Option<CameraPose>,
    frame_points: Option<FramePoints>,
}

impl TrackingController {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            frames: None,
            backend: None,
            sensors: None,
            source: PoseSource::None,
            status: TrackingStatus::Idle,
            reason: "not started".to_string(),
            motion: MotionModel::new(),
            pose: CameraPose::identity(),
            stats: TrackingStats::default(),
            clock: 0.0,
            since_native_update: f64::INFINITY,
            first_loss_at: None,
            plane: None,
            frame_points: None,
        }
    }

    pub fn with_frame_source(mut self, frames: Box<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_tracker(mut self, backend: Box<dyn TrackerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_sensors(mut self, sensors: Box<dyn SensorBackend>) -> Self {
        self.sensors = Some(sensors);
        self
    }

    /// Attach a pose source: the native tracker if it initializes, otherwise
    /// the device sensors, otherwise nothing (`Unavailable`).
    ///
    /// Calling this while running restarts the session.
    pub fn start(&mut self) -> TrackingStatus {
        self.stop();

        self.motion.reset();
        self.pose = CameraPose::identity();
        self.clock = 0.0;
        self.since_native_update = f64::INFINITY;
        self.first_loss_at = None;
        self.stats = TrackingStats::default();
        self.set_status(TrackingStatus::Initializing, "starting pose source");

        let native_err = match self.attach_native() {
            Ok(session) => {
                info!(
                    width = session.width(),
                    height = session.height(),
                    "native tracker attached"
                );
                self.source = PoseSource::Native(session);
                self.stats.mode = TrackingMode::Native;
                self.set_status(TrackingStatus::Initializing, "waiting for first tracker pose");
                return self.status;
            }
            Err(e) => e,
        };
        warn!("native tracker unavailable: {:#}", native_err);

        match self.attach_sensors() {
            Ok(()) => {
                info!("falling back to device orientation sensors");
                self.source = PoseSource::Sensor(SensorIntegrator::new(
                    self.config.sensor_velocity_damping,
                ));
                self.stats.mode = TrackingMode::Sensor;
                self.set_status(TrackingStatus::Initializing, "waiting for device orientation");
            }
            Err(sensor_err) => {
                warn!("device sensors unavailable: {:#}", sensor_err);
                self.stats.mode = TrackingMode::None;
                let reason = format!("no pose source ({native_err:#}; {sensor_err:#})");
                self.set_status(TrackingStatus::Unavailable, &reason);
            }
        }
        self.status
    }

    /// Release the pose source and return to `Idle`. Idempotent.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.source, PoseSource::None) {
            PoseSource::Native(session) => {
                debug!("releasing native tracker");
                drop(session);
            }
            PoseSource::Sensor(_) => {
                if let Some(sensors) = self.sensors.as_mut() {
                    sensors.stop();
                }
            }
            PoseSource::None => {}
        }
        self.plane = None;
        self.frame_points = None;
        self.first_loss_at = None;
        if self.status != TrackingStatus::Idle {
            self.set_status(TrackingStatus::Idle, "stopped");
        }
    }

    /// Advance one tick of `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.clock += dt;

        match self.source {
            PoseSource::Native(_) => self.update_native(dt),
            PoseSource::Sensor(_) => self.update_sensor(dt),
            PoseSource::None => return,
        }

        if let Some(t) = self.motion.last_time() {
            self.stats.last_pose_age_ms = (self.clock - t).max(0.0) * 1000.0;
        }
    }

    /// Zero the fallback accumulators, forget the motion history and ask the
    /// tracker to reset if it can.
    pub fn reset_world(&mut self) {
        match &mut self.source {
            PoseSource::Native(session) => {
                if session.instance.reset() {
                    info!("tracker reset on world reset");
                } else {
                    debug!("tracker has no reset; keeping its map");
                }
            }
            PoseSource::Sensor(integrator) => integrator.reset(),
            PoseSource::None => {}
        }
        self.motion.reset();
        self.first_loss_at = None;
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Plane reported by the tracker with its last successful pose.
    pub fn plane(&self) -> Option<CameraPose> {
        self.plane
    }

    pub fn frame_points(&self) -> Option<&FramePoints> {
        self.frame_points.as_ref()
    }

    pub fn stats(&self) -> TrackingStats {
        self.stats
    }

    pub fn status(&self) -> TrackingStatus {
        self.status
    }

    pub fn status_reason(&self) -> &str {
        &self.reason
    }

    fn attach_native(&mut self) -> Result<NativeSession> {
        let frames = self.frames.as_ref().context("no video source")?;
        let (w, h) = frames.dimensions().context("video has no dimensions yet")?;
        let (pw, ph) = processing_resolution(w, h)
            .with_context(|| format!("invalid video size {w}x{h}"))?;
        let backend = self.backend.as_mut().context("no tracker backend")?;
        let instance = backend
            .initialize(pw, ph)
            .with_context(|| format!("tracker initialization at {pw}x{ph} failed"))?;
        Ok(NativeSession {
            instance,
            frame: FrameBuffer::new(pw, ph),
        })
    }

    fn attach_sensors(&mut self) -> Result<()> {
        let sensors = self.sensors.as_mut().context("no orientation sensors")?;
        sensors
            .start()
            .context("orientation sensors refused to start")
    }

    fn update_native(&mut self, dt: f64) {
        self.since_native_update += dt;
        if self.since_native_update + THROTTLE_EPS < self.config.min_native_interval() {
            self.predict(dt);
            return;
        }
        self.since_native_update = 0.0;
        self.stats.frames_processed += 1;

        match self.acquire_native_pose() {
            Some(raw) => {
                self.accept_raw_pose(raw, dt, true);
                self.refresh_tracker_extras();
            }
            None => self.handle_loss(dt),
        }
        self.maybe_reset_lost_tracker();
    }

    fn acquire_native_pose(&mut self) -> Option<CameraPose> {
        let PoseSource::Native(session) = &mut self.source else {
            return None;
        };
        let frames = self.frames.as_mut()?;
        if !frames.render_into(&mut session.frame) {
            debug!("no decodable video frame this tick");
            return None;
        }
        let raw = session.instance.find_camera_pose(&session.frame)?;
        match CameraPose::from_column_major(&raw, &self.config.axis_fixup) {
            Ok(pose) => Some(pose),
            Err(e) => {
                debug!("discarding malformed tracker pose: {}", e);
                None
            }
        }
    }

    fn refresh_tracker_extras(&mut self) {
        let PoseSource::Native(session) = &mut self.source else {
            return;
        };
        self.plane = session
            .instance
            .find_plane()
            .and_then(|m| CameraPose::from_column_major(&m, &self.config.axis_fixup).ok());
        self.frame_points = Some(FramePoints {
            points: session.instance.frame_points(),
            width: session.width(),
            height: session.height(),
        });
    }

    fn update_sensor(&mut self, dt: f64) {
        self.stats.frames_processed += 1;
        let reading = self.sensors.as_ref().and_then(|s| {
            s.orientation()
                .filter(|o| o.is_finite())
                .map(|o| (o, s.acceleration()))
        });
        let Some((orientation, acceleration)) = reading else {
            self.handle_loss(dt);
            return;
        };
        let PoseSource::Sensor(integrator) = &mut self.source else {
            return;
        };
        let raw = integrator.step(&orientation, acceleration, dt);
        self.accept_raw_pose(raw, dt, false);
    }

    /// Record a successful raw pose: jitter, motion model, smoothing, status.
    ///
    /// Raw poses are taken as-is until the motion model has a velocity, so
    /// the smoothed pose carries no lag into the first predicted interval.
    fn accept_raw_pose(&mut self, raw: CameraPose, dt: f64, smooth: bool) {
        let last = self.motion.last_pose().copied().zip(self.motion.last_time());
        if let Some((prev, prev_t)) = last {
            self.stats.record_jitter(
                &prev,
                &raw,
                self.clock - prev_t,
                self.config.jitter_smoothing,
            );
        }
        let settled = self.motion.has_velocity();
        self.motion.update(&raw, self.clock);

        self.pose = if smooth && settled {
            blend_pose(
                &self.pose,
                &raw,
                dt,
                self.config.position_half_life_s,
                self.config.rotation_half_life_s,
            )
        } else {
            raw
        };
        self.stats.tracked_count += 1;
        self.first_loss_at = None;
        self.set_status(TrackingStatus::Tracking, "tracking");
    }

    fn handle_loss(&mut self, dt: f64) {
        self.stats.lost_count += 1;
        if self.first_loss_at.is_none() {
            self.first_loss_at = Some(self.clock);
        }
        self.predict(dt);
        if self.status != TrackingStatus::Initializing {
            self.set_status(TrackingStatus::Lost, "pose lost; predicting from motion model");
        }
    }

    /// Blend toward the motion-model extrapolation. No-op before the first
    /// raw pose, so the pose never jumps to identity.
    fn predict(&mut self, dt: f64) {
        if let Some(predicted) = self.motion.predict(self.clock, self.config.max_prediction_s) {
            self.pose = blend_pose(
                &self.pose,
                &predicted,
                dt,
                self.config.position_half_life_s,
                self.config.rotation_half_life_s,
            );
        }
    }

    fn maybe_reset_lost_tracker(&mut self) {
        if self.status != TrackingStatus::Lost {
            return;
        }
        let Some(since) = self.first_loss_at else {
            return;
        };
        let lost_for = self.clock - since;
        if lost_for <= self.config.lost_reset_timeout_s {
            return;
        }
        if let PoseSource::Native(session) = &mut self.source {
            let supported = session.instance.reset();
            warn!(lost_for_s = lost_for, supported, "tracking lost too long; resetting tracker");
        }
        self.first_loss_at = Some(self.clock);
    }

    fn set_status(&mut self, status: TrackingStatus, reason: &str) {
        if status != self.status {
            info!(from = %self.status, to = %status, reason, "tracking status changed");
        }
        self.status = status;
        if self.reason != reason {
            self.reason = reason.to_string();
        }
    }
}

impl Drop for TrackingController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::half_life_factor;
    use crate::tracking::source::{DeviceOrientation, TrackerInstance};
    use anyhow::bail;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    struct FixedVideo {
        size: Option<(u32, u32)>,
    }

    impl FrameSource for FixedVideo {
        fn dimensions(&self) -> Option<(u32, u32)> {
            self.size
        }

        fn render_into(&mut self, target: &mut FrameBuffer) -> bool {
            target.data.fill(128);
            true
        }
    }

    /// Shared observation handles for a scripted tracker.
    #[derive(Clone, Default)]
    struct Probe {
        script: Rc<RefCell<VecDeque<Option<Vec<f64>>>>>,
        calls: Rc<Cell<usize>>,
        resets: Rc<Cell<usize>>,
        init_size: Rc<Cell<Option<(u32, u32)>>>,
    }

    impl Probe {
        fn push(&self, pose: Option<CameraPose>) {
            let raw = pose.map(|p| p.to_matrix().as_slice().to_vec());
            self.script.borrow_mut().push_back(raw);
        }
    }

    struct ScriptedBackend {
        probe: Probe,
        fail: bool,
    }

    impl TrackerBackend for ScriptedBackend {
        fn initialize(&mut self, width: u32, height: u32) -> Result<Box<dyn TrackerInstance>> {
            if self.fail {
                bail!("tracker library missing");
            }
            self.probe.init_size.set(Some((width, height)));
            Ok(Box::new(ScriptedTracker {
                probe: self.probe.clone(),
            }))
        }
    }

    struct ScriptedTracker {
        probe: Probe,
    }

    impl TrackerInstance for ScriptedTracker {
        fn find_camera_pose(&mut self, _frame: &FrameBuffer) -> Option<Vec<f64>> {
            self.probe.calls.set(self.probe.calls.get() + 1);
            self.probe.script.borrow_mut().pop_front().flatten()
        }

        fn find_plane(&mut self) -> Option<Vec<f64>> {
            let floor = CameraPose::from_position(Vector3::new(0.0, -1.0, 0.0));
            Some(floor.to_matrix().as_slice().to_vec())
        }

        fn frame_points(&self) -> Vec<Point2<f64>> {
            vec![Point2::new(10.0, 20.0)]
        }

        fn reset(&mut self) -> bool {
            self.probe.resets.set(self.probe.resets.get() + 1);
            true
        }
    }

    struct FakeSensors {
        orientation: Rc<Cell<Option<DeviceOrientation>>>,
        acceleration: Option<Vector3<f64>>,
        permitted: bool,
        stopped: Rc<Cell<usize>>,
    }

    impl SensorBackend for FakeSensors {
        fn start(&mut self) -> Result<()> {
            if !self.permitted {
                bail!("permission denied");
            }
            Ok(())
        }

        fn orientation(&self) -> Option<DeviceOrientation> {
            self.orientation.get()
        }

        fn acceleration(&self) -> Option<Vector3<f64>> {
            self.acceleration
        }

        fn stop(&mut self) {
            self.stopped.set(self.stopped.get() + 1);
        }
    }

    fn native_controller(probe: &Probe) -> TrackingController {
        native_controller_with(probe, TrackingConfig::default())
    }

    fn native_controller_with(probe: &Probe, config: TrackingConfig) -> TrackingController {
        TrackingController::new(config)
            .with_frame_source(Box::new(FixedVideo {
                size: Some((1280, 720)),
            }))
            .with_tracker(Box::new(ScriptedBackend {
                probe: probe.clone(),
                fail: false,
            }))
    }

    fn upright() -> DeviceOrientation {
        DeviceOrientation {
            alpha: 0.0,
            beta: 90.0,
            gamma: 0.0,
        }
    }

    #[test]
    fn test_unavailable_without_any_source() {
        let mut controller = TrackingController::new(TrackingConfig::default());
        assert_eq!(controller.start(), TrackingStatus::Unavailable);
        assert!(!controller.status_reason().is_empty());

        controller.update(1.0 / 60.0);
        let pose = controller.pose();
        assert_eq!(pose, CameraPose::identity());
        assert_eq!(controller.stats().mode, TrackingMode::None);
        assert_eq!(controller.stats().frames_processed, 0);
        assert!(controller.plane().is_none());
        assert!(controller.frame_points().is_none());
    }

    #[test]
    fn test_failed_tracker_and_denied_sensors_is_unavailable() {
        let stopped = Rc::new(Cell::new(0));
        let mut controller = TrackingController::new(TrackingConfig::default())
            .with_frame_source(Box::new(FixedVideo {
                size: Some((640, 480)),
            }))
            .with_tracker(Box::new(ScriptedBackend {
                probe: Probe::default(),
                fail: true,
            }))
            .with_sensors(Box::new(FakeSensors {
                orientation: Rc::new(Cell::new(None)),
                acceleration: None,
                permitted: false,
                stopped: stopped.clone(),
            }));

        assert_eq!(controller.start(), TrackingStatus::Unavailable);
        assert!(controller.status_reason().contains("permission denied"));
        assert_eq!(controller.pose(), CameraPose::identity());
    }

    #[test]
    fn test_tracker_initialized_at_capped_resolution() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        assert_eq!(controller.start(), TrackingStatus::Initializing);
        assert_eq!(probe.init_size.get(), Some((640, 360)));
        assert_eq!(controller.stats().mode, TrackingMode::Native);
    }

    #[test]
    fn test_first_pose_moves_to_tracking_and_exposes_extras() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();
        probe.push(Some(CameraPose::from_position(Vector3::new(1.0, 2.0, 3.0))));

        controller.update(1.0 / 60.0);
        assert_eq!(controller.status(), TrackingStatus::Tracking);
        let expected = Vector3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(controller.pose().position, expected, epsilon = 1e-12);

        let plane = controller.plane().unwrap();
        assert_relative_eq!(plane.position.y, -1.0, epsilon = 1e-12);
        let points = controller.frame_points().unwrap();
        assert_eq!((points.width, points.height), (640, 360));
        assert_eq!(points.points.len(), 1);
    }

    #[test]
    fn test_failures_before_first_pose_stay_initializing() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();
        for _ in 0..5 {
            probe.push(None);
            controller.update(0.05);
        }
        assert_eq!(controller.status(), TrackingStatus::Initializing);
        assert_eq!(controller.stats().lost_count, 5);
        assert_eq!(controller.pose(), CameraPose::identity());
    }

    fn assert_jitter_sane(controller: &TrackingController) {
        let stats = controller.stats();
        assert!(stats.position_jitter_rate.is_finite() && stats.position_jitter_rate >= 0.0);
        assert!(stats.angular_jitter_rate.is_finite() && stats.angular_jitter_rate >= 0.0);
    }

    fn push_ramp(probe: &Probe) {
        // Raw poses for t = 0.0, 0.1, 0.2.
        for x in [0.0, 0.05, 0.10] {
            probe.push(Some(CameraPose::from_position(Vector3::new(x, 0.0, 0.0))));
        }
    }

    #[test]
    fn test_prediction_continuity_between_raw_poses() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();

        // Ticks every 0.05 s; the tracker misses the ticks between raw poses.
        probe.push(Some(CameraPose::from_position(Vector3::new(0.0, 0.0, 0.0))));
        probe.push(None);
        probe.push(Some(CameraPose::from_position(Vector3::new(0.05, 0.0, 0.0))));
        probe.push(None);
        probe.push(Some(CameraPose::from_position(Vector3::new(0.10, 0.0, 0.0))));

        controller.update(0.0);
        assert_relative_eq!(controller.pose().position.x, 0.0);

        // t = 0.05: no velocity yet, so the pose holds the only raw value.
        controller.update(0.05);
        assert_eq!(controller.pose().position.x, 0.0);
        assert_jitter_sane(&controller);

        // t = 0.10: the second raw pose is taken without lag.
        controller.update(0.05);
        assert_relative_eq!(controller.pose().position.x, 0.05, epsilon = 1e-12);
        assert_jitter_sane(&controller);

        // t = 0.15: lost tick, predicted strictly inside (0.05, 0.10).
        controller.update(0.05);
        let x = controller.pose().position.x;
        assert!(x > 0.05 && x < 0.10, "x = {x}");
        let expected = 0.05 + 0.025 * half_life_factor(0.05, 0.06);
        assert_relative_eq!(x, expected, epsilon = 1e-9);
        assert_eq!(controller.status(), TrackingStatus::Lost);
        assert_jitter_sane(&controller);

        // t = 0.20: third raw pose.
        controller.update(0.05);
        let x_end = controller.pose().position.x;
        assert!(x_end > x && x_end <= 0.10, "x = {x_end}");
        assert_eq!(controller.status(), TrackingStatus::Tracking);
        assert_eq!(controller.stats().tracked_count, 3);
        assert_eq!(controller.stats().lost_count, 2);
        assert_jitter_sane(&controller);
    }

    #[test]
    fn test_prediction_continuity_with_slow_tracker() {
        let probe = Probe::default();
        let config = TrackingConfig {
            target_fps: 10.0,
            ..Default::default()
        };
        let mut controller = native_controller_with(&probe, config);
        controller.start();
        push_ramp(&probe);

        controller.update(0.0);
        for _ in 1..6 {
            controller.update(1.0 / 60.0);
            // Only one raw pose so far: held, never extrapolated.
            assert_eq!(controller.pose().position.x, 0.0);
            assert_jitter_sane(&controller);
        }
        assert_eq!(probe.calls.get(), 1);

        controller.update(1.0 / 60.0);
        assert_eq!(probe.calls.get(), 2);
        assert_relative_eq!(controller.pose().position.x, 0.05, epsilon = 1e-12);

        let mut last = 0.05;
        for _ in 7..12 {
            controller.update(1.0 / 60.0);
            let x = controller.pose().position.x;
            assert!(x > 0.05 && x < 0.10, "x = {x}");
            assert!(x > last);
            last = x;
            assert_jitter_sane(&controller);
        }

        controller.update(1.0 / 60.0);
        assert_eq!(probe.calls.get(), 3);
        let x = controller.pose().position.x;
        assert!(x > last && x <= 0.10, "x = {x}");
        assert_eq!(controller.stats().lost_count, 0);
    }

    #[test]
    fn test_orientation_stays_unit_under_noise_and_loss() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();

        for i in 0..200 {
            let t = i as f64 / 60.0;
            if i % 7 == 3 {
                probe.push(None);
            } else {
                let wobble = (t * 13.0).sin() * 0.02;
                let q = UnitQuaternion::from_euler_angles(t * 0.8 + wobble, t * 1.7, -t * 0.4);
                probe.push(Some(CameraPose::new(Vector3::new(t, wobble, 0.0), q)));
            }
            controller.update(1.0 / 60.0);
            let norm = controller.pose().orientation.quaternion().norm();
            assert!((norm - 1.0).abs() < 1e-5, "norm {norm} at tick {i}");
        }
    }

    #[test]
    fn test_native_calls_are_throttled() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();
        for _ in 0..8 {
            probe.push(Some(CameraPose::identity()));
        }
        for _ in 0..8 {
            controller.update(1.0 / 240.0);
        }
        assert_eq!(probe.calls.get(), 2);
        assert_eq!(controller.stats().frames_processed, 2);
    }

    #[test]
    fn test_malformed_pose_counts_as_loss() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();
        probe.push(Some(CameraPose::identity()));
        controller.update(0.05);
        probe.script.borrow_mut().push_back(Some(vec![1.0; 9]));
        controller.update(0.05);

        assert_eq!(controller.status(), TrackingStatus::Lost);
        assert_eq!(controller.stats().lost_count, 1);
    }

    #[test]
    fn test_sustained_loss_resets_tracker_and_stays_lost() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.start();
        probe.push(Some(CameraPose::from_position(Vector3::new(0.3, 0.0, 0.0))));
        controller.update(0.1);

        for _ in 0..20 {
            controller.update(0.1);
        }
        assert_eq!(controller.status(), TrackingStatus::Lost);
        // 2.0 s of loss with a 1.5 s timeout: exactly one reset so far.
        assert_eq!(probe.resets.get(), 1);
        // Pose held near the last known position rather than snapping to identity.
        assert_relative_eq!(controller.pose().position.x, 0.3, epsilon = 1e-9);
        assert!(controller.stats().last_pose_age_ms > 1900.0);

        probe.push(Some(CameraPose::from_position(Vector3::new(0.3, 0.0, 0.0))));
        controller.update(0.1);
        assert_eq!(controller.status(), TrackingStatus::Tracking);
    }

    #[test]
    fn test_stop_is_idempotent_and_restart_works() {
        let probe = Probe::default();
        let mut controller = native_controller(&probe);
        controller.stop();
        assert_eq!(controller.status(), TrackingStatus::Idle);

        controller.start();
        controller.stop();
        controller.stop();
        assert_eq!(controller.status(), TrackingStatus::Idle);

        // Ticks while idle do nothing.
        controller.update(0.1);
        assert_eq!(controller.stats().frames_processed, 0);

        assert_eq!(controller.start(), TrackingStatus::Initializing);
    }

    #[test]
    fn test_sensor_fallback_tracks_and_resets_world() {
        let orientation = Rc::new(Cell::new(None));
        let stopped = Rc::new(Cell::new(0));
        let mut controller = TrackingController::new(TrackingConfig::default())
            .with_frame_source(Box::new(FixedVideo { size: None }))
            .with_tracker(Box::new(ScriptedBackend {
                probe: Probe::default(),
                fail: false,
            }))
            .with_sensors(Box::new(FakeSensors {
                orientation: orientation.clone(),
                acceleration: Some(Vector3::new(1.0, 0.0, 0.0)),
                permitted: true,
                stopped: stopped.clone(),
            }));

        assert_eq!(controller.start(), TrackingStatus::Initializing);
        assert_eq!(controller.stats().mode, TrackingMode::Sensor);

        controller.update(0.1);
        assert_eq!(controller.status(), TrackingStatus::Initializing);

        orientation.set(Some(upright()));
        for _ in 0..10 {
            controller.update(0.1);
        }
        assert_eq!(controller.status(), TrackingStatus::Tracking);
        let pose = controller.pose();
        assert!(pose.position.x > 0.0);
        assert_relative_eq!(pose.orientation.angle(), 0.0, epsilon = 1e-9);

        controller.reset_world();
        controller.update(0.0);
        assert_relative_eq!(controller.pose().position.x, 0.0, epsilon = 1e-12);

        controller.stop();
        assert_eq!(stopped.get(), 1);
    }
}
