//! AR session - couples the tracking controller with the plane mapper.
//!
//! Tracking runs every tick. Depth estimation is slow and external, so the
//! session hands out a `DepthRequest` ticket on a fixed interval and maps
//! the result against the pose captured when the ticket was issued.

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info};

use crate::geometry::{CameraIntrinsics, CameraPose};
use crate::mapping::{DepthBuffer, MapperConfig, MappingOutcome, PlaneMapper, WorldSurface};
use crate::tracking::{FramePoints, TrackingController, TrackingStats, TrackingStatus};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between depth requests.
    pub depth_interval_s: f64,
    /// Metric scale applied to the depth network's output.
    pub depth_scale_factor: f64,
    pub intrinsics: CameraIntrinsics,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            depth_interval_s: 1.2,
            depth_scale_factor: 1.0,
            intrinsics: CameraIntrinsics::default(),
        }
    }
}

/// Ticket for one asynchronous depth estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRequest {
    /// Session generation the request belongs to.
    pub generation: u64,
    /// Camera pose when the frame for this request was taken.
    pub pose: CameraPose,
    /// Session time (seconds) of the request.
    pub requested_at: f64,
}

pub struct ArSession {
    config: SessionConfig,
    controller: TrackingController,
    mapper: PlaneMapper,

    /// Bumped on stop and world reset; older requests are stale.
    generation: u64,
    /// Monotonic across restarts, unlike the controller clock.
    elapsed: f64,
    since_depth: f64,
    outstanding: bool,
}

impl ArSession {
    pub fn new(
        controller: TrackingController,
        mapper: MapperConfig,
        config: SessionConfig,
    ) -> Self {
        Self {
            config,
            controller,
            mapper: PlaneMapper::new(mapper),
            generation: 0,
            elapsed: 0.0,
            since_depth: 0.0,
            outstanding: false,
        }
    }

    pub fn start(&mut self) -> TrackingStatus {
        self.invalidate_depth();
        let status = self.controller.start();
        info!(%status, generation = self.generation, "session started");
        status
    }

    pub fn stop(&mut self) {
        self.controller.stop();
        self.invalidate_depth();
    }

    /// Advance tracking by `dt`. Returns a depth request when one is due.
    ///
    /// Every returned request must be resolved with [`ArSession::apply_depth`],
    /// with either a buffer or an error. No further request is issued until it is.
    pub fn tick(&mut self, dt: f64) -> Option<DepthRequest> {
        self.controller.update(dt);
        if dt.is_finite() && dt > 0.0 {
            self.elapsed += dt;
            self.since_depth += dt;
        }

        if self.outstanding || !self.controller.status().is_active() {
            return None;
        }
        if self.since_depth < self.config.depth_interval_s {
            return None;
        }

        self.outstanding = true;
        self.since_depth = 0.0;
        let request = DepthRequest {
            generation: self.generation,
            pose: self.controller.pose(),
            requested_at: self.elapsed,
        };
        debug!(generation = request.generation, at = request.requested_at, "depth requested");
        Some(request)
    }

    /// Feed back the depth estimate for `request`.
    ///
    /// Stale or failed results are dropped and return `None`.
    pub fn apply_depth(
        &mut self,
        request: &DepthRequest,
        depth: Result<DepthBuffer>,
    ) -> Option<MappingOutcome> {
        if request.generation != self.generation {
            debug!(
                request = request.generation,
                current = self.generation,
                "discarding stale depth result"
            );
            return None;
        }
        self.outstanding = false;
        self.since_depth = 0.0;

        let depth = match depth {
            Ok(d) => d,
            Err(e) => {
                debug!("depth estimate failed: {:#}", e);
                return None;
            }
        };

        let outcome = self.mapper.update_from_depth(
            &depth,
            &self.config.intrinsics,
            &request.pose,
            self.config.depth_scale_factor,
            request.requested_at,
        );
        debug!(?outcome, surfaces = self.mapper.surfaces().len(), "depth mapped");
        Some(outcome)
    }

    /// Reset tracking accumulators and forget every surface.
    pub fn reset_world(&mut self) {
        self.controller.reset_world();
        self.mapper.clear();
        self.invalidate_depth();
    }

    pub fn pose(&self) -> CameraPose {
        self.controller.pose()
    }

    pub fn plane(&self) -> Option<CameraPose> {
        self.controller.plane()
    }

    pub fn surfaces(&self) -> &[WorldSurface] {
        self.mapper.surfaces()
    }

    pub fn frame_points(&self) -> Option<&FramePoints> {
        self.controller.frame_points()
    }

    pub fn stats(&self) -> TrackingStats {
        self.controller.stats()
    }

    pub fn status(&self) -> TrackingStatus {
        self.controller.status()
    }

    pub fn status_reason(&self) -> &str {
        self.controller.status_reason()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn invalidate_depth(&mut self) {
        self.generation += 1;
        self.outstanding = false;
        self.since_depth = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::SurfaceId;
    use crate::tracking::{DeviceOrientation, SensorBackend, TrackingConfig};
    use anyhow::anyhow;
    use nalgebra::Vector3;

    const DT: f64 = 1.0 / 60.0;

    struct SteadySensors;

    impl SensorBackend for SteadySensors {
        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn orientation(&self) -> Option<DeviceOrientation> {
            Some(DeviceOrientation {
                alpha: 0.0,
                beta: 90.0,
                gamma: 0.0,
            })
        }

        fn acceleration(&self) -> Option<Vector3<f64>> {
            None
        }

        fn stop(&mut self) {}
    }

    fn session() -> ArSession {
        let controller =
            TrackingController::new(TrackingConfig::default())
                .with_sensors(Box::new(SteadySensors));
        ArSession::new(controller, MapperConfig::default(), SessionConfig::default())
    }

    fn flat_depth() -> DepthBuffer {
        DepthBuffer::new(64, 48, vec![0.4; 64 * 48])
    }

    fn tick_until_request(session: &mut ArSession) -> (usize, DepthRequest) {
        for i in 1..=1000 {
            if let Some(request) = session.tick(DT) {
                return (i, request);
            }
        }
        panic!("no depth request issued");
    }

    #[test]
    fn test_requests_follow_interval_one_at_a_time() {
        let mut session = session();
        assert_eq!(session.start(), TrackingStatus::Initializing);

        let (ticks, request) = tick_until_request(&mut session);
        assert!((71..=73).contains(&ticks), "first request after {ticks} ticks");
        assert_eq!(request.generation, session.generation());

        // Nothing more while the first is outstanding.
        for _ in 0..200 {
            assert!(session.tick(DT).is_none());
        }

        let outcome = session.apply_depth(&request, Ok(flat_depth()));
        assert_eq!(outcome, Some(MappingOutcome::Inserted(SurfaceId(0))));
        assert_eq!(session.surfaces().len(), 1);

        let (ticks, _) = tick_until_request(&mut session);
        assert!((71..=73).contains(&ticks));
    }

    #[test]
    fn test_mapping_uses_pose_from_request() {
        let mut session = session();
        session.start();
        let (_, mut request) = tick_until_request(&mut session);
        request.pose = CameraPose::identity();

        session.apply_depth(&request, Ok(flat_depth()));
        let surface = &session.surfaces()[0];
        // Identity camera looks down -Z so the fitted plane faces +Z.
        assert!(surface.normal.z > 0.99);
    }

    #[test]
    fn test_stale_result_after_stop_is_discarded() {
        let mut session = session();
        session.start();
        let (_, request) = tick_until_request(&mut session);

        session.stop();
        assert_eq!(session.status(), TrackingStatus::Idle);
        session.start();

        assert!(session.apply_depth(&request, Ok(flat_depth())).is_none());
        assert!(session.surfaces().is_empty());
    }

    #[test]
    fn test_failed_estimate_rearms_interval() {
        let mut session = session();
        session.start();
        let (_, request) = tick_until_request(&mut session);

        assert!(session.apply_depth(&request, Err(anyhow!("model not loaded"))).is_none());
        assert!(session.surfaces().is_empty());
        let (ticks, next) = tick_until_request(&mut session);
        assert!((71..=73).contains(&ticks));
        assert_eq!(next.generation, request.generation);
        assert!(next.requested_at > request.requested_at);
    }

    #[test]
    fn test_no_requests_without_pose_source() {
        let controller = TrackingController::new(TrackingConfig::default());
        let mut session =
            ArSession::new(controller, MapperConfig::default(), SessionConfig::default());
        assert_eq!(session.start(), TrackingStatus::Unavailable);
        for _ in 0..300 {
            assert!(session.tick(DT).is_none());
        }
    }

    #[test]
    fn test_reset_world_clears_surfaces_and_invalidates_requests() {
        let mut session = session();
        session.start();
        let (_, request) = tick_until_request(&mut session);
        session.apply_depth(&request, Ok(flat_depth()));
        assert_eq!(session.surfaces().len(), 1);

        let (_, pending) = tick_until_request(&mut session);
        session.reset_world();
        assert!(session.surfaces().is_empty());
        assert!(session.apply_depth(&pending, Ok(flat_depth())).is_none());
    }
}
