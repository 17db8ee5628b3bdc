//! Plane mapper: depth sample in, ranked world surfaces out.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::geometry::{CameraIntrinsics, CameraPose};
use crate::mapping::config::MapperConfig;
use crate::mapping::fusion::{FusionResult, SurfaceStore};
use crate::mapping::ransac::{fit_plane_ransac, summarize_fit};
use crate::mapping::sampler::{DepthBuffer, sample_points};
use crate::mapping::surface::{SurfaceId, WorldSurface};

/// Result of one mapping cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOutcome {
    /// The observation was merged into an existing surface.
    Fused(SurfaceId),
    /// The observation became a new surface.
    Inserted(SurfaceId),
    /// Not enough valid depth samples to attempt a fit.
    TooFewPoints(usize),
    /// No plane had enough support.
    NoPlane,
    /// Malformed depth buffer, intrinsics, scale or timestamp.
    InvalidInput,
}

impl MappingOutcome {
    pub fn surface(&self) -> Option<SurfaceId> {
        match *self {
            Self::Fused(id) | Self::Inserted(id) => Some(id),
            _ => None,
        }
    }
}

impl From<FusionResult> for MappingOutcome {
    fn from(result: FusionResult) -> Self {
        match result {
            FusionResult::Fused(id) => Self::Fused(id),
            FusionResult::Inserted(id) => Self::Inserted(id),
        }
    }
}

pub struct PlaneMapper {
    config: MapperConfig,
    store: SurfaceStore,
    rng: StdRng,
}

impl PlaneMapper {
    pub fn new(config: MapperConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.ransac.seed);
        let store = SurfaceStore::new(config.fusion.clone());
        Self { config, store, rng }
    }

    /// Ingest one depth sample taken at `pose`.
    ///
    /// Decay and pruning run on every call with a finite timestamp, whether
    /// or not a plane was found.
    pub fn update_from_depth(
        &mut self,
        depth: &DepthBuffer,
        intrinsics: &CameraIntrinsics,
        pose: &CameraPose,
        scale_factor: f64,
        timestamp_s: f64,
    ) -> MappingOutcome {
        if !timestamp_s.is_finite() {
            return MappingOutcome::InvalidInput;
        }
        let outcome = self.observe(depth, intrinsics, pose, scale_factor, timestamp_s);
        self.store.decay_and_prune(timestamp_s);
        outcome
    }

    /// Surfaces by non-increasing confidence.
    pub fn surfaces(&self) -> &[WorldSurface] {
        self.store.surfaces()
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    fn observe(
        &mut self,
        depth: &DepthBuffer,
        intrinsics: &CameraIntrinsics,
        pose: &CameraPose,
        scale_factor: f64,
        now: f64,
    ) -> MappingOutcome {
        let Some(points) =
            sample_points(depth, intrinsics, pose, scale_factor, &self.config.sampler)
        else {
            debug!(
                width = depth.width,
                height = depth.height,
                len = depth.data.len(),
                "rejected malformed depth input"
            );
            return MappingOutcome::InvalidInput;
        };

        if points.len() < self.config.min_points {
            debug!(samples = points.len(), "too few depth samples");
            return MappingOutcome::TooFewPoints(points.len());
        }

        let Some(fit) = fit_plane_ransac(&points, &self.config.ransac, &mut self.rng) else {
            debug!(samples = points.len(), "no supported plane");
            return MappingOutcome::NoPlane;
        };

        let candidate =
            summarize_fit(&points, &fit, &self.config.ransac).facing(&pose.position);
        debug!(
            inliers = candidate.inlier_count,
            samples = points.len(),
            confidence = candidate.confidence,
            "plane candidate"
        );
        self.store.integrate(&candidate, now).into()
    }
}
