//! Surface types shared by the fitter, the fusion store and consumers.

use nalgebra::{Unit, Vector3};

use crate::geometry::Plane;

/// Unique identifier for a tracked surface.
///
/// Assigned sequentially by the fusion store and never reused within a
/// mapper's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Plane observation produced by one fit cycle. Consumed immediately by the
/// fusion store.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneCandidate {
    pub normal: Unit<Vector3<f64>>,
    /// `normal · x + constant = 0`.
    pub constant: f64,
    /// Centroid of the inliers.
    pub center: Vector3<f64>,
    /// Largest inlier distance from `center`, capped.
    pub extent: f64,
    /// Heuristic in `[0, 1]` derived from the inlier ratio.
    pub confidence: f64,
    pub inlier_count: usize,
}

impl PlaneCandidate {
    pub fn plane(&self) -> Plane {
        Plane::new(self.normal, self.constant)
    }

    /// Flip the candidate so its normal points toward `viewpoint`.
    pub fn facing(mut self, viewpoint: &Vector3<f64>) -> Self {
        let oriented = self.plane().facing(viewpoint);
        self.normal = oriented.normal;
        self.constant = oriented.constant;
        self
    }
}

/// A planar surface in the world model.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSurface {
    pub id: SurfaceId,
    pub normal: Unit<Vector3<f64>>,
    pub plane_constant: f64,
    pub center: Vector3<f64>,
    pub extent: f64,
    /// Current confidence in `[0, 1]`, decayed since `last_seen_at`.
    pub confidence: f64,
    /// Mapper timestamp (seconds) of the last fused observation.
    pub last_seen_at: f64,
    /// Confidence at `last_seen_at`; decay is computed from this.
    pub(crate) seen_confidence: f64,
}

impl WorldSurface {
    pub fn plane(&self) -> Plane {
        Plane::new(self.normal, self.plane_constant)
    }

    pub fn age(&self, now: f64) -> f64 {
        (now - self.last_seen_at).max(0.0)
    }
}
