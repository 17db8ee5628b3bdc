//! Temporal fusion of plane candidates into tracked world surfaces.
//!
//! A candidate is matched against the known surfaces by normal alignment and
//! plane-constant distance. Matches are blended in; anything else becomes a
//! new surface. Unobserved surfaces decay exponentially and are pruned once
//! too old or too weak, so the store only ever exposes live, ranked surfaces.

use nalgebra::Unit;
use serde::Deserialize;
use tracing::debug;

use crate::geometry::smoothing::lerp_vec;
use crate::mapping::surface::{PlaneCandidate, SurfaceId, WorldSurface};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Minimum normal dot product for a candidate to match a surface.
    pub normal_alignment: f64,
    /// Maximum plane-constant difference (metres) for a match.
    pub distance_threshold: f64,
    /// Weight of the candidate when blending into a matched surface.
    pub fusion_rate: f64,
    /// Confidence added on every fused observation.
    pub confidence_boost: f64,
    /// Lower clamp for a newly inserted surface's confidence.
    pub min_initial_confidence: f64,
    /// Fraction of confidence kept per second without observation.
    pub decay_rate: f64,
    /// Surfaces unobserved for longer than this are removed.
    pub max_age_s: f64,
    /// Surfaces at or below this confidence are removed.
    pub prune_floor: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            normal_alignment: 0.92,
            distance_threshold: 0.25,
            fusion_rate: 0.2,
            confidence_boost: 0.05,
            min_initial_confidence: 0.3,
            decay_rate: 0.85,
            max_age_s: 12.0,
            prune_floor: 0.12,
        }
    }
}

/// What the store did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionResult {
    Fused(SurfaceId),
    Inserted(SurfaceId),
}

impl FusionResult {
    pub fn id(&self) -> SurfaceId {
        match *self {
            Self::Fused(id) | Self::Inserted(id) => id,
        }
    }
}

/// Owns every tracked surface; the only place surfaces are mutated.
#[derive(Debug, Clone)]
pub struct SurfaceStore {
    config: FusionConfig,
    surfaces: Vec<WorldSurface>,
    next_id: u64,
}

impl SurfaceStore {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            surfaces: Vec::new(),
            next_id: 0,
        }
    }

    /// Surfaces sorted by non-increasing confidence.
    pub fn surfaces(&self) -> &[WorldSurface] {
        &self.surfaces
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn get(&self, id: SurfaceId) -> Option<&WorldSurface> {
        self.surfaces.iter().find(|s| s.id == id)
    }

    /// Drop every surface. Ids keep counting up.
    pub fn clear(&mut self) {
        self.surfaces.clear();
    }

    /// Fuse the candidate into the best-aligned matching surface, or insert
    /// it as a new one.
    pub fn integrate(&mut self, candidate: &PlaneCandidate, now: f64) -> FusionResult {
        match self.find_match(candidate) {
            Some(idx) => {
                let rate = self.config.fusion_rate.clamp(0.0, 1.0);
                let boost = self.config.confidence_boost;
                let surface = &mut self.surfaces[idx];

                surface.normal = Unit::try_new(
                    lerp_vec(&surface.normal, &candidate.normal, rate),
                    f64::EPSILON,
                )
                .unwrap_or(surface.normal);
                surface.plane_constant += (candidate.constant - surface.plane_constant) * rate;
                surface.center = lerp_vec(&surface.center, &candidate.center, rate);
                surface.extent += (candidate.extent - surface.extent) * rate;
                let blended =
                    surface.confidence + (candidate.confidence - surface.confidence) * rate;
                surface.confidence = (blended + boost).clamp(0.0, 1.0);
                surface.seen_confidence = surface.confidence;
                surface.last_seen_at = now;

                debug!(
                    id = %surface.id,
                    confidence = surface.confidence,
                    "fused plane observation"
                );
                FusionResult::Fused(surface.id)
            }
            None => {
                let id = SurfaceId::new(self.next_id);
                self.next_id += 1;
                let confidence = candidate
                    .confidence
                    .max(self.config.min_initial_confidence)
                    .clamp(0.0, 1.0);
                self.surfaces.push(WorldSurface {
                    id,
                    normal: candidate.normal,
                    plane_constant: candidate.constant,
                    center: candidate.center,
                    extent: candidate.extent,
                    confidence,
                    last_seen_at: now,
                    seen_confidence: confidence,
                });
                debug!(%id, confidence, "new surface");
                FusionResult::Inserted(id)
            }
        }
    }

    /// Decay every surface by its time since last observation, drop expired
    /// or weak ones and re-rank the rest.
    pub fn decay_and_prune(&mut self, now: f64) {
        let rate = self.config.decay_rate.clamp(0.0, 1.0);
        for surface in &mut self.surfaces {
            let age = surface.age(now);
            surface.confidence = (surface.seen_confidence * rate.powf(age)).clamp(0.0, 1.0);
        }

        let before = self.surfaces.len();
        let (max_age, floor) = (self.config.max_age_s, self.config.prune_floor);
        self.surfaces
            .retain(|s| s.age(now) <= max_age && s.confidence > floor);
        let pruned = before - self.surfaces.len();
        if pruned > 0 {
            debug!(pruned, remaining = self.surfaces.len(), "pruned stale surfaces");
        }

        self.surfaces.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    fn find_match(&self, candidate: &PlaneCandidate) -> Option<usize> {
        self.surfaces
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let alignment = s.normal.dot(&candidate.normal);
                let offset = (s.plane_constant - candidate.constant).abs();
                (alignment >= self.config.normal_alignment
                    && offset < self.config.distance_threshold)
                    .then_some((i, alignment))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}
