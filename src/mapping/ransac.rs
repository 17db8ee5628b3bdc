//! Dominant plane extraction with 3-point RANSAC.
//!
//! Each iteration samples three distinct points, rejects collinear triples,
//! and scores the plane by counting points within `inlier_threshold`. The
//! best hypothesis is then refined with a least-squares fit over its inliers.

use nalgebra::Vector3;
use rand::Rng;
use serde::Deserialize;

use crate::geometry::{Plane, centroid};
use crate::mapping::surface::PlaneCandidate;

/// Configuration for the plane RANSAC fitter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Number of random hypotheses per fit.
    pub iterations: usize,
    /// Point-to-plane distance (metres) for a point to count as inlier.
    pub inlier_threshold: f64,
    /// Fits with fewer inliers are discarded.
    pub min_inliers: usize,
    /// Seed for the fitter's random generator.
    pub seed: u64,
    /// Cap on the reported surface extent (metres).
    pub max_extent: f64,
    /// Inlier ratio is multiplied by this before clamping into a confidence.
    pub confidence_scale: f64,
    /// Lower clamp of the candidate confidence.
    pub min_candidate_confidence: f64,
    /// Re-fit the best hypothesis over all of its inliers.
    pub refine: bool,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            iterations: 60,
            inlier_threshold: 0.05,
            min_inliers: 40,
            seed: 0x5eed,
            max_extent: 4.0,
            confidence_scale: 1.2,
            min_candidate_confidence: 0.3,
            refine: true,
        }
    }
}

/// Best plane hypothesis and its support.
#[derive(Debug, Clone)]
pub struct PlaneFit {
    pub plane: Plane,
    /// Indices into the input slice.
    pub inliers: Vec<usize>,
    /// Mean absolute point-to-plane distance of the inliers.
    pub mean_error: f64,
}

impl PlaneFit {
    pub fn num_inliers(&self) -> usize {
        self.inliers.len()
    }
}

/// Find the plane supported by the most points.
///
/// Returns `None` when there are fewer than three points or the best
/// hypothesis has fewer than `min_inliers` inliers.
pub fn fit_plane_ransac(
    points: &[Vector3<f64>],
    config: &RansacConfig,
    rng: &mut impl Rng,
) -> Option<PlaneFit> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let mut best: Option<PlaneFit> = None;
    for _ in 0..config.iterations {
        let [i, j, k] = sample_three_indices(rng, n);
        let plane = match Plane::from_points(&points[i], &points[j], &points[k]) {
            Some(p) => p,
            None => continue,
        };

        let (inliers, mean_error) = find_inliers(points, &plane, config.inlier_threshold);
        if best.as_ref().map_or(true, |b| inliers.len() > b.inliers.len()) {
            best = Some(PlaneFit {
                plane,
                inliers,
                mean_error,
            });
        }
    }

    if config.refine {
        if let Some(ref mut fit) = best {
            let support: Vec<_> = fit.inliers.iter().map(|&i| points[i]).collect();
            if let Some(refined) = Plane::fit_least_squares(&support) {
                let (new_inliers, new_error) =
                    find_inliers(points, &refined, config.inlier_threshold);
                if new_inliers.len() >= fit.inliers.len() {
                    fit.plane = refined;
                    fit.inliers = new_inliers;
                    fit.mean_error = new_error;
                }
            }
        }
    }

    best.filter(|fit| fit.num_inliers() >= config.min_inliers)
}

/// Summarize a fit as a plane candidate.
pub fn summarize_fit(
    points: &[Vector3<f64>],
    fit: &PlaneFit,
    config: &RansacConfig,
) -> PlaneCandidate {
    let support: Vec<_> = fit.inliers.iter().map(|&i| points[i]).collect();
    let center = centroid(&support);
    let extent = support
        .iter()
        .map(|p| (p - center).norm())
        .fold(0.0, f64::max)
        .min(config.max_extent);
    let ratio = if points.is_empty() {
        0.0
    } else {
        fit.num_inliers() as f64 / points.len() as f64
    };
    let floor = config.min_candidate_confidence.min(1.0);
    let confidence = (ratio * config.confidence_scale).clamp(floor, 1.0);

    PlaneCandidate {
        normal: fit.plane.normal,
        constant: fit.plane.constant,
        center,
        extent,
        confidence,
        inlier_count: fit.num_inliers(),
    }
}

/// Collect inliers for a plane and their mean absolute distance.
fn find_inliers(points: &[Vector3<f64>], plane: &Plane, threshold: f64) -> (Vec<usize>, f64) {
    let mut inliers = Vec::new();
    let mut sum_error = 0.0;

    for (i, p) in points.iter().enumerate() {
        let dist = plane.signed_distance(p).abs();
        if dist <= threshold {
            inliers.push(i);
            sum_error += dist;
        }
    }

    let mean_error = if inliers.is_empty() {
        f64::INFINITY
    } else {
        sum_error / inliers.len() as f64
    };

    (inliers, mean_error)
}

/// Sample three unique random indices.
fn sample_three_indices(rng: &mut impl Rng, n: usize) -> [usize; 3] {
    let mut indices = [0usize; 3];
    indices[0] = rng.gen_range(0..n);

    loop {
        indices[1] = rng.gen_range(0..n);
        if indices[1] != indices[0] {
            break;
        }
    }

    loop {
        indices[2] = rng.gen_range(0..n);
        if indices[2] != indices[0] && indices[2] != indices[1] {
            break;
        }
    }

    indices
}
