//! Infinite plane in Hessian normal form: `n · x + d = 0`.

use nalgebra::{Matrix3, SymmetricEigen, Unit, Vector3};

/// Triples whose cross product falls under this norm are treated as collinear.
pub const DEGENERATE_CROSS_NORM: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Unit<Vector3<f64>>,
    pub constant: f64,
}

impl Plane {
    pub fn new(normal: Unit<Vector3<f64>>, constant: f64) -> Self {
        Self { normal, constant }
    }

    /// Plane through a point with the given normal.
    pub fn from_point_normal(point: &Vector3<f64>, normal: Unit<Vector3<f64>>) -> Self {
        let constant = -normal.dot(point);
        Self { normal, constant }
    }

    /// Plane through three points, or `None` for a near-degenerate triple.
    pub fn from_points(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Option<Self> {
        let cross = (b - a).cross(&(c - a));
        if cross.norm() < DEGENERATE_CROSS_NORM {
            return None;
        }
        Some(Self::from_point_normal(a, Unit::new_normalize(cross)))
    }

    /// Least-squares plane through a point set (smallest principal axis).
    pub fn fit_least_squares(points: &[Vector3<f64>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let centroid = centroid(points);
        let mut cov = Matrix3::zeros();
        for p in points {
            let d = p - centroid;
            cov += d * d.transpose();
        }

        let eigen = SymmetricEigen::new(cov);
        let (min_idx, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        let axis: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
        if axis.norm() < DEGENERATE_CROSS_NORM {
            return None;
        }
        Some(Self::from_point_normal(&centroid, Unit::new_normalize(axis)))
    }

    #[inline]
    pub fn signed_distance(&self, p: &Vector3<f64>) -> f64 {
        self.normal.dot(p) + self.constant
    }

    /// Same plane with the normal pointing the other way.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            constant: -self.constant,
        }
    }

    /// Orient the normal toward `viewpoint` (the side it lies on).
    pub fn facing(&self, viewpoint: &Vector3<f64>) -> Self {
        if self.signed_distance(viewpoint) < 0.0 {
            self.flipped()
        } else {
            *self
        }
    }
}

pub fn centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    if points.is_empty() {
        return Vector3::zeros();
    }
    let sum: Vector3<f64> = points.iter().sum();
    sum / points.len() as f64
}
