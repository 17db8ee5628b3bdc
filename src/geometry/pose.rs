//! Camera pose: world-frame rigid transform handed to consumers.
//!
//! Raw poses arrive from the opaque tracker as flat 4x4 matrices in
//! column-major order. Decoding validates the shape, strips any uniform scale
//! from the rotation block and applies the backend's axis convention.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use serde::Deserialize;
use thiserror::Error;

/// Rotation blocks whose determinant falls below this are rejected.
const MIN_ROTATION_DET: f64 = 1e-3;

/// Reasons a raw tracker matrix cannot be turned into a pose.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseDecodeError {
    #[error("expected 16 matrix elements, got {0}")]
    WrongLength(usize),
    #[error("matrix contains non-finite values")]
    NonFinite,
    #[error("rotation block is degenerate (det = {0:.3e})")]
    DegenerateRotation(f64),
}

/// Per-axis sign flips that map a backend's camera convention onto ours.
///
/// Applied as a change of basis `S`: the rotation becomes `S R S` and the
/// translation `S t`, so the result is still a proper rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AxisFixup {
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_z: bool,
}

impl AxisFixup {
    fn signs(&self) -> Vector3<f64> {
        let s = |flip: bool| if flip { -1.0 } else { 1.0 };
        Vector3::new(s(self.flip_x), s(self.flip_y), s(self.flip_z))
    }
}

/// World-frame camera pose (T_wc).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl CameraPose {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Decode a flat column-major 4x4 matrix.
    pub fn from_column_major(
        elements: &[f64],
        fixup: &AxisFixup,
    ) -> Result<Self, PoseDecodeError> {
        if elements.len() != 16 {
            return Err(PoseDecodeError::WrongLength(elements.len()));
        }
        if elements.iter().any(|v| !v.is_finite()) {
            return Err(PoseDecodeError::NonFinite);
        }
        Self::from_matrix(&Matrix4::from_column_slice(elements), fixup)
    }

    /// Build from a homogeneous matrix `[s*R | t; 0 | 1]`.
    pub fn from_matrix(mat: &Matrix4<f64>, fixup: &AxisFixup) -> Result<Self, PoseDecodeError> {
        let block: Matrix3<f64> = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let det = block.determinant();
        if !det.is_finite() || det < MIN_ROTATION_DET {
            return Err(PoseDecodeError::DegenerateRotation(det));
        }

        // Uniform scale is the cube root of the determinant.
        let rotation_mat = block / det.cbrt();
        let signs = fixup.signs();
        let basis = Matrix3::from_diagonal(&signs);
        let rotation_mat = basis * rotation_mat * basis;
        let translation = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]).component_mul(&signs);

        let rotation = Rotation3::from_matrix_eps(&rotation_mat, 1e-9, 64, Rotation3::identity());
        Ok(Self {
            position: translation,
            orientation: UnitQuaternion::from_rotation_matrix(&rotation),
        })
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = self.orientation.to_homogeneous();
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        mat
    }

    /// Map a camera-frame point into the world.
    pub fn transform_point(&self, p_cam: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * p_cam + self.position
    }

    /// Translation distance and shortest rotation angle (radians) to `other`.
    pub fn delta(&self, other: &CameraPose) -> (f64, f64) {
        let dp = (other.position - self.position).norm();
        let dq = self.orientation.angle_to(&other.orientation);
        (dp, dq)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::identity()
    }
}
